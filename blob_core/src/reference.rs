use std::fmt;

use crate::error::ServiceError;

pub const REFERENCE_HEX_LEN: usize = 64;

/// A 32-byte content-style reference, expressed as 64 lowercase hex
/// characters on the wire and on disk. Input is case-insensitive and
/// normalized to lowercase before use.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reference([u8; 32]);

impl Reference {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        if raw.len() != REFERENCE_HEX_LEN {
            return Err(ServiceError::validation(format!(
                "reference must be {REFERENCE_HEX_LEN} hex characters, got {}",
                raw.len()
            )));
        }
        if !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ServiceError::validation(
                "reference must contain only hex characters",
            ));
        }
        let lower = raw.to_ascii_lowercase();
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&lower, &mut bytes)
            .map_err(|_| ServiceError::validation("reference is not valid hex"))?;
        Ok(Reference(bytes))
    }

    /// The first two hex characters, used to shard the storage directory.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "aa0000000000000000000000000000000000000000000000000000000000000a";

    #[test]
    fn valid_fixture_is_64_chars() {
        assert_eq!(VALID.len(), REFERENCE_HEX_LEN);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Reference::parse(&VALID[..63]).is_err());
        assert!(Reference::parse(&format!("{VALID}a")).is_err());
    }

    #[test]
    fn normalizes_mixed_case() {
        let upper = VALID.to_ascii_uppercase();
        let parsed = Reference::parse(&upper).unwrap();
        assert_eq!(parsed.to_string(), VALID);
    }

    #[test]
    fn rejects_non_hex() {
        let mut bad = VALID.to_string();
        bad.replace_range(0..1, "g");
        assert!(Reference::parse(&bad).is_err());
    }

    #[test]
    fn shard_prefix_is_first_two_hex_chars() {
        let r = Reference::parse(VALID).unwrap();
        assert_eq!(r.shard_prefix(), &VALID[0..2]);
    }
}
