use std::fmt;

use crate::error::ServiceError;

/// A tenant namespace carried in the auth token.
///
/// Bucket names are also used as a filesystem path component, so they are
/// restricted to a conservative charset: tokens are minted from
/// operator-supplied strings and must never be able to smuggle a path
/// separator or traversal sequence into the storage root.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bucket(String);

impl Bucket {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        if raw.is_empty() {
            return Err(ServiceError::validation("bucket must not be empty"));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ServiceError::validation(
                "bucket must contain only alphanumeric characters, '-' or '_'",
            ));
        }
        Ok(Bucket(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_names() {
        assert!(Bucket::parse("b1").is_ok());
        assert!(Bucket::parse("my-bucket_01").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(Bucket::parse("").is_err());
    }

    #[test]
    fn rejects_path_separators_and_traversal() {
        assert!(Bucket::parse("../etc").is_err());
        assert!(Bucket::parse("a/b").is_err());
        assert!(Bucket::parse("a\\b").is_err());
        assert!(Bucket::parse("..").is_err());
    }
}
