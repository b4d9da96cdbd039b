use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Maximum length, in base64 *text* characters, of a blob's `data` field.
/// This bounds the decoded payload to roughly 1 MiB and is expressed on the
/// encoded form because that is the form actually received and stored.
pub const MAX_DATA_TEXT_LEN: usize = 0x0010_0000;

/// The stored record for one reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobRecord {
    /// Opaque payload, base64 text as received from the client.
    pub data: String,
    pub version: u64,
    /// Milliseconds since epoch; set once on first write, never mutated.
    pub created: u64,
    /// Milliseconds since epoch; absent on the first version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
    /// Best-effort client-origin string.
    pub ip: String,
}

/// Validates a candidate `data` payload: must be valid base64 text and no
/// longer than [`MAX_DATA_TEXT_LEN`] characters.
pub fn validate_data(data: &str) -> Result<(), ServiceError> {
    if data.len() > MAX_DATA_TEXT_LEN {
        return Err(ServiceError::validation(format!(
            "data exceeds maximum length of {MAX_DATA_TEXT_LEN} characters"
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|_| ServiceError::validation("data is not valid base64"))?;
    Ok(())
}

/// Validates an optional version number from a request. `None` is always
/// accepted (omitted on an initial write); when present it must be a
/// positive integer.
pub fn validate_request_version(version: Option<i64>) -> Result<Option<u64>, ServiceError> {
    match version {
        None => Ok(None),
        Some(v) if v > 0 => Ok(Some(v as u64)),
        Some(_) => Err(ServiceError::validation(
            "version must be a positive integer",
        )),
    }
}
