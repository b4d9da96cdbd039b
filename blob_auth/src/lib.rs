//! Bearer token minting and verification.
//!
//! A token is `base64url(claims_json) + "." + hex(hmac_sha256(secret, claims_json))`.
//! `claims_json` is `{"bucket": "<name>", "iat": <ms since epoch>}`. Signature
//! verification uses [`Mac::verify_slice`], which compares in constant time,
//! so no two candidate tokens take measurably different time to reject.
//!
//! Any failure (malformed token, bad signature, missing or invalid bucket
//! claim) collapses to the single opaque [`ServiceError::AccessDenied`];
//! callers never learn which check failed.

use base64::Engine;
use blob_core::{Bucket, ServiceError, now_ms};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Placeholder secret used when `TOKEN_SECRET` is unset. Deployments that
/// run with this value are insecure; the CLI logs a warning at startup.
pub const INSECURE_DEFAULT_SECRET: &str = "insecure-default-token-secret";

#[derive(Serialize, Deserialize)]
struct Claims {
    bucket: String,
    iat: u64,
}

/// Verifies and mints bearer tokens against a single process-wide secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        TokenVerifier {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Mints a fresh, signed token for `bucket`.
    pub fn mint(&self, bucket: &Bucket) -> String {
        let claims = Claims {
            bucket: bucket.as_str().to_string(),
            iat: now_ms(),
        };
        let claims_json = serde_json::to_vec(&claims).expect("Claims always serializes");
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&claims_json);

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(&claims_json);
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{payload}.{signature}")
    }

    /// Verifies `token` and returns the bucket it authorizes, or
    /// [`ServiceError::AccessDenied`] for any failure.
    pub fn verify(&self, token: &str) -> Result<Bucket, ServiceError> {
        let (payload, signature_hex) = token.split_once('.').ok_or(ServiceError::AccessDenied)?;

        let claims_json = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| ServiceError::AccessDenied)?;

        let signature =
            hex::decode(signature_hex).map_err(|_| ServiceError::AccessDenied)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(&claims_json);
        mac.verify_slice(&signature)
            .map_err(|_| ServiceError::AccessDenied)?;

        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| ServiceError::AccessDenied)?;

        Bucket::parse(&claims.bucket).map_err(|_| ServiceError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_then_verify_round_trips() {
        let verifier = TokenVerifier::new("s3cr3t");
        let bucket = Bucket::parse("b1").unwrap();
        let token = verifier.mint(&bucket);
        let verified = verifier.verify(&token).unwrap();
        assert_eq!(verified, bucket);
    }

    #[test]
    fn wrong_secret_is_denied() {
        let minted = TokenVerifier::new("s3cr3t");
        let token = minted.mint(&Bucket::parse("b1").unwrap());

        let checker = TokenVerifier::new("different-secret");
        assert!(matches!(
            checker.verify(&token),
            Err(ServiceError::AccessDenied)
        ));
    }

    #[test]
    fn tampered_payload_is_denied() {
        let verifier = TokenVerifier::new("s3cr3t");
        let token = verifier.mint(&Bucket::parse("b1").unwrap());
        let (_, sig) = token.split_once('.').unwrap();
        let tampered_claims =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(br#"{"bucket":"b2","iat":0}"#);
        let tampered = format!("{tampered_claims}.{sig}");
        assert!(matches!(
            verifier.verify(&tampered),
            Err(ServiceError::AccessDenied)
        ));
    }

    #[test]
    fn malformed_token_is_denied() {
        let verifier = TokenVerifier::new("s3cr3t");
        assert!(matches!(
            verifier.verify("not-a-token"),
            Err(ServiceError::AccessDenied)
        ));
        assert!(matches!(
            verifier.verify("..."),
            Err(ServiceError::AccessDenied)
        ));
    }

    #[test]
    fn invalid_bucket_claim_is_denied() {
        let verifier = TokenVerifier::new("s3cr3t");
        let claims_json = br#"{"bucket":"../etc","iat":0}"#;
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(claims_json);
        let mut mac = HmacSha256::new_from_slice(b"s3cr3t").unwrap();
        mac.update(claims_json);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(matches!(
            verifier.verify(&format!("{payload}.{sig}")),
            Err(ServiceError::AccessDenied)
        ));
    }
}
