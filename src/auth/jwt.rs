//! JWT Token Handler
//! Mission: Issue and verify signed access tokens

use crate::auth::models::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use thiserror::Error;
use tracing::{debug, warn};

/// Token verification failures, in check order: structure, signature, expiry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Malformed token")]
    Malformed,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token has expired")]
    Expired,
    #[error("Token encoding failed")]
    Encoding,
}

/// JWT handler for token operations.
///
/// The signing key is process-wide: constructed once at startup and shared
/// read-only behind an Arc. With no configured secret a random key is
/// generated, so tokens do not survive a process restart in that mode.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
}

impl JwtHandler {
    pub fn new(secret: Option<String>, access_ttl_secs: i64) -> Self {
        let key_bytes = match secret {
            Some(s) if !s.trim().is_empty() => s.into_bytes(),
            _ => {
                warn!("No JWT_SECRET configured - using a generated key. Tokens will not survive a restart!");
                let mut bytes = vec![0u8; 64];
                rand::thread_rng().fill_bytes(&mut bytes);
                bytes
            }
        };

        Self {
            encoding_key: EncodingKey::from_secret(&key_bytes),
            decoding_key: DecodingKey::from_secret(&key_bytes),
            access_ttl_secs,
        }
    }

    /// Issue a signed token with the given subject, authorities and lifetime.
    /// Pure function of inputs + key: no side effects.
    pub fn issue(
        &self,
        subject: &str,
        authorities: &[String],
        ttl_secs: i64,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            roles: authorities.to_vec(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        };

        debug!("Issuing token for subject {} (ttl {}s)", subject, ttl_secs);

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| JwtError::Encoding)
    }

    /// Issue an access token with the configured access TTL.
    pub fn issue_access(&self, subject: &str, authorities: &[String]) -> Result<String, JwtError> {
        self.issue(subject, authorities, self.access_ttl_secs)
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// A token with a valid signature but past expiry is always `Expired`,
    /// never treated as valid.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::Malformed,
            })
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }
}
