/// JWT Claims structure
///
/// Payload of an access token: user identity plus the standard
/// registered claims (RFC 7519). Never persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

pub const ISSUER: &str = "cheapskate";
pub const AUDIENCE: &str = "cheapskate-client";

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// User email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    /// Build claims for `user_id` valid for `expiry_seconds` from `issued_at`
    pub fn new(user_id: Uuid, email: String, issued_at: i64, expiry_seconds: i64) -> Self {
        Self {
            sub: user_id.to_string(),
            email,
            exp: issued_at + expiry_seconds,
            iat: issued_at,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// A subject that is not a UUID makes the whole credential malformed.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::MalformedCredential))
    }
}
