/// Access Token Signing and Verification
///
/// Short-lived RS256 bearer tokens. Stateless: nothing is stored, nothing is
/// revoked; a token is valid until its `exp`.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, AUDIENCE, ISSUER};
use crate::auth::keys::KeyProvider;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

#[derive(Clone)]
pub struct AccessTokenIssuer {
    keys: Arc<KeyProvider>,
    expiry_seconds: i64,
}

impl AccessTokenIssuer {
    pub fn new(keys: Arc<KeyProvider>, expiry_seconds: i64) -> Self {
        Self {
            keys,
            expiry_seconds,
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(
            Arc::new(KeyProvider::from_settings(settings)),
            settings.access_token_expiry,
        )
    }

    /// Access token lifetime in seconds
    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_seconds
    }

    /// Sign a new access token for a user, valid from now
    pub fn sign(&self, user_id: &Uuid, email: &str) -> Result<String, AppError> {
        self.sign_at(user_id, email, Utc::now().timestamp())
    }

    /// Sign an access token as if issued at `issued_at` (Unix seconds)
    ///
    /// # Errors
    /// Returns a configuration error if the signing key cannot be loaded.
    pub fn sign_at(&self, user_id: &Uuid, email: &str, issued_at: i64) -> Result<String, AppError> {
        let keys = self.keys.keys()?;
        let claims = Claims::new(*user_id, email.to_string(), issued_at, self.expiry_seconds);

        encode(&Header::new(Algorithm::RS256), &claims, &keys.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate an access token and extract its claims
    ///
    /// Checks signature (RS256 only), issuer, audience and expiry with no
    /// leeway.
    ///
    /// # Errors
    /// - `AuthError::ExpiredCredential` if `exp` has passed
    /// - `AuthError::MalformedCredential` for anything else wrong with the token
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let keys = self.keys.keys()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Auth(AuthError::ExpiredCredential),
                _ => {
                    tracing::debug!(error = %e, "Access token rejected");
                    AppError::Auth(AuthError::MalformedCredential)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::EncodingKey;
    use serde::Serialize;

    const PRIVATE_PEM: &[u8] = include_bytes!("../../tests/fixtures/private_key.pem");
    const PUBLIC_PEM: &[u8] = include_bytes!("../../tests/fixtures/public_key.pem");

    fn test_issuer() -> AccessTokenIssuer {
        AccessTokenIssuer::new(Arc::new(KeyProvider::from_pem(PRIVATE_PEM, PUBLIC_PEM)), 900)
    }

    fn sign_raw<T: Serialize>(claims: &T) -> String {
        let key = EncodingKey::from_rsa_pem(PRIVATE_PEM).unwrap();
        encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let issuer = test_issuer();
        let user_id = Uuid::new_v4();

        let token = issuer.sign(&user_id, "test@example.com").expect("Failed to sign");
        let claims = issuer.verify(&token).expect("Failed to verify");

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.iss, "cheapskate");
        assert_eq!(claims.aud, "cheapskate-client");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_expired_token() {
        let issuer = test_issuer();
        let issued_at = Utc::now().timestamp() - 2 * issuer.expiry_seconds();

        let token = issuer
            .sign_at(&Uuid::new_v4(), "test@example.com", issued_at)
            .expect("Failed to sign");

        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Auth(AuthError::ExpiredCredential))
        ));
    }

    #[test]
    fn test_garbage_token() {
        let issuer = test_issuer();

        assert!(matches!(
            issuer.verify("invalid.token.here"),
            Err(AppError::Auth(AuthError::MalformedCredential))
        ));
    }

    #[test]
    fn test_tampered_token() {
        let issuer = test_issuer();
        let token = issuer.sign(&Uuid::new_v4(), "test@example.com").unwrap();

        let tampered = format!("{}X", token);

        assert!(matches!(
            issuer.verify(&tampered),
            Err(AppError::Auth(AuthError::MalformedCredential))
        ));
    }

    #[test]
    fn test_symmetric_token_rejected() {
        let issuer = test_issuer();
        let claims = Claims::new(Uuid::new_v4(), "test@example.com".into(), Utc::now().timestamp(), 900);
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret-key-at-least-32-characters-long"),
        )
        .unwrap();

        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Auth(AuthError::MalformedCredential))
        ));
    }

    #[test]
    fn test_wrong_audience() {
        let issuer = test_issuer();
        let mut claims = Claims::new(Uuid::new_v4(), "test@example.com".into(), Utc::now().timestamp(), 900);
        claims.aud = "someone-else".to_string();

        assert!(matches!(
            issuer.verify(&sign_raw(&claims)),
            Err(AppError::Auth(AuthError::MalformedCredential))
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let issuer = test_issuer();
        let mut claims = Claims::new(Uuid::new_v4(), "test@example.com".into(), Utc::now().timestamp(), 900);
        claims.iss = "not-cheapskate".to_string();

        assert!(matches!(
            issuer.verify(&sign_raw(&claims)),
            Err(AppError::Auth(AuthError::MalformedCredential))
        ));
    }

    #[test]
    fn test_missing_email_claim() {
        #[derive(Serialize)]
        struct NoEmail {
            sub: String,
            exp: i64,
            iat: i64,
            iss: String,
            aud: String,
        }

        let issuer = test_issuer();
        let now = Utc::now().timestamp();
        let token = sign_raw(&NoEmail {
            sub: Uuid::new_v4().to_string(),
            exp: now + 900,
            iat: now,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        });

        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Auth(AuthError::MalformedCredential))
        ));
    }

    #[test]
    fn test_non_string_email_claim() {
        let issuer = test_issuer();
        let now = Utc::now().timestamp();
        let token = sign_raw(&serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "email": 42,
            "exp": now + 900,
            "iat": now,
            "iss": ISSUER,
            "aud": AUDIENCE,
        }));

        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Auth(AuthError::MalformedCredential))
        ));
    }

    #[test]
    fn test_unloadable_keys_are_not_credential_errors() {
        let issuer = AccessTokenIssuer::new(
            Arc::new(KeyProvider::from_files("/nonexistent/a.pem", "/nonexistent/b.pem")),
            900,
        );

        assert!(matches!(
            issuer.sign(&Uuid::new_v4(), "test@example.com"),
            Err(AppError::Config(_))
        ));
        assert!(matches!(issuer.verify("a.b.c"), Err(AppError::Config(_))));
    }
}
