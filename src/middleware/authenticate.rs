/// Bearer Token Authentication
///
/// `AuthenticatedUser` is an extractor: a handler that takes it as an
/// argument only runs when the request carries a valid access token, and
/// receives the caller's identity as a plain value.

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AccessTokenIssuer;
use crate::error::{AppError, AuthError};

/// Identity of the caller, taken from a verified access token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: Option<&str>) -> Option<&str> {
    header_value
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verify the bearer token and build the caller identity. Stateless: only
/// the token itself is consulted.
pub fn authenticate(
    header_value: Option<&str>,
    issuer: &AccessTokenIssuer,
) -> Result<AuthenticatedUser, AppError> {
    let token = bearer_token(header_value).ok_or(AuthError::MissingToken)?;
    let claims = issuer.verify(token)?;

    Ok(AuthenticatedUser {
        id: claims.user_id()?,
        email: claims.email,
    })
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let issuer = match req.app_data::<web::Data<AccessTokenIssuer>>() {
            Some(issuer) => issuer,
            None => {
                return ready(Err(AppError::Internal(
                    "AccessTokenIssuer is not registered as app data".to_string(),
                )))
            }
        };

        let header_value = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let result = authenticate(header_value, issuer);
        match &result {
            Ok(user) => tracing::debug!(user_id = %user.id, "Access token accepted"),
            Err(e) => tracing::warn!(path = %req.path(), error = %e, "Access token rejected"),
        }

        ready(result)
    }
}
