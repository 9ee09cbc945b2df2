/// Authentication Routes
///
/// Registration, login, refresh token rotation, logout and identity lookup.
/// The refresh token travels only in an HTTP-only cookie scoped to
/// `/auth/refresh`; the access token travels in JSON bodies and bearer headers.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::auth::{PasswordHasher, TokenService, REFRESH_TOKEN_TTL_DAYS};
use crate::configuration::Environment;
use crate::error::{AppError, AuthError, RefreshError, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::store::{NewUser, UserStore};
use crate::validators::{is_valid_email, is_valid_name, normalize_email};

pub const REFRESH_COOKIE: &str = "refreshToken";
pub const REFRESH_COOKIE_PATH: &str = "/auth/refresh";

/// Attributes of the refresh token cookie
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            secure: environment.is_production(),
        }
    }

    fn refresh_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build(REFRESH_COOKIE, value)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path(REFRESH_COOKIE_PATH)
            .max_age(CookieDuration::days(REFRESH_TOKEN_TTL_DAYS))
            .finish()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.refresh_cookie(String::new());
        cookie.make_removal();
        cookie
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: AuthenticatedUser,
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email, password shorter than 8 characters, missing fields
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    users: web::Data<dyn UserStore>,
    passwords: web::Data<PasswordHasher>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(form.name.as_deref())?;
    let password = form.password.clone();
    let hasher = passwords.clone();
    let password_hash = web::block(move || hasher.hash(&password)).await??;

    let user = users
        .create_user(NewUser {
            email,
            name,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "User created".to_string(),
        user_id: user.id.to_string(),
    }))
}

/// POST /auth/login
///
/// Returns the access token in the body and sets the refresh token cookie.
///
/// # Security Notes
/// - Unknown email and wrong password give the same 401 response
/// - A bcrypt comparison runs in both cases, so timing does not reveal
///   whether the account exists
pub async fn login(
    form: web::Json<LoginRequest>,
    users: web::Data<dyn UserStore>,
    passwords: web::Data<PasswordHasher>,
    tokens: web::Data<TokenService>,
    cookies: web::Data<CookieSettings>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&form.email);
    if email.is_empty() || form.password.is_empty() {
        return Err(ValidationError::EmptyField("email and password".to_string()).into());
    }

    let user = users.find_by_email(&email).await?;
    // bcrypt runs on the blocking pool, not the worker thread
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let password = form.password.clone();
    let hasher = passwords.clone();
    let password_valid =
        web::block(move || hasher.verify(&password, stored_hash.as_deref())).await??;

    let user = match user {
        Some(user) if password_valid => user,
        _ => return Err(AuthError::InvalidCredentials.into()),
    };

    let issued = tokens.login(user.id, &user.email).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(HttpResponse::Ok()
        .cookie(cookies.refresh_cookie(issued.refresh_token))
        .json(AccessTokenResponse {
            access_token: issued.access_token,
        }))
}

/// POST /auth/refresh
///
/// Exchanges the refresh token cookie for a new access token and a new
/// refresh token cookie. Any refresh token failure clears the cookie.
///
/// # Errors
/// - 401 `No refresh token`: cookie absent
/// - 401 `Invalid or expired refresh token`: unknown, revoked or expired token
/// - 401 `Security violation detected. Please login again.`: the token had
///   already been used; every session of the user is revoked
pub async fn refresh(
    req: HttpRequest,
    users: web::Data<dyn UserStore>,
    tokens: web::Data<TokenService>,
    cookies: web::Data<CookieSettings>,
) -> Result<HttpResponse, AppError> {
    let raw_token = match req.cookie(REFRESH_COOKIE) {
        Some(cookie) if !cookie.value().is_empty() => cookie.value().to_string(),
        _ => return Err(RefreshError::Missing.into()),
    };

    match exchange_refresh_token(&raw_token, users.get_ref(), tokens.get_ref()).await {
        Ok((access_token, refresh_token)) => Ok(HttpResponse::Ok()
            .cookie(cookies.refresh_cookie(refresh_token))
            .json(AccessTokenResponse { access_token })),
        Err(e @ AppError::Refresh(_)) => {
            let mut response = e.error_response();
            response
                .add_cookie(&cookies.removal_cookie())
                .map_err(|e| AppError::Internal(format!("Failed to clear cookie: {}", e)))?;
            Ok(response)
        }
        Err(e) => Err(e),
    }
}

async fn exchange_refresh_token(
    raw_token: &str,
    users: &dyn UserStore,
    tokens: &TokenService,
) -> Result<(String, String), AppError> {
    let rotated = tokens.rotate(raw_token).await?;

    let user = users
        .find_by_id(rotated.user_id)
        .await?
        .ok_or(RefreshError::UserNotFound)?;
    let access_token = tokens.issuer().sign(&user.id, &user.email)?;

    Ok((access_token, rotated.refresh_token))
}

/// POST /auth/logout
///
/// Revokes the presented refresh token if there is one and clears the
/// cookie. Always 200.
pub async fn logout(
    req: HttpRequest,
    tokens: web::Data<TokenService>,
    cookies: web::Data<CookieSettings>,
) -> HttpResponse {
    if let Some(cookie) = req.cookie(REFRESH_COOKIE) {
        tokens.logout(cookie.value()).await;
    }

    HttpResponse::Ok()
        .cookie(cookies.removal_cookie())
        .json(serde_json::json!({ "message": "logged out" }))
}

/// GET /auth/me
///
/// **Requires** `Authorization: Bearer <access_token>`.
pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(MeResponse { user })
}
