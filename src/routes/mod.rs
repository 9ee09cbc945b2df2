mod auth;
mod health_check;

pub use auth::{
    login, logout, me, refresh, register, AccessTokenResponse, CookieSettings, LoginRequest,
    RegisterRequest, RegisterResponse, REFRESH_COOKIE, REFRESH_COOKIE_PATH,
};
pub use health_check::health_check;
