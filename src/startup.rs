use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AccessTokenIssuer, PasswordHasher, TokenService};
use crate::configuration::Settings;
use crate::error::AppError;
use crate::middleware::{json_config, security_headers, RequestLogger};
use crate::routes::{health_check, login, logout, me, refresh, register, CookieSettings};
use crate::store::{RefreshTokenStore, UserStore};

/// Everything the handlers share
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
    pub cookies: CookieSettings,
}

impl AppState {
    /// Wire services over any store that holds both users and refresh tokens
    pub fn new<S>(store: S, settings: &Settings) -> Result<Self, AppError>
    where
        S: UserStore + RefreshTokenStore + 'static,
    {
        let store = Arc::new(store);
        let refresh_tokens: Arc<dyn RefreshTokenStore> = store.clone();
        let users: Arc<dyn UserStore> = store;

        Ok(Self {
            users,
            tokens: TokenService::new(refresh_tokens, AccessTokenIssuer::from_settings(&settings.jwt)),
            passwords: PasswordHasher::new(settings.password.hash_cost)?,
            cookies: CookieSettings::for_environment(settings.application.environment),
        })
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let users = web::Data::from(state.users);
    let issuer = web::Data::new(state.tokens.issuer().clone());
    let tokens = web::Data::new(state.tokens);
    let passwords = web::Data::new(state.passwords);
    let cookies = web::Data::new(state.cookies);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(security_headers())
            .wrap(RequestLogger)
            .app_data(json_config())
            .app_data(users.clone())
            .app_data(issuer.clone())
            .app_data(tokens.clone())
            .app_data(passwords.clone())
            .app_data(cookies.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .route("/me", web::get().to(me)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
