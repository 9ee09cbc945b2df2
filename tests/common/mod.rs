#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use cheapskate_auth::auth::{AccessTokenIssuer, KeyProvider, TokenService};
use cheapskate_auth::configuration::{
    ApplicationSettings, DatabaseSettings, Environment, JwtSettings, PasswordSettings, Settings,
};
use cheapskate_auth::startup::{run, AppState};
use cheapskate_auth::store::InMemoryStore;
use serde_json::{json, Value};

pub const ACCESS_TOKEN_EXPIRY: i64 = 900;

pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

pub fn test_settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "127.0.0.1".to_string(),
            database_name: "cheapskate".to_string(),
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: Environment::Local,
        },
        jwt: JwtSettings {
            private_key_path: fixture("private_key.pem"),
            public_key_path: fixture("public_key.pem"),
            access_token_expiry: ACCESS_TOKEN_EXPIRY,
        },
        // lowest bcrypt cost, keeps the suite fast
        password: PasswordSettings { hash_cost: 4 },
    }
}

pub fn test_issuer() -> AccessTokenIssuer {
    AccessTokenIssuer::new(
        Arc::new(KeyProvider::from_files(
            &fixture("private_key.pem"),
            &fixture("public_key.pem"),
        )),
        ACCESS_TOKEN_EXPIRY,
    )
}

pub fn token_service(store: &InMemoryStore) -> TokenService {
    TokenService::new(Arc::new(store.clone()), test_issuer())
}

pub struct TestApp {
    pub address: String,
    pub store: InMemoryStore,
    pub client: reqwest::Client,
}

pub fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = InMemoryStore::new();
    let state = AppState::new(store.clone(), &test_settings()).expect("Failed to build state");
    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/register", &self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/login", &self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn refresh(&self, refresh_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(&format!("{}/auth/refresh", &self.address));
        if let Some(token) = refresh_token {
            request = request.header("Cookie", format!("refreshToken={}", token));
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn logout(&self, refresh_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(&format!("{}/auth/logout", &self.address));
        if let Some(token) = refresh_token {
            request = request.header("Cookie", format!("refreshToken={}", token));
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn me(&self, authorization: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/auth/me", &self.address));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Register and log in; returns (access token, raw refresh token)
    pub async fn signed_in(&self, email: &str, password: &str) -> (String, String) {
        assert_eq!(201, self.register(email, password).await.status().as_u16());
        let response = self.login(email, password).await;
        assert_eq!(200, response.status().as_u16());

        let refresh_token = refresh_cookie_value(&response).expect("login sets refresh cookie");
        let body: Value = response.json().await.expect("Failed to parse response");
        let access_token = body["accessToken"].as_str().unwrap().to_string();
        (access_token, refresh_token)
    }
}

/// Full `Set-Cookie` header for the refresh token, if present
pub fn refresh_set_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("refreshToken="))
        .map(str::to_string)
}

/// Value of the refresh token cookie; `None` when absent or cleared
pub fn refresh_cookie_value(response: &reqwest::Response) -> Option<String> {
    refresh_set_cookie(response)
        .and_then(|header| header.split(';').next().map(str::to_string))
        .map(|pair| pair.trim_start_matches("refreshToken=").to_string())
        .filter(|value| !value.is_empty())
}
