/// Response hardening and request size limits
///
/// Every response carries a fixed set of security headers, and JSON bodies
/// larger than 10 KiB are refused with 413 before they are parsed.

use actix_web::middleware::DefaultHeaders;
use actix_web::web;

/// Largest JSON request body any handler accepts
pub const MAX_JSON_BODY_BYTES: usize = 10 * 1024;

pub const SECURITY_HEADERS: [(&str, &str); 8] = [
    ("Content-Security-Policy", "default-src 'none'; frame-ancestors 'none'"),
    ("Cross-Origin-Opener-Policy", "same-origin"),
    ("Cross-Origin-Resource-Policy", "same-origin"),
    ("Referrer-Policy", "no-referrer"),
    ("Strict-Transport-Security", "max-age=15552000; includeSubDomains"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "0"),
];

/// Middleware adding `SECURITY_HEADERS` to responses that do not set them
pub fn security_headers() -> DefaultHeaders {
    SECURITY_HEADERS
        .iter()
        .fold(DefaultHeaders::new(), |headers, &header| headers.add(header))
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().limit(MAX_JSON_BODY_BYTES)
}
