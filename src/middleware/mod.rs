/// Middleware module
///
/// Request authentication, request logging and response hardening.

mod authenticate;
mod request_logger;
mod security;

pub use authenticate::{authenticate, bearer_token, AuthenticatedUser};
pub use request_logger::RequestLogger;
pub use security::{json_config, security_headers, MAX_JSON_BODY_BYTES, SECURITY_HEADERS};
