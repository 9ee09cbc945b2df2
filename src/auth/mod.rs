/// Authentication module
///
/// Access token signing/verification, password hashing, and the refresh
/// token lifecycle (issue, rotate, revoke).

mod claims;
mod jwt;
mod keys;
mod password;
mod refresh_token;
mod rotation;

pub use claims::{Claims, AUDIENCE, ISSUER};
pub use jwt::AccessTokenIssuer;
pub use keys::{KeyProvider, SigningKeys};
pub use password::PasswordHasher;
pub use refresh_token::{
    generate_refresh_token, hash_token, issue_refresh_token, refresh_token_ttl,
    revoke_all_user_tokens, revoke_refresh_token, stage_refresh_token, REFRESH_TOKEN_TTL_DAYS,
};
pub use rotation::{rotate_refresh_token, IssuedTokens, RotatedToken, TokenService};
