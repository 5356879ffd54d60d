//! Session tokens and the authentication flows built on them.

mod service;
pub mod token;

pub use service::{AuthError, AuthService};
pub use token::{Identity, TokenError, TokenPair, TokenService, UserClaims};
