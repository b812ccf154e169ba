//! Authentication
//! Mission: Credential and session lifecycle - passwords, JWTs, refresh
//! tokens, and the single-use email verification / password reset tokens

pub mod api;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod refresh;
pub mod service;
pub mod store;

pub use api::{routes, ApiError, AuthState};
pub use error::AuthError;
pub use jwt::{JwtError, JwtHandler};
pub use middleware::auth_gate;
pub use models::{Claims, RefreshToken, Role, User};
pub use refresh::RefreshTokenManager;
pub use service::AuthService;
pub use store::CredentialStore;
