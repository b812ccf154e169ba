//! Authentication Error Taxonomy
//! Mission: One typed error per user-visible failure condition

use thiserror::Error;

/// Domain errors surfaced by the auth services.
///
/// The reset flow deliberately collapses token mismatch and token expiry into
/// `InvalidOrExpiredToken` so callers cannot probe which condition failed.
/// The verification flow keeps them distinct.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    AuthenticationFailed,
    #[error("Account is disabled. Please verify your email address")]
    AccountDisabled,
    #[error("User not found")]
    UserNotFound,
    #[error("Email not found")]
    EmailNotFound,
    #[error("Refresh token not found")]
    TokenNotFound,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid verification token")]
    InvalidToken,
    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,
    #[error("{0} already exists")]
    AlreadyExists(&'static str),
    #[error("Insufficient permissions")]
    Forbidden,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
