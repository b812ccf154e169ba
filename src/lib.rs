//! AuthGate - Credential and Session Lifecycle Service
//! Mission: Password auth, short-lived JWTs, rotating refresh tokens, and
//! single-use email verification / password reset flows over SQLite

pub mod auth;
pub mod config;
pub mod email;
