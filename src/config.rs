//! Configuration
//! Mission: Collect runtime settings from the environment with safe defaults

use dotenv::dotenv;
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_ACCESS_TTL_SECS: i64 = 900; // 15 minutes
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 3600; // 7 days

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// None means a random per-process signing key: every token is
    /// invalidated on restart. Fine for development, set JWT_SECRET in prod.
    pub jwt_secret: Option<String>,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub first_user_admin: bool,
    pub app_base_url: String,
    pub email_from: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = resolve_data_path(env::var("AUTH_DB_PATH").ok(), "authgate.db");

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let access_token_ttl_secs = env::var("ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_ACCESS_TTL_SECS);
        let refresh_token_ttl_secs = env::var("REFRESH_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_REFRESH_TTL_SECS);

        let first_user_admin = env::var("FIRST_USER_ADMIN")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(true);

        let app_base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let email_from =
            env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@authgate.local".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        info!(
            "Config loaded: db={}, access_ttl={}s, refresh_ttl={}s, first_user_admin={}",
            db_path, access_token_ttl_secs, refresh_token_ttl_secs, first_user_admin
        );

        Self {
            db_path,
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            first_user_admin,
            app_base_url,
            email_from,
            bind_addr,
        }
    }
}

fn default_data_path(filename: &str) -> String {
    // Anchor defaults to the crate directory, not the caller's cwd
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    base.join(filename).to_string_lossy().to_string()
}

pub fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    base.join(p).to_string_lossy().to_string()
}

pub fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also try crate-root and repo-root .env when run with --manifest-path
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_path_absolute_passthrough() {
        let resolved = resolve_data_path(Some("/tmp/auth.db".to_string()), "authgate.db");
        assert_eq!(resolved, "/tmp/auth.db");
    }

    #[test]
    fn test_resolve_data_path_empty_falls_back_to_default() {
        let resolved = resolve_data_path(Some("   ".to_string()), "authgate.db");
        assert!(resolved.ends_with("authgate.db"));
        assert!(Path::new(&resolved).is_absolute());
    }

    #[test]
    fn test_resolve_data_path_relative_is_anchored() {
        let resolved = resolve_data_path(Some("data/auth.db".to_string()), "authgate.db");
        assert!(Path::new(&resolved).is_absolute());
        assert!(resolved.ends_with("data/auth.db"));
    }
}
