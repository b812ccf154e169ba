//! AuthGate server binary
//! Mission: Wire the auth service, email worker, and HTTP surface together

use anyhow::{Context, Result};
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authgate::auth::{
    auth_gate, routes, AuthService, CredentialStore, JwtHandler, RefreshTokenManager,
};
use authgate::config::{load_env, Config};
use authgate::email::{EmailQueue, LogSender};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🚀 AuthGate starting");

    let config = Config::from_env();

    let store = Arc::new(CredentialStore::new(&config.db_path)?);
    info!("🔐 Credential store initialized at: {}", config.db_path);

    let jwt = Arc::new(JwtHandler::new(
        config.jwt_secret.clone(),
        config.access_token_ttl_secs,
    ));
    let refresh_tokens = Arc::new(RefreshTokenManager::new(
        store.clone(),
        config.refresh_token_ttl_secs,
    ));

    let email = EmailQueue::spawn(
        Arc::new(LogSender),
        config.email_from.clone(),
        config.app_base_url.clone(),
    );

    let service = Arc::new(AuthService::new(
        store,
        jwt.clone(),
        refresh_tokens,
        email,
        config.first_user_admin,
    ));

    // The gate is fail-open and sits over everything: it annotates requests
    // with claims but never rejects, so public routes pass through untouched.
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(routes(service))
        .layer(middleware::from_fn_with_state(jwt, auth_gate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("🎯 AuthGate listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
