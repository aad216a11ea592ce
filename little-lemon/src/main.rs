//! # little-lemon
//!
//! Restaurant ordering API: a menu catalog, per-user carts, and orders, with
//! access decided by the caller's role.
//!
//! ## Architecture
//!
//! - **Store**: SQLite via sqlx; categories, menu items, orders, cart rows, users and groups
//! - **Auth**: TOML users file with constant-time password comparison, HTTP Basic or token login
//! - **Roles**: Admin (staff flag), Manager, Delivery crew, Customer, resolved per request
//! - **HTTP**: Axum router with rate limiting, request IDs, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod db;
mod http;
mod models;
mod roles;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::{load_auth, sync_users};
use crate::config::{AppConfig, Cli};
use crate::db::Database;
use crate::http::{router, AppState, TokenStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    let auth = load_auth(&config.users_file).context("failed to load users file")?;
    info!(
        bind = %config.bind,
        database_url = %config.database_url,
        users_file = %config.users_file.display(),
        user_count = auth.user_count(),
        prune_users = config.prune_users,
        token_ttl_hours = config.token_ttl_hours,
        "configuration loaded"
    );

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let summary = sync_users(&db, &auth, config.prune_users)
        .await
        .context("failed to sync users into the database")?;
    info!(
        synced = summary.synced,
        pruned = summary.pruned,
        "users synced"
    );

    let state = AppState {
        db,
        auth: Arc::new(auth),
        tokens: TokenStore::new(config.token_ttl_hours),
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "little-lemon listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
        info!("shutting down gracefully");
    })
    .await
    .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
