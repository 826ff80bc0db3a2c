/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (PgPool → IdentityRepo → SecurityManager) → Router 組み立て
 * - Middleware の適用 (access / CORS / HTTP layers)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::repos::IdentityRepo;
use crate::services::account::AccountService;
use crate::services::auth::{AccessGuard, SecurityManager};
use crate::state::AppState;

const DB_MAX_CONNECTIONS: u32 = 10;
const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,studymon=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development では即落として気づけるようにする
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .acquire_timeout(DB_ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    // 同じ repo が読み取り (IdentityStore) と書き込み (AccountStore) の両方を担う
    let repo = Arc::new(IdentityRepo::new(pool));

    let security = Arc::new(SecurityManager::new(repo.clone(), &config.security)?);
    let accounts = Arc::new(AccountService::new(repo, security.clone()));

    Ok(AppState::new(
        security,
        accounts,
        AccessGuard::new(config.app_env),
    ))
}

/// Full router with every layer. Public so integration tests can drive it
/// with a fake identity store.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}
