use std::sync::Arc;

use anyhow::{Context, Result};
use rand::Rng;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::batch::{GenerationDefaults, PostService};
use crate::config::Config;
use crate::credentials::CredentialManager;
use crate::gemini::GeminiClient;
use crate::platform::SqliteStore;
use crate::settings::SettingsStore;
use crate::{db, server, store};

/// Option key of the persisted admin token.
const ADMIN_TOKEN_KEY: &str = "admin_token";

/// Open the database, seed categories, and wire the services on top of it.
pub async fn open_services(config: &Config) -> Result<(SqlitePool, PostService)> {
    let pool = db::create_pool(config).await.context("creating database")?;
    info!(db_path = %config.db_path().display(), "database ready");

    store::sync_config_to_db(&pool, config)
        .await
        .context("syncing config to database")?;
    info!("config synced to database");

    let sqlite = Arc::new(SqliteStore::new(pool.clone(), &config.fakepost.site_url));
    let provider = Arc::new(GeminiClient::new(
        &config.provider.base_url,
        config.provider_timeout()?,
        config.provider_test_timeout()?,
    ));

    let service = PostService {
        content: sqlite.clone(),
        settings: SettingsStore::new(sqlite.clone()).with_limits(config.size_limits()),
        credentials: CredentialManager::new(sqlite, provider.clone()),
        provider,
        defaults: GenerationDefaults {
            limits: config.size_limits(),
            default_model: config.provider.default_model.clone(),
            credit_url: config.content.credit_url.clone(),
        },
    };
    Ok((pool, service))
}

pub async fn run(config: Config) -> Result<()> {
    let (pool, service) = open_services(&config).await?;
    let admin_token = bootstrap_admin_token(&pool, &config).await?;

    let cancel = CancellationToken::new();

    let router = server::build_router(server::AppState { service, admin_token });
    let listener = tokio::net::TcpListener::bind(&config.fakepost.listen)
        .await
        .with_context(|| format!("binding to {}", config.fakepost.listen))?;

    info!(listen = %config.fakepost.listen, "HTTP server listening");

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                server_cancel.cancelled().await;
            })
            .await
    });

    wait_for_shutdown().await;
    info!("shutdown signal received");

    cancel.cancel();

    // In-flight batches get a bounded window to finish.
    let shutdown_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, server_handle).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "server exited with error"),
        Ok(Err(e)) => warn!(error = %e, "server task panicked"),
        Err(_) => warn!("server did not stop within the shutdown window"),
        Ok(Ok(Ok(()))) => {}
    }

    pool.close().await;
    info!("shutdown complete");

    Ok(())
}

async fn bootstrap_admin_token(pool: &SqlitePool, config: &Config) -> Result<String> {
    // Priority: config value, then stored value, then a fresh one
    if let Some(ref token) = config.fakepost.admin_token {
        store::set_setting(pool, ADMIN_TOKEN_KEY, token).await?;
        info!("using admin token from config");
        return Ok(token.clone());
    }

    if let Some(token) = store::get_setting(pool, ADMIN_TOKEN_KEY).await? {
        info!("using stored admin token");
        return Ok(token);
    }

    let token = generate_token();
    store::set_setting(pool, ADMIN_TOKEN_KEY, &token).await?;
    warn!(
        token = %token,
        "admin token generated, save this, it won't be shown again"
    );
    Ok(token)
}

fn generate_token() -> String {
    use rand::distr::Alphanumeric;
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler, waiting for Ctrl-C only");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
