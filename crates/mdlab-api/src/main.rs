use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mdlab_api::config::{self, ApiConfig};
use mdlab_api::{api_router, AppState};
use mdlab_core::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let config = ApiConfig::from_env()?;
    tracing::info!(
        app = config::APP_NAME,
        version = config::APP_VERSION,
        db = %config.db_path.display(),
        price_policy = ?config.price_policy,
        "starting"
    );

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;

    let state = AppState::from_config(db, &config);
    {
        let db = state.lock_db()?;
        let report = state.identity(&db).backfill_patient_ids()?;
        if report.assigned > 0 || report.failed > 0 {
            tracing::info!(
                assigned = report.assigned,
                skipped = report.skipped,
                failed = report.failed,
                "patient ID backfill"
            );
        }
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, api_router(state)).await?;
    Ok(())
}
