//! Run-log dashboard backend.
//!
//! Queries the document store for the last N days of simulation run records,
//! aggregates them into chart and summary data, and serves the result to the
//! dashboard page over HTTP.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runlog_backend::{
    aggregate::{AggregateOptions, RecordPolicy, VersionOrdering},
    api::{self, AppState},
    middleware::request_logging,
    models::Config,
    state::DashboardState,
    store::RunStoreClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(?config, "starting runlog backend");

    let store = RunStoreClient::new(
        config.store_url.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
    );
    let options = AggregateOptions {
        policy: if config.strict_records {
            RecordPolicy::Strict
        } else {
            RecordPolicy::Tolerant
        },
        version_ordering: if config.numeric_version_order {
            VersionOrdering::Numeric
        } else {
            VersionOrdering::Lexicographic
        },
    };
    let state = Arc::new(AppState {
        store,
        dashboard: DashboardState::new(),
        options,
    });

    // Mirror the page load: populate the default window right away.
    api::spawn_refresh(state.clone(), config.default_window_days);

    let app = api::router(state)
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runlog_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
