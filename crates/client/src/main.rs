//! Headless sync agent.
//!
//! Signs in from the environment, keeps the local mirror fresh and logs
//! sync events until interrupted. `--once` runs a single sync and prints the
//! report as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;

use salesdesk_auth::{AccessToken, DatasetProfile, Session};
use salesdesk_client::{
    ClientConfig, ClientContext, NetworkSignal, PeriodicCheck, ReconnectListener,
    RefreshOnChange, RestBackend, SqliteMirrorStore, SyncStatus, log_events, mirror,
};
use salesdesk_core::UserId;

const CHANGE_DEBOUNCE: Duration = Duration::from_millis(500);

fn session_from_env() -> anyhow::Result<Session> {
    let token = std::env::var("SALESDESK_ACCESS_TOKEN").context("SALESDESK_ACCESS_TOKEN is not set")?;
    let user_id: UserId = std::env::var("SALESDESK_USER_ID")
        .context("SALESDESK_USER_ID is not set")?
        .parse()
        .context("SALESDESK_USER_ID must be a UUID")?;
    let email = std::env::var("SALESDESK_EMAIL").unwrap_or_default();
    let dataset: DatasetProfile = match std::env::var("SALESDESK_DATASET") {
        Ok(value) => value.parse().context("invalid SALESDESK_DATASET")?,
        Err(_) => DatasetProfile::default(),
    };

    Ok(Session::new(user_id, email, AccessToken::new(token)).with_dataset(dataset))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?;
    salesdesk_observability::init(config.log_format);

    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    let backend = Arc::new(RestBackend::from_config(&config)?);
    let store = match &config.cache_db {
        Some(path) => SqliteMirrorStore::new(path),
        None => SqliteMirrorStore::at_default_location()?,
    };
    tracing::info!(backend = %config.backend_url, mirror = ?store.path(), "starting sync agent");

    let ctx = Arc::new(ClientContext::new(
        config.clone(),
        backend,
        Arc::new(store),
        NetworkSignal::default(),
    ));
    let session = session_from_env()?;
    let user = session.user_id;
    ctx.sign_in(session)?;

    let status = SyncStatus::new(ctx.clone());
    let _ = status.refresh_local().await;

    if once {
        let report = status.trigger_sync().await;
        let store = ctx.store().as_ref();
        let orderable = mirror::orderable_customers(store, user).await?.len();
        let sellable = mirror::sellable_products(store, user).await?.len();
        let rendered = json!({
            "outcome": report.outcome,
            "counts": report.counts,
            "orderable_customers": orderable,
            "sellable_products": sellable,
            "error": report.error.as_ref().map(ToString::to_string),
            "elapsed_ms": report.elapsed().num_milliseconds(),
            "last_sync": status.snapshot().last_sync_display,
        });
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        if !report.success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let event_log = tokio::spawn(log_events(ctx.subscribe_events()));

    let on_online = {
        let status = status.clone();
        move || {
            let status = status.clone();
            async move {
                status.trigger_sync().await;
            }
        }
    };
    let reconnect = ReconnectListener::spawn(ctx.network(), on_online);
    let periodic = PeriodicCheck::spawn(status.clone(), config.check_interval, config.stale_after);
    let realtime = RefreshOnChange::spawn(ctx.changes(), status.clone(), CHANGE_DEBOUNCE);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");

    reconnect.stop();
    realtime.stop();
    periodic.shutdown().await;
    event_log.abort();

    Ok(())
}
