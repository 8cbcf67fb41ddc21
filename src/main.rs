//! Channel Feed runner
//!
//! Connects to the feed service configured in the environment, loads the
//! feed, follows live updates and logs every state change. Commands are read
//! from stdin: `more`, `refresh`, `ack`, `quit`.

use anyhow::Context;
use feed_state::{FeedConfig, FeedController, FeedSnapshot, SessionContext, StaticIdentity};
use feed_ui::{LoadMoreTarget, RefreshTarget};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = FeedConfig::from_env().context("invalid feed configuration")?;
    let identity = match std::env::var("FEED_CREDENTIAL") {
        Ok(credential) => StaticIdentity::new(credential),
        Err(_) => {
            tracing::warn!("FEED_CREDENTIAL is not set, running without an identity");
            StaticIdentity::anonymous()
        }
    };

    let session = SessionContext::new(Arc::new(identity));
    let controller = FeedController::from_config(session, &config)
        .context("failed to set up the feed controller")?;

    tracing::info!(
        service = %config.client.service_url,
        live = %config.live_url(),
        "Starting Channel Feed..."
    );

    let logger = tokio::spawn(log_snapshots(controller.subscribe()));

    let outcome = controller.start().await;
    tracing::info!(?outcome, "initial load finished");

    if let Err(e) = controller.refresh_channel_status().await {
        tracing::warn!(error = %e, "could not load subscriptions");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line.context("failed to read stdin")? {
                Some(command) => {
                    if !handle_command(&controller, command.trim()) {
                        break;
                    }
                }
                None => {
                    tokio::signal::ctrl_c().await.context("failed to wait for Ctrl-C")?;
                    break;
                }
            },
        }
    }

    controller.shutdown();
    logger.abort();
    tracing::info!("Channel Feed stopped");

    Ok(())
}

/// Returns false when the runner should exit
fn handle_command(controller: &FeedController, command: &str) -> bool {
    match command {
        "" => {}
        "more" => controller.load_more(),
        "refresh" => controller.trigger_refresh(),
        "ack" => controller.acknowledge_new_items(),
        "quit" | "q" => return false,
        other => tracing::warn!(command = other, "unknown command"),
    }
    true
}

async fn log_snapshots(mut snapshots: watch::Receiver<FeedSnapshot>) {
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();

        tracing::info!(
            phase = %snapshot.phase,
            items = snapshot.items.len(),
            next_page = %snapshot.cursor,
            has_more = snapshot.has_more,
            live = ?snapshot.live,
            new_item = snapshot.new_item_arrived,
            view = ?snapshot.presentation(),
            "feed updated"
        );

        if let Some(latest) = snapshot.items.first() {
            tracing::debug!(
                key = %latest.key(),
                date = %latest.timestamp,
                text = latest.text.as_deref().unwrap_or(""),
                "latest item"
            );
        }
    }
}
