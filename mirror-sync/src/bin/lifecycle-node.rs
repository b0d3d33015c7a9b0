//! Lifecycle node: ledger, notification log and mirror synchronizer in one process

use anyhow::Context;
use lifecycle_ledger::{Config, Ledger};
use mirror_sync::{MirrorConfig, RocksMirrorStore, Synchronizer, SystemClock};
use notification_bus::{DeadLetterQueue, NotificationLog, Subscriber};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting lifecycle node");

    // Load configuration
    let ledger_config = Config::from_env().context("loading ledger configuration")?;
    let mirror_config = MirrorConfig::from_env().context("loading mirror configuration")?;

    // Open ledger; replays its history onto the fresh log
    let log = Arc::new(NotificationLog::new());
    let ledger = Arc::new(
        Ledger::open(ledger_config, log.clone())
            .await
            .context("opening ledger")?,
    );

    let store = Arc::new(RocksMirrorStore::open(&mirror_config).context("opening mirror store")?);
    let synchronizer = Arc::new(Synchronizer::new(
        store,
        Arc::new(SystemClock),
        ledger.clone(),
        mirror_config.lock_stripes,
    ));

    let report = synchronizer
        .resync_all()
        .await
        .context("initial mirror resync")?;
    tracing::info!(?report, "Mirror reconciled with ledger");

    let dead_letters = Arc::new(DeadLetterQueue::new(mirror_config.dead_letter_capacity));
    let subscriber = Subscriber::new(log, mirror_config.subscriber_config())
        .with_dead_letters(dead_letters.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer = synchronizer.clone().spawn(subscriber, shutdown_rx);
    tracing::info!("Mirror synchronizer running");

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
        // Consumer ended on its own, e.g. offsets from another ledger
        finished = &mut consumer => Some(finished),
    };

    let stopped = match finished {
        Some(finished) => finished,
        None => {
            tracing::info!("Shutting down lifecycle node");
            shutdown_tx.send(true).ok();
            consumer.await
        }
    };

    let outcome = stopped.context("consumer task panicked")?;
    ledger.shutdown().await?;

    let committed = outcome.context("mirror consumer failed")?;
    tracing::info!(
        committed,
        dead_letters = dead_letters.len(),
        "Mirror synchronizer stopped"
    );
    Ok(())
}
