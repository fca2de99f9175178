//! wishwatch - wishlist monitor.
//!
//! Watches public wishlists and emails when items are added, removed or
//! change price.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wishwatch::config::Settings;
use wishwatch::scrapers::{HttpClient, ItemExtractor, Pacer};
use wishwatch::services::{LogSink, NotificationSink, Scheduler, SmtpSink};
use wishwatch::storage::JsonSnapshotStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let settings = Settings::load()?;

    let (log_file, log_error) = match open_log_file(&settings.log_file) {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wishwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        }))
        .init();

    if let Some(e) = log_error {
        warn!(
            "Cannot open log file {}, logging to stdout only: {}",
            settings.log_file.display(),
            e
        );
    }
    if std::env::args_os().len() > 1 {
        warn!("Command-line arguments are ignored; configure via environment");
    }
    settings.warn_incomplete();

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    let pacer = Pacer::from_os_rng(shutdown);
    let client = HttpClient::new(&settings.site_origin, settings.request_timeout)
        .context("failed to build HTTP client")?;
    let extractor = ItemExtractor::new(&settings.site_origin).context("invalid SITE_ORIGIN")?;
    let sink: Box<dyn NotificationSink> = match &settings.smtp {
        Some(smtp) => Box::new(SmtpSink::new(smtp).context("invalid SMTP settings")?),
        None => Box::new(LogSink),
    };
    let store = JsonSnapshotStore::new(&settings.cache_file);

    Scheduler::new(&settings, &client, &extractor, &pacer, sink.as_ref(), &store)
        .run_forever()
        .await
        .context("cannot read snapshot")?;

    info!("Stopped");
    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn wait_for_shutdown(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
    token.cancel();
}
