//! The monitor loop.
//!
//! Each pass visits every configured wishlist in a fresh random order,
//! collects it, diffs it against the snapshot, and sends one notification
//! per wishlist that changed. The snapshot is written once per pass and
//! again on shutdown.

use std::panic::AssertUnwindSafe;

use chrono::{Duration as ChronoDuration, Local};
use futures::FutureExt;
use tracing::{error, info, warn};

use super::notify::{compose, NotificationSink};
use super::reconcile::diff;
use crate::config::Settings;
use crate::models::WishlistConfig;
use crate::scrapers::{
    resolve_user_agent, Cancelled, CollectError, ItemExtractor, ListCollector, Pacer, PageFetcher,
    PageSource,
};
use crate::storage::{SnapshotMap, SnapshotStore, StoreError};

/// What happened to one wishlist during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistOutcome {
    /// Changes were found; the snapshot entry was replaced.
    Notified { delivered: bool },
    Unchanged,
    /// Collection failed; the previous snapshot entry is untouched.
    Skipped,
}

/// Per-pass tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub notified: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &WishlistOutcome) {
        match outcome {
            WishlistOutcome::Notified { .. } => self.notified += 1,
            WishlistOutcome::Unchanged => self.unchanged += 1,
            WishlistOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Drives collection, reconciliation and notification for all wishlists.
pub struct Scheduler<'a> {
    settings: &'a Settings,
    source: &'a dyn PageSource,
    extractor: &'a ItemExtractor,
    pacer: &'a Pacer,
    sink: &'a dyn NotificationSink,
    store: &'a dyn SnapshotStore,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        settings: &'a Settings,
        source: &'a dyn PageSource,
        extractor: &'a ItemExtractor,
        pacer: &'a Pacer,
        sink: &'a dyn NotificationSink,
        store: &'a dyn SnapshotStore,
    ) -> Self {
        Self {
            settings,
            source,
            extractor,
            pacer,
            sink,
            store,
        }
    }

    /// Run passes until shutdown is requested, then persist the snapshot.
    ///
    /// Fails only if an existing snapshot cannot be read at startup.
    pub async fn run_forever(&self) -> Result<(), StoreError> {
        info!("Starting wishlist monitor...");
        let mut snapshot = self.store.load()?;
        info!("Loaded snapshot with {} wishlists", snapshot.len());

        loop {
            if self.run_cycle(&mut snapshot).await.is_err() {
                break;
            }

            let delay = self.pacer.jittered(self.settings.delays.check_interval);
            if let Some(at) = ChronoDuration::from_std(delay)
                .ok()
                .and_then(|next| Local::now().checked_add_signed(next))
            {
                info!("Next cycle at {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
            if self
                .pacer
                .sleep_exact(delay, "before next cycle")
                .await
                .is_err()
            {
                break;
            }
        }

        info!("Shutdown requested, saving snapshot");
        self.save_snapshot(&snapshot);
        Ok(())
    }

    /// One pass over every wishlist. The snapshot is saved at the end of a
    /// completed pass; an interrupted pass leaves saving to the caller.
    pub async fn run_cycle(&self, snapshot: &mut SnapshotMap) -> Result<CycleReport, Cancelled> {
        let mut wishlists: Vec<&WishlistConfig> = self.settings.wishlists.iter().collect();
        self.pacer.shuffle(&mut wishlists);

        let mut report = CycleReport::default();
        for wishlist in wishlists {
            self.pacer.check()?;
            if wishlist.url.trim().is_empty() {
                continue;
            }

            let outcome = self.check_isolated(wishlist, snapshot).await?;
            report.record(&outcome);
            if outcome == WishlistOutcome::Skipped {
                continue;
            }

            self.pacer
                .pause(self.settings.delays.wishlist, "before next wishlist")
                .await?;
        }

        info!(
            notified = report.notified,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "Pass complete"
        );
        self.save_snapshot(snapshot);
        Ok(report)
    }

    /// [`Self::check_wishlist`] with panics contained to this wishlist.
    async fn check_isolated(
        &self,
        wishlist: &WishlistConfig,
        snapshot: &mut SnapshotMap,
    ) -> Result<WishlistOutcome, Cancelled> {
        match AssertUnwindSafe(self.check_wishlist(wishlist, snapshot))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(wishlist = %wishlist.name, "Processing panicked, skipping {}", wishlist.name);
                Ok(WishlistOutcome::Skipped)
            }
        }
    }

    /// Collect, diff and notify for a single wishlist.
    pub async fn check_wishlist(
        &self,
        wishlist: &WishlistConfig,
        snapshot: &mut SnapshotMap,
    ) -> Result<WishlistOutcome, Cancelled> {
        let user_agent = resolve_user_agent(self.settings.user_agent.as_deref(), self.pacer);
        info!("User-Agent for {}: {}", wishlist.name, user_agent);
        info!("Checking {}: {}", wishlist.name, wishlist.url);

        let fetcher = PageFetcher::new(
            self.source,
            self.pacer,
            self.settings.retry_policy(),
            self.settings.delays.failure,
        );
        let collector = ListCollector::new(
            fetcher,
            self.extractor,
            self.pacer,
            self.settings.delays.page,
            self.settings.delays.blocked,
        )
        .with_dump_dir(self.settings.dump_dir.clone());

        let items = match collector.collect(wishlist, &user_agent).await {
            Ok(items) => items,
            Err(CollectError::Cancelled) => return Err(Cancelled),
            Err(e) => {
                warn!(wishlist = %wishlist.name, "Skipping {}: {}", wishlist.name, e);
                return Ok(WishlistOutcome::Skipped);
            }
        };

        let previous = snapshot
            .get(&wishlist.url)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let changes = diff(previous, &items, self.settings.notify_threshold);

        if changes.is_empty() {
            info!("No changes detected.");
            return Ok(WishlistOutcome::Unchanged);
        }

        let (subject, body) = compose(&wishlist.name, &wishlist.url, &changes);
        let delivered = match self.sink.send(&subject, &body).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send notification for {}: {}", wishlist.name, e);
                false
            }
        };
        snapshot.insert(wishlist.url.clone(), items);

        Ok(WishlistOutcome::Notified { delivered })
    }

    fn save_snapshot(&self, snapshot: &SnapshotMap) {
        if let Err(e) = self.store.save(snapshot) {
            error!("Failed to save snapshot: {}", e);
        }
    }
}
