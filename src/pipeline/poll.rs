// src/pipeline/poll.rs

//! Periodic polling of every registered search.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Ad, CycleStats, PollerConfig, Search};
use crate::pipeline::diff;
use crate::services::{AdParser, ListingSource, Notifier};
use crate::storage::Store;

/// Runs fetch, parse, diff, store and notify for each search.
pub struct Poller {
    store: Arc<dyn Store>,
    source: Arc<dyn ListingSource>,
    parser: AdParser,
    notifier: Notifier,
    interval: Duration,
    request_delay: Duration,
}

impl Poller {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn ListingSource>,
        parser: AdParser,
        notifier: Notifier,
        config: &PollerConfig,
    ) -> Self {
        Self {
            store,
            source,
            parser,
            notifier,
            interval: Duration::from_secs(config.interval_secs),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Poll until cancelled. The interval is measured from the end of one
    /// cycle to the start of the next.
    pub async fn run(&self, cancel: &CancellationToken) {
        log::info!("Poller started, interval {:?}", self.interval);

        while !cancel.is_cancelled() {
            match self.run_cycle(cancel).await {
                Ok(stats) => log::info!(
                    "Cycle done: {} searches, {} new ads, {} notified, {} fetch failures",
                    stats.searches,
                    stats.new_ads,
                    stats.notified,
                    stats.fetch_failures
                ),
                Err(e) => log::error!("Cycle aborted: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        log::info!("Poller stopped");
    }

    /// One pass over a snapshot of all searches.
    ///
    /// Only failing to take the snapshot is an error; per-search failures are
    /// logged and counted.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleStats> {
        let searches = self.store.list_searches().await?;
        let mut stats = CycleStats::default();
        log::debug!("Cycle over {} searches", searches.len());

        for (i, search) in searches.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Cycle cancelled after {} searches", i);
                break;
            }
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            if let Err(e) = self.check_search(search, &mut stats).await {
                stats.skipped += 1;
                log::error!("Search {} ({}) failed: {}", search.id, search.descriptor.label(), e);
            }
        }

        Ok(stats)
    }

    async fn check_search(&self, search: &Search, stats: &mut CycleStats) -> Result<()> {
        let label = search.descriptor.label();
        let candidates = match self.source.fetch(&search.descriptor).await {
            Ok(html) => match self.parser.parse(&html) {
                Ok(ads) => ads,
                Err(e) => {
                    stats.parse_failures += 1;
                    log::warn!("Could not parse listing for {}: {}", label, e);
                    Vec::new()
                }
            },
            Err(e) => {
                stats.fetch_failures += 1;
                log::warn!("Could not fetch listing for {}: {}", label, e);
                Vec::new()
            }
        };

        let stored = self.store.stored_ad_ids(search.id).await?;
        let fresh = diff(&candidates, &stored);
        let fresh_ids: HashSet<&str> = fresh.iter().map(|ad| ad.id.as_str()).collect();

        let rows: Vec<Ad> = candidates
            .iter()
            .map(|c| Ad::from_candidate(search.id, c, fresh_ids.contains(c.id.as_str())))
            .collect();

        match self.store.upsert_ads(search.id, &rows).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                stats.skipped += 1;
                log::info!("Search {} deleted during the cycle, skipping", search.id);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        stats.searches += 1;
        stats.candidates += candidates.len();
        stats.new_ads += fresh.len();

        if !fresh.is_empty() {
            log::info!("{} new ads for {} (user {})", fresh.len(), label, search.user_id);
            let report = self.notifier.notify(search.user_id, &fresh).await;
            stats.notified += report.sent;
            stats.suppressed += report.suppressed;
            stats.send_failures += report.failed;
        }

        if !self.store.touch_search(search.id, Utc::now()).await? {
            log::info!("Search {} deleted before it was marked checked", search.id);
        }
        Ok(())
    }
}
