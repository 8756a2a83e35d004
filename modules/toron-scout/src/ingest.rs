// Forward crawl of the live feed plus gap reconciliation against the
// historical index.
//
// 1. Fast-forward: page through the newest listing, upserting each page as
//    it arrives, until a few consecutive pages were already fully stored or
//    the listing ends.
// 2. Gap check: if the oldest post seen is newer than the newest post stored
//    before this cycle, the live feed skipped something.
// 3. Backfill: sweep the historical index forward from the prior high-water
//    mark until it passes the oldest post seen.
//
// Every write is an idempotent upsert, so a cycle that stops early loses no
// state and the next cycle picks up from the store.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use toron_common::Post;
use toron_store::Repository;

use crate::config::ScoutConfig;
use crate::resolver::Resolver;
use crate::retry::RetryPolicy;
use crate::traits::{ForumSource, HistorySource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub pages: u32,
    pub written: usize,
    pub backfilled: usize,
    pub prefetched: usize,
    /// `(prior high-water mark, oldest seen)` when a gap was found.
    pub gap: Option<(i64, i64)>,
}

pub struct Ingestor {
    forum: Arc<dyn ForumSource>,
    history: Arc<dyn HistorySource>,
    repo: Repository,
    resolver: Arc<Resolver>,
    config: ScoutConfig,
    retry: RetryPolicy,
}

impl Ingestor {
    pub fn new(
        forum: Arc<dyn ForumSource>,
        history: Arc<dyn HistorySource>,
        repo: Repository,
        resolver: Arc<Resolver>,
        config: ScoutConfig,
    ) -> Self {
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_backoff);
        Self {
            forum,
            history,
            repo,
            resolver,
            config,
            retry,
        }
    }

    async fn pace(&self) {
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
    }

    pub async fn run(&self) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        let prior_high_water = self.repo.high_water_mark().await?;

        let oldest_seen = self.fast_forward(&mut stats).await?;

        if let (Some(high_water), Some(oldest)) = (prior_high_water, oldest_seen) {
            if oldest > high_water {
                info!(high_water, oldest, "Coverage gap in live feed, backfilling");
                stats.gap = Some((high_water, oldest));
                self.backfill(high_water, oldest, &mut stats).await?;
            }
        }

        Ok(stats)
    }

    /// Returns the oldest creation time seen, if any page arrived.
    async fn fast_forward(&self, stats: &mut IngestStats) -> Result<Option<i64>> {
        let mut after: Option<String> = None;
        let mut count = 0u32;
        let mut seen_pages = 0u32;
        let mut oldest_seen: Option<i64> = None;

        loop {
            self.pace().await;
            let Some(page) = self
                .retry
                .fetch("newest", || self.forum.newest(after.as_deref(), count))
                .await
            else {
                warn!(cursor = ?after, "Forward paging abandoned");
                break;
            };
            stats.pages += 1;

            let ids: Vec<&str> = page.posts.iter().map(|p| p.id.as_str()).collect();
            let already_stored = self.repo.posts.contains_all(&ids).await?;
            if let Some(page_oldest) = page.posts.iter().map(|p| p.created_utc).min() {
                oldest_seen = Some(oldest_seen.map_or(page_oldest, |o| o.min(page_oldest)));
            }

            let written = self.upsert(page.posts, stats).await?;
            stats.written += written;

            seen_pages = if already_stored { seen_pages + 1 } else { 0 };
            if seen_pages >= self.config.seen_page_threshold {
                debug!(seen_pages, "Caught up with stored posts");
                break;
            }

            match page.after {
                Some(next) => {
                    after = Some(next);
                    count = page.count;
                }
                None => break,
            }
        }

        Ok(oldest_seen)
    }

    /// Sweep `[from, to]` through the historical index.
    ///
    /// The index's cursor is exclusive, so each page resumes one second
    /// before its newest post: posts sharing that second with the next page
    /// are fetched again rather than skipped. Progress is judged by post ids.
    async fn backfill(&self, from: i64, to: i64, stats: &mut IngestStats) -> Result<()> {
        let mut cursor = from - 1;
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            self.pace().await;
            let Some(batch) = self
                .retry
                .fetch("history", || self.history.after(cursor))
                .await
            else {
                break;
            };

            let Some(newest) = batch.iter().map(|p| p.created_utc).max() else {
                break;
            };
            if newest <= cursor {
                warn!(cursor, "Historical index made no progress");
                break;
            }
            let fresh = batch.iter().filter(|p| seen.insert(p.id.clone())).count();
            self.upsert(batch, stats).await?;
            stats.backfilled += fresh;

            if newest > to {
                break;
            }
            cursor = if fresh == 0 {
                // a whole page within one second: step past it
                warn!(second = newest, "Page holds a single second, moving past it");
                newest
            } else {
                newest - 1
            };
        }

        Ok(())
    }

    /// Fold `posts` into the store and warm what they link to. Returns the
    /// number of posts written.
    pub async fn upsert(&self, posts: Vec<Post>, stats: &mut IngestStats) -> Result<usize> {
        let written = self.merge(posts).await?;
        let prefetched = self.prefetch(&written).await?;
        stats.prefetched += prefetched;
        Ok(written.len())
    }

    async fn merge(&self, posts: Vec<Post>) -> Result<Vec<Post>> {
        if posts.is_empty() {
            return Ok(posts);
        }
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        let existing = self.repo.posts.get_many(&ids).await?;

        let merged: Vec<Post> = posts
            .iter()
            .zip(existing)
            .map(|(new, old)| match old {
                Some(old) => old.update(new),
                None => new.clone(),
            })
            .collect();

        self.repo
            .posts
            .put_many(merged.iter().map(|p| (p.id.as_str(), p)))
            .await?;
        Ok(merged)
    }

    /// Resolve linked shows and fetch linked posts that are not stored yet.
    /// Fetched posts are stored without following their own links.
    async fn prefetch(&self, posts: &[Post]) -> Result<usize> {
        let mut wanted: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = posts.iter().map(|p| p.id.clone()).collect();

        for post in posts {
            self.resolver.prefetch_links(post).await;
            for id in post.links().iter().filter_map(|s| s.post_id()) {
                if seen.insert(id.clone()) {
                    wanted.push(id);
                }
            }
        }
        if wanted.is_empty() {
            return Ok(0);
        }

        let stored = self.repo.posts.get_many(&wanted).await?;
        let missing: Vec<String> = wanted
            .into_iter()
            .zip(stored)
            .filter(|(_, stored)| stored.is_none())
            .map(|(id, _)| id)
            .collect();

        let mut fetched = 0;
        for chunk in missing.chunks(self.config.info_batch.max(1)) {
            self.pace().await;
            let Some(posts) = self.retry.fetch("info", || self.forum.info(chunk)).await else {
                continue;
            };
            fetched += self.merge(posts).await?.len();
        }
        if fetched > 0 {
            debug!(fetched, "Prefetched cross-referenced posts");
        }
        Ok(fetched)
    }
}
