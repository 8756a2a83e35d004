use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use toron_common::{Post, Show};
use toron_store::{KeyValueStore, Repository};

use crate::config::ScoutConfig;
use crate::ingest::{IngestStats, Ingestor};
use crate::linker::{GroupingSnapshot, Linker};
use crate::refresh::Refresher;
use crate::resolver::Resolver;
use crate::traits::{ForumSource, HistorySource, ShowSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub ingest: IngestStats,
    pub refreshed: usize,
    pub pruned: usize,
    pub shows: usize,
}

/// Length of the top list when the caller does not ask for one.
pub const DEFAULT_TOP: usize = 25;

/// A grouped show ranked by how well its discussion threads scored.
#[derive(Debug, Clone, PartialEq)]
pub struct TopEntry {
    pub show: Show,
    pub average_score: f64,
    pub posts: usize,
}

/// The service: built once at startup and shared by the cycle driver and
/// whatever serves the read API.
pub struct Toron {
    repo: Repository,
    resolver: Arc<Resolver>,
    ingestor: Ingestor,
    refresher: Refresher,
    linker: Linker,
}

impl Toron {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        forum: Arc<dyn ForumSource>,
        history: Arc<dyn HistorySource>,
        shows: Arc<dyn ShowSource>,
        config: ScoutConfig,
    ) -> Self {
        let repo = Repository::new(store);
        let resolver = Arc::new(Resolver::new(shows, repo.clone(), &config));
        Self {
            ingestor: Ingestor::new(
                forum.clone(),
                history,
                repo.clone(),
                resolver.clone(),
                config.clone(),
            ),
            refresher: Refresher::new(forum, repo.clone(), config.clone()),
            linker: Linker::new(repo.clone(), resolver.clone(), config.scan_group),
            repo,
            resolver,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// One full cycle: ingest, refresh, prune, then rebuild the grouping
    /// index. Each step commits before the next starts. A failed step is
    /// logged and the remaining steps still run; only a failed rebuild fails
    /// the cycle.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let ingest = self.ingestor.run().await.unwrap_or_else(|e| {
            warn!(error = %e, "Ingest failed, continuing from stored state");
            IngestStats::default()
        });

        let now = Utc::now();
        let refreshed = self.refresher.refresh(now).await.unwrap_or_else(|e| {
            warn!(error = %e, "Refresh failed");
            0
        });
        let pruned = self.refresher.prune(now).await.unwrap_or_else(|e| {
            warn!(error = %e, "Prune failed");
            0
        });

        let snapshot = self.linker.invalidate().await?;

        let stats = CycleStats {
            ingest,
            refreshed,
            pruned,
            shows: snapshot.groups.len(),
        };
        info!(
            pages = stats.ingest.pages,
            written = stats.ingest.written,
            backfilled = stats.ingest.backfilled,
            prefetched = stats.ingest.prefetched,
            refreshed,
            pruned,
            shows = stats.shows,
            "Cycle complete"
        );
        Ok(stats)
    }

    /// Rebuild the grouping index now.
    pub async fn invalidate(&self) -> Result<Arc<GroupingSnapshot>> {
        self.linker.invalidate().await
    }

    // --- Read API ---

    /// Last published grouping; never waits on a rebuild in progress.
    pub fn current_grouping_snapshot(&self) -> Arc<GroupingSnapshot> {
        self.linker.snapshot()
    }

    /// Resolves once the first rebuild has been published.
    pub async fn wait_for_first_snapshot(&self) -> Arc<GroupingSnapshot> {
        let mut rx = self.linker.subscribe();
        let published = rx.wait_for(|s| s.generation > 0).await.map(|s| s.clone());
        // the sender lives in self, so this only fails during teardown
        published.unwrap_or_else(|_| self.linker.snapshot())
    }

    pub async fn show(&self, id: i32) -> Result<Option<Show>> {
        self.resolver.cached_show(id).await
    }

    pub async fn search_shows(&self, text: &str) -> Result<Vec<Show>> {
        self.resolver.search(text).await
    }

    /// Posts grouped under `show_id` in the current snapshot.
    pub async fn records_for(&self, show_id: i32) -> Result<Vec<Post>> {
        let snapshot = self.linker.snapshot();
        let ids = snapshot.posts_for(show_id);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .repo
            .posts
            .get_many(ids)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Grouped shows ordered by the average score of their posts.
    pub async fn top(&self, n: usize) -> Result<Vec<TopEntry>> {
        let snapshot = self.linker.snapshot();
        let mut ranked = Vec::with_capacity(snapshot.groups.len());

        for (&show_id, ids) in &snapshot.groups {
            let posts: Vec<Post> = self
                .repo
                .posts
                .get_many(ids)
                .await?
                .into_iter()
                .flatten()
                .collect();
            if posts.is_empty() {
                continue;
            }
            let Some(show) = self.resolver.cached_show(show_id).await? else {
                continue;
            };
            let total: i64 = posts.iter().map(|p| i64::from(p.score)).sum();
            ranked.push(TopEntry {
                show,
                average_score: total as f64 / posts.len() as f64,
                posts: posts.len(),
            });
        }

        ranked.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
        ranked.truncate(n);
        Ok(ranked)
    }
}
