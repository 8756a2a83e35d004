// Show resolution for a post: linked AniList ids, then linked MAL ids, then
// free-text search on the derived show title. All lookups go through the
// store-backed caches so a show is fetched at most once per staleness window.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use toron_common::{Post, SearchEntry, ServiceType, Show};
use toron_store::{MemoCache, Producer, Repository};

use crate::config::ScoutConfig;
use crate::retry::RetryPolicy;
use crate::traits::ShowSource;

/// External id schemes a show can be referenced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdScheme {
    AniList,
    Mal,
}

/// Ids known to resolve to nothing. Lives for the process only; a restart
/// gives every id another chance. An id is never blocked while its show is
/// stored.
#[derive(Debug, Default)]
pub struct BlockSet {
    ids: Mutex<HashSet<(IdScheme, i32)>>,
}

impl BlockSet {
    pub async fn contains(&self, scheme: IdScheme, id: i32) -> bool {
        self.ids.lock().await.contains(&(scheme, id))
    }

    pub async fn block(&self, scheme: IdScheme, id: i32) {
        self.ids.lock().await.insert((scheme, id));
    }

    /// Lift any block on the ids of a show that has just been stored.
    pub async fn release(&self, show: &Show) {
        let mut ids = self.ids.lock().await;
        ids.remove(&(IdScheme::AniList, show.id));
        if let Some(mal) = show.id_mal {
            ids.remove(&(IdScheme::Mal, mal));
        }
    }

    pub async fn len(&self) -> usize {
        self.ids.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ids.lock().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Producers
// ---------------------------------------------------------------------------

/// Fetches a show by AniList id, keeps the MAL index in step and lifts any
/// block on the ids of a show it finds.
pub struct ShowById {
    source: Arc<dyn ShowSource>,
    repo: Repository,
    blocks: Arc<BlockSet>,
    retry: RetryPolicy,
}

#[async_trait]
impl Producer<Show> for ShowById {
    type Error = anyhow::Error;

    async fn produce(&self, key: &str) -> Result<Option<Show>> {
        let id: i32 = key.parse()?;
        let show = self.retry.call("show by id", || self.source.by_id(id)).await?;
        if let Some(show) = &show {
            self.repo.index_show(show).await?;
            self.blocks.release(show).await;
        }
        Ok(show)
    }
}

/// Runs a free-text search and stores every returned show.
pub struct ShowSearch {
    source: Arc<dyn ShowSource>,
    repo: Repository,
    blocks: Arc<BlockSet>,
    retry: RetryPolicy,
}

#[async_trait]
impl Producer<SearchEntry> for ShowSearch {
    type Error = anyhow::Error;

    async fn produce(&self, query: &str) -> Result<Option<SearchEntry>> {
        let shows = self.retry.call("show search", || self.source.search(query)).await?;
        for show in &shows {
            self.repo.save_show(show).await?;
            self.blocks.release(show).await;
        }
        Ok(Some(SearchEntry {
            query: query.to_string(),
            shows: shows.iter().map(|s| s.id).collect(),
            retrieved: Utc::now(),
        }))
    }
}

/// Search cache key for free text.
pub fn search_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct Resolver {
    shows: MemoCache<Show, ShowById>,
    searches: MemoCache<SearchEntry, ShowSearch>,
    source: Arc<dyn ShowSource>,
    repo: Repository,
    blocks: Arc<BlockSet>,
    retry: RetryPolicy,
}

impl Resolver {
    pub fn new(source: Arc<dyn ShowSource>, repo: Repository, config: &ScoutConfig) -> Self {
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_backoff);
        let blocks = Arc::new(BlockSet::default());

        let show_ttl = config.show_ttl;
        let shows = MemoCache::new(
            "shows",
            repo.shows.clone(),
            ShowById {
                source: source.clone(),
                repo: repo.clone(),
                blocks: blocks.clone(),
                retry,
            },
        )
        .with_staleness(move |_, show: &Show| Utc::now() - show.retrieved > show_ttl);

        let search_ttl = config.search_ttl;
        let searches = MemoCache::new(
            "searches",
            repo.searches.clone(),
            ShowSearch {
                source: source.clone(),
                repo: repo.clone(),
                blocks: blocks.clone(),
                retry,
            },
        )
        .with_staleness(move |_, entry: &SearchEntry| Utc::now() - entry.retrieved > search_ttl);

        Self {
            shows,
            searches,
            source,
            repo,
            blocks,
            retry,
        }
    }

    pub fn blocks(&self) -> &BlockSet {
        &self.blocks
    }

    /// Show by AniList id, fetched on a miss or when stale.
    pub async fn show(&self, id: i32) -> Result<Option<Show>> {
        if self.blocks.contains(IdScheme::AniList, id).await {
            return Ok(None);
        }
        match self.shows.get(&id.to_string()).await? {
            Some(show) => Ok(Some(show)),
            None => {
                debug!(id, "Blocking unknown AniList id");
                self.blocks.block(IdScheme::AniList, id).await;
                Ok(None)
            }
        }
    }

    /// Show as currently cached, without any remote call.
    pub async fn cached_show(&self, id: i32) -> Result<Option<Show>> {
        Ok(self.shows.cached(&id.to_string()).await?)
    }

    /// Show by MyAnimeList id, through the secondary index when possible.
    pub async fn show_by_mal(&self, mal: i32) -> Result<Option<Show>> {
        if self.blocks.contains(IdScheme::Mal, mal).await {
            return Ok(None);
        }
        if let Some(id) = self.repo.show_id_for_mal(mal).await? {
            return self.show(id).await;
        }

        match self
            .retry
            .call("show by mal id", || self.source.by_mal_id(mal))
            .await?
        {
            Some(show) => {
                self.shows.insert(&show.id.to_string(), show.clone()).await?;
                self.repo.index_show(&show).await?;
                self.blocks.release(&show).await;
                Ok(Some(show))
            }
            None => {
                debug!(mal, "Blocking unknown MAL id");
                self.blocks.block(IdScheme::Mal, mal).await;
                Ok(None)
            }
        }
    }

    /// Shows matching free text, best match first.
    pub async fn search(&self, text: &str) -> Result<Vec<Show>> {
        let key = search_key(text);
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let Some(entry) = self.searches.get(&key).await? else {
            return Ok(Vec::new());
        };

        let mut shows = Vec::with_capacity(entry.shows.len());
        for id in entry.shows {
            if let Some(show) = self.show(id).await? {
                shows.push(show);
            }
        }
        Ok(shows)
    }

    /// The show a post discusses, or `None` when nothing matches.
    ///
    /// When several linked shows resolve, the most popular one wins. That is
    /// an approximation: a thread linking a sequel and its prequel gets
    /// whichever has more followers.
    pub async fn resolve(&self, post: &Post) -> Result<Option<Show>> {
        let links = post.links();

        let mut linked = Vec::new();
        for id in links
            .iter()
            .filter(|s| s.service_type == ServiceType::AniList)
            .filter_map(|s| s.show_id())
        {
            if let Some(show) = self.show(id).await? {
                linked.push(show);
            }
        }
        if let Some(show) = most_popular(linked) {
            return Ok(Some(show));
        }

        let mut linked = Vec::new();
        for mal in links
            .iter()
            .filter(|s| s.service_type == ServiceType::MyAnimeList)
            .filter_map(|s| s.show_id())
        {
            if let Some(show) = self.show_by_mal(mal).await? {
                linked.push(show);
            }
        }
        if let Some(show) = most_popular(linked) {
            return Ok(Some(show));
        }

        let title = post.show_title();
        Ok(self.search(&title).await?.into_iter().next())
    }

    /// Warm the show caches for every show id linked from `post`. Failures
    /// are logged; the linker retries on its next rebuild.
    pub async fn prefetch_links(&self, post: &Post) {
        for service in post.links() {
            let Some(id) = service.show_id() else {
                continue;
            };
            let result = match service.service_type {
                ServiceType::AniList => self.show(id).await,
                ServiceType::MyAnimeList => self.show_by_mal(id).await,
                _ => continue,
            };
            if let Err(e) = result {
                warn!(post_id = post.id.as_str(), show_id = id, error = %e, "Show prefetch failed");
            }
        }
    }
}

fn most_popular(shows: Vec<Show>) -> Option<Show> {
    shows.into_iter().max_by_key(|s| s.popularity)
}
