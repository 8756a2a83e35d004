// In-memory fakes for the three source traits, plus builders.
//
// - MockForum (ForumSource): pages keyed by continuation token, posts by id
// - MockHistory (HistorySource): sorted posts served `after` a timestamp
// - MockShowApi (ShowSource): shows by id, MAL id and search text
//
// Each mock counts its calls so tests can assert on remote traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use toron_common::{Post, Show};
use toron_store::MemoryStore;

use crate::config::ScoutConfig;
use crate::service::Toron;
use crate::traits::{ForumPage, ForumSource, HistorySource, ShowSource};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A link post with no engagement, fetched now.
pub fn post(id: &str, created: DateTime<Utc>) -> Post {
    Post {
        author: "tester".into(),
        created_utc: created.timestamp(),
        id: id.into(),
        is_self: false,
        num_comments: 0,
        over_18: false,
        permalink: format!("/r/anime/comments/{id}/"),
        score: 0,
        selftext: None,
        title: format!("Post {id}"),
        url: format!("https://www.reddit.com/r/anime/comments/{id}/"),
        fetched: Utc::now(),
    }
}

/// An episode discussion that passes the quality filter. `body` should
/// contain some text besides links.
pub fn discussion(id: &str, created: DateTime<Utc>, title: &str, body: &str) -> Post {
    Post {
        author: "AutoLovepon".into(),
        is_self: true,
        num_comments: 40,
        score: 120,
        selftext: Some(body.into()),
        title: title.into(),
        ..post(id, created)
    }
}

/// A discussion linking AniList show `show_id`.
pub fn linked_discussion(id: &str, created: DateTime<Utc>, show_id: i32) -> Post {
    discussion(
        id,
        created,
        &format!("Show {show_id} - Episode 1 discussion"),
        &format!("Rate this episode! [AniList](https://anilist.co/anime/{show_id}/)"),
    )
}

pub fn show(id: i32, title: &str, popularity: i32) -> Show {
    Show {
        id,
        id_mal: None,
        title_romaji: title.into(),
        title_english: None,
        title_native: None,
        synonyms: Vec::new(),
        popularity,
        episodes: 12,
        status: "FINISHED".into(),
        average_score: 70,
        site_url: Some(format!("https://anilist.co/anime/{id}")),
        retrieved: Utc::now(),
    }
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

// ---------------------------------------------------------------------------
// MockForum
// ---------------------------------------------------------------------------

/// Listing pages keyed by the continuation token that requests them (`None`
/// for the first page). Unregistered tokens return an empty page.
#[derive(Default)]
pub struct MockForum {
    pages: HashMap<Option<String>, ForumPage>,
    posts: Mutex<HashMap<String, Post>>,
    newest_calls: AtomicUsize,
    info_calls: AtomicUsize,
    down: bool,
}

impl MockForum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, after: Option<&str>, posts: Vec<Post>, next: Option<&str>) -> Self {
        let count = posts.len() as u32;
        self.pages.insert(
            after.map(str::to_string),
            ForumPage {
                posts,
                after: next.map(str::to_string),
                count,
            },
        );
        self
    }

    /// Current state returned by bulk lookups.
    pub fn on_info(self, post: Post) -> Self {
        self.set_info(post);
        self
    }

    pub fn set_info(&self, post: Post) {
        self.posts
            .lock()
            .unwrap()
            .insert(post.id.clone(), post);
    }

    /// Every call fails with a transport error.
    pub fn down(mut self) -> Self {
        self.down = true;
        self
    }

    pub fn newest_calls(&self) -> usize {
        self.newest_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForumSource for MockForum {
    async fn newest(&self, after: Option<&str>, count: u32) -> Result<ForumPage> {
        self.newest_calls.fetch_add(1, Ordering::SeqCst);
        if self.down {
            bail!("MockForum: connection refused");
        }
        let mut page = self
            .pages
            .get(&after.map(str::to_string))
            .cloned()
            .unwrap_or_default();
        page.count += count;
        Ok(page)
    }

    async fn info(&self, ids: &[String]) -> Result<Vec<Post>> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if self.down {
            bail!("MockForum: connection refused");
        }
        let posts = self.posts.lock().unwrap();
        Ok(ids.iter().filter_map(|id| posts.get(id).cloned()).collect())
    }
}

// ---------------------------------------------------------------------------
// MockHistory
// ---------------------------------------------------------------------------

/// Serves stored posts created strictly after the cursor, oldest first,
/// `page_size` at a time.
pub struct MockHistory {
    posts: Vec<Post>,
    page_size: usize,
    cursors: Mutex<Vec<i64>>,
}

impl Default for MockHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHistory {
    pub fn new() -> Self {
        Self {
            posts: Vec::new(),
            page_size: 100,
            cursors: Mutex::new(Vec::new()),
        }
    }

    pub fn with_posts(mut self, posts: Vec<Post>) -> Self {
        self.posts = posts;
        self.posts.sort_by_key(|p| p.created_utc);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Cursors requested so far, in order.
    pub fn cursors(&self) -> Vec<i64> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistorySource for MockHistory {
    async fn after(&self, after: i64) -> Result<Vec<Post>> {
        self.cursors.lock().unwrap().push(after);
        Ok(self
            .posts
            .iter()
            .filter(|p| p.created_utc > after)
            .take(self.page_size)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockShowApi
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockShowApi {
    shows: HashMap<i32, Show>,
    searches: HashMap<String, Vec<i32>>,
    by_id_calls: AtomicUsize,
    by_mal_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl MockShowApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_show(mut self, show: Show) -> Self {
        self.shows.insert(show.id, show);
        self
    }

    /// Free-text search results, best first. Matching ignores case.
    pub fn on_search(mut self, query: &str, ids: Vec<i32>) -> Self {
        self.searches.insert(query.to_lowercase(), ids);
        self
    }

    pub fn by_id_calls(&self) -> usize {
        self.by_id_calls.load(Ordering::SeqCst)
    }

    pub fn by_mal_calls(&self) -> usize {
        self.by_mal_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShowSource for MockShowApi {
    async fn search(&self, query: &str) -> Result<Vec<Show>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let ids = self
            .searches
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default();
        Ok(ids.iter().filter_map(|id| self.shows.get(id).cloned()).collect())
    }

    async fn by_id(&self, id: i32) -> Result<Option<Show>> {
        self.by_id_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.shows.get(&id).cloned())
    }

    async fn by_mal_id(&self, mal_id: i32) -> Result<Option<Show>> {
        self.by_mal_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.shows.values().find(|s| s.id_mal == Some(mal_id)).cloned())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A service wired to fakes, keeping handles to each for assertions.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub forum: Arc<MockForum>,
    pub history: Arc<MockHistory>,
    pub shows: Arc<MockShowApi>,
    pub toron: Toron,
}

impl Harness {
    pub fn new(forum: MockForum, history: MockHistory, shows: MockShowApi) -> Self {
        Self::on_store(Arc::new(MemoryStore::new()), forum, history, shows)
    }

    /// Build over an existing store, e.g. one seeded by an earlier harness.
    pub fn on_store(
        store: Arc<MemoryStore>,
        forum: MockForum,
        history: MockHistory,
        shows: MockShowApi,
    ) -> Self {
        let forum = Arc::new(forum);
        let history = Arc::new(history);
        let shows = Arc::new(shows);
        let toron = Toron::new(
            store.clone(),
            forum.clone(),
            history.clone(),
            shows.clone(),
            ScoutConfig::immediate(),
        );
        Self {
            store,
            forum,
            history,
            shows,
            toron,
        }
    }
}
