// Trait abstractions for the remote sources a cycle depends on.
//
// ForumSource: the live forum: newest listing plus bulk lookup by id.
// HistorySource: the historical search index, authoritative for coverage.
// ShowSource: the show catalogue: free-text search, by id, by MAL id.
//
// Concrete clients implement these here; testing.rs provides in-memory
// fakes so a whole cycle runs without network or Redis.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use anilist_client::{AnilistClient, Media};
use pushshift_client::{PushshiftClient, Submission};
use reddit_client::{RedditClient, RedditPost};
use toron_common::{Post, Show};

/// One page of the newest listing.
#[derive(Debug, Clone, Default)]
pub struct ForumPage {
    pub posts: Vec<Post>,
    /// Continuation token; `None` once the listing is exhausted.
    pub after: Option<String>,
    /// Running item count to send with the next request.
    pub count: u32,
}

// ---------------------------------------------------------------------------
// ForumSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ForumSource: Send + Sync {
    async fn newest(&self, after: Option<&str>, count: u32) -> Result<ForumPage>;

    /// Current state of the given posts. Unknown ids are left out.
    async fn info(&self, ids: &[String]) -> Result<Vec<Post>>;
}

pub fn post_from_reddit(post: RedditPost, fetched: DateTime<Utc>) -> Post {
    Post {
        author: post.author,
        created_utc: post.created_utc as i64,
        id: post.id,
        is_self: post.is_self,
        num_comments: post.num_comments,
        over_18: post.over_18,
        permalink: post.permalink,
        score: post.score,
        selftext: post.selftext,
        title: post.title,
        url: post.url,
        fetched,
    }
}

#[async_trait]
impl ForumSource for RedditClient {
    async fn newest(&self, after: Option<&str>, count: u32) -> Result<ForumPage> {
        let listing = RedditClient::newest(self, after, count).await?;
        let now = Utc::now();
        Ok(ForumPage {
            posts: listing
                .posts
                .into_iter()
                .map(|p| post_from_reddit(p, now))
                .collect(),
            after: listing.after,
            count: listing.count,
        })
    }

    async fn info(&self, ids: &[String]) -> Result<Vec<Post>> {
        let now = Utc::now();
        let mut posts = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(reddit_client::MAX_INFO_IDS) {
            let found = RedditClient::info(self, chunk).await?;
            posts.extend(found.into_iter().map(|p| post_from_reddit(p, now)));
        }
        Ok(posts)
    }
}

// ---------------------------------------------------------------------------
// HistorySource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Posts created strictly after `after` (epoch seconds), oldest first.
    async fn after(&self, after: i64) -> Result<Vec<Post>>;
}

pub fn post_from_submission(post: Submission, fetched: DateTime<Utc>) -> Post {
    Post {
        author: post.author,
        created_utc: post.created_utc,
        id: post.id,
        is_self: post.is_self,
        num_comments: post.num_comments,
        over_18: post.over_18,
        permalink: post.permalink,
        score: post.score,
        selftext: post.selftext,
        title: post.title,
        url: post.url,
        fetched,
    }
}

#[async_trait]
impl HistorySource for PushshiftClient {
    async fn after(&self, after: i64) -> Result<Vec<Post>> {
        let submissions = self.submissions_after(after).await?;
        let now = Utc::now();
        Ok(submissions
            .into_iter()
            .map(|s| post_from_submission(s, now))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// ShowSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ShowSource: Send + Sync {
    /// Best match first.
    async fn search(&self, query: &str) -> Result<Vec<Show>>;

    async fn by_id(&self, id: i32) -> Result<Option<Show>>;

    async fn by_mal_id(&self, mal_id: i32) -> Result<Option<Show>>;
}

pub fn show_from_media(media: Media, retrieved: DateTime<Utc>) -> Show {
    Show {
        id: media.id,
        id_mal: media.id_mal,
        title_romaji: media.title.romaji,
        title_english: media.title.english,
        title_native: media.title.native,
        synonyms: media.synonyms,
        popularity: media.popularity,
        episodes: media.episodes.unwrap_or(0),
        status: media.status.unwrap_or_default(),
        average_score: media.average_score.unwrap_or(0),
        site_url: media.site_url,
        retrieved,
    }
}

#[async_trait]
impl ShowSource for AnilistClient {
    async fn search(&self, query: &str) -> Result<Vec<Show>> {
        let media = AnilistClient::search(self, query).await?;
        let now = Utc::now();
        Ok(media.into_iter().map(|m| show_from_media(m, now)).collect())
    }

    async fn by_id(&self, id: i32) -> Result<Option<Show>> {
        let media = AnilistClient::by_id(self, id).await?;
        Ok(media.map(|m| show_from_media(m, Utc::now())))
    }

    async fn by_mal_id(&self, mal_id: i32) -> Result<Option<Show>> {
        let media = AnilistClient::by_mal_id(self, mal_id).await?;
        Ok(media.map(|m| show_from_media(m, Utc::now())))
    }
}
