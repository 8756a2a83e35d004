use std::ops::RangeInclusive;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::links::{extract_links, Service};
use crate::title;

// --- Post ---

/// One discussion thread ingested from the forum. Keyed by `id`.
///
/// Identity fields (author, id, permalink, url, title, creation time) never
/// change after first observation; community metrics are folded in by
/// [`Post::update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub author: String,
    pub created_utc: i64,
    pub id: String,
    pub is_self: bool,
    pub num_comments: i32,
    pub over_18: bool,
    pub permalink: String,
    pub score: i32,
    pub selftext: Option<String>,
    pub title: String,
    pub url: String,
    /// Last time the metrics were fetched from the forum. Never moves backwards.
    pub fetched: DateTime<Utc>,
}

impl Post {
    pub fn created(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.created_utc, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Fold a newer observation of the same post into this one: score,
    /// comment count and body are replaced, identity fields are kept, and
    /// `fetched` advances to the newer fetch time.
    pub fn update(&self, newer: &Post) -> Post {
        Post {
            num_comments: newer.num_comments,
            score: newer.score,
            selftext: newer.selftext.clone(),
            fetched: self.fetched.max(newer.fetched),
            ..self.clone()
        }
    }

    pub fn episode(&self) -> Option<RangeInclusive<u32>> {
        title::episode_range(&self.title)
    }

    pub fn show_title(&self) -> String {
        title::show_title(&self.title)
    }

    /// Links in the body, in order of appearance. Empty for link posts.
    pub fn links(&self) -> Vec<Service> {
        self.selftext.as_deref().map(extract_links).unwrap_or_default()
    }

    /// Body with bracketed annotations removed, `None` when nothing remains.
    /// Covers `[removed]` and `[deleted]` bodies.
    pub fn meaningful_body(&self) -> Option<String> {
        let body = title::strip_brackets(self.selftext.as_deref()?);
        let body = body.trim();
        (!body.is_empty()).then(|| body.to_string())
    }
}

// --- Show ---

/// A canonical anime entry. `id` is the AniList id; `id_mal` the MyAnimeList id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: i32,
    pub id_mal: Option<i32>,
    pub title_romaji: String,
    pub title_english: Option<String>,
    pub title_native: Option<String>,
    pub synonyms: Vec<String>,
    pub popularity: i32,
    /// 0 when the total is not yet known (airing shows).
    pub episodes: i32,
    pub status: String,
    pub average_score: i32,
    pub site_url: Option<String>,
    pub retrieved: DateTime<Utc>,
}

impl Show {
    /// Preferred display title: English when present, romaji otherwise.
    pub fn display_title(&self) -> &str {
        self.title_english.as_deref().unwrap_or(&self.title_romaji)
    }
}

// --- Search cache ---

/// The show ids a free-text search returned, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub query: String,
    pub shows: Vec<i32>,
    pub retrieved: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn post() -> Post {
        Post {
            author: "AutoLovepon".into(),
            created_utc: 1_545_000_000,
            id: "a7kd3e".into(),
            is_self: true,
            num_comments: 10,
            over_18: false,
            permalink: "/r/anime/comments/a7kd3e/".into(),
            score: 50,
            selftext: Some("[AniList](https://anilist.co/anime/100)".into()),
            title: "Show - Episode 2 discussion".into(),
            url: "https://www.reddit.com/r/anime/comments/a7kd3e/".into(),
            fetched: Utc.timestamp_opt(1_545_000_100, 0).unwrap(),
        }
    }

    #[test]
    fn update_replaces_metrics_and_keeps_identity() {
        let old = post();
        let mut newer = post();
        newer.author = "someone-else".into();
        newer.score = 900;
        newer.num_comments = 300;
        newer.selftext = None;
        newer.fetched = old.fetched + Duration::hours(3);

        let merged = old.update(&newer);
        assert_eq!(merged.author, "AutoLovepon");
        assert_eq!(merged.score, 900);
        assert_eq!(merged.num_comments, 300);
        assert_eq!(merged.selftext, None);
        assert_eq!(merged.fetched, newer.fetched);
    }

    #[test]
    fn update_never_moves_fetched_backwards() {
        let old = post();
        let mut stale = post();
        stale.fetched = old.fetched - Duration::days(1);
        assert_eq!(old.update(&stale).fetched, old.fetched);
    }

    #[test]
    fn meaningful_body_ignores_removed() {
        let mut p = post();
        p.selftext = Some("[removed]".into());
        assert_eq!(p.meaningful_body(), None);
        p.selftext = None;
        assert_eq!(p.meaningful_body(), None);
        p.selftext = Some("Rate this episode".into());
        assert!(p.meaningful_body().is_some());
    }

    #[test]
    fn derived_fields() {
        let p = post();
        assert_eq!(p.episode(), Some(2..=2));
        assert_eq!(p.show_title(), "Show");
        assert_eq!(p.links()[0].show_id(), Some(100));
    }
}
