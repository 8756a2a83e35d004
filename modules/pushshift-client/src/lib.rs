pub mod error;

pub use error::{PushshiftError, Result};

use serde::Deserialize;

const BASE_URL: &str = "https://api.pushshift.io";

/// Items requested per page. Pushshift caps this at 100.
const PAGE_SIZE: u32 = 100;

/// A submission from the historical search index.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub id: String,
    pub author: String,
    pub created_utc: i64,
    pub permalink: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub num_comments: i32,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub selftext: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<Submission>,
}

pub struct PushshiftClient {
    client: reqwest::Client,
    base_url: String,
    subreddit: String,
}

impl PushshiftClient {
    pub fn new(subreddit: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
            subreddit: subreddit.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Submissions created strictly after `after` (unix seconds), oldest first.
    pub async fn submissions_after(&self, after: i64) -> Result<Vec<Submission>> {
        let url = format!("{}/reddit/submission/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("subreddit", self.subreddit.clone()),
                ("after", after.to_string()),
                ("sort", "asc".to_string()),
                ("sort_type", "created_utc".to_string()),
                ("size", PAGE_SIZE.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PushshiftError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw = resp.text().await?;
        let submissions = parse_search(&raw)?;
        tracing::debug!(after, count = submissions.len(), "Fetched pushshift page");
        Ok(submissions)
    }
}

pub fn parse_search(raw: &str) -> Result<Vec<Submission>> {
    let response: SearchResponse = serde_json::from_str(raw)?;
    Ok(response.data)
}
