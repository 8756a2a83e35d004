pub mod error;
pub mod types;

pub use error::{RedditError, Result};
pub use types::{Listing, RedditPost};

use types::ListingResponse;

const BASE_URL: &str = "https://api.reddit.com";

/// Reddit caps `/api/info` at 100 fullnames per request.
pub const MAX_INFO_IDS: usize = 100;

/// Page size requested from `/new`. Reddit caps listings at 100.
const PAGE_LIMIT: u32 = 100;

pub struct RedditClient {
    client: reqwest::Client,
    base_url: String,
    subreddit: String,
}

impl RedditClient {
    pub fn new(user_agent: &str, subreddit: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            subreddit: subreddit.to_string(),
        })
    }

    /// Point the client at a different host (used against local fixtures).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch one page of the subreddit's newest submissions.
    ///
    /// `after` is the continuation token from the previous page; `count` is the
    /// running total returned with it. Pass `None, 0` for the first page.
    pub async fn newest(&self, after: Option<&str>, count: u32) -> Result<Listing> {
        let url = format!("{}/r/{}/new", self.base_url, self.subreddit);
        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", PAGE_LIMIT.to_string()), ("raw_json", "1".to_string())]);
        if let Some(after) = after {
            request = request.query(&[("after", after.to_string()), ("count", count.to_string())]);
        }

        let raw = send_text(request).await?;
        let listing = parse_listing(&raw, count)?;
        tracing::debug!(
            after = listing.after.as_deref().unwrap_or(""),
            count = listing.count,
            posts = listing.posts.len(),
            "Fetched /new page"
        );
        Ok(listing)
    }

    /// Bulk lookup by post id (without the `t3_` prefix). At most
    /// [`MAX_INFO_IDS`] ids per call; callers chunk larger sets.
    pub async fn info(&self, ids: &[String]) -> Result<Vec<RedditPost>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let fullnames = ids
            .iter()
            .map(|id| format!("t3_{id}"))
            .collect::<Vec<_>>()
            .join(",");

        let url = format!("{}/api/info", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("id", fullnames), ("raw_json", "1".to_string())]);

        let raw = send_text(request).await?;
        Ok(parse_listing(&raw, 0)?.posts)
    }
}

async fn send_text(request: reqwest::RequestBuilder) -> Result<String> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RedditError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp.text().await?)
}

/// Parse a listing body. Children that are not submissions, or that fail to
/// deserialize, are dropped with a warning rather than failing the page.
pub fn parse_listing(raw: &str, previous_count: u32) -> Result<Listing> {
    let response: ListingResponse = serde_json::from_str(raw)?;
    let dist = response
        .data
        .dist
        .unwrap_or(response.data.children.len() as u32);

    let posts = response
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == "t3")
        .filter_map(|child| match serde_json::from_value::<RedditPost>(child.data) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed listing child");
                None
            }
        })
        .collect();

    Ok(Listing {
        posts,
        after: response.data.after,
        count: previous_count + dist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_abc124",
            "dist": 2,
            "children": [
                {"kind": "t3", "data": {
                    "id": "abc123", "author": "AutoLovepon", "created_utc": 1545263923.0,
                    "permalink": "/r/anime/comments/abc123/x/", "url": "https://www.reddit.com/r/anime/comments/abc123/x/",
                    "title": "Show - Episode 3 discussion", "is_self": true, "num_comments": 40,
                    "score": 120, "over_18": false, "selftext": "hello"
                }},
                {"kind": "t1", "data": {"id": "comment"}},
                {"kind": "t3", "data": {
                    "id": "abc124", "author": "someone", "created_utc": 1545263999,
                    "permalink": "/r/anime/comments/abc124/y/", "url": "https://i.imgur.com/x.png",
                    "title": "Fanart"
                }}
            ]
        }
    }"#;

    #[test]
    fn parses_submissions_and_skips_other_kinds() {
        let listing = parse_listing(LISTING, 25).unwrap();
        assert_eq!(listing.posts.len(), 2);
        assert_eq!(listing.after.as_deref(), Some("t3_abc124"));
        assert_eq!(listing.count, 27);
        assert_eq!(listing.posts[0].num_comments, 40);
        assert!(listing.posts[0].is_self);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let listing = parse_listing(LISTING, 0).unwrap();
        let fanart = &listing.posts[1];
        assert!(!fanart.is_self);
        assert_eq!(fanart.score, 0);
        assert!(fanart.selftext.is_none());
        assert_eq!(fanart.created_utc as i64, 1545263999);
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        assert!(matches!(parse_listing("<html>", 0), Err(RedditError::Parse(_))));
    }
}
