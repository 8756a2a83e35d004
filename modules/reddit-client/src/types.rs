use serde::Deserialize;

/// A submission as returned inside a Reddit listing (`kind = "t3"`).
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub author: String,
    /// Reddit serializes this as a float (`1545263923.0`).
    pub created_utc: f64,
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

/// One page of the `/new` listing.
#[derive(Debug, Clone)]
pub struct Listing {
    pub posts: Vec<RedditPost>,
    /// Continuation token for the next page. `None` once the listing is exhausted.
    pub after: Option<String>,
    /// Running number of items seen, passed back as `count` on the next request.
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListingResponse {
    pub data: ListingData,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListingData {
    pub children: Vec<ListingChild>,
    pub after: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListingChild {
    pub kind: String,
    pub data: serde_json::Value,
}
