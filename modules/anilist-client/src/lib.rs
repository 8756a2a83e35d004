pub mod error;
pub mod types;

pub use error::{AnilistError, Result};
pub use types::{Media, MediaTitle};

use serde::de::DeserializeOwned;
use serde_json::json;
use types::{GraphQlResponse, MediaData, PageData};

const ENDPOINT: &str = "https://graphql.anilist.co";

/// Field selection shared by every query.
pub const MEDIA_FIELDS: &str = "id idMal title { romaji english native } synonyms popularity episodes status averageScore siteUrl";

const SEARCH_QUERY: &str = "query ($query: String) { Page(perPage: 10) { media(search: $query, type: ANIME, sort: SEARCH_MATCH) { __FIELDS__ } } }";
const BY_ID_QUERY: &str = "query ($id: Int) { Media(id: $id, type: ANIME) { __FIELDS__ } }";
const BY_MAL_ID_QUERY: &str = "query ($id: Int) { Media(idMal: $id, type: ANIME) { __FIELDS__ } }";

pub struct AnilistClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AnilistClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Free-text search, best match first.
    pub async fn search(&self, query: &str) -> Result<Vec<Media>> {
        tracing::debug!(query, "AniList search");
        let data: Option<PageData> = self
            .post(SEARCH_QUERY, json!({ "query": query }))
            .await?;
        Ok(data.map(|d| d.page.media).unwrap_or_default())
    }

    /// Lookup by AniList id. `None` when AniList has no such entry.
    pub async fn by_id(&self, id: i32) -> Result<Option<Media>> {
        let data: Option<MediaData> = self.post(BY_ID_QUERY, json!({ "id": id })).await?;
        Ok(data.and_then(|d| d.media))
    }

    /// Lookup by MyAnimeList id. `None` when AniList has no mapping.
    pub async fn by_mal_id(&self, id: i32) -> Result<Option<Media>> {
        let data: Option<MediaData> = self.post(BY_MAL_ID_QUERY, json!({ "id": id })).await?;
        Ok(data.and_then(|d| d.media))
    }

    /// POST a query. A GraphQL-level 404 ("Not Found.") maps to `Ok(None)`;
    /// every other error status is surfaced.
    async fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<Option<T>> {
        let body = json!({
            "query": query.replace("__FIELDS__", MEDIA_FIELDS),
            "variables": variables,
        });

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        let raw = resp.text().await?;

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AnilistError::Api {
                status: status.as_u16(),
                message: raw,
            });
        }

        parse_response(&raw)
    }
}

impl Default for AnilistClient {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<Option<T>> {
    let response: GraphQlResponse<T> = serde_json::from_str(raw)?;
    if let Some(err) = response.errors.first() {
        if err.status == Some(404) {
            return Ok(None);
        }
        if response.data.is_none() {
            return Err(AnilistError::Api {
                status: err.status.unwrap_or(500),
                message: err.message.clone(),
            });
        }
    }
    Ok(response.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page() {
        let raw = r#"{"data": {"Page": {"media": [
            {"id": 100, "idMal": 200, "title": {"romaji": "Shingeki", "english": "Attack", "native": null},
             "synonyms": ["AoT"], "popularity": 500, "episodes": 25, "status": "FINISHED",
             "averageScore": 84, "siteUrl": "https://anilist.co/anime/100"}
        ]}}}"#;
        let page: PageData = parse_response(raw).unwrap().unwrap();
        assert_eq!(page.page.media[0].id, 100);
        assert_eq!(page.page.media[0].id_mal, Some(200));
        assert_eq!(page.page.media[0].title.english.as_deref(), Some("Attack"));
    }

    #[test]
    fn not_found_is_none() {
        let raw = r#"{"errors": [{"message": "Not Found.", "status": 404}], "data": {"Media": null}}"#;
        let data: Option<MediaData> = parse_response(raw).unwrap();
        assert!(data.is_none());
    }

    #[test]
    fn other_errors_surface() {
        let raw = r#"{"errors": [{"message": "Too Many Requests.", "status": 429}], "data": null}"#;
        let result: Result<Option<MediaData>> = parse_response(raw);
        assert!(matches!(result, Err(AnilistError::Api { status: 429, .. })));
    }

    #[test]
    fn queries_embed_field_selection() {
        let q = BY_MAL_ID_QUERY.replace("__FIELDS__", MEDIA_FIELDS);
        assert!(q.contains("idMal: $id"));
        assert!(q.contains("averageScore"));
    }
}
