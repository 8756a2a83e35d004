use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MediaTitle {
    pub romaji: String,
    pub english: Option<String>,
    pub native: Option<String>,
}

/// An anime entry as selected by [`crate::MEDIA_FIELDS`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: i32,
    pub id_mal: Option<i32>,
    pub title: MediaTitle,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub popularity: i32,
    pub episodes: Option<i32>,
    pub status: Option<String>,
    pub average_score: Option<i32>,
    pub site_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
    pub status: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageData {
    #[serde(rename = "Page")]
    pub page: Page,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    pub media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaData {
    #[serde(rename = "Media")]
    pub media: Option<Media>,
}
