use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Bare URLs in markdown/plain text. Parentheses are excluded so markdown
/// links (`[name](https://...)`) yield just the target.
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{2,256}\.[a-z]{2,6}\b[-a-zA-Z0-9@:%_+.~#?&/=]*")
        .expect("valid regex")
});

static ANIME_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"anime/(\d*)(?:/|$|\?)").expect("valid regex"));

static REDDIT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:comments|\.it)/([a-z0-9]*)(?:/|$|\?)").expect("valid regex"));

/// External services recognised in thread bodies, matched by domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    AniList,
    Imgur,
    Crunchyroll,
    Reddit,
    MyAnimeList,
    Kitsu,
    Funimation,
    Hulu,
    Other,
}

impl ServiceType {
    const ALL: [ServiceType; 8] = [
        ServiceType::AniList,
        ServiceType::Imgur,
        ServiceType::Crunchyroll,
        ServiceType::Reddit,
        ServiceType::MyAnimeList,
        ServiceType::Kitsu,
        ServiceType::Funimation,
        ServiceType::Hulu,
    ];

    pub fn domains(self) -> &'static [&'static str] {
        match self {
            ServiceType::AniList => &["anilist.co"],
            ServiceType::Imgur => &["imgur.com"],
            ServiceType::Crunchyroll => &["crunchyroll.com"],
            ServiceType::Reddit => &["reddit.com", "redd.it"],
            ServiceType::MyAnimeList => &["myanimelist.net"],
            ServiceType::Kitsu => &["kitsu.io"],
            ServiceType::Funimation => &["funimation.com"],
            ServiceType::Hulu => &["hulu.com"],
            ServiceType::Other => &[],
        }
    }

    pub fn detect(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.domains().iter().any(|d| lower.contains(d)))
            .unwrap_or(ServiceType::Other)
    }
}

/// A link found in a thread body, classified by service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub url: String,
    pub service_type: ServiceType,
}

impl Service {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            service_type: ServiceType::detect(url),
        }
    }

    /// Numeric show id for AniList and MyAnimeList links (`.../anime/<id>/...`).
    pub fn show_id(&self) -> Option<i32> {
        match self.service_type {
            ServiceType::AniList | ServiceType::MyAnimeList => ANIME_ID_RE
                .captures(&self.url)?
                .get(1)?
                .as_str()
                .parse()
                .ok(),
            _ => None,
        }
    }

    /// Post id for Reddit links (`/comments/<id>/` or `redd.it/<id>`).
    pub fn post_id(&self) -> Option<String> {
        if self.service_type != ServiceType::Reddit {
            return None;
        }
        let id = REDDIT_ID_RE.captures(&self.url)?.get(1)?.as_str();
        (!id.is_empty()).then(|| id.to_string())
    }
}

/// Every URL in `text`, in order of appearance, deduplicated.
pub fn extract_links(text: &str) -> Vec<Service> {
    let mut seen = std::collections::HashSet::new();
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|url| seen.insert(*url))
        .map(Service::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_links_are_extracted_without_parens() {
        let links = extract_links("[AniList](https://anilist.co/anime/100/Shingeki) and more");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://anilist.co/anime/100/Shingeki");
        assert_eq!(links[0].service_type, ServiceType::AniList);
        assert_eq!(links[0].show_id(), Some(100));
    }

    #[test]
    fn mal_id_at_end_of_url() {
        let s = Service::new("https://myanimelist.net/anime/37521");
        assert_eq!(s.service_type, ServiceType::MyAnimeList);
        assert_eq!(s.show_id(), Some(37521));
    }

    #[test]
    fn anilist_link_without_id() {
        let s = Service::new("https://anilist.co/search/anime");
        assert_eq!(s.show_id(), None);
    }

    #[test]
    fn reddit_post_ids() {
        assert_eq!(
            Service::new("https://www.reddit.com/r/anime/comments/a7kd3e/some_title/").post_id(),
            Some("a7kd3e".to_string())
        );
        assert_eq!(Service::new("https://redd.it/a7kd3e").post_id(), Some("a7kd3e".to_string()));
        assert_eq!(Service::new("https://www.reddit.com/r/anime/").post_id(), None);
    }

    #[test]
    fn unknown_domains_are_other() {
        let links = extract_links("see https://example.com/page for info");
        assert_eq!(links[0].service_type, ServiceType::Other);
        assert_eq!(links[0].show_id(), None);
    }

    #[test]
    fn duplicates_collapse() {
        let text = "https://anilist.co/anime/1 https://anilist.co/anime/1 https://anilist.co/anime/2";
        let ids: Vec<_> = extract_links(text).iter().filter_map(|s| s.show_id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn no_links_in_plain_text() {
        assert!(extract_links("nothing to see here").is_empty());
    }
}
