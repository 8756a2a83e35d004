use std::sync::Arc;

use toron_common::{Post, SearchEntry, Show};

use crate::collection::Collection;
use crate::error::Result;
use crate::kv::KeyValueStore;
use crate::records::ShowRef;

pub const POSTS: &str = "post:";
pub const SHOWS: &str = "show:";
pub const SHOWS_BY_MAL: &str = "show-mal:";
pub const SEARCHES: &str = "search:";

const HIGH_WATER_SCAN_GROUP: usize = 500;

/// The logical collections sharing one store.
#[derive(Clone)]
pub struct Repository {
    pub posts: Collection<Post>,
    pub shows: Collection<Show>,
    pub shows_by_mal: Collection<ShowRef>,
    pub searches: Collection<SearchEntry>,
}

impl Repository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            posts: Collection::new(store.clone(), POSTS),
            shows: Collection::new(store.clone(), SHOWS),
            shows_by_mal: Collection::new(store.clone(), SHOWS_BY_MAL),
            searches: Collection::new(store, SEARCHES),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        self.posts.store()
    }

    /// Store a show along with its MyAnimeList index entry.
    pub async fn save_show(&self, show: &Show) -> Result<()> {
        self.shows.put(show.id, show).await?;
        self.index_show(show).await
    }

    /// Write only the MyAnimeList index entry for `show`.
    pub async fn index_show(&self, show: &Show) -> Result<()> {
        match show.id_mal {
            Some(mal) => self.shows_by_mal.put(mal, &ShowRef { id: show.id }).await,
            None => Ok(()),
        }
    }

    /// Remove a show and its MyAnimeList index entry.
    pub async fn delete_show(&self, show: &Show) -> Result<()> {
        self.shows.delete(&[show.id]).await?;
        if let Some(mal) = show.id_mal {
            self.shows_by_mal.delete(&[mal]).await?;
        }
        Ok(())
    }

    pub async fn show_id_for_mal(&self, mal: i32) -> Result<Option<i32>> {
        Ok(self.shows_by_mal.get(mal).await?.map(|r| r.id))
    }

    /// Latest creation time among stored posts, `None` for an empty store.
    pub async fn high_water_mark(&self) -> Result<Option<i64>> {
        let mut newest: Option<i64> = None;
        let mut cursor: Option<String> = None;
        loop {
            let (posts, next) = self
                .posts
                .scan_page(cursor.as_deref(), HIGH_WATER_SCAN_GROUP)
                .await?;
            for (_, post) in posts {
                newest = Some(newest.map_or(post.created_utc, |n| n.max(post.created_utc)));
            }
            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(newest),
            }
        }
    }
}
