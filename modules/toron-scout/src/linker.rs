// Grouping of posts by the show they discuss.
//
// The index is rebuilt from the store on every invalidation and published as
// an immutable snapshot. Readers clone the current `Arc` and never see a
// half-built index. Rebuilds are serialised; an invalidation that arrives
// while a rebuild is queued is satisfied by that rebuild instead of
// starting another.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use toron_common::Post;
use toron_store::Repository;

use crate::resolver::Resolver;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupingSnapshot {
    /// 0 until the first rebuild completes.
    pub generation: u64,
    /// Show id to the ids of posts discussing it, in id order.
    pub groups: BTreeMap<i32, Vec<String>>,
    pub built_at: Option<DateTime<Utc>>,
}

impl GroupingSnapshot {
    pub fn posts_for(&self, show_id: i32) -> &[String] {
        self.groups.get(&show_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_post(&self, post_id: &str) -> bool {
        self.groups.values().any(|ids| ids.iter().any(|id| id == post_id))
    }
}

/// Minimum quality for a post to count towards a show.
pub fn passes_quality(post: &Post) -> bool {
    post.num_comments > 2
        && post.score > 1
        && post.is_self
        && post.episode().is_some()
        && post.meaningful_body().is_some()
}

pub struct Linker {
    repo: Repository,
    resolver: Arc<Resolver>,
    scan_group: usize,
    published: watch::Sender<Arc<GroupingSnapshot>>,
    requested: AtomicU64,
    /// Generation of the last completed rebuild.
    built: Mutex<u64>,
}

impl Linker {
    pub fn new(repo: Repository, resolver: Arc<Resolver>, scan_group: usize) -> Self {
        let (published, _) = watch::channel(Arc::new(GroupingSnapshot::default()));
        Self {
            repo,
            resolver,
            scan_group,
            published,
            requested: AtomicU64::new(0),
            built: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> Arc<GroupingSnapshot> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<GroupingSnapshot>> {
        self.published.subscribe()
    }

    /// Mark the index out of date and rebuild it, unless a rebuild that
    /// started after this call already covers it.
    pub async fn invalidate(&self) -> Result<Arc<GroupingSnapshot>> {
        let wanted = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let mut built = self.built.lock().await;
        if *built >= wanted {
            debug!(wanted, built = *built, "Rebuild already covered");
            return Ok(self.snapshot());
        }

        let generation = self.requested.load(Ordering::SeqCst);
        let snapshot = Arc::new(self.rebuild(generation).await?);
        *built = generation;
        self.published.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    async fn rebuild(&self, generation: u64) -> Result<GroupingSnapshot> {
        let posts = self.repo.posts.scan_all(self.scan_group).await?;
        let total = posts.len();
        let mut groups: BTreeMap<i32, Vec<String>> = BTreeMap::new();
        let mut unresolved = 0usize;

        for (_, post) in posts.iter().filter(|(_, p)| passes_quality(p)) {
            match self.resolver.resolve(post).await {
                Ok(Some(show)) => groups.entry(show.id).or_default().push(post.id.clone()),
                Ok(None) => unresolved += 1,
                Err(e) => {
                    warn!(post_id = post.id.as_str(), error = %e, "Show lookup failed, skipping post");
                    unresolved += 1;
                }
            }
        }

        info!(
            generation,
            posts = total,
            shows = groups.len(),
            unresolved,
            "Rebuilt grouping index"
        );
        Ok(GroupingSnapshot {
            generation,
            groups,
            built_at: Some(Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        Post {
            author: "AutoLovepon".into(),
            created_utc: 0,
            id: "a".into(),
            is_self: true,
            num_comments: 3,
            over_18: false,
            permalink: String::new(),
            score: 2,
            selftext: Some("Rate this episode here.".into()),
            title: "Show - Episode 1 discussion".into(),
            url: String::new(),
            fetched: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn quality_thresholds_are_strict() {
        assert!(passes_quality(&post()));
        assert!(!passes_quality(&Post { num_comments: 2, ..post() }));
        assert!(!passes_quality(&Post { score: 1, ..post() }));
        assert!(!passes_quality(&Post { is_self: false, ..post() }));
        assert!(!passes_quality(&Post { title: "Show discussion".into(), ..post() }));
        assert!(!passes_quality(&Post { selftext: Some("[removed]".into()), ..post() }));
    }

    #[test]
    fn empty_snapshot_has_no_posts() {
        let snapshot = GroupingSnapshot::default();
        assert!(snapshot.posts_for(1).is_empty());
        assert!(!snapshot.contains_post("a"));
    }
}
