// Keeps stored post metrics fresh and prunes old posts nobody engaged with.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use toron_common::{is_outdated, Post};
use toron_store::Repository;

use crate::config::ScoutConfig;
use crate::retry::RetryPolicy;
use crate::traits::ForumSource;

pub struct Refresher {
    forum: Arc<dyn ForumSource>,
    repo: Repository,
    config: ScoutConfig,
    retry: RetryPolicy,
}

/// Old posts are kept while they show any sign of being worth keeping.
pub fn is_low_value(post: &Post) -> bool {
    post.num_comments <= 2 && post.score <= 1 && !post.is_self
}

impl Refresher {
    pub fn new(forum: Arc<dyn ForumSource>, repo: Repository, config: ScoutConfig) -> Self {
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_backoff);
        Self {
            forum,
            repo,
            config,
            retry,
        }
    }

    /// Refetch every outdated post, one scan group at a time. A batch whose
    /// lookup keeps failing is skipped until the next cycle.
    pub async fn refresh(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut cursor: Option<String> = None;
        let mut groups = 0usize;
        let mut refreshed = 0usize;

        loop {
            let (posts, next) = self
                .repo
                .posts
                .scan_page(cursor.as_deref(), self.config.scan_group)
                .await?;

            let stale: Vec<Post> = posts
                .into_iter()
                .map(|(_, post)| post)
                .filter(|post| is_outdated(post, now))
                .collect();

            for batch in stale.chunks(self.config.info_batch.max(1)) {
                refreshed += self.refresh_batch(batch).await?;
            }

            groups += 1;
            if groups % self.config.commit_every.max(1) == 0 {
                self.repo.store().flush().await?;
            }

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        self.repo.store().flush().await?;
        if refreshed > 0 {
            info!(refreshed, groups, "Refreshed outdated posts");
        }
        Ok(refreshed)
    }

    async fn refresh_batch(&self, batch: &[Post]) -> Result<usize> {
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
        let ids: Vec<String> = batch.iter().map(|p| p.id.clone()).collect();
        let Some(fresh) = self.retry.fetch("info", || self.forum.info(&ids)).await else {
            return Ok(0);
        };

        let fresh: HashMap<&str, &Post> = fresh.iter().map(|p| (p.id.as_str(), p)).collect();
        let updated: Vec<Post> = batch
            .iter()
            .filter_map(|old| fresh.get(old.id.as_str()).map(|new| old.update(new)))
            .collect();

        self.repo
            .posts
            .put_many(updated.iter().map(|p| (p.id.as_str(), p)))
            .await?;
        Ok(updated.len())
    }

    /// Delete posts older than the prune age that are also low value.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.config.prune_after;
        let mut cursor: Option<String> = None;
        let mut pruned = 0usize;

        loop {
            let (posts, next) = self
                .repo
                .posts
                .scan_page(cursor.as_deref(), self.config.scan_group)
                .await?;

            let doomed: Vec<String> = posts
                .into_iter()
                .filter(|(_, post)| post.created() < cutoff && is_low_value(post))
                .map(|(id, _)| id)
                .collect();
            if !doomed.is_empty() {
                pruned += self.repo.posts.delete(&doomed).await? as usize;
            }

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(pruned, "Pruned low-value posts");
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_engagement_keeps_a_post() {
        let base = Post {
            author: "a".into(),
            created_utc: 0,
            id: "x".into(),
            is_self: false,
            num_comments: 2,
            over_18: false,
            permalink: String::new(),
            score: 1,
            selftext: None,
            title: String::new(),
            url: String::new(),
            fetched: DateTime::<Utc>::UNIX_EPOCH,
        };
        assert!(is_low_value(&base));
        assert!(!is_low_value(&Post { num_comments: 3, ..base.clone() }));
        assert!(!is_low_value(&Post { score: 2, ..base.clone() }));
        assert!(!is_low_value(&Post { is_self: true, ..base }));
    }
}
