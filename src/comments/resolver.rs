// Comment source resolver — find a post's comments across three tiers.
//
// Lookup order: the short-lived cache, the structured per-post store, then
// the legacy flat table (capped at LEGACY_COMMENT_LIMIT rows). The first
// tier that yields a non-empty list wins. Nothing is retried here; a tier
// that errors is logged and skipped.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::db::models::CommentRecord;
use crate::db::queries::LEGACY_COMMENT_LIMIT;
use crate::db::Database;

/// Key-value cache in front of the comment stores.
#[async_trait]
pub trait CommentCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<CommentRecord>>>;
    async fn put(&self, key: &str, comments: &[CommentRecord]) -> Result<()>;
}

#[async_trait]
impl CommentCache for TtlCache<Vec<CommentRecord>> {
    async fn get(&self, key: &str) -> Result<Option<Vec<CommentRecord>>> {
        Ok(TtlCache::get(self, key))
    }

    async fn put(&self, key: &str, comments: &[CommentRecord]) -> Result<()> {
        self.insert(key, comments.to_vec());
        Ok(())
    }
}

/// Cache key for a post's comments.
pub fn cache_key(post_id: &str) -> String {
    format!("comments:{post_id}")
}

pub struct CommentResolver {
    cache: Arc<dyn CommentCache>,
    db: Arc<dyn Database>,
}

impl CommentResolver {
    pub fn new(cache: Arc<dyn CommentCache>, db: Arc<dyn Database>) -> Self {
        Self { cache, db }
    }

    /// Resolve a post's comments. Returns an empty list when no tier has any.
    pub async fn resolve(&self, post_id: &str) -> Vec<CommentRecord> {
        let key = cache_key(post_id);

        match self.cache.get(&key).await {
            Ok(Some(comments)) if !comments.is_empty() => {
                debug!(post_id, count = comments.len(), "Comments served from cache");
                return comments;
            }
            Ok(_) => {}
            Err(e) => warn!(post_id, error = %e, "Comment cache lookup failed"),
        }

        let from_store = match self.db.get_post_comments(post_id).await {
            Ok(Some(comments)) if !comments.is_empty() => Some(comments),
            Ok(_) => None,
            Err(e) => {
                warn!(post_id, error = %e, "Structured comment store lookup failed");
                None
            }
        };

        let resolved = match from_store {
            Some(comments) => {
                debug!(post_id, count = comments.len(), "Comments loaded from structured store");
                comments
            }
            None => match self.db.get_legacy_comments(post_id, LEGACY_COMMENT_LIMIT).await {
                Ok(comments) => {
                    if !comments.is_empty() {
                        debug!(post_id, count = comments.len(), "Comments loaded from legacy table");
                    }
                    comments
                }
                Err(e) => {
                    warn!(post_id, error = %e, "Legacy comment lookup failed");
                    Vec::new()
                }
            },
        };

        if !resolved.is_empty() {
            if let Err(e) = self.cache.put(&key, &resolved).await {
                warn!(post_id, error = %e, "Failed to cache resolved comments");
            }
        }

        resolved
    }
}
