//! Collaborator contracts for the host content platform.
//!
//! The generation services never touch storage directly; they go through
//! these two traits. `SqliteStore` is the production implementation.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{Category, NewPost};
use crate::store;

/// Posts and their taxonomy.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a published post. With no categories the store assigns its default category.
    async fn create_post(&self, post: NewPost) -> Result<i64>;
    async fn set_categories(&self, post_id: i64, category_ids: &[i64]) -> Result<()>;
    async fn remove_category(&self, post_id: i64, category_id: i64) -> Result<()>;
    async fn permalink(&self, post_id: i64) -> Result<String>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn default_category(&self) -> Result<Option<i64>>;
}

/// Single global key-value namespace. No transactions.
#[async_trait]
pub trait OptionsStore: Send + Sync {
    async fn get_option(&self, key: &str) -> Result<Option<String>>;
    /// Returns `true` when the stored value changed, `false` when it was already equal.
    async fn set_option(&self, key: &str, value: &str) -> Result<bool>;
    /// Returns `true` when a value was removed.
    async fn delete_option(&self, key: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    site_url: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, site_url: &str) -> Self {
        Self {
            pool,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn create_post(&self, post: NewPost) -> Result<i64> {
        let categories = if post.categories.is_empty() {
            store::get_default_category(&self.pool).await?.into_iter().collect()
        } else {
            post.categories
        };
        store::insert_post(&self.pool, &post.title, &post.content, &categories).await
    }

    async fn set_categories(&self, post_id: i64, category_ids: &[i64]) -> Result<()> {
        store::set_post_categories(&self.pool, post_id, category_ids).await
    }

    async fn remove_category(&self, post_id: i64, category_id: i64) -> Result<()> {
        store::remove_post_category(&self.pool, post_id, category_id).await
    }

    async fn permalink(&self, post_id: i64) -> Result<String> {
        let slug = store::get_post_slug(&self.pool, post_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post {post_id} not found"))?;
        Ok(format!("{}/{slug}/", self.site_url))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        store::list_categories(&self.pool).await
    }

    async fn default_category(&self) -> Result<Option<i64>> {
        store::get_default_category(&self.pool).await
    }
}

#[async_trait]
impl OptionsStore for SqliteStore {
    async fn get_option(&self, key: &str) -> Result<Option<String>> {
        store::get_setting(&self.pool, key).await
    }

    async fn set_option(&self, key: &str, value: &str) -> Result<bool> {
        if store::get_setting(&self.pool, key).await?.as_deref() == Some(value) {
            return Ok(false);
        }
        store::set_setting(&self.pool, key, value).await?;
        Ok(true)
    }

    async fn delete_option(&self, key: &str) -> Result<bool> {
        store::delete_setting(&self.pool, key).await
    }
}
