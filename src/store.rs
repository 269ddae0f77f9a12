use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::config::Config;
use crate::models::Category;

/// Option key holding the id of the category auto-assigned to uncategorised posts.
pub const DEFAULT_CATEGORY_KEY: &str = "default_category";

/// Read a setting from the settings table.
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("reading setting")?;
    Ok(row.map(|(v,)| v))
}

/// Upsert a setting in the settings table.
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .context("upserting setting")?;
    Ok(())
}

/// Delete a setting. Returns whether a row was removed.
pub async fn delete_setting(pool: &SqlitePool, key: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await
        .context("deleting setting")?;
    Ok(result.rows_affected() > 0)
}

/// Insert a category by name, or return the existing one with the same slug.
pub async fn upsert_category(pool: &SqlitePool, name: &str) -> Result<i64> {
    let slug = slug_from_name(name);

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM categories WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(pool)
        .await
        .context("checking for existing category")?;

    if let Some((id,)) = existing {
        sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(name.trim())
            .bind(id)
            .execute(pool)
            .await
            .context("updating category")?;
        debug!(name = %name, id, "updated category");
        return Ok(id);
    }

    let id = sqlx::query("INSERT INTO categories (name, slug) VALUES (?, ?)")
        .bind(name.trim())
        .bind(&slug)
        .execute(pool)
        .await
        .context("inserting category")?
        .last_insert_rowid();

    debug!(name = %name, id, "created category");
    Ok(id)
}

/// Seed the default category and configured categories.
/// Categories missing from config are left in place since posts may reference them.
pub async fn sync_config_to_db(pool: &SqlitePool, config: &Config) -> Result<()> {
    let default_id = upsert_category(pool, &config.content.default_category).await?;
    set_setting(pool, DEFAULT_CATEGORY_KEY, &default_id.to_string()).await?;

    for name in &config.content.categories {
        upsert_category(pool, name).await?;
    }

    Ok(())
}

/// Id of the default category, if one has been seeded.
pub async fn get_default_category(pool: &SqlitePool) -> Result<Option<i64>> {
    let value = get_setting(pool, DEFAULT_CATEGORY_KEY).await?;
    value
        .map(|v| v.parse::<i64>().context("parsing default category id"))
        .transpose()
}

/// All categories ordered by name, with the number of posts in each.
pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT c.id, c.name, c.slug, COUNT(pc.post_id) AS count
         FROM categories c
         LEFT JOIN post_categories pc ON pc.category_id = c.id
         GROUP BY c.id, c.name, c.slug
         ORDER BY c.name ASC",
    )
    .fetch_all(pool)
    .await
    .context("listing categories")?;
    Ok(categories)
}

/// Insert a post and its category links in one transaction.
/// Returns the new post id.
pub async fn insert_post(pool: &SqlitePool, title: &str, content: &str, category_ids: &[i64]) -> Result<i64> {
    let mut tx = pool.begin().await.context("starting post transaction")?;

    let slug = unique_post_slug(&mut tx, title).await?;
    let id = sqlx::query("INSERT INTO posts (title, slug, content, status, created_at) VALUES (?, ?, ?, 'publish', ?)")
        .bind(title)
        .bind(&slug)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("inserting post")?
        .last_insert_rowid();

    for category_id in category_ids {
        link_category(&mut tx, id, *category_id).await?;
    }

    tx.commit().await.context("committing post")?;

    debug!(id, slug = %slug, "inserted post");
    Ok(id)
}

/// Replace a post's categories with exactly `category_ids`.
pub async fn set_post_categories(pool: &SqlitePool, post_id: i64, category_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await.context("starting category transaction")?;

    sqlx::query("DELETE FROM post_categories WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("clearing post categories")?;

    for category_id in category_ids {
        link_category(&mut tx, post_id, *category_id).await?;
    }

    tx.commit().await.context("committing post categories")?;
    Ok(())
}

pub async fn remove_post_category(pool: &SqlitePool, post_id: i64, category_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM post_categories WHERE post_id = ? AND category_id = ?")
        .bind(post_id)
        .bind(category_id)
        .execute(pool)
        .await
        .context("removing post category")?;
    Ok(())
}

#[cfg(test)]
pub async fn get_post_category_ids(pool: &SqlitePool, post_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT category_id FROM post_categories WHERE post_id = ? ORDER BY category_id")
            .bind(post_id)
            .fetch_all(pool)
            .await
            .context("reading post categories")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn get_post_slug(pool: &SqlitePool, post_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT slug FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("reading post slug")?;
    Ok(row.map(|(s,)| s))
}

async fn link_category(tx: &mut Transaction<'_, Sqlite>, post_id: i64, category_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(category_id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("assigning category {category_id} to post {post_id}"))?;
    Ok(())
}

/// Slug from the title, suffixed `-2`, `-3`, ... until unused.
async fn unique_post_slug(tx: &mut Transaction<'_, Sqlite>, title: &str) -> Result<String> {
    let base = match slug_from_name(title) {
        s if s.is_empty() => "post".to_string(),
        s => s,
    };

    let mut candidate = base.clone();
    let mut n = 1;
    loop {
        let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE slug = ?")
            .bind(&candidate)
            .fetch_optional(&mut **tx)
            .await
            .context("checking post slug")?;
        if taken.is_none() {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{base}-{n}");
    }
}

pub fn slug_from_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
