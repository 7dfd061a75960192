use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::pagination::Pagination;
use crate::validation::{Issue, Issues};

/// A generated image owned by a signed in user
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub color_scheme: Option<String>,
    pub orientation: String,
    pub guidance_scale: f64,
    pub seed: Option<i64>,
    pub title: Option<String>,
    pub image_url: String,
    pub storage_key: String,
    pub published: bool,
    #[serde(rename = "createdAt")]
    pub created_at_utc: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at_utc: DateTime<Utc>,
}

impl Image {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.prompt)
    }
}

/// Column list for `images` aliased as `i`
pub(crate) const IMAGE_COLUMNS: &str = "i.id, i.user_id, i.prompt, i.negative_prompt, \
     i.color_scheme, i.orientation, i.guidance_scale, i.seed, i.title, i.image_url, \
     i.storage_key, i.published, i.created_at_utc, i.updated_at_utc";

/// Columns shared by every listing that shows an image with its owner
///
/// Expects `images i JOIN users u` and the viewer's id bound as `$1`.
pub(crate) const CARD_COLUMNS: &str = "u.username AS owner_username, \
     u.avatar_url AS owner_avatar_url, \
     (SELECT COUNT(*) FROM bookmarks bc WHERE bc.image_id = i.id) AS bookmark_count, \
     EXISTS (SELECT 1 FROM bookmarks bv WHERE bv.image_id = i.id AND bv.user_id = $1) AS is_bookmarked";

#[derive(Debug, Clone)]
pub struct NewImage {
    pub user_id: Uuid,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub color_scheme: Option<String>,
    pub orientation: String,
    pub guidance_scale: f64,
    pub seed: Option<i64>,
    pub image_url: String,
    pub storage_key: String,
    /// Defaults to now; migrated guest images keep their original timestamp
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: Uuid,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

/// An image as shown in the feed and other listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCard {
    #[serde(flatten)]
    pub image: Image,
    pub owner: Owner,
    pub bookmark_count: i64,
    pub is_bookmarked: bool,
}

#[derive(Debug, FromRow)]
pub(crate) struct ImageCardRow {
    #[sqlx(flatten)]
    image: Image,
    owner_username: Option<String>,
    owner_avatar_url: Option<String>,
    bookmark_count: i64,
    is_bookmarked: bool,
}

impl From<ImageCardRow> for ImageCard {
    fn from(row: ImageCardRow) -> Self {
        Self {
            owner: Owner {
                id: row.image.user_id,
                username: row.owner_username,
                avatar_url: row.owner_avatar_url,
            },
            image: row.image,
            bookmark_count: row.bookmark_count,
            is_bookmarked: row.is_bookmarked,
        }
    }
}

/// One of the caller's own images with its bookmark count
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryImage {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub image: Image,
    pub bookmark_count: i64,
}

pub const TITLE_MAX_CHARS: usize = 100;

/// Optional title given when publishing; blank means keep the current one
pub fn validate_title(title: Option<String>) -> Result<Option<String>, Vec<Issue>> {
    let title = crate::validation::non_empty(title);
    let mut issues = Issues::new();
    if let Some(title) = &title {
        issues.check_length("title", title, 1, TITLE_MAX_CHARS, "Title is required", "Title is too long");
    }
    issues.finish(title)
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Image {
    pub async fn insert(conn: &mut PgConnection, new: &NewImage) -> crate::Result<Image> {
        let image = sqlx::query_as::<_, Image>(&format!(
            r#"
            INSERT INTO images AS i (user_id, prompt, negative_prompt, color_scheme, orientation,
                                     guidance_scale, seed, image_url, storage_key,
                                     created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, NOW()), COALESCE($10, NOW()))
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(&new.prompt)
        .bind(&new.negative_prompt)
        .bind(&new.color_scheme)
        .bind(&new.orientation)
        .bind(new.guidance_scale)
        .bind(new.seed)
        .bind(&new.image_url)
        .bind(&new.storage_key)
        .bind(new.created_at)
        .fetch_one(conn)
        .await?;

        info!(image_id = %image.id, user_id = %image.user_id, "Image created");

        Ok(image)
    }

    /// Insert unless an image with the same storage key exists
    pub async fn insert_if_absent(
        conn: &mut PgConnection,
        new: &NewImage,
    ) -> crate::Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            r#"
            INSERT INTO images AS i (user_id, prompt, negative_prompt, color_scheme, orientation,
                                     guidance_scale, seed, image_url, storage_key,
                                     created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, NOW()), COALESCE($10, NOW()))
            ON CONFLICT (storage_key) DO NOTHING
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(&new.prompt)
        .bind(&new.negative_prompt)
        .bind(&new.color_scheme)
        .bind(&new.orientation)
        .bind(new.guidance_scale)
        .bind(new.seed)
        .bind(&new.image_url)
        .bind(&new.storage_key)
        .bind(new.created_at)
        .fetch_optional(conn)
        .await?;

        Ok(image)
    }

    pub async fn get_by_id(pool: &PgPool, image_id: Uuid) -> crate::Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images i WHERE i.id = $1"
        ))
        .bind(image_id)
        .fetch_optional(pool)
        .await?;

        Ok(image)
    }

    pub async fn get_by_storage_key(
        conn: &mut PgConnection,
        storage_key: &str,
    ) -> crate::Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images i WHERE i.storage_key = $1"
        ))
        .bind(storage_key)
        .fetch_optional(conn)
        .await?;

        Ok(image)
    }

    /// Load an image only if `owner` owns it
    pub async fn get_owned(
        pool: &PgPool,
        image_id: Uuid,
        owner: Uuid,
    ) -> crate::Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images i WHERE i.id = $1 AND i.user_id = $2"
        ))
        .bind(image_id)
        .bind(owner)
        .fetch_optional(pool)
        .await?;

        Ok(image)
    }

    /// The owner's images, newest first
    pub async fn history(
        pool: &PgPool,
        owner: Uuid,
        pagination: Pagination,
    ) -> crate::Result<(Vec<HistoryImage>, i64)> {
        let images = sqlx::query_as::<_, HistoryImage>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS},
                   (SELECT COUNT(*) FROM bookmarks b WHERE b.image_id = i.id) AS bookmark_count
            FROM images i
            WHERE i.user_id = $1
            ORDER BY i.created_at_utc DESC, i.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner)
        .bind(pagination.limit)
        .bind(pagination.skip())
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE user_id = $1")
            .bind(owner)
            .fetch_one(pool)
            .await?;

        Ok((images, total))
    }

    /// Mark an owned image as published, optionally setting its title
    pub async fn publish(
        pool: &PgPool,
        image_id: Uuid,
        owner: Uuid,
        title: Option<&str>,
    ) -> crate::Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            r#"
            UPDATE images AS i
            SET published = TRUE, title = COALESCE($3, i.title), updated_at_utc = NOW()
            WHERE i.id = $1 AND i.user_id = $2
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(image_id)
        .bind(owner)
        .bind(title)
        .fetch_optional(pool)
        .await?;

        if let Some(image) = &image {
            info!(image_id = %image.id, "Image published");
        }

        Ok(image)
    }

    pub async fn delete(pool: &PgPool, image_id: Uuid, owner: Uuid) -> crate::Result<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1 AND user_id = $2")
            .bind(image_id)
            .bind(owner)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Published images, newest first, optionally filtered by prompt or title
    pub async fn feed(
        pool: &PgPool,
        viewer: Option<Uuid>,
        search: Option<&str>,
        pagination: Pagination,
    ) -> crate::Result<(Vec<ImageCard>, i64)> {
        let pattern = search.map(like_pattern);

        let rows = sqlx::query_as::<_, ImageCardRow>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}, {CARD_COLUMNS}
            FROM images i
            JOIN users u ON u.id = i.user_id
            WHERE i.published
              AND ($2::TEXT IS NULL OR i.prompt ILIKE $2 OR i.title ILIKE $2)
            ORDER BY i.created_at_utc DESC, i.id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(viewer)
        .bind(&pattern)
        .bind(pagination.limit)
        .bind(pagination.skip())
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM images i
            WHERE i.published
              AND ($1::TEXT IS NULL OR i.prompt ILIKE $1 OR i.title ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

        Ok((rows.into_iter().map(ImageCard::from).collect(), total))
    }
}
