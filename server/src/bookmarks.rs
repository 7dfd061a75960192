use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::images::{ImageCard, ImageCardRow, CARD_COLUMNS, IMAGE_COLUMNS};
use crate::pagination::Pagination;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at_utc: DateTime<Utc>,
}

/// A bookmarked image as returned to its bookmarker
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkedImage {
    #[serde(flatten)]
    pub card: ImageCard,
    pub bookmark_id: Uuid,
    pub bookmarked_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct BookmarkedImageRow {
    #[sqlx(flatten)]
    card: ImageCardRow,
    bookmark_id: Uuid,
    bookmarked_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    #[error("Image not found")]
    ImageNotFound,
    #[error("Image already bookmarked")]
    AlreadyBookmarked,
    #[error("Bookmark not found")]
    NotBookmarked,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Bookmark {
    /// Bookmark any existing image, published or not
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        image_id: Uuid,
    ) -> Result<Bookmark, BookmarkError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM images WHERE id = $1)")
            .bind(image_id)
            .fetch_one(pool)
            .await?;
        if !exists {
            return Err(BookmarkError::ImageNotFound);
        }

        let bookmark = sqlx::query_as::<_, Bookmark>(
            r#"
            INSERT INTO bookmarks (user_id, image_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, image_id) DO NOTHING
            RETURNING id, user_id, image_id, created_at_utc
            "#,
        )
        .bind(user_id)
        .bind(image_id)
        .fetch_optional(pool)
        .await?
        .ok_or(BookmarkError::AlreadyBookmarked)?;

        info!(%user_id, %image_id, "Bookmark created");
        Ok(bookmark)
    }

    pub async fn remove(pool: &PgPool, user_id: Uuid, image_id: Uuid) -> Result<(), BookmarkError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND image_id = $2")
            .bind(user_id)
            .bind(image_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BookmarkError::NotBookmarked);
        }

        info!(%user_id, %image_id, "Bookmark removed");
        Ok(())
    }

    /// The user's bookmarks, most recently bookmarked first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        pagination: Pagination,
    ) -> crate::Result<(Vec<BookmarkedImage>, i64)> {
        let rows = sqlx::query_as::<_, BookmarkedImageRow>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}, {CARD_COLUMNS},
                   b.id AS bookmark_id, b.created_at_utc AS bookmarked_at
            FROM bookmarks b
            JOIN images i ON i.id = b.image_id
            JOIN users u ON u.id = i.user_id
            WHERE b.user_id = $1
            ORDER BY b.created_at_utc DESC, b.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(pagination.limit)
        .bind(pagination.skip())
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        let items = rows
            .into_iter()
            .map(|row| BookmarkedImage {
                card: ImageCard::from(row.card),
                bookmark_id: row.bookmark_id,
                bookmarked_at: row.bookmarked_at,
            })
            .collect();

        Ok((items, total))
    }
}
