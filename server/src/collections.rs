use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::images::{ImageCard, ImageCardRow, CARD_COLUMNS, IMAGE_COLUMNS};
use crate::pagination::Pagination;
use crate::validation::{Issue, Issues};

pub const NAME_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at_utc: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub collection: Collection,
    pub image_count: i64,
}

/// An image inside a collection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionImage {
    #[serde(flatten)]
    pub card: ImageCard,
    pub collection_image_id: Uuid,
    pub added_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CollectionImageRow {
    #[sqlx(flatten)]
    card: ImageCardRow,
    collection_image_id: Uuid,
    added_at: DateTime<Utc>,
}

/// Name and description as submitted for create and update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFields {
    pub name: String,
    pub description: Option<String>,
}

impl CollectionInput {
    pub fn validate(self) -> Result<CollectionFields, Vec<Issue>> {
        let mut issues = Issues::new();

        let name = self.name.trim().to_string();
        issues.check_length(
            "name",
            &name,
            1,
            NAME_MAX_CHARS,
            "Name is required",
            "Name is too long",
        );

        let description = crate::validation::non_empty(self.description);
        if let Some(description) = &description {
            if description.chars().count() > DESCRIPTION_MAX_CHARS {
                issues.push("description", "Description is too long");
            }
        }

        issues.finish(CollectionFields { name, description })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// Missing, or owned by someone else
    #[error("Collection not found")]
    NotFound,
    #[error("Image not found")]
    ImageNotFound,
    #[error("Image already in collection")]
    AlreadyInCollection,
    #[error("Image not in collection")]
    NotInCollection,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

const COLLECTION_COLUMNS: &str = "c.id, c.user_id, c.name, c.description, c.created_at_utc, c.updated_at_utc";

impl Collection {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        fields: &CollectionFields,
    ) -> Result<Collection, CollectionError> {
        let collection = sqlx::query_as::<_, Collection>(&format!(
            r#"
            INSERT INTO collections AS c (user_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING {COLLECTION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .fetch_one(pool)
        .await?;

        info!(collection_id = %collection.id, %user_id, "Collection created");
        Ok(collection)
    }

    pub async fn get_owned(
        pool: &PgPool,
        collection_id: Uuid,
        owner: Uuid,
    ) -> Result<Collection, CollectionError> {
        sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections c WHERE c.id = $1 AND c.user_id = $2"
        ))
        .bind(collection_id)
        .bind(owner)
        .fetch_optional(pool)
        .await?
        .ok_or(CollectionError::NotFound)
    }

    /// The user's collections, most recently touched first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<CollectionSummary>, CollectionError> {
        let collections = sqlx::query_as::<_, CollectionSummary>(&format!(
            r#"
            SELECT {COLLECTION_COLUMNS},
                   (SELECT COUNT(*) FROM collection_images ci WHERE ci.collection_id = c.id) AS image_count
            FROM collections c
            WHERE c.user_id = $1
            ORDER BY c.updated_at_utc DESC, c.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(collections)
    }

    pub async fn update(
        pool: &PgPool,
        collection_id: Uuid,
        owner: Uuid,
        fields: &CollectionFields,
    ) -> Result<Collection, CollectionError> {
        let collection = sqlx::query_as::<_, Collection>(&format!(
            r#"
            UPDATE collections AS c
            SET name = $3, description = $4, updated_at_utc = NOW()
            WHERE c.id = $1 AND c.user_id = $2
            RETURNING {COLLECTION_COLUMNS}
            "#
        ))
        .bind(collection_id)
        .bind(owner)
        .bind(&fields.name)
        .bind(&fields.description)
        .fetch_optional(pool)
        .await?
        .ok_or(CollectionError::NotFound)?;

        info!(%collection_id, "Collection updated");
        Ok(collection)
    }

    /// Delete a collection; its entries go with it
    pub async fn delete(
        pool: &PgPool,
        collection_id: Uuid,
        owner: Uuid,
    ) -> Result<(), CollectionError> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1 AND user_id = $2")
            .bind(collection_id)
            .bind(owner)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CollectionError::NotFound);
        }

        info!(%collection_id, "Collection deleted");
        Ok(())
    }

    /// Entries of an owned collection, most recently added first
    pub async fn images(
        pool: &PgPool,
        collection_id: Uuid,
        owner: Uuid,
        pagination: Pagination,
    ) -> Result<(Vec<CollectionImage>, i64), CollectionError> {
        Self::get_owned(pool, collection_id, owner).await?;

        let rows = sqlx::query_as::<_, CollectionImageRow>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}, {CARD_COLUMNS},
                   ci.id AS collection_image_id, ci.added_at_utc AS added_at
            FROM collection_images ci
            JOIN images i ON i.id = ci.image_id
            JOIN users u ON u.id = i.user_id
            WHERE ci.collection_id = $2
            ORDER BY ci.added_at_utc DESC, ci.id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(owner)
        .bind(collection_id)
        .bind(pagination.limit)
        .bind(pagination.skip())
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM collection_images WHERE collection_id = $1",
        )
        .bind(collection_id)
        .fetch_one(pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| CollectionImage {
                card: ImageCard::from(row.card),
                collection_image_id: row.collection_image_id,
                added_at: row.added_at,
            })
            .collect();

        Ok((items, total))
    }

    /// Add an image to an owned collection and bump the collection's `updated_at`
    pub async fn add_image(
        pool: &PgPool,
        collection_id: Uuid,
        owner: Uuid,
        image_id: Uuid,
    ) -> Result<Uuid, CollectionError> {
        Self::get_owned(pool, collection_id, owner).await?;

        let image_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM images WHERE id = $1)")
                .bind(image_id)
                .fetch_one(pool)
                .await?;
        if !image_exists {
            return Err(CollectionError::ImageNotFound);
        }

        let mut tx = pool.begin().await?;

        let entry_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO collection_images (collection_id, image_id)
            VALUES ($1, $2)
            ON CONFLICT (collection_id, image_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(collection_id)
        .bind(image_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CollectionError::AlreadyInCollection)?;

        sqlx::query("UPDATE collections SET updated_at_utc = NOW() WHERE id = $1")
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(%collection_id, %image_id, "Image added to collection");
        Ok(entry_id)
    }

    pub async fn remove_image(
        pool: &PgPool,
        collection_id: Uuid,
        owner: Uuid,
        image_id: Uuid,
    ) -> Result<(), CollectionError> {
        Self::get_owned(pool, collection_id, owner).await?;

        let result = sqlx::query(
            "DELETE FROM collection_images WHERE collection_id = $1 AND image_id = $2",
        )
        .bind(collection_id)
        .bind(image_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CollectionError::NotInCollection);
        }

        info!(%collection_id, %image_id, "Image removed from collection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_required_and_bounded() {
        let empty = CollectionInput {
            name: "   ".into(),
            description: None,
        };
        assert_eq!(
            empty.validate().unwrap_err(),
            vec![Issue::new("name", "Name is required")]
        );

        let long = CollectionInput {
            name: "n".repeat(51),
            description: Some("d".repeat(501)),
        };
        assert_eq!(
            long.validate().unwrap_err(),
            vec![
                Issue::new("name", "Name is too long"),
                Issue::new("description", "Description is too long"),
            ]
        );
    }

    #[test]
    fn valid_input_is_trimmed() {
        let fields = CollectionInput {
            name: "  Landscapes ".into(),
            description: Some("".into()),
        }
        .validate()
        .unwrap();

        assert_eq!(
            fields,
            CollectionFields {
                name: "Landscapes".into(),
                description: None,
            }
        );
    }
}
