use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::OptionalUser,
    errors::ApiResult,
    images::Image,
    pagination::{Pagination, PaginationMeta},
    state::AppState,
    validation::non_empty,
};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl FeedQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_raw(self.page.as_deref(), self.limit.as_deref())
    }

    pub fn search(&self) -> Option<String> {
        non_empty(self.search.clone())
    }
}

/// Published images, newest first; bookmark state is relative to the caller
pub async fn feed(
    State(state): State<AppState>,
    OptionalUser { user, .. }: OptionalUser,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Value>> {
    let pagination = query.pagination();
    let search = query.search();

    let (images, total) = Image::feed(
        &state.db,
        user.as_ref().map(|u| u.id),
        search.as_deref(),
        pagination,
    )
    .await?;

    Ok(Json(json!({
        "images": images,
        "pagination": PaginationMeta::new(pagination, total),
    })))
}
