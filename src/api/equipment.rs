use axum::{
    Json,
    extract::{Form, State},
};
use serde::Serialize;
use std::sync::Arc;

use super::types::FlashCategory;
use super::{ApiError, ApiResponse, AppState};
use crate::entities::posts;

#[derive(Debug, Serialize)]
pub struct EquipmentRowDto {
    pub id: i32,
    pub title: String,
    pub content: String,
}

impl From<posts::Model> for EquipmentRowDto {
    fn from(post: posts::Model) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
        }
    }
}

/// GET /equipment_spec/
pub async fn equipment_spec(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<EquipmentRowDto>>>, ApiError> {
    let rows = fetch_rows(&state).await?;

    Ok(Json(ApiResponse::success(rows)))
}

/// POST /equipment_spec/
/// Bulk edit over every post at once. Field names carry the target column
/// and row id as `title-3` / `content-3`; each field is applied as it is
/// read, so rows updated before a bad id stay updated.
pub async fn save_equipment_spec(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Json<ApiResponse<Vec<EquipmentRowDto>>>, ApiError> {
    for (key, value) in fields {
        let Some((name, id)) = key.split_once('-') else {
            continue;
        };

        let id: i32 = id
            .parse()
            .map_err(|_| ApiError::NotFound(format!("Post {id} does not exist")))?;

        if state.store().find_post(id).await?.is_none() {
            return Err(ApiError::post_not_found(id));
        }

        let column = match name {
            "title" => posts::Column::Title,
            "content" => posts::Column::Content,
            _ => continue,
        };

        state.store().update_post_field(id, column, &value).await?;
    }

    let rows = fetch_rows(&state).await?;

    Ok(Json(
        ApiResponse::success(rows).with_flash(FlashCategory::Info, "Saved"),
    ))
}

async fn fetch_rows(state: &AppState) -> Result<Vec<EquipmentRowDto>, ApiError> {
    let posts = state.store().list_posts().await?;

    Ok(posts.into_iter().map(EquipmentRowDto::from).collect())
}
