use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::types::avatar_url;
use super::{ApiError, ApiResponse, AppState};
use crate::db::User;

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub image_url: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            image_url: avatar_url(&user.image_file),
        }
    }
}

/// GET/POST /users/
/// Member directory, visible to signed-in users only.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let users = state.store().list_users().await?;
    let rows = users.iter().map(UserDto::from).collect();

    Ok(Json(ApiResponse::success(rows)))
}
