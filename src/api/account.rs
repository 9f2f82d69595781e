use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::current_user;
use super::types::{FlashCategory, avatar_url};
use super::{ApiError, ApiResponse, AppState};
use crate::forms::{FieldErrors, PictureUpload, UpdateAccountForm};

#[derive(Debug, Serialize)]
pub struct AccountDto {
    pub username: String,
    pub email: String,
    pub image_url: String,
}

/// GET /account/
pub async fn show_account(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    let user = current_user(&state, &session).await?;

    Ok(Json(ApiResponse::success(AccountDto {
        username: user.username,
        email: user.email,
        image_url: avatar_url(&user.image_file),
    })))
}

/// POST /account/
/// Multipart update of username, email, and optionally the avatar. A new
/// avatar is thumbnailed and the previous file removed before the row
/// changes.
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    session: Session,
    multipart: Multipart,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    let user = current_user(&state, &session).await?;

    let form = read_account_form(multipart).await?;

    let errors = form.validate(state.store(), &user).await?;
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let image_file = match form.picture {
        Some(picture) => Some(
            state
                .avatars()
                .save_avatar(picture.bytes, &picture.filename, &user.image_file)
                .await?,
        ),
        None => None,
    };

    let updated = state
        .store()
        .update_user_account(user.id, &form.username, &form.email, image_file.as_deref())
        .await?;

    tracing::info!(user_id = updated.id, "Account details updated");

    Ok(Json(
        ApiResponse::success(AccountDto {
            username: updated.username,
            email: updated.email,
            image_url: avatar_url(&updated.image_file),
        })
        .with_flash(FlashCategory::Success, "Account details updated")
        .with_redirect("/account/"),
    ))
}

async fn read_account_form(mut multipart: Multipart) -> Result<UpdateAccountForm, ApiError> {
    let mut form = UpdateAccountForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed_multipart)? {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };

        match name.as_str() {
            "username" => form.username = field.text().await.map_err(malformed_multipart)?,
            "email" => form.email = field.text().await.map_err(malformed_multipart)?,
            "picture" => {
                let filename = field.file_name().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(malformed_multipart)?;

                // Browsers submit an empty picture part when no file was
                // chosen; that is not an upload.
                if let Some(filename) = filename.filter(|f| !f.is_empty())
                    && !bytes.is_empty()
                {
                    form.picture = Some(PictureUpload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn malformed_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::ValidationFailed(FieldErrors::single(
        "form",
        format!("Malformed multipart payload: {err}"),
    ))
}
