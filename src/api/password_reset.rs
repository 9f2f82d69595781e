use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::is_authenticated;
use super::types::FlashCategory;
use super::{ApiError, ApiResponse, AppState};
use crate::db::User;
use crate::forms::{RequestResetForm, ResetPasswordForm};

/// GET /user/request_reset_password/
pub async fn request_reset_form() -> Json<ApiResponse<()>> {
    Json(ApiResponse::ok())
}

/// POST /user/request_reset_password/
pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    Json(form): Json<RequestResetForm>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let errors = form.validate(state.store()).await?;
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    // Validation already proved the address is registered.
    let user = state
        .store()
        .find_user_by_email(&form.email)
        .await?
        .ok_or_else(|| ApiError::internal("Account vanished between validation and lookup"))?;

    let token = state.reset_tokens().issue(user.id, &user.username);
    let public_url = state.config().read().await.mail.public_url.clone();
    let reset_url = format!("{public_url}/user/reset_password/{token}");

    state
        .mailer()
        .send_password_reset(&user.email, &reset_url)
        .await?;

    tracing::info!(user_id = user.id, "Password reset link issued");

    Ok(Json(
        ApiResponse::ok()
            .with_flash(
                FlashCategory::Success,
                "Password reset email sent, please follow the link inside",
            )
            .with_redirect("/"),
    ))
}

/// GET /user/reset_password/{token}
/// The token is checked on the form view too, so a dead link fails before
/// the user types anything.
pub async fn reset_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if is_authenticated(&session).await? {
        return Ok(Json(ApiResponse::ok().with_redirect("/")));
    }

    resolve_token(&state, &token).await?;

    Ok(Json(ApiResponse::ok()))
}

/// POST /user/reset_password/{token}
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(token): Path<String>,
    Json(form): Json<ResetPasswordForm>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if is_authenticated(&session).await? {
        return Ok(Json(ApiResponse::ok().with_redirect("/")));
    }

    let user = resolve_token(&state, &token).await?;

    let errors = form.validate();
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let security = state.config().read().await.security.clone();
    state
        .store()
        .update_user_password(user.id, &form.password, &security)
        .await?;

    tracing::info!(user_id = user.id, "Password reset completed");

    Ok(Json(
        ApiResponse::ok()
            .with_flash(FlashCategory::Success, "Password updated successfully")
            .with_redirect("/"),
    ))
}

/// Verify signature and age, then resolve the embedded user id. Tokens are
/// not single-use: any token verifies until it expires.
async fn resolve_token(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = state.reset_tokens().verify(token)?;

    state
        .store()
        .find_user_by_id(claims.user_id)
        .await?
        .ok_or(ApiError::InvalidToken)
}
