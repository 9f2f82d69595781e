use axum::{
    Json,
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tower_sessions::{Expiry, Session};

use super::types::FlashCategory;
use super::{ApiError, ApiResponse, AppState};
use crate::constants::session::USER_ID_KEY;
use crate::db::{CredentialCheck, User};
use crate::forms::{LoginForm, RegistrationForm};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginQuery {
    /// Path to return to after logging in. Filled in by the 401 response
    /// of a members-only route.
    pub next: Option<String>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Session guard for members-only routes. Rejects with the login redirect
/// when no user id is in the session.
pub async fn require_session(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match session.get::<i32>(USER_ID_KEY).await? {
        Some(user_id) => {
            tracing::Span::current().record("user_id", user_id);
            Ok(next.run(request).await)
        }
        None => {
            let next_path = request
                .uri()
                .path_and_query()
                .map_or_else(|| request.uri().path().to_string(), ToString::to_string);

            Err(ApiError::Unauthenticated { next: next_path })
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /register/
pub async fn register_form(session: Session) -> Result<Json<ApiResponse<()>>, ApiError> {
    if is_authenticated(&session).await? {
        return Ok(Json(ApiResponse::ok().with_redirect("/")));
    }

    Ok(Json(ApiResponse::ok()))
}

/// POST /register/
/// Create an account and send the caller on to the login screen.
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(form): Json<RegistrationForm>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if is_authenticated(&session).await? {
        return Ok(Json(ApiResponse::ok().with_redirect("/")));
    }

    let errors = form.validate(state.store()).await?;
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let security = state.config().read().await.security.clone();
    let user = state
        .store()
        .create_user(&form.username, &form.email, &form.password, &security)
        .await?;

    tracing::info!(username = %user.username, "New account registered");

    Ok(Json(
        ApiResponse::ok()
            .with_flash(
                FlashCategory::Success,
                format!("Account {} registered successfully", user.username),
            )
            .with_redirect("/login/"),
    ))
}

/// GET /login/
pub async fn login_form(session: Session) -> Result<Json<ApiResponse<()>>, ApiError> {
    if is_authenticated(&session).await? {
        return Ok(Json(ApiResponse::ok().with_redirect("/")));
    }

    Ok(Json(ApiResponse::ok()))
}

/// POST /login/
/// Verify credentials and open a session. Unknown address and wrong
/// password produce different danger flashes.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if is_authenticated(&session).await? {
        return Ok(Json(ApiResponse::ok().with_redirect("/")));
    }

    let errors = form.validate();
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let user = match state
        .store()
        .check_credentials(&form.email, &form.password)
        .await?
    {
        CredentialCheck::Verified(user) => user,
        CredentialCheck::WrongPassword => {
            return Err(ApiError::InvalidCredentials(
                "Incorrect password".to_string(),
            ));
        }
        CredentialCheck::UnknownEmail => {
            return Err(ApiError::InvalidCredentials(
                "No account found for this email, please check the address".to_string(),
            ));
        }
    };

    session.insert(USER_ID_KEY, user.id).await?;

    if form.remember {
        let remember_days = state.config().read().await.security.remember_me_days;
        session.set_expiry(Some(Expiry::AtDateTime(
            OffsetDateTime::now_utc() + Duration::days(remember_days),
        )));
    }

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(
        ApiResponse::ok()
            .with_flash(
                FlashCategory::Success,
                format!("Logged in as {}", user.email),
            )
            .with_redirect(query.next.unwrap_or_else(|| "/".to_string())),
    ))
}

/// GET /logout/
pub async fn logout(session: Session) -> Result<Json<ApiResponse<()>>, ApiError> {
    session.flush().await?;

    Ok(Json(ApiResponse::ok().with_redirect("/")))
}

/// GET /change_account/
/// Sign the caller out and send them to the login screen to switch users.
pub async fn change_account(session: Session) -> Result<Json<ApiResponse<()>>, ApiError> {
    session.flush().await?;

    Ok(Json(ApiResponse::ok().with_redirect("/login/")))
}

// ============================================================================
// Helpers
// ============================================================================

pub(super) async fn is_authenticated(session: &Session) -> Result<bool, ApiError> {
    Ok(session.get::<i32>(USER_ID_KEY).await?.is_some())
}

/// Resolve the session to its user row. Routes behind [`require_session`]
/// call this; a session pointing at a vanished user is treated as signed
/// out.
pub(super) async fn current_user(state: &AppState, session: &Session) -> Result<User, ApiError> {
    let user_id: i32 = session.get(USER_ID_KEY).await?.ok_or_else(not_signed_in)?;

    state
        .store()
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(not_signed_in)
}

fn not_signed_in() -> ApiError {
    ApiError::Unauthenticated {
        next: "/".to_string(),
    }
}
