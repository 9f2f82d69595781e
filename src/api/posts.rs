use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::current_user;
use super::types::{AuthorDto, FlashCategory, PostDto, PostPageDto};
use super::{ApiError, ApiResponse, AppState};
use crate::constants::pagination::PER_PAGE;
use crate::forms::PostForm;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AboutDto {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserPostsDto {
    pub user: AuthorDto,
    pub posts: PostPageDto,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
/// Public front page: newest posts first, ten per page.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PostPageDto>>, ApiError> {
    let page = resolve_page(&query)?;

    let posts = state.store().page_recent_posts(page, PER_PAGE).await?;
    ensure_page_in_range(page, posts.total_pages)?;

    Ok(Json(ApiResponse::success(PostPageDto::from(posts))))
}

/// GET /about/
pub async fn about() -> Json<ApiResponse<AboutDto>> {
    Json(ApiResponse::success(AboutDto {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        description: env!("CARGO_PKG_DESCRIPTION"),
    }))
}

/// GET /post/new_post
pub async fn new_post_form() -> Json<ApiResponse<()>> {
    Json(ApiResponse::ok())
}

/// POST /post/new_post
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(form): Json<PostForm>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let user = current_user(&state, &session).await?;

    let errors = form.validate();
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let post = state
        .store()
        .create_post(&form.title, &form.content, user.id)
        .await?;

    tracing::info!(post_id = post.id, author = %user.username, "Post published");

    Ok(Json(
        ApiResponse::success(PostDto::from_parts(post, &user))
            .with_flash(FlashCategory::Success, "Post published successfully")
            .with_redirect("/"),
    ))
}

/// GET /post/post_detail/{post_id}/
pub async fn post_detail(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let entry = state
        .store()
        .find_post_with_author(post_id)
        .await?
        .ok_or_else(|| ApiError::post_not_found(post_id))?;

    Ok(Json(ApiResponse::success(PostDto::from(entry))))
}

/// GET /post/post_update/{post_id}/
/// Prefill data for the edit form. Only the author may load it.
pub async fn edit_post_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let user = current_user(&state, &session).await?;

    let entry = state
        .store()
        .find_post_with_author(post_id)
        .await?
        .ok_or_else(|| ApiError::post_not_found(post_id))?;

    if entry.post.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(ApiResponse::success(PostDto::from(entry))))
}

/// POST /post/post_update/{post_id}/
/// Replace title and content; `post_time` moves to now, which also bumps
/// the post back to the top of the front page.
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(post_id): Path<i32>,
    Json(form): Json<PostForm>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let user = current_user(&state, &session).await?;

    let post = state
        .store()
        .find_post(post_id)
        .await?
        .ok_or_else(|| ApiError::post_not_found(post_id))?;

    if post.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    let errors = form.validate();
    if !errors.is_empty() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let updated = state
        .store()
        .update_post(post_id, &form.title, &form.content)
        .await?;

    tracing::info!(post_id, author = %user.username, "Post updated");

    Ok(Json(
        ApiResponse::success(PostDto::from_parts(updated, &user))
            .with_flash(FlashCategory::Success, "Post updated successfully")
            .with_redirect(format!("/post/post_detail/{post_id}/")),
    ))
}

/// GET|POST /post/delete_post/{post_id}
/// Deletion answers both methods, mirroring a confirm page that also
/// accepts a plain link.
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = current_user(&state, &session).await?;

    let post = state
        .store()
        .find_post(post_id)
        .await?
        .ok_or_else(|| ApiError::post_not_found(post_id))?;

    if post.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    state.store().delete_post(post_id).await?;

    tracing::info!(post_id, author = %user.username, "Post deleted");

    Ok(Json(
        ApiResponse::ok()
            .with_flash(
                FlashCategory::Info,
                format!("Post \"{}\" has been deleted", post.title),
            )
            .with_redirect("/"),
    ))
}

/// GET|POST /user/{username}/posts/
/// Everything one author has published, paginated like the front page.
pub async fn user_posts(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<UserPostsDto>>, ApiError> {
    let page = resolve_page(&query)?;

    let user = state
        .store()
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::user_not_found(&username))?;

    let posts = state
        .store()
        .find_posts_by_author(user.id, page, PER_PAGE)
        .await?;
    ensure_page_in_range(page, posts.total_pages)?;

    Ok(Json(ApiResponse::success(UserPostsDto {
        user: AuthorDto::from(&user),
        posts: PostPageDto::from(posts),
    })))
}

// ============================================================================
// Helpers
// ============================================================================

/// `?page=` handling: absent or unparseable values fall back to page 1,
/// zero and negative pages do not exist.
fn resolve_page(query: &PageQuery) -> Result<u64, ApiError> {
    let page = query
        .page
        .as_deref()
        .map_or(1, |raw| raw.parse::<i64>().unwrap_or(1));

    u64::try_from(page)
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| ApiError::NotFound(format!("Page {page} does not exist")))
}

/// Page 1 always renders, even with no posts yet; anything past the last
/// page is not found.
fn ensure_page_in_range(page: u64, total_pages: u64) -> Result<(), ApiError> {
    if page > 1 && page > total_pages {
        return Err(ApiError::NotFound(format!("Page {page} does not exist")));
    }

    Ok(())
}
