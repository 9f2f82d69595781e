use axum::{
    Router,
    http::{HeaderValue, Uri},
    middleware,
    routing::get,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::config::Config;
use crate::state::SharedState;

mod account;
mod auth;
mod equipment;
mod error;
mod observability;
mod password_reset;
mod posts;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn reset_tokens(&self) -> &Arc<crate::services::ResetTokenSigner> {
        &self.shared.reset_tokens
    }

    #[must_use]
    pub fn avatars(&self) -> &Arc<crate::services::AvatarService> {
        &self.shared.avatars
    }

    #[must_use]
    pub fn mailer(&self) -> &Arc<dyn crate::services::Mailer> {
        &self.shared.mailer
    }
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);

    Ok(Arc::new(AppState {
        shared,
        prometheus_handle,
    }))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (avatar_path, cors_origins, secure_cookies, inactivity_minutes) = {
        let config = state.config().read().await;
        (
            config.media.avatar_path.clone(),
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.server.session_inactivity_minutes,
        )
    };

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            inactivity_minutes,
        )));

    let app_router = Router::new()
        .merge(create_member_router())
        .route("/", get(posts::index))
        .route("/about/", get(posts::about))
        .route("/register/", get(auth::register_form).post(auth::register))
        .route("/login/", get(auth::login_form).post(auth::login))
        .route("/logout/", get(auth::logout))
        .route("/change_account/", get(auth::change_account))
        .route(
            "/user/{username}/posts/",
            get(posts::user_posts).post(posts::user_posts),
        )
        .route(
            "/user/request_reset_password/",
            get(password_reset::request_reset_form).post(password_reset::request_reset),
        )
        .route(
            "/user/reset_password/{token}",
            get(password_reset::reset_form).post(password_reset::reset_password),
        )
        .route(
            "/equipment_spec/",
            get(equipment::equipment_spec).post(equipment::save_equipment_spec),
        )
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .merge(app_router)
        .nest_service(
            "/static/icon",
            tower_http::services::ServeDir::new(avatar_path),
        )
        .fallback(not_found)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_requests))
}

/// Routes behind the session guard. The guard runs inside the session
/// layer, so the `Session` extractor is live by the time it fires.
fn create_member_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/account/",
            get(account::show_account).post(account::update_account),
        )
        .route(
            "/post/new_post",
            get(posts::new_post_form).post(posts::create_post),
        )
        .route("/post/post_detail/{post_id}/", get(posts::post_detail))
        .route(
            "/post/post_update/{post_id}/",
            get(posts::edit_post_form).post(posts::update_post),
        )
        .route(
            "/post/delete_post/{post_id}",
            get(posts::delete_post).post(posts::delete_post),
        )
        .route("/users/", get(users::list_users).post(users::list_users))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::require_session))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {uri}"))
}
