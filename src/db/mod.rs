use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::entities::posts;

pub mod migrator;
pub mod repositories;

pub use repositories::post::{PostPage, PostWithAuthor};
pub use repositories::user::{CredentialCheck, DEFAULT_AVATAR, User};

/// Facade over the per-entity repositories. Cheap to clone; every handler
/// reaches persistence through this.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn post_repo(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    // -- users ---------------------------------------------------------

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<User> {
        self.user_repo()
            .create(username, email, password, security)
            .await
    }

    pub async fn find_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_all().await
    }

    pub async fn check_credentials(&self, email: &str, password: &str) -> Result<CredentialCheck> {
        self.user_repo().check_credentials(email, password).await
    }

    pub async fn update_user_password(
        &self,
        id: i32,
        new_password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        self.user_repo()
            .update_password(id, new_password, security)
            .await
    }

    pub async fn update_user_account(
        &self,
        id: i32,
        username: &str,
        email: &str,
        image_file: Option<&str>,
    ) -> Result<User> {
        self.user_repo()
            .update_account(id, username, email, image_file)
            .await
    }

    // -- posts ---------------------------------------------------------

    pub async fn create_post(
        &self,
        title: &str,
        content: &str,
        author_id: i32,
    ) -> Result<posts::Model> {
        self.post_repo().create(title, content, author_id).await
    }

    pub async fn find_post(&self, id: i32) -> Result<Option<posts::Model>> {
        self.post_repo().get(id).await
    }

    pub async fn find_post_with_author(&self, id: i32) -> Result<Option<PostWithAuthor>> {
        self.post_repo().get_with_author(id).await
    }

    pub async fn page_recent_posts(&self, page: u64, page_size: u64) -> Result<PostPage> {
        self.post_repo().page_recent(page, page_size).await
    }

    pub async fn find_posts_by_author(
        &self,
        author_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<PostPage> {
        self.post_repo()
            .page_by_author(author_id, page, page_size)
            .await
    }

    pub async fn list_posts(&self) -> Result<Vec<posts::Model>> {
        self.post_repo().list_all().await
    }

    pub async fn update_post(&self, id: i32, title: &str, content: &str) -> Result<posts::Model> {
        self.post_repo().update(id, title, content).await
    }

    pub async fn update_post_field(
        &self,
        id: i32,
        column: posts::Column,
        value: &str,
    ) -> Result<()> {
        self.post_repo().update_field(id, column, value).await
    }

    pub async fn delete_post(&self, id: i32) -> Result<bool> {
        self.post_repo().delete(id).await
    }
}
