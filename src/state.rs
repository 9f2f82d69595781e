use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AvatarService, LogMailer, Mailer, ResetTokenSigner, SmtpMailer};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub reset_tokens: Arc<ResetTokenSigner>,

    pub avatars: Arc<AvatarService>,

    pub mailer: Arc<dyn Mailer>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        // The avatar directory doubles as the /static/icon document root,
        // so it must exist before the router is built.
        tokio::fs::create_dir_all(&config.media.avatar_path).await?;

        let reset_tokens = Arc::new(ResetTokenSigner::new(
            &config.security.secret_key,
            config.security.reset_token_max_age_seconds,
        ));

        let mailer: Arc<dyn Mailer> = if config.mail.enabled {
            Arc::new(SmtpMailer::new(&config.mail)?)
        } else {
            Arc::new(LogMailer)
        };

        // Clone config before moving it into the RwLock for services that need it
        let avatar_config = config.clone();
        let config_arc = Arc::new(RwLock::new(config));

        let avatars = Arc::new(AvatarService::new(avatar_config));

        Ok(Self {
            config: config_arc,
            store,
            reset_tokens,
            avatars,
            mailer,
        })
    }
}
