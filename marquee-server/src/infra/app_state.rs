use std::{fmt, sync::Arc};

use anyhow::Context;
use tracing::info;

use crate::infra::config::Config;
use crate::infra::websocket::WatchPartyRooms;
use crate::users::auth::jwt::TokenService;
use marquee_core::application::unit_of_work::AppUnitOfWork;
use marquee_core::auth::AuthCrypto;
use marquee_core::database::PostgresDatabase;
use marquee_core::playback::{LastUsedSourceResolver, PlaytimeBatchWriter};
use marquee_core::providers::{
    ChatBackend, MetadataProvider, OpenAiChatClient, TmdbProvider,
};
use marquee_core::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub unit_of_work: Arc<AppUnitOfWork>,
    /// Present when running against PostgreSQL.
    pub postgres: Option<Arc<PostgresDatabase>>,
    pub auth_crypto: Arc<AuthCrypto>,
    pub tokens: TokenService,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub playtime: PlaytimeBatchWriter,
    pub sources: LastUsedSourceResolver,
    pub metadata: Option<Arc<dyn MetadataProvider>>,
    pub chat: Option<Arc<dyn ChatBackend>>,
    pub watch_party: WatchPartyRooms,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("dev_mode", &self.config.dev_mode)
            .field("postgres", &self.postgres.is_some())
            .field("metadata", &self.metadata.is_some())
            .field("chat", &self.chat.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: Config,
        unit_of_work: AppUnitOfWork,
        auth_crypto: AuthCrypto,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let tokens =
            TokenService::new(&config.auth.token_key, config.auth.token_ttl);
        let playtime = PlaytimeBatchWriter::new(
            unit_of_work.watch_history.clone(),
            config.playtime.into(),
        );
        let sources = LastUsedSourceResolver::new(
            unit_of_work.users.clone(),
            unit_of_work.watch_history.clone(),
        );

        Self {
            config: Arc::new(config),
            unit_of_work: Arc::new(unit_of_work),
            postgres: None,
            auth_crypto: Arc::new(auth_crypto),
            tokens,
            rate_limiter,
            playtime,
            sources,
            metadata: None,
            chat: None,
            watch_party: WatchPartyRooms::new(),
        }
    }

    pub fn with_postgres(mut self, postgres: Arc<PostgresDatabase>) -> Self {
        self.postgres = Some(postgres);
        self
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatBackend>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Build the TMDB and chat clients for whichever keys are configured.
    pub fn with_configured_upstreams(mut self) -> anyhow::Result<Self> {
        if let Some(key) = self.config.tmdb.api_key.as_deref() {
            let provider =
                TmdbProvider::new(key, self.config.tmdb.base_url.as_deref())
                    .context("failed to build TMDB client")?;
            self.metadata = Some(Arc::new(provider));
            info!("TMDB metadata enabled");
        }
        if let Some(key) = self.config.chat.api_key.as_deref() {
            let client = OpenAiChatClient::new(
                key,
                self.config.chat.api_base.as_deref(),
                self.config.chat.model.as_deref(),
            )
            .context("failed to build chat client")?;
            self.chat = Some(Arc::new(client));
            info!("chat assistant enabled");
        }
        Ok(self)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
