//! Service layer for PostSync
//!
//! `PostSyncService` is the single entry point for front ends. It owns the
//! store handle and wires the repositories, the image trimmer and the
//! publish orchestrator together:
//!
//! - `PublishOrchestrator` / `PublishSession`: multi-platform publishing with retry
//! - `DraftService`: saving drafts
//! - `TagSuggester`: debounced tag lookups
//! - `EventBus`: progress and warning events
//!
//! # Example
//!
//! ```no_run
//! use libpostsync::service::PostSyncService;
//! use libpostsync::{Draft, Platform};
//!
//! # async fn example() -> libpostsync::Result<()> {
//! let service = PostSyncService::new().await?;
//! service.login(Platform::Tumblr, "alice", "app-password").await?;
//!
//! let connected = service.connected_platforms().await?;
//! let mut session = service.session(Draft::new("Hello!"));
//! let outcome = session.publish(&connected).await?;
//! println!("complete: {}", outcome.is_complete());
//! # Ok(())
//! # }
//! ```

pub mod draft;
pub mod publish;
pub mod suggestions;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use self::draft::DraftService;
use self::publish::{PublishOrchestrator, PublishSession};
use self::suggestions::TagSuggester;
use crate::config::Config;
use crate::db::Store;
use crate::error::{PlatformError, Result};
use crate::events::{EventBus, EventReceiver};
use crate::platforms::transport::{SimulatedTransport, Transport};
use crate::platforms::{ClientContext, ClientFactory, DefaultClientFactory};
use crate::posts::PostRepository;
use crate::tokens::TokenStore;
use crate::trimmer::ImageBorderTrimmer;
use crate::types::{Draft, Platform, Post};

/// Whether a platform has a stored token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub platform: Platform,
    pub connected: bool,
    /// Disabled platforms are never published to
    pub enabled: bool,
}

pub struct PostSyncService {
    config: Arc<Config>,
    store: Store,
    tokens: TokenStore,
    posts: PostRepository,
    factory: Arc<dyn ClientFactory>,
    orchestrator: PublishOrchestrator,
    drafts: DraftService,
    suggester: TagSuggester,
    trimmer: ImageBorderTrimmer,
    event_bus: EventBus,
}

impl PostSyncService {
    /// Create a service from the config file (or defaults)
    pub async fn new() -> Result<Self> {
        let config = Config::load_or_default()?;
        Self::from_config(config).await
    }

    /// Open the configured store and use the simulated transport
    pub async fn from_config(config: Config) -> Result<Self> {
        Self::with_transport(config, Arc::new(SimulatedTransport)).await
    }

    pub async fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let event_bus = EventBus::default();
        let store = Store::open_with_events(&config.db_path(), &event_bus).await?;
        let tokens = TokenStore::new(store.clone()).with_events(event_bus.clone());
        let context = ClientContext::new(tokens, transport, config.platforms.request_timeout());
        let factory: Arc<dyn ClientFactory> = Arc::new(DefaultClientFactory::new(context));
        Ok(Self::assemble(config, store, factory, event_bus))
    }

    /// Build around an already opened store and a custom client factory
    pub fn with_factory(config: Config, store: Store, factory: Arc<dyn ClientFactory>) -> Self {
        Self::assemble(config, store, factory, EventBus::default())
    }

    fn assemble(
        config: Config,
        store: Store,
        factory: Arc<dyn ClientFactory>,
        event_bus: EventBus,
    ) -> Self {
        let tokens = TokenStore::new(store.clone()).with_events(event_bus.clone());
        let posts = PostRepository::new(store.clone()).with_events(event_bus.clone());
        let orchestrator =
            PublishOrchestrator::new(Arc::clone(&factory), posts.clone(), event_bus.clone());
        let drafts = DraftService::new(posts.clone());
        let suggester = TagSuggester::new(posts.clone(), config.suggestions.debounce());
        let trimmer =
            ImageBorderTrimmer::new(config.images.trim_options()).with_events(event_bus.clone());

        Self {
            config: Arc::new(config),
            store,
            tokens,
            posts,
            factory,
            orchestrator,
            drafts,
            suggester,
            trimmer,
            event_bus,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn posts(&self) -> &PostRepository {
        &self.posts
    }

    pub fn orchestrator(&self) -> &PublishOrchestrator {
        &self.orchestrator
    }

    pub fn drafts(&self) -> &DraftService {
        &self.drafts
    }

    pub fn suggester(&self) -> &TagSuggester {
        &self.suggester
    }

    pub fn trimmer(&self) -> &ImageBorderTrimmer {
        &self.trimmer
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Authenticate with `platform`; rejected credentials are an error
    pub async fn login(&self, platform: Platform, username: &str, credential: &str) -> Result<()> {
        let client = self.factory.create(platform);
        if client.authenticate(username, credential).await? {
            info!("Connected to {} as {}", platform, username);
            Ok(())
        } else {
            warn!("Login to {} failed for {}", platform, username);
            Err(PlatformError::Authentication(format!(
                "{} rejected the credentials for {}",
                platform, username
            ))
            .into())
        }
    }

    /// Every known platform with its connection state
    pub async fn connections(&self) -> Result<Vec<ConnectionStatus>> {
        let active = self.tokens.list_active_platforms().await?;
        Ok(Platform::ALL
            .iter()
            .map(|platform| ConnectionStatus {
                platform: *platform,
                connected: active.contains(platform),
                enabled: self.config.platforms.is_enabled(*platform),
            })
            .collect())
    }

    /// Platforms with a stored token that are enabled in the config
    pub async fn connected_platforms(&self) -> Result<BTreeSet<Platform>> {
        Ok(self
            .connections()
            .await?
            .into_iter()
            .filter(|status| status.connected && status.enabled)
            .map(|status| status.platform)
            .collect())
    }

    /// Start a publish session for `draft`
    pub fn session(&self, draft: Draft) -> PublishSession {
        PublishSession::new(self.orchestrator.clone(), draft)
    }

    /// Stored posts, newest first, optionally capped at `limit`
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<Post>> {
        let mut posts = self.posts.get_all().await?;
        if let Some(limit) = limit {
            posts.truncate(limit);
        }
        Ok(posts)
    }

    pub async fn close(self) {
        self.store.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostSyncError;
    use crate::platforms::mock::MockFactory;

    async fn service(factory: MockFactory, config: Config) -> PostSyncService {
        let store = Store::open_in_memory().await.unwrap();
        PostSyncService::with_factory(config, store, Arc::new(factory))
    }

    #[tokio::test]
    async fn test_login_rejected_is_authentication_error() {
        let service = service(MockFactory::accepting().with_auth_failure(), Config::default()).await;

        match service.login(Platform::X, "alice", "pw").await {
            Err(e @ PostSyncError::Platform(PlatformError::Authentication(_))) => {
                assert_eq!(e.exit_code(), 2)
            }
            other => panic!("Expected Authentication error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connections_reflect_tokens_and_config() {
        let mut config = Config::default();
        config.platforms.enabled = vec![Platform::X, Platform::Tumblr];
        let service = service(MockFactory::accepting(), config).await;

        service.tokens().save(Platform::X, "a", "t").await.unwrap();
        service.tokens().save(Platform::Threads, "a", "t").await.unwrap();

        let connections = service.connections().await.unwrap();
        assert_eq!(connections.len(), 3);
        assert!(connections[0].connected && connections[0].enabled);
        assert!(!connections[1].connected);
        assert!(connections[2].connected && !connections[2].enabled);

        let connected = service.connected_platforms().await.unwrap();
        assert_eq!(connected.into_iter().collect::<Vec<_>>(), vec![Platform::X]);
    }

    #[tokio::test]
    async fn test_history_limit() {
        let service = service(MockFactory::accepting(), Config::default()).await;
        for text in ["a", "b", "c"] {
            service.drafts().save(&Draft::new(text)).await.unwrap();
        }

        let recent = service.history(Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "c");
        assert_eq!(service.history(None).await.unwrap().len(), 3);
    }
}
