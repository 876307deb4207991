//! Platform abstraction and implementations
//!
//! Every destination implements [`PlatformClient`]: `authenticate` stores a
//! freshly issued token through the [`TokenStore`], `publish` reads it back
//! and hands a platform-shaped [`Delivery`] to the [`Transport`].
//!
//! Wire protocols live behind [`Transport`]; the variants only decide how a
//! draft is shaped for their platform and which limits apply.
//!
//! Adding a platform means adding a [`Platform`] case and one variant module;
//! the publish orchestrator only ever talks to a [`ClientFactory`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use libpostsync::platforms::{ClientContext, ClientFactory, DefaultClientFactory};
//! use libpostsync::platforms::transport::SimulatedTransport;
//! use libpostsync::{Draft, Platform, Store, TokenStore};
//!
//! # async fn example() -> libpostsync::Result<()> {
//! let store = Store::open("~/.local/share/postsync/postsync.db").await?;
//! let context = ClientContext::new(
//!     TokenStore::new(store),
//!     Arc::new(SimulatedTransport),
//!     Duration::from_secs(10),
//! );
//! let factory = DefaultClientFactory::new(context);
//!
//! let client = factory.create(Platform::Tumblr);
//! if client.authenticate("alice", "app-password").await? {
//!     client.publish(&Draft::new("Hello from PostSync")).await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::error::{PlatformError, Result};
use crate::tokens::TokenStore;
use crate::types::{Draft, Platform};

pub mod threads;
pub mod transport;
pub mod tumblr;
pub mod x;

// Mock clients are available for all builds to support integration tests
pub mod mock;

pub use transport::{Delivery, Transport};

/// Capability every platform variant provides
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Exchange credentials for a token and store it
    ///
    /// Returns `Ok(false)` when the platform rejects the credentials.
    /// Transport failures (network, timeout) are returned as errors.
    async fn authenticate(&self, username: &str, credential: &str) -> Result<bool>;

    /// Deliver a draft using the stored token
    ///
    /// Returns whether the platform accepted the post. A missing token is
    /// `PlatformError::Unauthenticated`; content outside the platform's
    /// limits is `PlatformError::Posting`. Callers treat any error the
    /// same as `Ok(false)`.
    async fn publish(&self, draft: &Draft) -> Result<bool>;
}

/// Builds the client for a platform
pub trait ClientFactory: Send + Sync {
    fn create(&self, platform: Platform) -> Box<dyn PlatformClient>;

    /// Resolve a platform identifier, failing for anything outside the
    /// known set
    fn create_by_name(&self, name: &str) -> Result<Box<dyn PlatformClient>> {
        let platform: Platform = name.parse()?;
        Ok(self.create(platform))
    }
}

/// Collaborators shared by every real platform variant
#[derive(Clone)]
pub struct ClientContext {
    tokens: TokenStore,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ClientContext {
    pub fn new(tokens: TokenStore, transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            tokens,
            transport,
            timeout,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Request a token and persist it on success
    pub(crate) async fn issue_and_store(
        &self,
        platform: Platform,
        username: &str,
        credential: &str,
    ) -> Result<bool> {
        info!("[{}] Starting login for {}", platform, username);

        let issued = self
            .with_timeout(
                platform,
                self.transport.issue_token(platform, username, credential),
            )
            .await?;

        match issued {
            Some(token) => {
                self.tokens.save(platform, username, &token).await?;
                info!("[{}] Login succeeded for {}", platform, username);
                Ok(true)
            }
            None => {
                warn!("[{}] Credentials rejected for {}", platform, username);
                Ok(false)
            }
        }
    }

    /// Look up the stored token and send `delivery` with it
    pub(crate) async fn deliver(&self, platform: Platform, delivery: &Delivery) -> Result<bool> {
        let token = self
            .tokens
            .get_token(platform)
            .await?
            .ok_or_else(|| PlatformError::Unauthenticated(platform.to_string()))?;

        info!("[{}] Delivering post", platform);
        let accepted = self
            .with_timeout(
                platform,
                self.transport
                    .deliver(platform, token.expose_secret(), delivery),
            )
            .await?;

        if accepted {
            info!("[{}] Post accepted", platform);
        } else {
            warn!("[{}] Post rejected by platform", platform);
        }
        Ok(accepted)
    }

    async fn with_timeout<T, F>(&self, platform: Platform, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout(platform.to_string()).into()),
        }
    }
}

/// Factory over the real platform variants
#[derive(Clone)]
pub struct DefaultClientFactory {
    context: ClientContext,
}

impl DefaultClientFactory {
    pub fn new(context: ClientContext) -> Self {
        Self { context }
    }
}

impl ClientFactory for DefaultClientFactory {
    fn create(&self, platform: Platform) -> Box<dyn PlatformClient> {
        match platform {
            Platform::X => Box::new(x::XClient::new(self.context.clone())),
            Platform::Tumblr => Box::new(tumblr::TumblrClient::new(self.context.clone())),
            Platform::Threads => Box::new(threads::ThreadsClient::new(self.context.clone())),
        }
    }
}

/// Shared limit check used by the variants
pub(crate) fn check_limits(
    platform: Platform,
    text: &str,
    images: usize,
    max_chars: Option<usize>,
    max_images: usize,
) -> Result<()> {
    if let Some(limit) = max_chars {
        let length = text.chars().count();
        if length > limit {
            return Err(PlatformError::Posting(format!(
                "{} allows {} characters, post has {}",
                platform, limit, length
            ))
            .into());
        }
    }
    if images > max_images {
        return Err(PlatformError::Posting(format!(
            "{} allows {} images, post has {}",
            platform, max_images, images
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::error::PostSyncError;
    use crate::platforms::mock::MockTransport;

    async fn context(transport: MockTransport, timeout: Duration) -> ClientContext {
        let store = Store::open_in_memory().await.unwrap();
        ClientContext::new(TokenStore::new(store), Arc::new(transport), timeout)
    }

    #[tokio::test]
    async fn test_factory_builds_matching_variant() {
        let factory = DefaultClientFactory::new(
            context(MockTransport::accepting(), Duration::from_secs(1)).await,
        );
        for platform in Platform::ALL {
            assert_eq!(factory.create(platform).platform(), platform);
        }
    }

    #[tokio::test]
    async fn test_factory_rejects_unknown_name() {
        let factory = DefaultClientFactory::new(
            context(MockTransport::accepting(), Duration::from_secs(1)).await,
        );
        match factory.create_by_name("friendster") {
            Err(PostSyncError::Platform(PlatformError::UnsupportedPlatform(name))) => {
                assert_eq!(name, "friendster")
            }
            Err(other) => panic!("Expected UnsupportedPlatform, got {:?}", other),
            Ok(_) => panic!("Expected an error for an unknown platform"),
        }
        assert!(factory.create_by_name("Tumblr").is_ok());
    }

    #[tokio::test]
    async fn test_authenticate_stores_issued_token() {
        let ctx = context(MockTransport::accepting(), Duration::from_secs(1)).await;
        let factory = DefaultClientFactory::new(ctx.clone());

        assert!(factory
            .create(Platform::Threads)
            .authenticate("alice", "pw")
            .await
            .unwrap());

        let token = ctx.tokens().get_token(Platform::Threads).await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "mock-threads-alice");
    }

    #[tokio::test]
    async fn test_rejected_credentials_store_nothing() {
        let ctx = context(MockTransport::rejecting(), Duration::from_secs(1)).await;
        let factory = DefaultClientFactory::new(ctx.clone());

        assert!(!factory
            .create(Platform::X)
            .authenticate("alice", "wrong")
            .await
            .unwrap());
        assert!(ctx.tokens().get_token(Platform::X).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_without_token_is_unauthenticated() {
        let transport = MockTransport::accepting();
        let deliveries = transport.deliveries();
        let factory = DefaultClientFactory::new(context(transport, Duration::from_secs(1)).await);

        match factory.create(Platform::Tumblr).publish(&Draft::new("hi")).await {
            Err(PostSyncError::Platform(PlatformError::Unauthenticated(name))) => {
                assert_eq!(name, "tumblr")
            }
            other => panic!("Expected Unauthenticated, got {:?}", other),
        }
        assert!(deliveries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_transport_times_out() {
        let ctx = context(
            MockTransport::accepting().with_delay(Duration::from_millis(200)),
            Duration::from_millis(20),
        )
        .await;
        ctx.tokens().save(Platform::X, "a", "t").await.unwrap();
        let factory = DefaultClientFactory::new(ctx);

        match factory.create(Platform::X).publish(&Draft::new("hi")).await {
            Err(PostSyncError::Platform(PlatformError::Timeout(name))) => assert_eq!(name, "x"),
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_check_limits() {
        assert!(check_limits(Platform::X, "short", 1, Some(10), 4).is_ok());
        assert!(check_limits(Platform::X, "this is too long", 0, Some(10), 4).is_err());
        assert!(check_limits(Platform::X, "ok", 5, Some(10), 4).is_err());
        assert!(check_limits(Platform::Tumblr, &"a".repeat(10_000), 0, None, 10).is_ok());
    }
}
