//! Mock clients and transport for testing
//!
//! [`MockFactory`] hands out [`MockClient`]s whose behavior is configured per
//! platform and can be changed between publish attempts, so tests can
//! drive partial failures and retries. [`MockTransport`] sits under the
//! real variants to exercise token handling and shaping without a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use super::{ClientFactory, Delivery, PlatformClient, Transport};
use crate::error::{PlatformError, Result};
use crate::types::{Draft, Platform};

/// How a mock client answers `publish`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Accept,
    /// The platform answers "not accepted"
    Reject,
    /// The call fails with a posting error
    Fail(String),
}

#[derive(Debug)]
struct MockState {
    outcomes: HashMap<Platform, MockOutcome>,
    auth_succeeds: bool,
    delay: Duration,
    publish_calls: Vec<Platform>,
    auth_calls: Vec<Platform>,
    published: Vec<(Platform, Draft)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            outcomes: HashMap::new(),
            auth_succeeds: true,
            delay: Duration::from_millis(0),
            publish_calls: Vec::new(),
            auth_calls: Vec::new(),
            published: Vec::new(),
        }
    }
}

/// Factory whose clients share one recorded state
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    state: Arc<Mutex<MockState>>,
}

impl MockFactory {
    /// Every platform accepts
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, platform: Platform, outcome: MockOutcome) -> Self {
        self.set_outcome(platform, outcome);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = delay;
        self
    }

    pub fn with_auth_failure(self) -> Self {
        self.state.lock().unwrap().auth_succeeds = false;
        self
    }

    /// Change a platform's answer for later calls
    pub fn set_outcome(&self, platform: Platform, outcome: MockOutcome) {
        self.state.lock().unwrap().outcomes.insert(platform, outcome);
    }

    pub fn publish_calls(&self, platform: Platform) -> usize {
        self.state
            .lock()
            .unwrap()
            .publish_calls
            .iter()
            .filter(|p| **p == platform)
            .count()
    }

    pub fn total_publish_calls(&self) -> usize {
        self.state.lock().unwrap().publish_calls.len()
    }

    pub fn auth_calls(&self) -> usize {
        self.state.lock().unwrap().auth_calls.len()
    }

    /// Drafts that were accepted, in completion order
    pub fn published(&self) -> Vec<(Platform, Draft)> {
        self.state.lock().unwrap().published.clone()
    }
}

impl ClientFactory for MockFactory {
    fn create(&self, platform: Platform) -> Box<dyn PlatformClient> {
        Box::new(MockClient {
            platform,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockClient {
    platform: Platform,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl PlatformClient for MockClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn authenticate(&self, username: &str, credential: &str) -> Result<bool> {
        let (delay, succeeds) = {
            let mut state = self.state.lock().unwrap();
            state.auth_calls.push(self.platform);
            (state.delay, state.auth_succeeds)
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }
        Ok(succeeds && !username.is_empty() && !credential.is_empty())
    }

    async fn publish(&self, draft: &Draft) -> Result<bool> {
        let (delay, outcome) = {
            let mut state = self.state.lock().unwrap();
            state.publish_calls.push(self.platform);
            let outcome = state
                .outcomes
                .get(&self.platform)
                .cloned()
                .unwrap_or(MockOutcome::Accept);
            (state.delay, outcome)
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }

        match outcome {
            MockOutcome::Accept => {
                self.state
                    .lock()
                    .unwrap()
                    .published
                    .push((self.platform, draft.clone()));
                Ok(true)
            }
            MockOutcome::Reject => Ok(false),
            MockOutcome::Fail(message) => Err(PlatformError::Posting(message).into()),
        }
    }
}

pub type DeliveryLog = Arc<Mutex<Vec<(Platform, Delivery)>>>;

/// Transport stand-in that records deliveries
#[derive(Clone)]
pub struct MockTransport {
    accepts: bool,
    delay: Duration,
    deliveries: DeliveryLog,
}

impl MockTransport {
    /// Issues `mock-{platform}-{username}` tokens and accepts deliveries
    pub fn accepting() -> Self {
        Self {
            accepts: true,
            delay: Duration::from_millis(0),
            deliveries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Rejects credentials and deliveries
    pub fn rejecting() -> Self {
        Self {
            accepts: false,
            ..Self::accepting()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn deliveries(&self) -> DeliveryLog {
        Arc::clone(&self.deliveries)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn issue_token(
        &self,
        platform: Platform,
        username: &str,
        _credential: &str,
    ) -> Result<Option<String>> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        Ok(self
            .accepts
            .then(|| format!("mock-{}-{}", platform, username)))
    }

    async fn deliver(&self, platform: Platform, _token: &str, delivery: &Delivery) -> Result<bool> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((platform, delivery.clone()));
        Ok(self.accepts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostSyncError;

    #[tokio::test]
    async fn test_outcomes_per_platform() {
        let factory = MockFactory::accepting()
            .with_outcome(Platform::Tumblr, MockOutcome::Reject)
            .with_outcome(Platform::Threads, MockOutcome::Fail("boom".to_string()));
        let draft = Draft::new("hi");

        assert!(factory.create(Platform::X).publish(&draft).await.unwrap());
        assert!(!factory.create(Platform::Tumblr).publish(&draft).await.unwrap());
        assert!(matches!(
            factory.create(Platform::Threads).publish(&draft).await,
            Err(PostSyncError::Platform(PlatformError::Posting(_)))
        ));

        assert_eq!(factory.total_publish_calls(), 3);
        assert_eq!(factory.published().len(), 1);
    }

    #[tokio::test]
    async fn test_outcome_can_change_between_calls() {
        let factory = MockFactory::accepting().with_outcome(Platform::X, MockOutcome::Reject);
        let client = factory.create(Platform::X);

        assert!(!client.publish(&Draft::new("a")).await.unwrap());
        factory.set_outcome(Platform::X, MockOutcome::Accept);
        assert!(client.publish(&Draft::new("a")).await.unwrap());
        assert_eq!(factory.publish_calls(Platform::X), 2);
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let factory = MockFactory::accepting().with_auth_failure();
        assert!(!factory
            .create(Platform::X)
            .authenticate("a", "b")
            .await
            .unwrap());
        assert_eq!(factory.auth_calls(), 1);
    }
}
