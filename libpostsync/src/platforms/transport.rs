//! Network seam for platform clients
//!
//! The concrete wire protocol of each platform is outside this crate's
//! scope. Clients talk to a [`Transport`]; the default
//! [`SimulatedTransport`] issues local tokens and accepts every delivery,
//! which is enough to drive the whole publish flow end to end.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::types::Platform;

/// A post shaped for one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub text: String,
    pub images: Vec<String>,
    /// Tags sent as structured data (platforms that render them inline
    /// leave this empty)
    pub tags: Vec<String>,
    pub topic: Option<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchange credentials for a token; `None` means rejected
    async fn issue_token(
        &self,
        platform: Platform,
        username: &str,
        credential: &str,
    ) -> Result<Option<String>>;

    /// Send a post; returns whether the platform accepted it
    async fn deliver(&self, platform: Platform, token: &str, delivery: &Delivery) -> Result<bool>;
}

/// Offline transport: any non-blank credential is accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedTransport;

#[async_trait]
impl Transport for SimulatedTransport {
    async fn issue_token(
        &self,
        platform: Platform,
        username: &str,
        credential: &str,
    ) -> Result<Option<String>> {
        if username.trim().is_empty() || credential.trim().is_empty() {
            return Ok(None);
        }
        let token = format!("{}-{}", platform, uuid::Uuid::new_v4());
        info!("[{}] Simulated token issued", platform);
        Ok(Some(token))
    }

    async fn deliver(&self, platform: Platform, _token: &str, delivery: &Delivery) -> Result<bool> {
        info!(
            "[{}] Simulated delivery: {} chars, {} image(s)",
            platform,
            delivery.text.chars().count(),
            delivery.images.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_tokens_are_unique_and_prefixed() {
        let transport = SimulatedTransport;
        let a = transport
            .issue_token(Platform::Tumblr, "alice", "pw")
            .await
            .unwrap()
            .unwrap();
        let b = transport
            .issue_token(Platform::Tumblr, "alice", "pw")
            .await
            .unwrap()
            .unwrap();

        assert!(a.starts_with("tumblr-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_simulated_rejects_blank_credentials() {
        let transport = SimulatedTransport;
        assert!(transport
            .issue_token(Platform::X, "alice", "  ")
            .await
            .unwrap()
            .is_none());
        assert!(transport
            .issue_token(Platform::X, "", "pw")
            .await
            .unwrap()
            .is_none());
    }
}
