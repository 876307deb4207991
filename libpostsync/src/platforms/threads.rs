//! Threads
//!
//! Threads supports a single topic per post; the first tag becomes the
//! topic and the rest are dropped.

use async_trait::async_trait;
use tracing::debug;

use super::{check_limits, ClientContext, Delivery, PlatformClient};
use crate::error::Result;
use crate::types::{Draft, Platform};

pub const MAX_CHARS: usize = 500;
pub const MAX_IMAGES: usize = 10;

pub struct ThreadsClient {
    context: ClientContext,
}

impl ThreadsClient {
    pub fn new(context: ClientContext) -> Self {
        Self { context }
    }

    pub fn shape(draft: &Draft) -> Result<Delivery> {
        let text = draft.content.trim().to_string();
        check_limits(
            Platform::Threads,
            &text,
            draft.images.len(),
            Some(MAX_CHARS),
            MAX_IMAGES,
        )?;

        let mut tags = draft
            .tags
            .iter()
            .map(|tag| tag.trim().trim_start_matches('#'))
            .filter(|tag| !tag.is_empty());
        let topic = tags.next().map(str::to_string);
        let dropped = tags.count();
        if dropped > 0 {
            debug!("[threads] {} extra tag(s) not sent", dropped);
        }

        Ok(Delivery {
            text,
            images: draft.images.clone(),
            tags: Vec::new(),
            topic,
        })
    }
}

#[async_trait]
impl PlatformClient for ThreadsClient {
    fn platform(&self) -> Platform {
        Platform::Threads
    }

    async fn authenticate(&self, username: &str, credential: &str) -> Result<bool> {
        self.context
            .issue_and_store(Platform::Threads, username, credential)
            .await
    }

    async fn publish(&self, draft: &Draft) -> Result<bool> {
        let delivery = Self::shape(draft)?;
        self.context.deliver(Platform::Threads, &delivery).await
    }
}
