//! X (formerly Twitter)
//!
//! Tags are rendered inline as trailing hashtags, so they count against the
//! character limit.

use async_trait::async_trait;

use super::{check_limits, ClientContext, Delivery, PlatformClient};
use crate::error::Result;
use crate::types::{Draft, Platform};

pub const MAX_CHARS: usize = 280;
pub const MAX_IMAGES: usize = 4;

pub struct XClient {
    context: ClientContext,
}

impl XClient {
    pub fn new(context: ClientContext) -> Self {
        Self { context }
    }

    /// Shape a draft into the text X receives
    pub fn shape(draft: &Draft) -> Result<Delivery> {
        let hashtags = draft
            .tags
            .iter()
            .map(|tag| hashtag(tag))
            .filter(|tag| tag.len() > 1)
            .collect::<Vec<_>>()
            .join(" ");

        let body = draft.content.trim();
        let text = match (body.is_empty(), hashtags.is_empty()) {
            (_, true) => body.to_string(),
            (true, false) => hashtags,
            (false, false) => format!("{}\n\n{}", body, hashtags),
        };

        check_limits(
            Platform::X,
            &text,
            draft.images.len(),
            Some(MAX_CHARS),
            MAX_IMAGES,
        )?;

        Ok(Delivery {
            text,
            images: draft.images.clone(),
            tags: Vec::new(),
            topic: None,
        })
    }
}

/// `"rust lang"` becomes `"#rustlang"`; an existing `#` is kept
fn hashtag(tag: &str) -> String {
    let compact: String = tag
        .trim()
        .trim_start_matches('#')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("#{}", compact)
}

#[async_trait]
impl PlatformClient for XClient {
    fn platform(&self) -> Platform {
        Platform::X
    }

    async fn authenticate(&self, username: &str, credential: &str) -> Result<bool> {
        self.context
            .issue_and_store(Platform::X, username, credential)
            .await
    }

    async fn publish(&self, draft: &Draft) -> Result<bool> {
        let delivery = Self::shape(draft)?;
        self.context.deliver(Platform::X, &delivery).await
    }
}
