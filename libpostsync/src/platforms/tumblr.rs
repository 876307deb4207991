//! Tumblr
//!
//! Tags travel as a separate list. Text length is not limited.

use async_trait::async_trait;

use super::{check_limits, ClientContext, Delivery, PlatformClient};
use crate::error::Result;
use crate::types::{Draft, Platform};

pub const MAX_IMAGES: usize = 10;

pub struct TumblrClient {
    context: ClientContext,
}

impl TumblrClient {
    pub fn new(context: ClientContext) -> Self {
        Self { context }
    }

    pub fn shape(draft: &Draft) -> Result<Delivery> {
        check_limits(
            Platform::Tumblr,
            &draft.content,
            draft.images.len(),
            None,
            MAX_IMAGES,
        )?;

        let tags = draft
            .tags
            .iter()
            .map(|tag| tag.trim().trim_start_matches('#').to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(Delivery {
            text: draft.content.trim().to_string(),
            images: draft.images.clone(),
            tags,
            topic: None,
        })
    }
}

#[async_trait]
impl PlatformClient for TumblrClient {
    fn platform(&self) -> Platform {
        Platform::Tumblr
    }

    async fn authenticate(&self, username: &str, credential: &str) -> Result<bool> {
        self.context
            .issue_and_store(Platform::Tumblr, username, credential)
            .await
    }

    async fn publish(&self, draft: &Draft) -> Result<bool> {
        let delivery = Self::shape(draft)?;
        self.context.deliver(Platform::Tumblr, &delivery).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_structured() {
        let draft = Draft::new("Long form\nwith lines")
            .with_tags(vec!["#art".to_string(), " sketch ".to_string(), "  ".to_string()]);

        let delivery = TumblrClient::shape(&draft).unwrap();
        assert_eq!(delivery.text, "Long form\nwith lines");
        assert_eq!(delivery.tags, vec!["art", "sketch"]);
    }

    #[test]
    fn test_long_text_allowed() {
        assert!(TumblrClient::shape(&Draft::new("a".repeat(50_000))).is_ok());
    }

    #[test]
    fn test_image_limit() {
        let images = (0..=MAX_IMAGES).map(|i| format!("file:///{}.png", i)).collect();
        assert!(TumblrClient::shape(&Draft::new("").with_images(images)).is_err());
    }
}
