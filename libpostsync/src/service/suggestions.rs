//! Latest-request-wins tag suggestions
//!
//! Each call takes a ticket from a shared generation counter, waits out the
//! debounce, and only reports its result if no newer call started in the
//! meantime. Superseded calls return `None`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::posts::PostRepository;

#[derive(Clone)]
pub struct TagSuggester {
    posts: PostRepository,
    debounce: Duration,
    generation: Arc<AtomicU64>,
}

impl TagSuggester {
    pub fn new(posts: PostRepository, debounce: Duration) -> Self {
        Self {
            posts,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::Acquire) == ticket
    }

    /// Suggestions for `query`, or `None` if a newer query superseded it
    pub async fn suggest(&self, query: &str) -> Result<Option<Vec<String>>> {
        let ticket = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if !self.is_current(ticket) {
            debug!("Suggestion query '{}' superseded before lookup", query);
            return Ok(None);
        }

        let suggestions = self.posts.get_tag_suggestions(query).await?;

        if !self.is_current(ticket) {
            debug!("Suggestion query '{}' superseded, result dropped", query);
            return Ok(None);
        }
        Ok(Some(suggestions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::types::NewPost;

    async fn suggester(debounce: Duration) -> TagSuggester {
        let posts = PostRepository::new(Store::open_in_memory().await.unwrap());
        posts
            .create(NewPost {
                tags: "rust, rustacean, go".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        TagSuggester::new(posts, debounce)
    }

    #[tokio::test]
    async fn test_single_query() {
        let suggester = suggester(Duration::ZERO).await;
        assert_eq!(
            suggester.suggest("rust").await.unwrap(),
            Some(vec!["rust".to_string(), "rustacean".to_string()])
        );
    }

    #[tokio::test]
    async fn test_newer_query_supersedes_older() {
        let suggester = suggester(Duration::from_millis(50)).await;
        let early = suggester.clone();
        let late = suggester.clone();

        let (first, second) = tokio::join!(early.suggest("ru"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            late.suggest("go").await
        });

        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap(), Some(vec!["go".to_string()]));
    }
}
