//! Saving drafts for later

use tracing::warn;

use crate::error::{PostSyncError, Result};
use crate::posts::PostRepository;
use crate::types::{Draft, NewPost, Post, PostStatus};

#[derive(Clone)]
pub struct DraftService {
    posts: PostRepository,
}

impl DraftService {
    pub fn new(posts: PostRepository) -> Self {
        Self { posts }
    }

    /// Store `draft` as a new draft-status post
    ///
    /// A draft with neither text nor images is rejected before touching the
    /// store.
    pub async fn save(&self, draft: &Draft) -> Result<()> {
        if draft.is_empty() {
            warn!("Refusing to save an empty draft");
            return Err(PostSyncError::InvalidInput(
                "draft has no text and no images".to_string(),
            ));
        }
        self.posts.create(NewPost::draft(draft)).await
    }

    /// Saved drafts, newest first
    pub async fn list(&self) -> Result<Vec<Post>> {
        self.posts.get_by_status(PostStatus::Draft).await
    }
}
