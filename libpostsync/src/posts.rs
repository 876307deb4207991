//! Post history storage
//!
//! Posts are append-only: every durable change is a new row written by
//! `create`. The ordered image list is stored as a JSON array.

use std::collections::HashSet;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{info, warn};

use crate::db::{parse_timestamp, Store};
use crate::error::{DbError, PostSyncError, Result};
use crate::events::{Event, EventBus};
use crate::types::{split_list, NewPost, Post, PostStatus};

#[derive(Clone)]
pub struct PostRepository {
    store: Store,
    events: Option<EventBus>,
}

impl PostRepository {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Write one new post row
    pub async fn create(&self, post: NewPost) -> Result<()> {
        let images_json = encode_images(&post.images)?;

        sqlx::query(
            r#"
            INSERT INTO posts (content, images, status, platforms, tags)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.content)
        .bind(&images_json)
        .bind(post.status.as_str())
        .bind(&post.platforms)
        .bind(&post.tags)
        .execute(self.store.pool())
        .await
        .map_err(|e| {
            warn!("Failed to create post: {}", e);
            DbError::SqlxError(e)
        })?;

        info!(
            "Post created (status={}, platforms='{}')",
            post.status.as_str(),
            post.platforms
        );
        if let Some(events) = &self.events {
            events.emit(Event::PostPersisted {
                status: post.status,
                platforms: post.platforms,
            });
        }
        Ok(())
    }

    /// Every post, most recently created first
    pub async fn get_all(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, images, status, platforms, created_at, tags
            FROM posts
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Posts with the given status, most recently created first
    pub async fn get_by_status(&self, status: PostStatus) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, images, status, platforms, created_at, tags
            FROM posts
            WHERE status = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(self.store.pool())
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Distinct tags containing `query`, compared case-insensitively
    ///
    /// Tags keep their stored casing and appear in first-seen order, newest
    /// posts first. A blank query returns nothing without touching the store.
    pub async fn get_tag_suggestions(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        // SQLite LIKE folds ASCII only, so matching happens here.
        let rows: Vec<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT tags FROM posts
            WHERE tags IS NOT NULL AND tags != ''
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(DbError::SqlxError)?;

        let needle = query.to_lowercase();
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();

        for tags in rows.into_iter().flatten() {
            for tag in split_list(&tags) {
                if tag.to_lowercase().contains(&needle) && seen.insert(tag.clone()) {
                    suggestions.push(tag);
                }
            }
        }

        Ok(suggestions)
    }
}

pub fn encode_images(images: &[String]) -> Result<String> {
    serde_json::to_string(images).map_err(|e| {
        PostSyncError::from(DbError::CorruptRow {
            table: "posts",
            message: format!("cannot encode images: {}", e),
        })
    })
}

/// Decode the stored image column; a missing value is an empty list
pub fn decode_images(raw: Option<&str>) -> Result<Vec<String>> {
    match raw {
        None => Ok(Vec::new()),
        Some(s) if s.trim().is_empty() => Ok(Vec::new()),
        Some(s) => serde_json::from_str(s).map_err(|e| {
            PostSyncError::from(DbError::CorruptRow {
                table: "posts",
                message: format!("bad images value: {}", e),
            })
        }),
    }
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let images: Option<String> = row.get("images");
    let status: String = row.get("status");
    let created_at: Option<String> = row.get("created_at");

    Ok(Post {
        id: row.get("id"),
        content: row.get::<Option<String>, _>("content").unwrap_or_default(),
        images: decode_images(images.as_deref())?,
        status: status.parse().map_err(|message| DbError::CorruptRow {
            table: "posts",
            message,
        })?,
        platforms: row.get::<Option<String>, _>("platforms").unwrap_or_default(),
        tags: row.get::<Option<String>, _>("tags").unwrap_or_default(),
        created_at: match created_at {
            Some(raw) => parse_timestamp("posts", &raw)?,
            None => chrono::Utc::now(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Draft;

    async fn repository() -> PostRepository {
        PostRepository::new(Store::open_in_memory().await.unwrap())
    }

    fn tagged(tags: &str) -> NewPost {
        NewPost {
            content: "post".to_string(),
            tags: tags.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_with_defaults() {
        let posts = repository().await;
        posts.create(NewPost::default()).await.unwrap();

        let all = posts.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "");
        assert!(all[0].images.is_empty());
        assert_eq!(all[0].status, PostStatus::Draft);
        assert_eq!(all[0].platforms, "");
        assert_eq!(all[0].tags, "");
    }

    #[tokio::test]
    async fn test_images_round_trip_in_order() {
        let posts = repository().await;
        let images = vec![
            "file:///b.png".to_string(),
            "file:///a.png".to_string(),
            "content://media/external/images/7".to_string(),
        ];
        posts
            .create(NewPost {
                images: images.clone(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(posts.get_all().await.unwrap()[0].images, images);
    }

    #[tokio::test]
    async fn test_get_all_newest_first() {
        let posts = repository().await;
        for content in ["first", "second", "third"] {
            posts
                .create(NewPost::draft(&Draft::new(content)))
                .await
                .unwrap();
        }

        let contents: Vec<_> = posts
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.content)
            .collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_null_images_decode_to_empty_list() {
        let posts = repository().await;
        sqlx::query("INSERT INTO posts (content, status) VALUES ('legacy', 'posted')")
            .execute(posts.store.pool())
            .await
            .unwrap();

        let all = posts.get_all().await.unwrap();
        assert!(all[0].images.is_empty());
        assert_eq!(all[0].status, PostStatus::Posted);
    }

    #[tokio::test]
    async fn test_get_by_status() {
        let posts = repository().await;
        posts.create(NewPost::draft(&Draft::new("d"))).await.unwrap();
        posts
            .create(NewPost {
                content: "p".to_string(),
                status: PostStatus::Posted,
                platforms: "x".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let drafts = posts.get_by_status(PostStatus::Draft).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].content, "d");
    }

    #[tokio::test]
    async fn test_tag_suggestions_case_insensitive_and_distinct() {
        let posts = repository().await;
        posts.create(tagged("Cat, dog")).await.unwrap();
        posts.create(tagged("cat,concatenate")).await.unwrap();
        posts.create(tagged("Cat, bird")).await.unwrap();

        let suggestions = posts.get_tag_suggestions("cat").await.unwrap();

        assert!(suggestions.contains(&"Cat".to_string()));
        assert!(suggestions.contains(&"cat".to_string()));
        assert!(suggestions.contains(&"concatenate".to_string()));
        assert!(!suggestions.contains(&"dog".to_string()));
        assert!(!suggestions.contains(&"bird".to_string()));

        let unique: HashSet<_> = suggestions.iter().collect();
        assert_eq!(unique.len(), suggestions.len());
    }

    #[tokio::test]
    async fn test_tag_suggestions_uppercase_query() {
        let posts = repository().await;
        posts.create(tagged("rustlang")).await.unwrap();

        assert_eq!(
            posts.get_tag_suggestions("RUST").await.unwrap(),
            vec!["rustlang".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tag_suggestions_fold_non_ascii_case() {
        let posts = repository().await;
        posts.create(tagged("Émile, Ärger, plain")).await.unwrap();

        assert_eq!(
            posts.get_tag_suggestions("émile").await.unwrap(),
            vec!["Émile".to_string()]
        );
        assert_eq!(
            posts.get_tag_suggestions("är").await.unwrap(),
            vec!["Ärger".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tag_suggestions_blank_query_skips_store() {
        let store = Store::open_in_memory().await.unwrap();
        let posts = PostRepository::new(store.clone());
        store.close().await;

        // A closed store would error if it were queried
        assert!(posts.get_tag_suggestions("").await.unwrap().is_empty());
        assert!(posts.get_tag_suggestions("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tag_suggestions_wildcards_are_literal() {
        let posts = repository().await;
        posts.create(tagged("100%, plain")).await.unwrap();

        assert_eq!(
            posts.get_tag_suggestions("%").await.unwrap(),
            vec!["100%".to_string()]
        );
    }

    #[tokio::test]
    async fn test_create_emits_persisted_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let posts = repository().await.with_events(bus);

        posts.create(NewPost::default()).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            Event::PostPersisted {
                status: PostStatus::Draft,
                platforms: String::new()
            }
        );
    }

    #[test]
    fn test_decode_images_rejects_garbage() {
        assert!(decode_images(Some("not json")).is_err());
        assert!(decode_images(Some("")).unwrap().is_empty());
    }
}
