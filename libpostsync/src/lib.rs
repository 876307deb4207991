//! PostSync - compose once, publish everywhere
//!
//! This library holds the local store (schema migrations, tokens, post
//! history), the image border trimmer, the platform clients and the
//! publish orchestrator that delivers one draft to several platforms with
//! partial-failure retry.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod migrations;
pub mod platforms;
pub mod posts;
pub mod service;
pub mod tokens;
pub mod trimmer;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Store;
pub use error::{PostSyncError, Result};
pub use events::{Event, EventBus};
pub use migrations::SchemaMigrator;
pub use posts::PostRepository;
pub use service::publish::{PublishOrchestrator, PublishOutcome, PublishSession};
pub use service::PostSyncService;
pub use tokens::TokenStore;
pub use trimmer::ImageBorderTrimmer;
pub use types::{Draft, NewPost, Platform, Post, PostStatus};
