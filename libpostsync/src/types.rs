//! Core types for PostSync

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Separator used when a set of platforms or tags is stored as one column.
pub const LIST_SEPARATOR: &str = ", ";

/// The closed set of destinations a post can be delivered to.
///
/// Ordering follows declaration order and is used wherever a set of
/// platforms is rendered, so joined values are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X,
    Tumblr,
    Threads,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::X, Platform::Tumblr, Platform::Threads];

    /// Identifier stored in `auth_tokens.platform` and `posts.platforms`
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::Tumblr => "tumblr",
            Platform::Threads => "threads",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x" | "twitter" => Ok(Platform::X),
            "tumblr" => Ok(Platform::Tumblr),
            "threads" => Ok(Platform::Threads),
            other => Err(PlatformError::UnsupportedPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Posted,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Posted => "posted",
        }
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "posted" => Ok(PostStatus::Posted),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

/// A persisted post as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub content: String,
    pub images: Vec<String>,
    pub status: PostStatus,
    pub platforms: String,
    pub tags: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn platform_list(&self) -> Vec<String> {
        split_list(&self.platforms)
    }

    pub fn tag_list(&self) -> Vec<String> {
        split_list(&self.tags)
    }
}

/// Input to `PostRepository::create`. Every field has a default.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub content: String,
    pub images: Vec<String>,
    pub status: PostStatus,
    pub platforms: String,
    pub tags: String,
}

impl Default for NewPost {
    fn default() -> Self {
        Self {
            content: String::new(),
            images: Vec::new(),
            status: PostStatus::Draft,
            platforms: String::new(),
            tags: String::new(),
        }
    }
}

impl NewPost {
    pub fn draft(draft: &Draft) -> Self {
        Self {
            content: draft.content.clone(),
            images: draft.images.clone(),
            status: PostStatus::Draft,
            platforms: String::new(),
            tags: join_list(&draft.tags),
        }
    }

    pub fn posted<'a, I>(draft: &Draft, platforms: I) -> Self
    where
        I: IntoIterator<Item = &'a Platform>,
    {
        Self {
            content: draft.content.clone(),
            images: draft.images.clone(),
            status: PostStatus::Posted,
            platforms: join_platforms(platforms),
            tags: join_list(&draft.tags),
        }
    }
}

/// Content composed by the user, not yet stored or delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub content: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

impl Draft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// True when there is neither text nor any image to deliver
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.images.is_empty()
    }
}

pub fn join_platforms<'a, I>(platforms: I) -> String
where
    I: IntoIterator<Item = &'a Platform>,
{
    platforms
        .into_iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

pub fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Splits a comma-joined column into trimmed, non-empty tokens
pub fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
