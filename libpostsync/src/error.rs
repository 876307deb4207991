//! Error types for PostSync

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PostSyncError>;

#[derive(Error, Debug)]
pub enum PostSyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PostSyncError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PostSyncError::InvalidInput(_) => 3,
            PostSyncError::Platform(PlatformError::Authentication(_))
            | PostSyncError::Platform(PlatformError::Unauthenticated(_)) => 2,
            PostSyncError::Migration(_) => 4,
            PostSyncError::Platform(_) => 1,
            PostSyncError::Config(_) => 1,
            PostSyncError::Database(_) => 1,
            PostSyncError::Image(_) => 1,
        }
    }

    /// Whether the store must not be used after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, PostSyncError::Migration(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// A schema step failed; the store is unusable until it is applied.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to prepare version table: {0}")]
    VersionTable(#[source] sqlx::Error),

    #[error("Step {version} ({description}) failed: {source}")]
    StepFailed {
        version: u32,
        description: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not authenticated with {0}")]
    Unauthenticated(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Another trim is already in progress")]
    Busy,

    #[error("Image IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode/encode failed: {0}")]
    Codec(#[from] image::ImageError),

    #[error("Unsupported image URI: {0}")]
    UnsupportedUri(String),

    #[error("Corrected image would overwrite the original: {0}")]
    WouldOverwrite(std::path::PathBuf),

    #[error("Trim worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = PostSyncError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_errors() {
        let rejected = PostSyncError::Platform(PlatformError::Authentication("bad".to_string()));
        let missing = PostSyncError::Platform(PlatformError::Unauthenticated("x".to_string()));
        assert_eq!(rejected.exit_code(), 2);
        assert_eq!(missing.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_posting_error() {
        let error = PostSyncError::Platform(PlatformError::Posting("rejected".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_migration_error_is_fatal() {
        let error = PostSyncError::Migration(MigrationError::StepFailed {
            version: 3,
            description: "create posts table",
            source: sqlx::Error::RowNotFound,
        });
        assert!(error.is_fatal());
        assert_eq!(error.exit_code(), 4);

        let db = PostSyncError::Database(DbError::SqlxError(sqlx::Error::RowNotFound));
        assert!(!db.is_fatal());
    }

    #[test]
    fn test_error_message_formatting_step_failed() {
        let error = MigrationError::StepFailed {
            version: 2,
            description: "create auth_tokens table",
            source: sqlx::Error::RowNotFound,
        };
        let message = error.to_string();
        assert!(message.starts_with("Step 2 (create auth_tokens table) failed"));
    }

    #[test]
    fn test_error_message_formatting_platform() {
        let error = PostSyncError::Platform(PlatformError::Timeout("tumblr".to_string()));
        assert_eq!(error.to_string(), "Platform error: Request to tumblr timed out");
    }

    #[test]
    fn test_error_conversion_from_image_error() {
        let converted: PostSyncError = ImageError::Busy.into();
        match converted {
            PostSyncError::Image(ImageError::Busy) => {}
            other => panic!("Expected PostSyncError::Image, got {:?}", other),
        }
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();
        assert_eq!(original.to_string(), cloned.to_string());
    }
}
