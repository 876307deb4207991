//! Per-platform credential cache
//!
//! At most one token per platform is kept; saving again replaces the row
//! wholesale. Store failures are returned unchanged and never retried here.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::db::{parse_timestamp, Store};
use crate::error::{DbError, Result};
use crate::events::{Event, EventBus};
use crate::types::Platform;

/// A stored credential. The token is redacted in `Debug` output.
#[derive(Debug)]
pub struct AuthToken {
    pub platform: Platform,
    pub username: String,
    pub token: SecretString,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenStore {
    store: Store,
    events: Option<EventBus>,
}

impl TokenStore {
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

    /// Insert or replace the token for `platform`
    pub async fn save(&self, platform: Platform, username: &str, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO auth_tokens (platform, username, token)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(platform.as_str())
        .bind(username)
        .bind(token)
        .execute(self.store.pool())
        .await
        .map_err(|e| {
            warn!("Failed to save token for {}: {}", platform, e);
            DbError::SqlxError(e)
        })?;

        info!("Token for {} saved (user {})", platform, username);
        if let Some(events) = &self.events {
            events.emit(Event::TokenSaved {
                platform,
                username: username.to_string(),
            });
        }
        Ok(())
    }

    /// The token for `platform`, or `None` if it never authenticated
    pub async fn get_token(&self, platform: Platform) -> Result<Option<SecretString>> {
        let token: Option<String> =
            sqlx::query_scalar("SELECT token FROM auth_tokens WHERE platform = ?")
                .bind(platform.as_str())
                .fetch_optional(self.store.pool())
                .await
                .map_err(DbError::SqlxError)?;

        debug!("Token lookup for {}: found={}", platform, token.is_some());
        Ok(token.map(SecretString::from))
    }

    /// The full stored row for `platform`
    pub async fn get(&self, platform: Platform) -> Result<Option<AuthToken>> {
        let row = sqlx::query(
            r#"
            SELECT username, token, created_at
            FROM auth_tokens WHERE platform = ?
            "#,
        )
        .bind(platform.as_str())
        .fetch_optional(self.store.pool())
        .await
        .map_err(DbError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: Option<String> = row.get("created_at");
        let created_at = match created_at {
            Some(raw) => parse_timestamp("auth_tokens", &raw)?,
            None => Utc::now(),
        };

        Ok(Some(AuthToken {
            platform,
            username: row.get("username"),
            token: SecretString::from(row.get::<String, _>("token")),
            created_at,
        }))
    }

    /// Platforms that currently have a stored token, in no particular order
    pub async fn list_active_platforms(&self) -> Result<Vec<Platform>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT platform FROM auth_tokens")
            .fetch_all(self.store.pool())
            .await
            .map_err(DbError::SqlxError)?;

        Ok(names
            .iter()
            .filter_map(|name| match name.parse::<Platform>() {
                Ok(platform) => Some(platform),
                Err(e) => {
                    warn!("Ignoring token row: {}", e);
                    None
                }
            })
            .collect())
    }
}
