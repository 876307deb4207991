//! Event system for user notifications and observability
//!
//! The event bus uses `tokio::sync::broadcast` for multi-subscriber support.
//! Components emit events for every persisted-state transition and every
//! recovered failure; a notifier (CLI output, UI toast, crash sink) consumes
//! them. If no subscribers exist, events are dropped without blocking.
//!
//! # Example
//!
//! ```no_run
//! use libpostsync::events::{Event, EventBus};
//! use libpostsync::Platform;
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::PublishStarted {
//!     targets: vec![Platform::X],
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{Platform, PostStatus};

pub type EventReceiver = broadcast::Receiver<Event>;

/// Broadcasts events to any number of subscribers without blocking emitters.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

impl EventBus {
    /// Create a new event bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Lagging subscribers lose the oldest events first.
    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MigrationApplied {
        version: u32,
        description: String,
    },

    MigrationFailed {
        version: u32,
        description: String,
        error: String,
    },

    TokenSaved {
        platform: Platform,
        username: String,
    },

    PostPersisted {
        status: PostStatus,
        platforms: String,
    },

    PublishStarted {
        targets: Vec<Platform>,
    },

    /// One fan-out branch finished
    PlatformSettled {
        platform: Platform,
        success: bool,
        error: Option<String>,
    },

    PublishSucceeded {
        platforms: Vec<Platform>,
    },

    /// Some platforms failed; nothing was persisted and a retry is possible
    PublishPartial {
        succeeded: Vec<Platform>,
        failed: Vec<Platform>,
    },

    PublishRejected {
        reason: String,
    },

    AlreadyDelivered {
        platforms: Vec<Platform>,
    },

    ImageTrimmed {
        original: String,
        trimmed: String,
    },

    /// Non-fatal: the original image is used unchanged
    ImageTrimFailed {
        uri: String,
        error: String,
    },
}
