//! Multi-platform publishing with partial-failure retry
//!
//! [`PublishOrchestrator`] runs one round: it fans a draft out to every
//! connected platform that has not already accepted it, waits for all of
//! them to settle, and writes the single `posted` record only when no
//! platform is left failing. [`PublishSession`] carries the accumulated
//! successes for one draft between rounds so a retry never re-delivers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{PostSyncError, Result};
use crate::events::{Event, EventBus};
use crate::platforms::ClientFactory;
use crate::posts::PostRepository;
use crate::types::{join_platforms, Draft, NewPost, Platform};

/// Result of a publish call the caller must act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Every target accepted and the posted record was written
    Delivered { platforms: BTreeSet<Platform> },
    /// Some targets failed; nothing was persisted
    Partial {
        succeeded: BTreeSet<Platform>,
        failed: BTreeMap<Platform, String>,
    },
    /// All connected platforms had already accepted this draft
    AlreadyDelivered { platforms: BTreeSet<Platform> },
}

impl PublishOutcome {
    pub fn is_complete(&self) -> bool {
        !matches!(self, PublishOutcome::Partial { .. })
    }

    pub fn failed(&self) -> BTreeSet<Platform> {
        match self {
            PublishOutcome::Partial { failed, .. } => failed.keys().copied().collect(),
            _ => BTreeSet::new(),
        }
    }
}

/// Settled outcomes of one fan-out
#[derive(Debug, Clone, Default)]
pub struct PublishRound {
    pub succeeded: BTreeSet<Platform>,
    pub failed: BTreeMap<Platform, String>,
}

#[derive(Clone)]
pub struct PublishOrchestrator {
    factory: Arc<dyn ClientFactory>,
    posts: PostRepository,
    events: EventBus,
}

impl PublishOrchestrator {
    pub fn new(factory: Arc<dyn ClientFactory>, posts: PostRepository, events: EventBus) -> Self {
        Self {
            factory,
            posts,
            events,
        }
    }

    /// Publish `draft` to `connected` minus `prior`, recording it on full
    /// success
    pub async fn publish(
        &self,
        draft: &Draft,
        connected: &BTreeSet<Platform>,
        prior: &BTreeSet<Platform>,
    ) -> Result<PublishOutcome> {
        let Some(round) = self.run_round(draft, connected, prior).await? else {
            return Ok(PublishOutcome::AlreadyDelivered {
                platforms: prior.clone(),
            });
        };

        let all_successes: BTreeSet<Platform> = prior.union(&round.succeeded).copied().collect();
        if round.failed.is_empty() {
            self.record(draft, &all_successes).await?;
            Ok(PublishOutcome::Delivered {
                platforms: all_successes,
            })
        } else {
            Ok(self.partial(all_successes, round.failed))
        }
    }

    /// Validate, then fan out to the remaining targets
    ///
    /// Returns `None` when every connected platform is already in `prior`.
    /// Nothing is written to the store here.
    pub async fn run_round(
        &self,
        draft: &Draft,
        connected: &BTreeSet<Platform>,
        prior: &BTreeSet<Platform>,
    ) -> Result<Option<PublishRound>> {
        if connected.is_empty() {
            return Err(self.reject("no connected platforms"));
        }
        if draft.is_empty() {
            return Err(self.reject("draft has no text and no images"));
        }

        let targets: Vec<Platform> = connected.difference(prior).copied().collect();
        if targets.is_empty() {
            info!(
                "Already delivered to {}, nothing to do",
                join_platforms(prior.iter())
            );
            self.events.emit(Event::AlreadyDelivered {
                platforms: prior.iter().copied().collect(),
            });
            return Ok(None);
        }

        info!("Publishing to {}", join_platforms(targets.iter()));
        self.events.emit(Event::PublishStarted {
            targets: targets.clone(),
        });

        let futures = targets.iter().map(|platform| {
            let client = self.factory.create(*platform);
            async move { (client.platform(), client.publish(draft).await) }
        });
        let settled = join_all(futures).await;

        let mut round = PublishRound::default();
        for (platform, result) in settled {
            let failure = match result {
                Ok(true) => None,
                Ok(false) => Some("rejected by platform".to_string()),
                Err(e) => Some(e.to_string()),
            };

            match &failure {
                None => {
                    info!("[{}] Published", platform);
                    round.succeeded.insert(platform);
                }
                Some(reason) => {
                    warn!("[{}] Publish failed: {}", platform, reason);
                    round.failed.insert(platform, reason.clone());
                }
            }
            self.events.emit(Event::PlatformSettled {
                platform,
                success: failure.is_none(),
                error: failure,
            });
        }

        Ok(Some(round))
    }

    /// Write the one `posted` record for a fully delivered draft
    pub async fn record(&self, draft: &Draft, platforms: &BTreeSet<Platform>) -> Result<()> {
        if let Err(e) = self.posts.create(NewPost::posted(draft, platforms.iter())).await {
            error!(
                "Delivered to {} but the post record could not be written: {}",
                join_platforms(platforms.iter()),
                e
            );
            return Err(e);
        }
        info!("Post delivered to {}", join_platforms(platforms.iter()));
        self.events.emit(Event::PublishSucceeded {
            platforms: platforms.iter().copied().collect(),
        });
        Ok(())
    }

    fn partial(
        &self,
        succeeded: BTreeSet<Platform>,
        failed: BTreeMap<Platform, String>,
    ) -> PublishOutcome {
        warn!(
            "Partial publish: succeeded [{}], failed [{}]",
            join_platforms(succeeded.iter()),
            join_platforms(failed.keys())
        );
        self.events.emit(Event::PublishPartial {
            succeeded: succeeded.iter().copied().collect(),
            failed: failed.keys().copied().collect(),
        });
        PublishOutcome::Partial { succeeded, failed }
    }

    fn reject(&self, reason: &str) -> PostSyncError {
        warn!("Publish rejected: {}", reason);
        self.events.emit(Event::PublishRejected {
            reason: reason.to_string(),
        });
        PostSyncError::InvalidInput(reason.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Posting,
    /// Delivered everywhere; only the record write is outstanding
    FullySucceeded,
    PartiallySucceeded,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Posting => "posting",
            SessionState::FullySucceeded => "fully-succeeded",
            SessionState::PartiallySucceeded => "partially-succeeded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Publish state for one draft across retries
pub struct PublishSession {
    orchestrator: PublishOrchestrator,
    draft: Draft,
    attempts: BTreeMap<Platform, AttemptStatus>,
    state: SessionState,
}

impl PublishSession {
    pub fn new(orchestrator: PublishOrchestrator, draft: Draft) -> Self {
        Self {
            orchestrator,
            draft,
            attempts: BTreeMap::new(),
            state: SessionState::Idle,
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempts(&self) -> &BTreeMap<Platform, AttemptStatus> {
        &self.attempts
    }

    /// Platforms that have accepted this draft
    pub fn successes(&self) -> BTreeSet<Platform> {
        self.attempts
            .iter()
            .filter(|(_, status)| **status == AttemptStatus::Succeeded)
            .map(|(platform, _)| *platform)
            .collect()
    }

    /// Run one publish round against `connected`
    ///
    /// After a `Delivered` outcome the session is back to `Idle` with an
    /// empty attempt map. If the record write failed, the successes are kept
    /// and the next call only retries that write.
    pub async fn publish(&mut self, connected: &BTreeSet<Platform>) -> Result<PublishOutcome> {
        if self.state == SessionState::FullySucceeded {
            return self.finish().await;
        }

        let prior = self.successes();
        let previous = self.state;
        self.state = SessionState::Posting;
        for platform in connected.difference(&prior) {
            self.attempts.insert(*platform, AttemptStatus::Pending);
        }

        let round = match self
            .orchestrator
            .run_round(&self.draft, connected, &prior)
            .await
        {
            Ok(round) => round,
            Err(e) => {
                self.attempts.retain(|_, status| *status != AttemptStatus::Pending);
                self.state = previous;
                return Err(e);
            }
        };

        let Some(round) = round else {
            self.state = previous;
            return Ok(PublishOutcome::AlreadyDelivered { platforms: prior });
        };

        for platform in &round.succeeded {
            self.attempts.insert(*platform, AttemptStatus::Succeeded);
        }
        for platform in round.failed.keys() {
            self.attempts.insert(*platform, AttemptStatus::Failed);
        }

        if round.failed.is_empty() {
            self.state = SessionState::FullySucceeded;
            self.finish().await
        } else {
            self.state = SessionState::PartiallySucceeded;
            Ok(self.orchestrator.partial(self.successes(), round.failed))
        }
    }

    async fn finish(&mut self) -> Result<PublishOutcome> {
        let platforms = self.successes();
        self.orchestrator.record(&self.draft, &platforms).await?;
        self.attempts.clear();
        self.state = SessionState::Idle;
        Ok(PublishOutcome::Delivered { platforms })
    }
}
