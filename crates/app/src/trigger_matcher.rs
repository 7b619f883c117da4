//! Trigger matcher — turns domain events into run starts.
//!
//! The matcher subscribes to the event bus and, for each incoming event,
//! loads the enabled automations listening for that event type, applies
//! their trigger filters to the payload, and starts a run per match. Each
//! run is spawned as its own task, so neither a slow collaborator nor a
//! misconfigured automation can hold up the bus or its sibling matches.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use dripline_domain::event::Event;

use crate::executor::{RunStarter, StartOutcome};
use crate::ports::AutomationStore;

/// Matches events against enabled automations and starts runs.
pub struct TriggerMatcher<A, S> {
    automations: A,
    starter: Arc<S>,
}

impl<A, S> TriggerMatcher<A, S>
where
    A: AutomationStore + Send + Sync + 'static,
    S: RunStarter + 'static,
{
    /// Create a matcher over an automation store and a run starter.
    pub fn new(automations: A, starter: Arc<S>) -> Self {
        Self {
            automations,
            starter,
        }
    }

    /// Process one event against all enabled automations.
    ///
    /// Failures are isolated per automation: a store error skips the whole
    /// event (logged), a filter error skips only that automation, and run
    /// execution happens in detached tasks whose errors are logged there.
    /// Nothing propagates to the caller.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn on_event(&self, event: &Event) {
        let candidates = match self.automations.find_enabled_by_event(event.event_type).await {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::error!(error = %err, "failed to load automations for event");
                return;
            }
        };
        if candidates.is_empty() {
            return;
        }

        let Some(subscriber_id) = event.resolve_subscriber() else {
            tracing::warn!("event carries no resolvable subscriber; nothing to start");
            return;
        };

        for automation in candidates {
            match automation.trigger.matches_event(event) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    // One bad filter must not block the other automations.
                    tracing::warn!(
                        automation_id = %automation.id,
                        error = %err,
                        "trigger filter failed; skipping automation"
                    );
                    continue;
                }
            }

            tracing::debug!(automation_id = %automation.id, "trigger matched");
            let starter = Arc::clone(&self.starter);
            let event = event.clone();
            tokio::spawn(async move {
                match starter.start(&automation, subscriber_id, &event).await {
                    Ok(StartOutcome::Started(run)) => {
                        tracing::debug!(run_id = %run.id, status = %run.status.as_str(), "run finished driving");
                    }
                    Ok(StartOutcome::Duplicate(run)) => {
                        tracing::debug!(run_id = %run.id, "duplicate trigger delivery ignored");
                    }
                    Err(err) => {
                        tracing::error!(
                            automation_id = %automation.id,
                            error = %err,
                            "run could not be driven"
                        );
                    }
                }
            });
        }
    }

    /// Consume events from a bus subscription until the bus closes.
    ///
    /// Lagging (the matcher falling behind the channel capacity) drops the
    /// oldest events; that is logged loudly since dropped events mean
    /// un-started runs.
    pub fn spawn(self: Arc<Self>, mut receiver: broadcast::Receiver<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => self.on_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::error!(missed, "event bus lagged; triggering events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
