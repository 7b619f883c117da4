//! Run executor — walks one automation's node graph for one subscriber.
//!
//! The executor owns the whole lifecycle of a run: idempotent start,
//! per-node dispatch, retry with backoff for flaky collaborators, durable
//! suspension at delay nodes, and resume after the delay (or a process
//! restart). Within a run execution is strictly sequential — a node's
//! outcome is appended to the execution log before the cursor advances —
//! while independent runs proceed concurrently without coordination.

use std::future::Future;
use std::time::Duration;

use serde_json::{Value, json};

use dripline_domain::automation::{Action, Automation, NodeId, NodeKind};
use dripline_domain::error::{ActionError, DriplineError, NotFoundError, StructuralError};
use dripline_domain::event::Event;
use dripline_domain::id::{RunId, SubscriberId};
use dripline_domain::run::{Run, RunContext, RunStatus};
use dripline_domain::run_log::LogEntry;

use crate::dispatch::ActionDispatcher;
use crate::ports::{AutomationStore, ExecutionLog, Mailer, RunRepository, TagStore, WebhookSink};

/// Visit budget per drive: `node count × this factor`. Save-time validation
/// rejects cycles, so exceeding the budget means the stored graph was
/// corrupted behind the engine's back.
pub const VISIT_BUDGET_FACTOR: usize = 4;

/// Exponential backoff settings for retryable action failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per action node, first try included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}

/// Result of asking the executor to start a run.
#[derive(Debug)]
pub enum StartOutcome {
    /// A new run was created and driven as far as it could go.
    Started(Run),
    /// The idempotency triple already had a run; nothing happened.
    Duplicate(Run),
}

impl StartOutcome {
    /// The run behind either outcome.
    #[must_use]
    pub fn run(&self) -> &Run {
        match self {
            Self::Started(run) | Self::Duplicate(run) => run,
        }
    }

    /// Whether the start was short-circuited by an existing run.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Starts runs — the face the trigger matcher sees.
pub trait RunStarter: Send + Sync {
    /// Start (or idempotently skip) a run of `automation` for one subscriber.
    fn start(
        &self,
        automation: &Automation,
        subscriber_id: SubscriberId,
        event: &Event,
    ) -> impl Future<Output = Result<StartOutcome, DriplineError>> + Send;
}

/// Resumes suspended runs — the face the resume worker sees.
pub trait RunResumer: Send + Sync {
    /// Continue a suspended run from its persisted cursor.
    fn resume(&self, run_id: RunId) -> impl Future<Output = Result<Run, DriplineError>> + Send;
}

/// The workflow executor: automation store + run repository + execution
/// log + action dispatcher, glued together by the drive loop.
pub struct RunExecutor<A, R, L, M, T, W> {
    automations: A,
    runs: R,
    log: L,
    dispatcher: ActionDispatcher<M, T, W>,
    retry: RetryPolicy,
}

impl<A, R, L, M, T, W> RunExecutor<A, R, L, M, T, W>
where
    A: AutomationStore + Send + Sync,
    R: RunRepository + Send + Sync,
    L: ExecutionLog + Send + Sync,
    M: Mailer + Send + Sync,
    T: TagStore + Send + Sync,
    W: WebhookSink + Send + Sync,
{
    /// Create an executor with the default retry policy.
    pub fn new(automations: A, runs: R, log: L, dispatcher: ActionDispatcher<M, T, W>) -> Self {
        Self {
            automations,
            runs,
            log,
            dispatcher,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Start a run for `(automation, subscriber, event)` and drive it until
    /// it completes, fails, or suspends at a delay node.
    ///
    /// Re-delivering the same event is a no-op: if any run already exists
    /// for the triple, the existing run is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the run repository or execution log.
    /// Run-level failures (structural, condition, exhausted action) are not
    /// errors — they are recorded in the log and in the returned run.
    #[tracing::instrument(
        skip(self, automation, event),
        fields(automation_id = %automation.id, subscriber_id = %subscriber_id, event_id = %event.id)
    )]
    pub async fn start(
        &self,
        automation: &Automation,
        subscriber_id: SubscriberId,
        event: &Event,
    ) -> Result<StartOutcome, DriplineError> {
        if let Some(existing) = self
            .runs
            .find_by_trigger(automation.id, subscriber_id, event.id)
            .await?
        {
            tracing::debug!(run_id = %existing.id, "duplicate trigger delivery ignored");
            return Ok(StartOutcome::Duplicate(existing));
        }

        let entry = automation
            .entry_node()
            .ok_or(StructuralError::MissingEntryNode)?;
        let run = Run::start(
            automation.id,
            subscriber_id,
            event.id,
            entry.id.clone(),
            RunContext::from_payload(&event.payload),
        );
        let run = self.runs.create(run).await?;
        tracing::info!(run_id = %run.id, "run started");

        let run = self.drive(run, automation).await?;
        Ok(StartOutcome::Started(run))
    }

    /// Continue a suspended run from its persisted cursor.
    ///
    /// Resuming a run that is not suspended is a no-op — a late scheduler
    /// tick must not disturb a run that already moved on. If the automation
    /// was deleted while the run was parked, the run fails at its next step.
    ///
    /// # Errors
    ///
    /// Returns [`DriplineError::NotFound`] for an unknown run id, or
    /// storage errors from the repositories.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, run_id: RunId) -> Result<Run, DriplineError> {
        let Some(mut run) = self.runs.get_by_id(run_id).await? else {
            return Err(NotFoundError {
                entity: "Run",
                id: run_id.to_string(),
            }
            .into());
        };
        if run.status != RunStatus::Suspended {
            tracing::debug!(status = %run.status, "resume on non-suspended run is a no-op");
            return Ok(run);
        }

        let Some(automation) = self.automations.get_by_id(run.automation_id).await? else {
            // The automation was deleted under the parked run.
            let node_id = run.cursor.clone().unwrap_or_else(|| NodeId::from("?"));
            let reason = ActionError::CollaboratorUnavailable(
                "automation no longer exists".to_string(),
            );
            self.log
                .append(LogEntry::failure(&run, node_id, 1, Value::Null, &reason.to_string()))
                .await?;
            run.fail();
            tracing::warn!(run_id = %run.id, "run failed: automation deleted while suspended");
            return self.runs.update(run).await;
        };

        run.resume();
        let run = self.runs.update(run).await?;
        tracing::info!(run_id = %run.id, "run resumed");
        self.drive(run, &automation).await
    }

    /// The drive loop: execute nodes until the run leaves `Running`.
    /// The run row is persisted after every step so a crash resumes from
    /// the last logged node, never from the entry node.
    async fn drive(&self, mut run: Run, automation: &Automation) -> Result<Run, DriplineError> {
        let budget = automation.nodes.len() * VISIT_BUDGET_FACTOR;
        let mut visits = 0usize;

        while run.status == RunStatus::Running {
            let Some(node_id) = run.cursor.clone() else {
                run.complete();
                run = self.runs.update(run).await?;
                continue;
            };

            visits += 1;
            if visits > budget {
                let err = StructuralError::CycleSuspected { visits, budget };
                self.log
                    .append(LogEntry::failure(&run, node_id, 1, Value::Null, &err.to_string()))
                    .await?;
                run.fail();
                tracing::error!(run_id = %run.id, %err, "run failed");
            } else if let Some(node) = automation.node(&node_id) {
                match &node.kind {
                    NodeKind::Action { action, next } => {
                        match self.execute_action(&run, &node_id, action).await? {
                            Some(output) => {
                                run.context.merge(output);
                                run.advance(next.clone());
                            }
                            None => run.fail(),
                        }
                    }
                    NodeKind::Condition {
                        predicate,
                        on_true,
                        on_false,
                    } => {
                        let input = serde_json::to_value(predicate).unwrap_or(Value::Null);
                        match predicate.evaluate(&run.context) {
                            Ok(outcome) => {
                                self.log
                                    .append(LogEntry::success(
                                        &run,
                                        node_id,
                                        1,
                                        input,
                                        json!(outcome),
                                    ))
                                    .await?;
                                let target = if outcome { on_true } else { on_false };
                                run.advance(target.clone());
                            }
                            Err(err) => {
                                self.log
                                    .append(LogEntry::failure(
                                        &run,
                                        node_id,
                                        1,
                                        input,
                                        &err.to_string(),
                                    ))
                                    .await?;
                                run.fail();
                                tracing::error!(run_id = %run.id, %err, "run failed");
                            }
                        }
                    }
                    NodeKind::Delay { seconds, next } => {
                        let input = json!({ "seconds": seconds });
                        match next {
                            Some(next) => {
                                let resume_at = resume_time(*seconds);
                                self.log
                                    .append(LogEntry::success(
                                        &run,
                                        node_id,
                                        1,
                                        input,
                                        json!({ "resume_at": resume_at.to_rfc3339() }),
                                    ))
                                    .await?;
                                run.suspend(resume_at, next.clone());
                                tracing::info!(run_id = %run.id, %resume_at, "run suspended");
                            }
                            None => {
                                // A delay with nothing after it is terminal.
                                self.log
                                    .append(LogEntry::success(&run, node_id, 1, input, Value::Null))
                                    .await?;
                                run.complete();
                            }
                        }
                    }
                }
            } else {
                let err = StructuralError::DanglingNode {
                    node_id: node_id.to_string(),
                };
                self.log
                    .append(LogEntry::failure(&run, node_id, 1, Value::Null, &err.to_string()))
                    .await?;
                run.fail();
                tracing::error!(run_id = %run.id, %err, "run failed");
            }

            run = self.runs.update(run).await?;
        }

        Ok(run)
    }

    /// Dispatch one action with retries. Every attempt — success or failure
    /// — appends its own log entry, so the audit trail shows retry history.
    /// Returns `None` once the failure is final (already logged).
    async fn execute_action(
        &self,
        run: &Run,
        node_id: &NodeId,
        action: &Action,
    ) -> Result<Option<Value>, DriplineError> {
        let input = serde_json::to_value(action).unwrap_or(Value::Null);
        let mut attempt = 1u32;

        loop {
            match self
                .dispatcher
                .execute(action, run.subscriber_id, &run.context)
                .await
            {
                Ok(output) => {
                    self.log
                        .append(LogEntry::success(
                            run,
                            node_id.clone(),
                            attempt,
                            input,
                            output.clone(),
                        ))
                        .await?;
                    return Ok(Some(output));
                }
                Err(err) => {
                    self.log
                        .append(LogEntry::failure(
                            run,
                            node_id.clone(),
                            attempt,
                            input.clone(),
                            &err.to_string(),
                        ))
                        .await?;
                    if err.is_retryable() && attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_for(attempt);
                        tracing::warn!(
                            node_id = %node_id,
                            attempt,
                            error = %err,
                            ?delay,
                            "action failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    } else {
                        tracing::error!(
                            node_id = %node_id,
                            attempt,
                            error = %err,
                            "action failed permanently"
                        );
                        return Ok(None);
                    }
                }
            }
        }
    }
}

/// Resume time for a delay node, saturating instead of overflowing on
/// absurd durations.
fn resume_time(seconds: u64) -> dripline_domain::time::Timestamp {
    let delta = chrono::Duration::try_seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
        .unwrap_or(chrono::TimeDelta::MAX);
    dripline_domain::time::now()
        .checked_add_signed(delta)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}

impl<A, R, L, M, T, W> RunStarter for RunExecutor<A, R, L, M, T, W>
where
    A: AutomationStore + Send + Sync,
    R: RunRepository + Send + Sync,
    L: ExecutionLog + Send + Sync,
    M: Mailer + Send + Sync,
    T: TagStore + Send + Sync,
    W: WebhookSink + Send + Sync,
{
    fn start(
        &self,
        automation: &Automation,
        subscriber_id: SubscriberId,
        event: &Event,
    ) -> impl Future<Output = Result<StartOutcome, DriplineError>> + Send {
        RunExecutor::start(self, automation, subscriber_id, event)
    }
}

impl<A, R, L, M, T, W> RunResumer for RunExecutor<A, R, L, M, T, W>
where
    A: AutomationStore + Send + Sync,
    R: RunRepository + Send + Sync,
    L: ExecutionLog + Send + Sync,
    M: Mailer + Send + Sync,
    T: TagStore + Send + Sync,
    W: WebhookSink + Send + Sync,
{
    fn resume(&self, run_id: RunId) -> impl Future<Output = Result<Run, DriplineError>> + Send {
        RunExecutor::resume(self, run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use dripline_domain::automation::{CompareOp, Node, Predicate, Trigger};
    use dripline_domain::event::EventType;
    use dripline_domain::id::{AutomationId, EventId};
    use dripline_domain::run_log::StepStatus;

    // ── In-memory automation store ─────────────────────────────────

    #[derive(Default)]
    struct InMemoryAutomations {
        store: Mutex<HashMap<AutomationId, Automation>>,
    }

    impl InMemoryAutomations {
        fn insert(&self, automation: Automation) {
            self.store
                .lock()
                .unwrap()
                .insert(automation.id, automation);
        }

        fn remove(&self, id: AutomationId) {
            self.store.lock().unwrap().remove(&id);
        }
    }

    impl AutomationStore for InMemoryAutomations {
        async fn get_by_id(&self, id: AutomationId) -> Result<Option<Automation>, DriplineError> {
            Ok(self.store.lock().unwrap().get(&id).cloned())
        }

        async fn get_all(&self) -> Result<Vec<Automation>, DriplineError> {
            Ok(self.store.lock().unwrap().values().cloned().collect())
        }

        async fn find_enabled_by_event(
            &self,
            event_type: EventType,
        ) -> Result<Vec<Automation>, DriplineError> {
            Ok(self
                .store
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.enabled && a.trigger.event_type == event_type)
                .cloned()
                .collect())
        }
    }

    // ── In-memory run repository ───────────────────────────────────

    #[derive(Default)]
    struct InMemoryRuns {
        store: Mutex<HashMap<RunId, Run>>,
    }

    impl RunRepository for InMemoryRuns {
        async fn create(&self, run: Run) -> Result<Run, DriplineError> {
            self.store.lock().unwrap().insert(run.id, run.clone());
            Ok(run)
        }

        async fn update(&self, run: Run) -> Result<Run, DriplineError> {
            self.store.lock().unwrap().insert(run.id, run.clone());
            Ok(run)
        }

        async fn get_by_id(&self, id: RunId) -> Result<Option<Run>, DriplineError> {
            Ok(self.store.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_trigger(
            &self,
            automation_id: AutomationId,
            subscriber_id: SubscriberId,
            trigger_event_id: EventId,
        ) -> Result<Option<Run>, DriplineError> {
            Ok(self
                .store
                .lock()
                .unwrap()
                .values()
                .find(|r| {
                    r.automation_id == automation_id
                        && r.subscriber_id == subscriber_id
                        && r.trigger_event_id == trigger_event_id
                })
                .cloned())
        }

        async fn find_due(
            &self,
            before: dripline_domain::time::Timestamp,
            limit: usize,
        ) -> Result<Vec<Run>, DriplineError> {
            let mut due: Vec<Run> = self
                .store
                .lock()
                .unwrap()
                .values()
                .filter(|r| {
                    r.status == RunStatus::Suspended && r.resume_at.is_some_and(|at| at <= before)
                })
                .cloned()
                .collect();
            due.sort_by_key(|r| r.resume_at);
            due.truncate(limit);
            Ok(due)
        }
    }

    // ── In-memory execution log ────────────────────────────────────

    #[derive(Default)]
    struct InMemoryLog {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl InMemoryLog {
        fn entries(&self) -> Vec<LogEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl ExecutionLog for InMemoryLog {
        async fn append(&self, entry: LogEntry) -> Result<LogEntry, DriplineError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(entry)
        }

        async fn find_by_run(
            &self,
            run_id: RunId,
        ) -> Result<Vec<LogEntry>, DriplineError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.run_id == run_id)
                .cloned()
                .collect())
        }

        async fn find_by_automation(
            &self,
            automation_id: AutomationId,
            limit: usize,
        ) -> Result<Vec<LogEntry>, DriplineError> {
            let mut entries: Vec<LogEntry> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.automation_id == automation_id)
                .cloned()
                .collect();
            entries.reverse();
            entries.truncate(limit);
            Ok(entries)
        }

        async fn find_by_subscriber(
            &self,
            subscriber_id: SubscriberId,
            limit: usize,
        ) -> Result<Vec<LogEntry>, DriplineError> {
            let mut entries: Vec<LogEntry> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.subscriber_id == subscriber_id)
                .cloned()
                .collect();
            entries.reverse();
            entries.truncate(limit);
            Ok(entries)
        }
    }

    // ── Scripted collaborators ─────────────────────────────────────

    #[derive(Default)]
    struct ScriptedMailer {
        failures: Mutex<VecDeque<ActionError>>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedMailer {
        fn fail_next(&self, errors: Vec<ActionError>) {
            self.failures.lock().unwrap().extend(errors);
        }
    }

    impl Mailer for ScriptedMailer {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<Value, ActionError> {
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.sent.lock().unwrap().push(to.to_string());
            Ok(json!({"message_id": "m-1"}))
        }
    }

    #[derive(Default)]
    struct FakeTags {
        tags: Mutex<Vec<String>>,
    }

    impl TagStore for FakeTags {
        async fn add_tag(&self, _subscriber_id: SubscriberId, tag: &str) -> Result<(), ActionError> {
            self.tags.lock().unwrap().push(tag.to_string());
            Ok(())
        }

        async fn remove_tag(
            &self,
            _subscriber_id: SubscriberId,
            tag: &str,
        ) -> Result<(), ActionError> {
            self.tags.lock().unwrap().retain(|t| t != tag);
            Ok(())
        }
    }

    struct NullHooks;

    impl WebhookSink for NullHooks {
        async fn deliver(&self, _url: &str, _payload: &Value) -> Result<(), ActionError> {
            Ok(())
        }
    }

    // ── Harness ────────────────────────────────────────────────────

    type TestExecutor = RunExecutor<
        Arc<InMemoryAutomations>,
        Arc<InMemoryRuns>,
        Arc<InMemoryLog>,
        Arc<ScriptedMailer>,
        Arc<FakeTags>,
        Arc<NullHooks>,
    >;

    struct Harness {
        automations: Arc<InMemoryAutomations>,
        runs: Arc<InMemoryRuns>,
        log: Arc<InMemoryLog>,
        mailer: Arc<ScriptedMailer>,
        tags: Arc<FakeTags>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                automations: Arc::new(InMemoryAutomations::default()),
                runs: Arc::new(InMemoryRuns::default()),
                log: Arc::new(InMemoryLog::default()),
                mailer: Arc::new(ScriptedMailer::default()),
                tags: Arc::new(FakeTags::default()),
            }
        }

        /// Build an executor over the shared stores. Zero backoff so retry
        /// tests stay fast; calling this twice simulates a process restart.
        fn executor(&self) -> TestExecutor {
            let dispatcher = ActionDispatcher::new(
                Arc::clone(&self.mailer),
                Arc::clone(&self.tags),
                Arc::new(NullHooks),
            );
            RunExecutor::new(
                Arc::clone(&self.automations),
                Arc::clone(&self.runs),
                Arc::clone(&self.log),
                dispatcher,
            )
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
            })
        }
    }

    // ── Graph fixtures ─────────────────────────────────────────────

    fn tag_node(id: &str, tag: &str, next: Option<&str>) -> Node {
        Node {
            id: NodeId::from(id),
            label: String::new(),
            kind: NodeKind::Action {
                action: Action::AddTag {
                    tag: tag.to_string(),
                },
                next: next.map(NodeId::from),
            },
        }
    }

    fn email_node(id: &str, next: Option<&str>) -> Node {
        Node {
            id: NodeId::from(id),
            label: String::new(),
            kind: NodeKind::Action {
                action: Action::SendEmail {
                    subject: "Welcome".to_string(),
                    body: "Hi".to_string(),
                },
                next: next.map(NodeId::from),
            },
        }
    }

    fn country_gate(id: &str, on_true: Option<&str>, on_false: Option<&str>) -> Node {
        Node {
            id: NodeId::from(id),
            label: String::new(),
            kind: NodeKind::Condition {
                predicate: Predicate {
                    field: "country".to_string(),
                    op: CompareOp::Eq,
                    value: json!("US"),
                },
                on_true: on_true.map(NodeId::from),
                on_false: on_false.map(NodeId::from),
            },
        }
    }

    fn delay_node(id: &str, seconds: u64, next: Option<&str>) -> Node {
        Node {
            id: NodeId::from(id),
            label: String::new(),
            kind: NodeKind::Delay {
                seconds,
                next: next.map(NodeId::from),
            },
        }
    }

    /// The branching fixture from the reporting examples: a country gate
    /// tagging US leads one way and everyone else another.
    fn lead_router() -> Automation {
        Automation::builder()
            .name("Lead router")
            .trigger(Trigger::on(EventType::NewLead))
            .node(country_gate("gate", Some("tag-us"), Some("tag-intl")))
            .node(tag_node("tag-us", "us-lead", None))
            .node(tag_node("tag-intl", "intl-lead", None))
            .build()
            .unwrap()
    }

    fn new_lead_event(country: &str) -> Event {
        Event::new(
            EventType::NewLead,
            Some(SubscriberId::new()),
            json!({"country": country, "email": "lead@example.com"}),
        )
    }

    fn entry_summary(entries: &[LogEntry]) -> Vec<(String, StepStatus, u32)> {
        entries
            .iter()
            .map(|e| (e.node_id.to_string(), e.status, e.attempt))
            .collect()
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_follow_true_branch_and_skip_the_other() {
        let harness = Harness::new();
        let automation = lead_router();
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        let run = outcome.run();
        assert_eq!(run.status, RunStatus::Completed);

        let entries = harness.log.entries();
        assert_eq!(
            entry_summary(&entries),
            vec![
                ("gate".to_string(), StepStatus::Success, 1),
                ("tag-us".to_string(), StepStatus::Success, 1),
            ]
        );
        assert_eq!(entries[0].output, json!(true));
        assert_eq!(harness.tags.tags.lock().unwrap().as_slice(), ["us-lead"]);
    }

    #[tokio::test]
    async fn should_follow_false_branch_for_non_matching_context() {
        let harness = Harness::new();
        let automation = lead_router();
        let event = new_lead_event("DE");

        harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        let entries = harness.log.entries();
        assert_eq!(entries[0].output, json!(false));
        assert_eq!(entries[1].node_id.as_str(), "tag-intl");
        assert_eq!(harness.tags.tags.lock().unwrap().as_slice(), ["intl-lead"]);
    }

    #[tokio::test]
    async fn should_complete_at_dead_end_when_branch_target_is_absent() {
        let harness = Harness::new();
        let automation = Automation::builder()
            .name("Half gate")
            .trigger(Trigger::on(EventType::NewLead))
            .node(country_gate("gate", Some("tag-us"), None))
            .node(tag_node("tag-us", "us-lead", None))
            .build()
            .unwrap();
        let event = new_lead_event("DE");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Completed);
        assert_eq!(harness.log.entries().len(), 1);
        assert!(harness.tags.tags.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_ignore_redelivered_event_for_same_subscriber() {
        let harness = Harness::new();
        let automation = lead_router();
        let event = new_lead_event("US");
        let subscriber = event.resolve_subscriber().unwrap();

        let executor = harness.executor();
        let first = executor.start(&automation, subscriber, &event).await.unwrap();
        assert!(!first.is_duplicate());
        let entries_before = harness.log.entries().len();

        let second = executor.start(&automation, subscriber, &event).await.unwrap();
        assert!(second.is_duplicate());
        assert_eq!(second.run().id, first.run().id);
        assert_eq!(harness.log.entries().len(), entries_before);
    }

    #[tokio::test]
    async fn should_start_separate_runs_for_distinct_events() {
        let harness = Harness::new();
        let automation = lead_router();
        let subscriber = SubscriberId::new();

        let executor = harness.executor();
        let payload = json!({"country": "US"});
        let first = Event::new(EventType::NewLead, Some(subscriber), payload.clone());
        let second = Event::new(EventType::NewLead, Some(subscriber), payload);

        let a = executor.start(&automation, subscriber, &first).await.unwrap();
        let b = executor.start(&automation, subscriber, &second).await.unwrap();
        assert!(!b.is_duplicate());
        assert_ne!(a.run().id, b.run().id);
    }

    #[tokio::test]
    async fn should_log_each_retry_attempt_before_succeeding() {
        let harness = Harness::new();
        harness
            .mailer
            .fail_next(vec![ActionError::Transient("smtp timeout".to_string())]);

        let automation = Automation::builder()
            .name("Welcome email")
            .trigger(Trigger::on(EventType::NewLead))
            .node(email_node("send", None))
            .build()
            .unwrap();
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Completed);
        let entries = harness.log.entries();
        assert_eq!(
            entry_summary(&entries),
            vec![
                ("send".to_string(), StepStatus::Failure, 1),
                ("send".to_string(), StepStatus::Success, 2),
            ]
        );
        assert_eq!(entries[0].output, json!({"error": "transient action failure: smtp timeout"}));
    }

    #[tokio::test]
    async fn should_fail_run_after_exhausting_retries() {
        let harness = Harness::new();
        harness.mailer.fail_next(vec![
            ActionError::CollaboratorUnavailable("relay down".to_string()),
            ActionError::CollaboratorUnavailable("relay down".to_string()),
            ActionError::CollaboratorUnavailable("relay down".to_string()),
        ]);

        let automation = Automation::builder()
            .name("Welcome email")
            .trigger(Trigger::on(EventType::NewLead))
            .node(email_node("send", Some("tag")))
            .node(tag_node("tag", "welcomed", None))
            .build()
            .unwrap();
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Failed);

        // Three attempts for `send`, nothing for the node after it.
        let entries = harness.log.entries();
        assert_eq!(
            entry_summary(&entries),
            vec![
                ("send".to_string(), StepStatus::Failure, 1),
                ("send".to_string(), StepStatus::Failure, 2),
                ("send".to_string(), StepStatus::Failure, 3),
            ]
        );
        assert!(harness.tags.tags.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_not_retry_invalid_params() {
        let harness = Harness::new();
        let automation = Automation::builder()
            .name("Welcome email")
            .trigger(Trigger::on(EventType::NewLead))
            .node(email_node("send", None))
            .build()
            .unwrap();
        // No `email` field in the payload: InvalidParams, fatal on attempt 1.
        let event = Event::new(
            EventType::NewLead,
            Some(SubscriberId::new()),
            json!({"country": "US"}),
        );

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Failed);
        let entries = harness.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempt, 1);
        assert_eq!(entries[0].status, StepStatus::Failure);
    }

    #[tokio::test]
    async fn should_merge_action_output_into_context_for_later_nodes() {
        let harness = Harness::new();
        // Gate on the tag output of the first node.
        let automation = Automation::builder()
            .name("Tag then gate")
            .trigger(Trigger::on(EventType::NewLead))
            .node(tag_node("tag", "vip", Some("gate")))
            .node(Node {
                id: NodeId::from("gate"),
                label: String::new(),
                kind: NodeKind::Condition {
                    predicate: Predicate {
                        field: "tagged".to_string(),
                        op: CompareOp::Eq,
                        value: json!(true),
                    },
                    on_true: Some(NodeId::from("after")),
                    on_false: None,
                },
            })
            .node(tag_node("after", "seen-gate", None))
            .build()
            .unwrap();
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Completed);
        assert!(
            harness
                .tags
                .tags
                .lock()
                .unwrap()
                .contains(&"seen-gate".to_string())
        );
    }

    #[tokio::test]
    async fn should_suspend_at_delay_and_resume_after_restart() {
        let harness = Harness::new();
        let automation = Automation::builder()
            .name("Wait then tag")
            .trigger(Trigger::on(EventType::NewLead))
            .node(tag_node("first", "arrived", Some("wait")))
            .node(delay_node("wait", 0, Some("second")))
            .node(tag_node("second", "waited", None))
            .build()
            .unwrap();
        harness.automations.insert(automation.clone());
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        let run = outcome.run();
        assert_eq!(run.status, RunStatus::Suspended);
        assert_eq!(run.cursor.as_ref().unwrap().as_str(), "second");
        assert!(run.resume_at.is_some());
        assert_eq!(
            harness.tags.tags.lock().unwrap().as_slice(),
            ["arrived"],
            "nodes after the delay must not run yet"
        );

        // Simulated restart: a brand-new executor over the same stores.
        let resumed = harness.executor().resume(run.id).await.unwrap();
        assert_eq!(resumed.status, RunStatus::Completed);
        assert_eq!(
            harness.tags.tags.lock().unwrap().as_slice(),
            ["arrived", "waited"]
        );

        // The delay logged once; the run continued from `second`, not `first`.
        let entries = harness.log.entries();
        assert_eq!(
            entry_summary(&entries),
            vec![
                ("first".to_string(), StepStatus::Success, 1),
                ("wait".to_string(), StepStatus::Success, 1),
                ("second".to_string(), StepStatus::Success, 1),
            ]
        );
    }

    #[tokio::test]
    async fn should_treat_resume_of_completed_run_as_noop() {
        let harness = Harness::new();
        let automation = lead_router();
        harness.automations.insert(automation.clone());
        let event = new_lead_event("US");

        let executor = harness.executor();
        let outcome = executor
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();
        let entries_before = harness.log.entries().len();

        let resumed = executor.resume(outcome.run().id).await.unwrap();
        assert_eq!(resumed.status, RunStatus::Completed);
        assert_eq!(harness.log.entries().len(), entries_before);
    }

    #[tokio::test]
    async fn should_fail_suspended_run_when_automation_was_deleted() {
        let harness = Harness::new();
        let automation = Automation::builder()
            .name("Wait then tag")
            .trigger(Trigger::on(EventType::NewLead))
            .node(delay_node("wait", 0, Some("tag")))
            .node(tag_node("tag", "waited", None))
            .build()
            .unwrap();
        harness.automations.insert(automation.clone());
        let event = new_lead_event("US");

        let executor = harness.executor();
        let outcome = executor
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();
        assert_eq!(outcome.run().status, RunStatus::Suspended);

        harness.automations.remove(automation.id);

        let resumed = executor.resume(outcome.run().id).await.unwrap();
        assert_eq!(resumed.status, RunStatus::Failed);

        let entries = harness.log.entries();
        let last = entries.last().unwrap();
        assert_eq!(last.status, StepStatus::Failure);
        assert!(
            last.output["error"]
                .as_str()
                .unwrap()
                .contains("automation no longer exists")
        );
        assert!(harness.tags.tags.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_resume_in_flight_run_of_disabled_automation() {
        let harness = Harness::new();
        let mut automation = Automation::builder()
            .name("Wait then tag")
            .trigger(Trigger::on(EventType::NewLead))
            .node(delay_node("wait", 0, Some("tag")))
            .node(tag_node("tag", "waited", None))
            .build()
            .unwrap();
        harness.automations.insert(automation.clone());
        let event = new_lead_event("US");

        let executor = harness.executor();
        let outcome = executor
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        // Disabling blocks new runs, not runs already in flight.
        automation.enabled = false;
        harness.automations.insert(automation);

        let resumed = executor.resume(outcome.run().id).await.unwrap();
        assert_eq!(resumed.status, RunStatus::Completed);
        assert_eq!(harness.tags.tags.lock().unwrap().as_slice(), ["waited"]);
    }

    #[tokio::test]
    async fn should_fail_run_on_dangling_node_reference() {
        let harness = Harness::new();
        // Assembled by hand to sneak past save-time validation, the way a
        // corrupted row would.
        let automation = Automation {
            id: AutomationId::new(),
            name: "Corrupted".to_string(),
            enabled: true,
            trigger: Trigger::on(EventType::NewLead),
            nodes: vec![tag_node("a", "x", Some("ghost"))],
        };
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Failed);
        let entries = harness.log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].node_id.as_str(), "ghost");
        assert_eq!(entries[1].status, StepStatus::Failure);
        assert!(
            entries[1].output["error"]
                .as_str()
                .unwrap()
                .contains("unknown node")
        );
    }

    #[tokio::test]
    async fn should_fail_run_when_visit_budget_suspects_a_cycle() {
        let harness = Harness::new();
        let automation = Automation {
            id: AutomationId::new(),
            name: "Looped".to_string(),
            enabled: true,
            trigger: Trigger::on(EventType::NewLead),
            nodes: vec![tag_node("a", "x", Some("b")), tag_node("b", "y", Some("a"))],
        };
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Failed);
        let entries = harness.log.entries();
        // Budget is nodes × factor; the entry after the budget reports the cycle.
        assert_eq!(entries.len(), 2 * VISIT_BUDGET_FACTOR + 1);
        let last = entries.last().unwrap();
        assert_eq!(last.status, StepStatus::Failure);
        assert!(last.output["error"].as_str().unwrap().contains("cycle suspected"));
    }

    #[tokio::test]
    async fn should_fail_run_on_malformed_condition_literal() {
        let harness = Harness::new();
        let automation = Automation::builder()
            .name("Bad gate")
            .trigger(Trigger::on(EventType::NewLead))
            .node(Node {
                id: NodeId::from("gate"),
                label: String::new(),
                kind: NodeKind::Condition {
                    predicate: Predicate {
                        field: "opens".to_string(),
                        op: CompareOp::Gt,
                        value: json!("not-a-number"),
                    },
                    on_true: Some(NodeId::from("tag")),
                    on_false: None,
                },
            })
            .node(tag_node("tag", "active", None))
            .build()
            .unwrap();
        let event = Event::new(
            EventType::NewLead,
            Some(SubscriberId::new()),
            json!({"opens": 9}),
        );

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Failed);
        let entries = harness.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, StepStatus::Failure);
        assert!(harness.tags.tags.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_complete_delay_without_successor() {
        let harness = Harness::new();
        let automation = Automation::builder()
            .name("Trailing wait")
            .trigger(Trigger::on(EventType::NewLead))
            .node(delay_node("wait", 60, None))
            .build()
            .unwrap();
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Completed);
        assert!(outcome.run().resume_at.is_none());
    }

    #[tokio::test]
    async fn should_cap_backoff_at_max_delay() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(9), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn should_bound_terminating_runs_by_node_count() {
        // Straight line of N action nodes: exactly N log entries, N visits.
        let harness = Harness::new();
        let automation = Automation::builder()
            .name("Straight line")
            .trigger(Trigger::on(EventType::NewLead))
            .node(tag_node("n1", "t1", Some("n2")))
            .node(tag_node("n2", "t2", Some("n3")))
            .node(tag_node("n3", "t3", None))
            .build()
            .unwrap();
        let event = new_lead_event("US");

        let outcome = harness
            .executor()
            .start(&automation, event.resolve_subscriber().unwrap(), &event)
            .await
            .unwrap();

        assert_eq!(outcome.run().status, RunStatus::Completed);
        assert_eq!(harness.log.entries().len(), automation.nodes.len());
    }
}
