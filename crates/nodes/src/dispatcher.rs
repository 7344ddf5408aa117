//! Top-level orchestrator: routes triggers to handlers and runs them in the
//! background.
//!
//! The registry is frozen when the dispatcher is built. Accepted runs are
//! spawned onto the tokio runtime so the inbound request can be acknowledged
//! immediately. Two limits apply to spawned runs:
//!
//! - at most `max_concurrent_runs` execute at once (a semaphore), and
//! - runs for the same issue execute one at a time, so a second `need_prd`
//!   sees the PRD posted by the first instead of racing it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use pipeline::{
    BotConfig, Command, CommandRouter, EventContext, IssueKey, RunId, TrackerConnector, Trigger,
    TriggerSink,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use crate::handler::{CommandHandler, RunError, RunOutcome};

/// Maps commands to handlers. Consumed by [`Dispatcher::new`].
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<Command, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `command`, replacing any earlier registration.
    pub fn register(mut self, command: Command, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(command, handler);
        self
    }
}

/// Cloneable handle; clones share the registry, pool, and per-issue locks.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    router: CommandRouter,
    connector: Arc<dyn TrackerConnector>,
    handlers: HashMap<Command, Arc<dyn CommandHandler>>,
    permits: Arc<Semaphore>,
    issue_locks: Mutex<HashMap<IssueKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl Dispatcher {
    pub fn new(
        config: &BotConfig,
        connector: Arc<dyn TrackerConnector>,
        registry: CommandRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                router: CommandRouter::new(config),
                connector,
                handlers: registry.handlers,
                permits: Arc::new(Semaphore::new(config.max_concurrent_runs())),
                issue_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Routes `trigger` and, when it names a registered command, spawns the run.
    ///
    /// Returns immediately. `None` means the trigger was dropped (not addressed
    /// to the bot, or an unknown command); that is logged, never reported.
    pub fn accept(&self, trigger: Trigger) -> Option<JoinHandle<Result<RunOutcome, RunError>>> {
        let kind = trigger.kind();
        let Some(command) = self.inner.router.route(&trigger) else {
            debug!(
                trigger = kind,
                issue = %trigger.context().issue_key(),
                "ignoring trigger"
            );
            return None;
        };
        if !self.inner.handlers.contains_key(&command) {
            debug!(%command, "ignoring command without a registered handler");
            return None;
        }

        let context = trigger.into_context();
        let run_id = RunId::new_random();
        let span = info_span!(
            "run",
            %run_id,
            %command,
            trigger = kind,
            repository = %context.repository.full_name(),
            issue = %context.issue.number,
        );
        info!(parent: &span, "accepted trigger");

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(
            async move {
                let result = inner.run_serialized(command, &context).await;
                match &result {
                    Ok(outcome) => info!(?outcome, "run finished"),
                    Err(err) => error!(error = %err, "run failed"),
                }
                result
            }
            .instrument(span),
        );
        Some(handle)
    }

    /// Runs `command` for `context` on the current task and waits for it.
    ///
    /// Subject to the same pool and per-issue limits as spawned runs.
    pub async fn run(
        &self,
        command: Command,
        context: &EventContext,
    ) -> Result<RunOutcome, RunError> {
        let span = info_span!(
            "run",
            run_id = %RunId::new_random(),
            %command,
            trigger = "direct",
            repository = %context.repository.full_name(),
            issue = %context.issue.number,
        );
        self.inner
            .run_serialized(command, context)
            .instrument(span)
            .await
    }
}

impl TriggerSink for Dispatcher {
    fn submit(&self, trigger: Trigger) {
        // The run reports its own outcome; nothing waits on the handle.
        let _ = self.accept(trigger);
    }
}

impl Inner {
    async fn run_serialized(
        &self,
        command: Command,
        context: &EventContext,
    ) -> Result<RunOutcome, RunError> {
        let handler = self
            .handlers
            .get(&command)
            .cloned()
            .ok_or(RunError::NoHandler(command))?;

        let lease = self.lease_issue_lock(context.issue_key());
        // Issue lock first: a run queued behind another on the same issue
        // must not hold a pool permit while it waits.
        let _serialized = lease.lock.lock().await;
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RunError::ShuttingDown)?;
        let tracker = self
            .connector
            .connect(context.installation, &context.repository)
            .await?;
        handler.handle(context, tracker).await
    }

    fn lease_issue_lock(&self, key: IssueKey) -> IssueLockLease<'_> {
        let lock = self.issue_lock(&key);
        IssueLockLease {
            inner: self,
            key,
            lock,
        }
    }

    fn issue_lock(&self, key: &IssueKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .issue_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    #[cfg(test)]
    fn tracked_issues(&self) -> usize {
        self.issue_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// One run's claim on an issue lock. Dropping it (including while unwinding
/// from a panicking handler) removes the map entry once it is unused.
struct IssueLockLease<'a> {
    inner: &'a Inner,
    key: IssueKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for IssueLockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .inner
            .issue_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Unused when only the map and this lease still reference it.
        if locks.get(&self.key).is_some_and(|entry| {
            Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(entry) == 2
        }) {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
