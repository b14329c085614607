// src/runtime/scheduler.rs
//! Backlog submission scheduler
//!
//! On every `init` the persisted backlog is compared against the configured
//! threshold. When it is strictly larger, the scheduler moves from `Idle` to
//! `PendingSubmit` and spawns a task that waits [`SUBMIT_DELAY`], hands the
//! backlog snapshot to the caller's [`Submitter`], and purges the persisted
//! queue if the submission succeeds.
//!
//! Delivery is at-most-once per schedule: a failed submission is logged and
//! not retried, the persisted queue is left for a later `init`.
//!
//! ```text
//!            backlog > threshold
//!   Idle ─────────────────────────→ PendingSubmit
//!    ↑                                   │ sleep(3s)
//!    │                                   ↓
//!    └──── purge on Ok / keep on Err ── submit(user_info, snapshot)
//! ```

use crate::recording::event::Event;
use crate::recording::persistence::EventPersistence;
use crate::runtime::environment::{HostEnvironment, UserInfo};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Backlog size above which a submission is scheduled, unless overridden
pub const DEFAULT_MAX_EVENTS_LIMIT_UNTIL_SUBMIT: usize = 100;

/// Delay between scheduling and invoking the submitter
pub const SUBMIT_DELAY: Duration = Duration::from_secs(3);

/// Options accepted by `init`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOptions {
    /// Backlog threshold; `None` or `0` selects the default of 100
    #[serde(default)]
    pub max_events_limit_until_submit: Option<usize>,
}

impl InitOptions {
    pub fn with_max_events_limit_until_submit(limit: usize) -> Self {
        Self {
            max_events_limit_until_submit: Some(limit),
        }
    }

    /// Effective threshold
    pub fn threshold(&self) -> usize {
        match self.max_events_limit_until_submit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_MAX_EVENTS_LIMIT_UNTIL_SUBMIT,
        }
    }
}

/// Caller-supplied transport for submitted events
///
/// Implemented for any `Fn(UserInfo, Vec<Event>) -> impl Future<Output = anyhow::Result<()>>`.
pub trait Submitter: Send + Sync + 'static {
    fn submit(&self, user_info: UserInfo, events: Vec<Event>) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> Submitter for F
where
    F: Fn(UserInfo, Vec<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn submit(&self, user_info: UserInfo, events: Vec<Event>) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(self(user_info, events))
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    PendingSubmit,
}

/// Result of a scheduled submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The submitter accepted the events and the persisted queue was purged
    Submitted { events: usize },

    /// The submitter failed; the persisted queue was kept
    Rejected { reason: String },
}

/// Handle to a scheduled submission.
///
/// The submission cannot be cancelled through this handle; it only allows
/// observing the outcome.
#[derive(Debug)]
pub struct SubmissionHandle {
    task: JoinHandle<SubmissionOutcome>,
}

impl SubmissionHandle {
    /// Wait for the submission to finish. `None` if the task panicked or
    /// its runtime shut down first.
    pub async fn outcome(self) -> Option<SubmissionOutcome> {
        self.task.await.ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Returns the scheduler to `Idle` when the submission task ends, even by panic
struct PendingGuard(Arc<Mutex<SchedulerState>>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        *self.0.lock() = SchedulerState::Idle;
    }
}

/// Decides when the persisted backlog is handed to the submitter
#[derive(Clone)]
pub struct SubmissionScheduler {
    state: Arc<Mutex<SchedulerState>>,
    persistence: EventPersistence,
    environment: Arc<dyn HostEnvironment>,
}

impl SubmissionScheduler {
    pub fn new(persistence: EventPersistence, environment: Arc<dyn HostEnvironment>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            persistence,
            environment,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Strict threshold check
    pub fn exceeds_threshold(backlog: usize, threshold: usize) -> bool {
        backlog > threshold
    }

    /// Schedule a submission of `saved` if it exceeds `threshold`.
    ///
    /// `saved` is the snapshot handed to the submitter; events committed after
    /// this call are not part of it. Returns `None` when nothing was scheduled:
    /// backlog within threshold, a submission already pending, or no tokio
    /// runtime available.
    pub fn schedule_if_needed(
        &self,
        saved: Vec<Event>,
        threshold: usize,
        submitter: Arc<dyn Submitter>,
    ) -> Option<SubmissionHandle> {
        let backlog = saved.len();
        if !Self::exceeds_threshold(backlog, threshold) {
            debug!(backlog, threshold, "Backlog within threshold");
            return None;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(backlog, "No async runtime available, submission skipped");
                return None;
            }
        };

        {
            let mut state = self.state.lock();
            if *state == SchedulerState::PendingSubmit {
                debug!(backlog, "Submission already pending");
                return None;
            }
            *state = SchedulerState::PendingSubmit;
        }

        info!(
            backlog,
            threshold,
            "Scheduling submission in {}s",
            SUBMIT_DELAY.as_secs()
        );

        let guard = PendingGuard(Arc::clone(&self.state));
        let persistence = self.persistence.clone();
        let environment = Arc::clone(&self.environment);

        let task = runtime.spawn(async move {
            let _guard = guard;
            tokio::time::sleep(SUBMIT_DELAY).await;

            let user_info = environment.user_info();
            match submitter.submit(user_info, saved).await {
                Ok(()) => {
                    if let Err(e) = persistence.delete_saved_events() {
                        warn!("Submitted events could not be purged: {}", e);
                    }
                    metrics::counter!("telemetry_submissions_total", "outcome" => "success")
                        .increment(1);
                    info!(events = backlog, "Submitted persisted events");
                    SubmissionOutcome::Submitted { events: backlog }
                }
                Err(e) => {
                    metrics::counter!("telemetry_submissions_total", "outcome" => "rejected")
                        .increment(1);
                    warn!("Submission failed, keeping persisted events: {:#}", e);
                    SubmissionOutcome::Rejected {
                        reason: e.to_string(),
                    }
                }
            }
        });

        Some(SubmissionHandle { task })
    }
}
