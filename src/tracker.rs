// src/tracker.rs
//! Public tracker facade
//!
//! A [`Tracker`] owns one session buffer, one handle on the durable store and
//! one binding to its host. It is cheap to clone; clones share all state.
//!
//! Every operation is best-effort: storage failures are logged and swallowed
//! so that tracking never breaks the host application.
//!
//! ```no_run
//! use std::sync::Arc;
//! use telemetry_buffer::{InitOptions, LocalHost, MemoryStore, Tracker, UserInfo, Event};
//!
//! # async fn run() {
//! let host = Arc::new(LocalHost::new());
//! let tracker = Tracker::builder(Arc::new(MemoryStore::new()), host.clone()).build();
//!
//! tracker.init(
//!     |_info: UserInfo, events: Vec<Event>| async move {
//!         println!("sending {} events", events.len());
//!         anyhow::Ok(())
//!     },
//!     InitOptions::with_max_events_limit_until_submit(150),
//! );
//!
//! tracker.record("ButtonClicked", Some("HomePage"), None);
//! host.notify_unload(); // commits the session
//! # }
//! ```

use crate::recording::event::{Event, Fields, SessionMarker};
use crate::recording::persistence::EventPersistence;
use crate::recording::recorder::{Clock, EventRecorder, SystemClock};
use crate::recording::storage::KeyValueStore;
use crate::runtime::environment::{HostEnvironment, SystemEnvironment, UserInfo};
use crate::runtime::host::{HostLifecycle, Visibility};
use crate::runtime::scheduler::{
    InitOptions, SchedulerState, SubmissionHandle, SubmissionScheduler, Submitter,
};
use crate::runtime::session::{Registration, SessionHooks};
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// What `init` found and did
#[derive(Debug)]
pub struct InitReport {
    /// Persisted backlog size at init time
    pub backlog: usize,

    /// Threshold the backlog was compared against
    pub threshold: usize,

    /// Scheduled submission, if the backlog exceeded the threshold
    pub submission: Option<SubmissionHandle>,
}

impl InitReport {
    pub fn is_scheduled(&self) -> bool {
        self.submission.is_some()
    }
}

/// Builder for [`Tracker`]
pub struct TrackerBuilder {
    store: Arc<dyn KeyValueStore>,
    host: Arc<dyn HostLifecycle>,
    environment: Arc<dyn HostEnvironment>,
    clock: Arc<dyn Clock>,
}

impl TrackerBuilder {
    /// Environment metadata source (default: [`SystemEnvironment`])
    pub fn environment(mut self, environment: Arc<dyn HostEnvironment>) -> Self {
        self.environment = environment;
        self
    }

    /// Timestamp source (default: [`SystemClock`])
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Tracker {
        let persistence = EventPersistence::new(self.store);
        let scheduler = SubmissionScheduler::new(persistence.clone(), Arc::clone(&self.environment));

        Tracker {
            inner: Arc::new(TrackerInner {
                recorder: EventRecorder::with_clock(self.clock),
                persistence,
                scheduler,
                host: self.host,
                environment: self.environment,
                registration: Mutex::new(None),
            }),
        }
    }
}

/// Session event tracker
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    recorder: EventRecorder,
    persistence: EventPersistence,
    scheduler: SubmissionScheduler,
    host: Arc<dyn HostLifecycle>,
    environment: Arc<dyn HostEnvironment>,
    registration: Mutex<Option<Registration>>,
}

impl TrackerInner {
    fn commit(&self) -> Result<usize> {
        self.persistence.commit(&self.recorder)
    }
}

impl SessionHooks for TrackerInner {
    fn on_unload(&self) {
        if let Err(e) = self.commit() {
            warn!("Failed to commit session on unload: {}", e);
        }
    }

    fn on_visibility_change(&self, visibility: Visibility) {
        let marker = match visibility {
            Visibility::Hidden => SessionMarker::Hidden,
            Visibility::Visible => SessionMarker::Visible,
        };
        self.recorder.record_marker(marker);
    }
}

impl Tracker {
    /// Start building a tracker over `store`, bound to `host`
    pub fn builder(store: Arc<dyn KeyValueStore>, host: Arc<dyn HostLifecycle>) -> TrackerBuilder {
        TrackerBuilder {
            store,
            host,
            environment: Arc::new(SystemEnvironment),
            clock: Arc::new(SystemClock),
        }
    }

    /// Start a session.
    ///
    /// Binds unload (commit) and visibility (`Hidden` / `Visible`) handlers to
    /// the host, records `StartSession`, and schedules a submission of the
    /// persisted backlog if it exceeds the threshold. Calling `init` again
    /// replaces the previous bindings instead of stacking them, and starts a
    /// new session.
    pub fn init<S: Submitter>(&self, submitter: S, options: InitOptions) -> InitReport {
        {
            let mut registration = self.inner.registration.lock();
            if let Some(previous) = registration.take() {
                previous.detach(self.inner.host.as_ref());
            }
            *registration = Some(Registration::attach(self.inner.host.as_ref(), &self.inner));
        }

        self.inner.recorder.record_marker(SessionMarker::StartSession);

        let saved = self.inner.persistence.saved_events();
        let backlog = saved.len();
        let threshold = options.threshold();
        let submission = self
            .inner
            .scheduler
            .schedule_if_needed(saved, threshold, Arc::new(submitter));

        info!(
            backlog,
            threshold,
            scheduled = submission.is_some(),
            "Telemetry session started"
        );

        InitReport {
            backlog,
            threshold,
            submission,
        }
    }

    /// Record an event in the session buffer
    pub fn record(&self, name: &str, context: Option<&str>, extra: Option<Fields>) {
        self.inner.recorder.record(name, context, extra);
    }

    /// End the session and append the buffer to the persisted queue.
    ///
    /// Failures are logged; the buffer is kept so a later commit can retry.
    pub fn commit(&self) {
        if let Err(e) = self.inner.commit() {
            warn!("Failed to commit session events: {}", e);
        }
    }

    /// Like [`Tracker::commit`], but reports the new persisted queue length
    /// or the storage error
    pub fn try_commit(&self) -> Result<usize> {
        self.inner.commit()
    }

    /// Snapshot of the session buffer
    pub fn events(&self) -> Vec<Event> {
        self.inner.recorder.events()
    }

    /// Empty the session buffer
    pub fn clear_events(&self) {
        self.inner.recorder.clear_events();
    }

    /// Events in the persisted queue
    pub fn saved_events(&self) -> Vec<Event> {
        self.inner.persistence.saved_events()
    }

    /// Remove the persisted queue
    pub fn delete_saved_events(&self) {
        if let Err(e) = self.inner.persistence.delete_saved_events() {
            warn!("Failed to delete saved events: {}", e);
        }
    }

    /// Environment metadata sent with submissions
    pub fn user_info(&self) -> UserInfo {
        self.inner.environment.user_info()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.scheduler.state()
    }

    /// Whether host bindings are currently attached
    pub fn is_attached(&self) -> bool {
        self.inner.registration.lock().is_some()
    }

    /// Detach the host bindings. The buffer and persisted queue are untouched.
    pub fn dispose(&self) {
        if let Some(registration) = self.inner.registration.lock().take() {
            registration.detach(self.inner.host.as_ref());
        }
    }
}
