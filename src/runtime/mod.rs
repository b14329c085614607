// src/runtime/mod.rs
//! Session runtime
//!
//! This module binds the recorder to its host and drives submission:
//!
//! - **Host**: unload and visibility notifications (`HostLifecycle`, `LocalHost`)
//! - **Environment**: language / platform / user agent metadata
//! - **Session**: registration of lifecycle hooks, detachable
//! - **Scheduler**: threshold check and delayed submission of the backlog
//!
//! # Architecture
//!
//! ```text
//!   init() ─┬─ Registration::attach ── unload → commit()
//!           │                        └─ visibility → record(Hidden|Visible)
//!           ├─ record(StartSession)
//!           └─ SubmissionScheduler ── backlog > threshold?
//!                                        ↓ after 3s
//!                                   submitter(user_info, backlog)
//!                                        ↓ Ok
//!                                   delete persisted queue
//! ```

pub mod environment;
pub mod host;
pub mod scheduler;
pub mod session;

// Re-export commonly used types
pub use environment::{HostEnvironment, StaticEnvironment, SystemEnvironment, UserInfo};
pub use host::{HostLifecycle, ListenerId, LocalHost, Visibility};
pub use scheduler::{
    InitOptions, SchedulerState, SubmissionHandle, SubmissionOutcome, SubmissionScheduler, Submitter,
    DEFAULT_MAX_EVENTS_LIMIT_UNTIL_SUBMIT, SUBMIT_DELAY,
};
pub use session::{Registration, SessionHooks};
