// tests/session_lifecycle.rs
//! End-to-end session lifecycle over a durable SQLite store

use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use telemetry_buffer::recording::ManualClock;
use telemetry_buffer::runtime::{StaticEnvironment, SUBMIT_DELAY};
use telemetry_buffer::{
    Event, Fields, InitOptions, LocalHost, SqliteStore, SubmissionOutcome, Tracker, UserInfo,
    Visibility,
};

const NOW: i64 = 1_700_000_000;

type Submissions = Arc<Mutex<Vec<(UserInfo, Vec<Event>)>>>;

fn browser_info() -> UserInfo {
    UserInfo {
        language: "en-US".to_string(),
        platform: "MacIntel".to_string(),
        user_agent: "Mozilla/5.0".to_string(),
    }
}

/// One execution context: a fresh tracker and host over the shared database
fn open_context(path: &Path) -> (Tracker, Arc<LocalHost>) {
    let store = SqliteStore::open(path).unwrap();
    let host = Arc::new(LocalHost::new());
    let tracker = Tracker::builder(Arc::new(store), host.clone())
        .clock(Arc::new(ManualClock::new(NOW)))
        .environment(Arc::new(StaticEnvironment(browser_info())))
        .build();
    (tracker, host)
}

fn collect(submissions: Submissions) -> impl Fn(UserInfo, Vec<Event>) -> futures::future::Ready<anyhow::Result<()>> + Send + Sync + 'static {
    move |info, events| {
        submissions.lock().push((info, events));
        futures::future::ready(Ok(()))
    }
}

fn names(events: &[Event]) -> Vec<&str> {
    events.iter().map(|e| e.name.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_backlog_survives_restart_and_is_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.db");
    let submissions = Submissions::default();
    let options = InitOptions::with_max_events_limit_until_submit(3);

    // First context: record a session and unload
    {
        let (tracker, host) = open_context(&path);
        let report = tracker.init(collect(submissions.clone()), options);
        assert!(!report.is_scheduled());

        let mut extra = Fields::new();
        extra.insert("extraData".to_string(), json!("123"));
        tracker.record("ButtonClicked", Some("HomePage"), Some(extra));
        host.set_visibility(Visibility::Hidden);
        host.set_visibility(Visibility::Visible);
        assert!(host.notify_unload());
    }

    // Second context: the persisted backlog exceeds the threshold
    let (tracker, _host) = open_context(&path);
    let saved = tracker.saved_events();
    assert_eq!(
        names(&saved),
        ["StartSession", "ButtonClicked", "Hidden", "Visible", "EndSession"]
    );
    assert_eq!(
        serde_json::to_value(&saved[1]).unwrap(),
        json!({"e": "ButtonClicked", "t": NOW, "c": "HomePage", "extraData": "123"})
    );

    let report = tracker.init(collect(submissions.clone()), options);
    assert_eq!(report.backlog, 5);
    let submission = report.submission.expect("backlog above threshold");

    tokio::time::sleep(SUBMIT_DELAY / 2).await;
    assert!(submissions.lock().is_empty());

    assert_eq!(
        submission.outcome().await,
        Some(SubmissionOutcome::Submitted { events: 5 })
    );

    let submissions = submissions.lock();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, browser_info());
    assert_eq!(submissions[0].1, saved);

    // Purged from the durable store; the new session is still buffered
    assert!(tracker.saved_events().is_empty());
    assert_eq!(names(&tracker.events()), ["StartSession"]);
}

#[tokio::test(start_paused = true)]
async fn test_threshold_boundary_is_strict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.db");

    {
        let (tracker, _host) = open_context(&path);
        tracker.record("Event1", None, None);
        tracker.record("Event2", None, None);
        tracker.commit();
        assert_eq!(tracker.saved_events().len(), 3);
    }

    let submissions = Submissions::default();
    let (tracker, _host) = open_context(&path);

    let at_limit = tracker.init(
        collect(submissions.clone()),
        InitOptions::with_max_events_limit_until_submit(3),
    );
    assert!(!at_limit.is_scheduled());

    let above_limit = tracker.init(
        collect(submissions.clone()),
        InitOptions::with_max_events_limit_until_submit(2),
    );
    above_limit.submission.unwrap().outcome().await.unwrap();
    assert_eq!(submissions.lock().len(), 1);
}

#[tokio::test]
async fn test_corrupted_store_value_is_treated_as_empty() {
    use telemetry_buffer::KeyValueStore;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.db");
    SqliteStore::open(&path)
        .unwrap()
        .set("events", "[{\"e\": \"Truncated\"")
        .unwrap();

    let (tracker, host) = open_context(&path);
    assert!(tracker.saved_events().is_empty());

    let report = tracker.init(
        collect(Submissions::default()),
        InitOptions::with_max_events_limit_until_submit(1),
    );
    assert_eq!(report.backlog, 0);

    host.notify_unload();
    assert_eq!(names(&tracker.saved_events()), ["StartSession", "EndSession"]);
}
