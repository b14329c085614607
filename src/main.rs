// src/main.rs
//! Telemetry Buffer CLI
//!
//! Records events read from stdin into a durable session buffer.
//!
//! Input lines:
//!
//! - `Name [context] [{"json": "fields"}]` records an event
//! - `:hidden` / `:visible` toggles visibility
//! - `:commit` commits the session buffer
//!
//! EOF or Ctrl-C ends the session (unload). Backlogs above the configured
//! threshold are submitted by printing `{"userInfo": .., "events": [..]}`
//! to stdout.

use anyhow::Result;
use std::sync::Arc;
use telemetry_buffer::observability::{describe_metrics, init_tracing};
use telemetry_buffer::recording::open_store;
use telemetry_buffer::{
    Event, Fields, InitOptions, LocalHost, Tracker, TrackerConfig, UserInfo, Visibility,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = TrackerConfig::load()?;
    init_tracing(&config.logging)?;
    describe_metrics();

    info!("Starting telemetry-buffer v{}", telemetry_buffer::VERSION);
    info!("Configuration loaded: {:?}", config);

    let store = open_store(&config.storage)?;
    let host = Arc::new(LocalHost::new());
    let tracker = Tracker::builder(store, host.clone()).build();

    let report = tracker.init(print_submission, InitOptions::from(&config.submission));
    info!(
        "Persisted backlog: {} events (threshold {})",
        report.backlog, report.threshold
    );

    tokio::select! {
        _ = read_input(&tracker, &host, BufReader::new(tokio::io::stdin())) => {}
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    // A successful submission purges the whole persisted queue, so let it
    // finish before this session is committed.
    if let Some(submission) = report.submission {
        match submission.outcome().await {
            Some(outcome) => info!("Submission finished: {:?}", outcome),
            None => warn!("Submission task did not complete"),
        }
    }

    host.notify_unload();
    info!("Session committed, {} events persisted", tracker.saved_events().len());

    Ok(())
}

/// Apply input lines until EOF.
///
/// A read error ends the input like EOF does, so the session is still
/// committed on unload.
async fn read_input<R>(tracker: &Tracker, host: &LocalHost, reader: R)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => handle_line(tracker, host, &line),
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read input, ending session: {}", e);
                break;
            }
        }
    }
}

fn handle_line(tracker: &Tracker, host: &LocalHost, line: &str) {
    match line.trim() {
        "" => {}
        ":hidden" => host.set_visibility(Visibility::Hidden),
        ":visible" => host.set_visibility(Visibility::Visible),
        ":commit" => tracker.commit(),
        input => {
            let (name, context, extra) = parse_event_line(input);
            tracker.record(name, context, extra);
        }
    }
}

/// Split `Name [context] [json-object]`
fn parse_event_line(input: &str) -> (&str, Option<&str>, Option<Fields>) {
    let (name, rest) = split_token(input);
    let (context, rest) = if rest.starts_with('{') {
        (None, rest)
    } else {
        let (context, rest) = split_token(rest);
        (Some(context).filter(|c| !c.is_empty()), rest)
    };

    let extra = if rest.is_empty() {
        None
    } else {
        match serde_json::from_str::<Fields>(rest) {
            Ok(fields) => Some(fields),
            Err(e) => {
                warn!("Ignoring malformed fields for {}: {}", name, e);
                None
            }
        }
    };

    (name, context, extra)
}

fn split_token(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (input, ""),
    }
}

async fn print_submission(user_info: UserInfo, events: Vec<Event>) -> anyhow::Result<()> {
    let payload = serde_json::json!({
        "userInfo": user_info,
        "events": events,
    });
    println!("{}", serde_json::to_string(&payload)?);
    Ok(())
}
