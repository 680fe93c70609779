//! Headless call test — drives one session end to end without a terminal UI.
//!
//! Opens the room, waits for the join, toggles the microphone and waits for
//! the widget to confirm, holds the call, then hangs up and counts what the
//! session threw away afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::time;

use super::widget::{MessageReceiver, WidgetFactory};
use super::{CallSession, LifecycleState, Role};

/// How long to wait for late widget events after hanging up.
const SETTLE_TIME: Duration = Duration::from_millis(50);

/// Inputs for a call test.
pub struct CallTestOptions {
    pub room: String,
    pub display_name: String,
    pub role: Role,
    /// How long to hold the call once joined.
    pub duration: Duration,
    pub join_timeout: Duration,
}

/// Result of a call test.
#[derive(Debug, Default)]
pub struct CallTestResult {
    pub reached_active: bool,
    pub audio_confirmed: bool,
    pub participants: usize,
    pub end_callbacks: usize,
    pub discarded_events: u64,
    pub final_state: String,
    pub elapsed: Duration,
}

/// Run a call test against the given widget factory.
pub async fn run_call_test(
    opts: CallTestOptions,
    factory: Box<dyn WidgetFactory>,
) -> Result<CallTestResult> {
    let started = Instant::now();
    let ended = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ended);
    let (mut session, mut rx) = CallSession::new(
        factory,
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    session
        .open(&opts.room, &opts.display_name, opts.role)
        .context("Failed to open call")?;
    tracing::info!(
        "Opened room {} as {} ({})",
        opts.room,
        opts.display_name,
        opts.role.label()
    );

    let mut result = CallTestResult::default();

    result.reached_active = wait_until(&mut session, &mut rx, opts.join_timeout, |s| {
        *s.state() != LifecycleState::Connecting
    })
    .await
        && *session.state() == LifecycleState::Active;

    if !result.reached_active {
        tracing::warn!(
            "Call did not become active within {:?} (state: {})",
            opts.join_timeout,
            session.state().as_str()
        );
        session.close();
    } else {
        session.toggle_audio()?;
        result.audio_confirmed =
            wait_until(&mut session, &mut rx, Duration::from_secs(2), |s| s.audio_muted()).await;

        // Hold the call, still processing whatever the widget sends.
        wait_until(&mut session, &mut rx, opts.duration, |s| {
            *s.state() != LifecycleState::Active
        })
        .await;

        result.participants = session.participant_count();
        if session.has_widget() {
            session.end_call()?;
        }
    }

    time::sleep(SETTLE_TIME).await;
    session.pump(&mut rx);

    result.end_callbacks = ended.load(Ordering::SeqCst);
    result.discarded_events = session.discarded_events();
    result.final_state = session.state().as_str().to_string();
    result.elapsed = started.elapsed();
    Ok(result)
}

/// Process widget messages until `done` holds or `timeout` passes.
async fn wait_until(
    session: &mut CallSession,
    rx: &mut MessageReceiver,
    timeout: Duration,
    done: impl Fn(&CallSession) -> bool,
) -> bool {
    let deadline = time::Instant::now() + timeout;
    while !done(session) {
        match time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(msg)) => {
                session.handle_message(msg);
            }
            Ok(None) | Err(_) => return done(session),
        }
    }
    true
}

/// Print a human-readable summary.
pub fn print_summary(result: &CallTestResult) {
    let mark = |ok: bool| if ok { "ok" } else { "FAILED" };
    println!("Call test finished in {:.2}s", result.elapsed.as_secs_f64());
    println!("  joined:            {}", mark(result.reached_active));
    println!("  mute confirmed:    {}", mark(result.audio_confirmed));
    println!("  participants seen: {}", result.participants);
    println!("  end callbacks:     {}", result.end_callbacks);
    println!("  late events dropped: {}", result.discarded_events);
    println!("  final state:       {}", result.final_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::loopback::LoopbackFactory;

    fn options(duration_ms: u64) -> CallTestOptions {
        CallTestOptions {
            room: "consult-42".into(),
            display_name: "Alice".into(),
            role: Role::Patient,
            duration: Duration::from_millis(duration_ms),
            join_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn test_call_test_with_loopback() {
        let factory = LoopbackFactory::new(Duration::from_millis(20), vec!["dr-lee".into()]);
        let result = run_call_test(options(100), Box::new(factory)).await.unwrap();

        assert!(result.reached_active);
        assert!(result.audio_confirmed);
        assert_eq!(result.participants, 1);
        assert_eq!(result.end_callbacks, 1);
        // conference-left and ready-to-close from our own hangup.
        assert_eq!(result.discarded_events, 2);
        assert_eq!(result.final_state, "ended");
    }

    #[tokio::test]
    async fn test_call_test_join_timeout() {
        let factory = LoopbackFactory::new(Duration::from_secs(60), Vec::new());
        let mut opts = options(0);
        opts.join_timeout = Duration::from_millis(30);
        let result = run_call_test(opts, Box::new(factory)).await.unwrap();

        assert!(!result.reached_active);
        assert_eq!(result.end_callbacks, 0);
        assert_eq!(result.final_state, "idle");
    }

    #[tokio::test]
    async fn test_call_test_sdk_unavailable() {
        let factory = LoopbackFactory::unavailable("offline");
        let err = run_call_test(options(0), Box::new(factory))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("offline"));
    }
}
