//! Session activity manager.
//!
//! Tracks user activity for one session, enforces the client-side idle
//! timeout, and keeps the server-side session alive with a heartbeat.
//!
//! State machine: Stopped → [`start_session`](SessionActivityManager::start_session)
//! → Tracking. While tracking, two background tasks run:
//!
//! - an idle watchdog that recomputes its deadline from the stored activity
//!   timestamp, so a context suspended past the true deadline and resumed
//!   later is judged expired even though its timer never fired;
//! - a heartbeat loop that pings the backend every five minutes and
//!   self-terminates once the idle threshold has passed instead of
//!   resurrecting a dead session.
//!
//! An uninterrupted idle timeout clears stored auth and hard-redirects to
//! the login route with a machine-readable reason — the session is
//! unrecoverable client-side at that point.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use vikareta_core::SessionId;

use crate::api::AuthApi;
use crate::host::Navigator;
use crate::notify::{SessionChange, SessionChangeEvent, SessionChangeNotifier};
use crate::store::AuthStateStore;

/// Route the idle timeout redirects to.
const TIMEOUT_ROUTE: &str = "/auth/login?reason=timeout";

struct Tracking {
    session_id: SessionId,
    last_activity: Arc<Mutex<Instant>>,
    watchdog: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

/// Per-session activity tracking, idle timeout, and heartbeat.
pub struct SessionActivityManager {
    store: Arc<AuthStateStore>,
    api: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn SessionChangeNotifier>,
    origin: Uuid,
    idle_timeout: Duration,
    heartbeat_interval: Duration,
    activity_throttle: Duration,
    tracking: Mutex<Option<Tracking>>,
}

impl SessionActivityManager {
    #[must_use]
    pub fn new(
        store: Arc<AuthStateStore>,
        api: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn SessionChangeNotifier>,
        origin: Uuid,
        idle_timeout: Duration,
        heartbeat_interval: Duration,
        activity_throttle: Duration,
    ) -> Self {
        Self {
            store,
            api,
            navigator,
            notifier,
            origin,
            idle_timeout,
            heartbeat_interval,
            activity_throttle,
            tracking: Mutex::new(None),
        }
    }

    /// Begin tracking a session. Any previously tracked session is stopped
    /// first.
    pub fn start_session(&self, session_id: SessionId) {
        self.stop_session();

        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let watchdog = tokio::spawn(idle_watchdog(
            Arc::clone(&last_activity),
            self.idle_timeout,
            Arc::clone(&self.store),
            Arc::clone(&self.navigator),
            Arc::clone(&self.notifier),
            self.origin,
        ));
        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&last_activity),
            self.idle_timeout,
            self.heartbeat_interval,
            Arc::clone(&self.api),
            session_id.clone(),
        ));

        if let Ok(mut tracking) = self.tracking.lock() {
            *tracking = Some(Tracking {
                session_id,
                last_activity,
                watchdog,
                heartbeat,
            });
        }
    }

    /// Record user activity, throttled to one accepted update per throttle
    /// window. Bursts of input advance the timestamp at most once per
    /// window; the watchdog picks the new deadline up on its next wake.
    pub fn record_activity(&self) {
        let Ok(tracking) = self.tracking.lock() else {
            return;
        };
        let Some(tracking) = tracking.as_ref() else {
            return;
        };
        if let Ok(mut last) = tracking.last_activity.lock() {
            if last.elapsed() >= self.activity_throttle {
                *last = Instant::now();
            }
        }
    }

    /// Whether the tracked session has passed the idle threshold.
    ///
    /// Recomputed from the stored timestamp, deliberately independent of
    /// whether the watchdog has fired.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        let Ok(tracking) = self.tracking.lock() else {
            return false;
        };
        let Some(tracking) = tracking.as_ref() else {
            return false;
        };
        tracking
            .last_activity
            .lock()
            .map(|last| last.elapsed() > self.idle_timeout)
            .unwrap_or(false)
    }

    /// Id of the tracked session, if any.
    #[must_use]
    pub fn current_session_id(&self) -> Option<SessionId> {
        self.tracking
            .lock()
            .ok()?
            .as_ref()
            .map(|t| t.session_id.clone())
    }

    /// Tear down listeners and timers unconditionally.
    pub fn stop_session(&self) {
        let previous = self.tracking.lock().ok().and_then(|mut t| t.take());
        if let Some(tracking) = previous {
            tracking.watchdog.abort();
            tracking.heartbeat.abort();
            tracing::debug!(session = %tracking.session_id, "session tracking stopped");
        }
    }
}

impl Drop for SessionActivityManager {
    fn drop(&mut self) {
        self.stop_session();
    }
}

/// Sleep until the idle deadline, re-arming whenever activity has pushed it
/// forward; fire the timeout when a full idle window passes uninterrupted.
async fn idle_watchdog(
    last_activity: Arc<Mutex<Instant>>,
    idle_timeout: Duration,
    store: Arc<AuthStateStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn SessionChangeNotifier>,
    origin: Uuid,
) {
    loop {
        let deadline = last_activity
            .lock()
            .map(|last| *last + idle_timeout)
            .unwrap_or_else(|_| Instant::now());

        if Instant::now() >= deadline {
            tracing::info!("session idle timeout reached");
            store.clear_auth_data();
            notifier.publish(SessionChange {
                origin,
                event: SessionChangeEvent::TimedOut,
            });
            navigator.redirect(TIMEOUT_ROUTE);
            return;
        }

        tokio::time::sleep_until(deadline).await;
    }
}

/// Ping the backend on a fixed period while the session is still inside the
/// idle window; end the loop once the window has passed.
async fn heartbeat_loop(
    last_activity: Arc<Mutex<Instant>>,
    idle_timeout: Duration,
    heartbeat_interval: Duration,
    api: Arc<dyn AuthApi>,
    session_id: SessionId,
) {
    let mut ticker = tokio::time::interval(heartbeat_interval);
    // The first tick completes immediately; the session was just created,
    // so skip it.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let idle = last_activity
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or(Duration::ZERO);
        if idle > idle_timeout {
            tracing::debug!(session = %session_id, "idle threshold passed; heartbeat loop ending");
            return;
        }

        if let Err(error) = api.heartbeat(&session_id).await {
            tracing::warn!(session = %session_id, %error, "heartbeat failed");
        }
    }
}
