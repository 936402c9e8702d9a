//! Session lifecycle: idle expiry, activity, heartbeats, and refresh
//! deduplication under concurrency.

use std::time::Duration;

use futures::future::join_all;
use vikareta_integration_tests::{MAIN_HOST, TestContext};
use vikareta_session::api::Endpoint;

const MINUTE: Duration = Duration::from_secs(60);

// =============================================================================
// Idle Expiry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_session_times_out_and_redirects() {
    let ctx = TestContext::on_host(MAIN_HOST);
    let credentials = ctx.register_buyer("u1");
    ctx.coordinator.login(&credentials).await;

    tokio::time::sleep(31 * MINUTE).await;

    assert_eq!(
        ctx.navigator.last_redirect().as_deref(),
        Some("/auth/login?reason=timeout")
    );
    assert!(!ctx.coordinator.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_activity_keeps_session_alive() {
    let ctx = TestContext::on_host(MAIN_HOST);
    let credentials = ctx.register_buyer("u1");
    ctx.coordinator.login(&credentials).await;

    // Two hours of wall time, touched every 20 minutes.
    for _ in 0..6 {
        tokio::time::sleep(20 * MINUTE).await;
        ctx.coordinator.record_activity();
    }

    assert!(ctx.coordinator.is_authenticated());
    assert!(!ctx.coordinator.activity().is_session_expired());
    assert!(ctx.navigator.last_redirect().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_run_while_session_lives() {
    let ctx = TestContext::on_host(MAIN_HOST);
    let credentials = ctx.register_buyer("u1");
    ctx.coordinator.login(&credentials).await;

    tokio::time::sleep(11 * MINUTE).await;

    assert_eq!(ctx.api.calls(Endpoint::Heartbeat), 2);
}

// =============================================================================
// Refresh Storms
// =============================================================================

#[tokio::test]
async fn test_refresh_storm_collapses_to_one_wire_call() {
    let ctx = TestContext::on_host(MAIN_HOST);
    let credentials = ctx.register_buyer("u1");
    ctx.coordinator.login(&credentials).await;
    ctx.api.set_delay(Endpoint::Refresh, Duration::from_millis(50));

    let states = join_all((0..10).map(|_| ctx.coordinator.refresh_token())).await;

    assert_eq!(ctx.api.calls(Endpoint::Refresh), 1);
    assert!(states.iter().all(|state| state.is_authenticated));
}

#[tokio::test]
async fn test_logout_ends_tracking_and_scrubs_state() {
    let ctx = TestContext::on_host(MAIN_HOST);
    let credentials = ctx.register_buyer("u1");
    ctx.coordinator.login(&credentials).await;

    let state = ctx.coordinator.logout().await;

    assert!(!state.is_authenticated);
    assert!(ctx.coordinator.get_current_user().is_none());
    assert_eq!(ctx.coordinator.activity().current_session_id(), None);
    // Logout beacons target both siblings.
    let logout_beacons: Vec<_> = ctx
        .beacons
        .sent()
        .into_iter()
        .filter(|url| url.contains("/api/auth/logout-all"))
        .collect();
    assert_eq!(logout_beacons.len(), 2);
}
