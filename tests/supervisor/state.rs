use super::helpers::MockTransport;
use rpc_supervisor::{AttemptOutcome, ConnectionStatus, ReconnectSupervisor, SupervisorConfig};
use std::time::Duration;
use tokio::time::Instant;

fn supervisor(transport: &MockTransport, config: SupervisorConfig) -> ReconnectSupervisor<MockTransport> {
    ReconnectSupervisor::new(transport.clone(), config)
}

#[tokio::test(start_paused = true)]
async fn fresh_supervisor_has_no_episode() {
    let sup = supervisor(&MockTransport::new("s:1"), SupervisorConfig::default());
    let state = sup.state().await;

    assert_eq!(state.status(), ConnectionStatus::Disconnected);
    assert_eq!(state.consecutive_failures(), 0);
    assert!(state.episode_started_at().is_none());
    assert!(!state.error_escalated());
}

#[tokio::test(start_paused = true)]
async fn episode_starts_at_first_failure() {
    let sup = supervisor(&MockTransport::new("s:2"), SupervisorConfig::default());

    let first = Instant::now();
    sup.attempt().await;
    tokio::time::advance(Duration::from_secs(3)).await;
    sup.attempt().await;
    sup.attempt().await;

    let state = sup.state().await;
    assert_eq!(state.consecutive_failures(), 3);
    assert_eq!(state.episode_started_at(), Some(first));
    let episode = state.episode().unwrap();
    assert_eq!(episode.elapsed(Instant::now()), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn escalation_flag_follows_episode() {
    let transport = MockTransport::new("s:3");
    let config = SupervisorConfig::builder()
        .shutdown_timeout(Duration::from_secs(1))
        .build();
    let sup = supervisor(&transport, config);

    sup.attempt().await;
    assert!(!sup.state().await.error_escalated());

    tokio::time::advance(Duration::from_millis(1001)).await;
    sup.attempt().await;
    assert!(sup.state().await.error_escalated());

    // Success clears the whole episode at once
    transport.set_up(true);
    assert_eq!(sup.attempt().await, AttemptOutcome::Connected);
    let state = sup.state().await;
    assert_eq!(state.consecutive_failures(), 0);
    assert!(state.episode_started_at().is_none());
    assert!(!state.error_escalated());
}

#[tokio::test(start_paused = true)]
async fn lost_connection_starts_new_episode() {
    let transport = MockTransport::new("s:4");
    transport.set_up(true);
    let sup = supervisor(&transport, SupervisorConfig::default());

    sup.attempt().await;
    assert!(sup.is_connected());

    transport.set_up(false);
    assert!(sup.connection_lost().await);
    assert_eq!(sup.state().await.consecutive_failures(), 0);

    tokio::time::advance(Duration::from_secs(5)).await;
    let lost_at = Instant::now();
    sup.attempt().await;
    let state = sup.state().await;
    assert_eq!(state.consecutive_failures(), 1);
    assert_eq!(state.episode_started_at(), Some(lost_at));
}

#[tokio::test(start_paused = true)]
async fn closed_state_is_frozen() {
    let sup = supervisor(&MockTransport::new("s:5"), SupervisorConfig::default());
    sup.attempt().await;
    sup.attempt().await;

    sup.close(Duration::from_secs(1)).await;
    let frozen = sup.state().await;
    assert!(frozen.is_closed());

    assert_eq!(sup.attempt().await, AttemptOutcome::Closed);
    assert!(!sup.connection_lost().await);
    assert_eq!(sup.state().await, frozen);
    assert_eq!(frozen.consecutive_failures(), 2);
}
