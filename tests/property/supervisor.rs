//! Property tests for the supervisor's bookkeeping.
//!
//! Invariants tested:
//! - At most one escalation per failure episode
//! - WARN count per episode is `failures / warning_every`
//! - A success always clears the episode

use proptest::prelude::*;
use rpc_supervisor::{AttemptOutcome, ReconnectSupervisor, SupervisorConfig, Transport};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Transport whose next connect result is set by the test.
#[derive(Clone, Default)]
struct Scripted {
    up: Arc<AtomicBool>,
}

impl Transport for Scripted {
    type Error = io::Error;

    fn target(&self) -> &str {
        "scripted:0"
    }

    async fn connect(&self) -> Result<(), io::Error> {
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }
    }

    async fn close(&self) -> Result<(), io::Error> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Step {
    /// Wait, then fail an attempt
    Fail(u64),
    /// Wait, connect, then lose the connection again
    Flap(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        8 => (0u64..=50).prop_map(Step::Fail),
        1 => (0u64..=50).prop_map(Step::Flap),
    ]
}

#[derive(Default)]
struct Counters {
    warnings: AtomicU64,
    escalations: AtomicU64,
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn episodes_are_bounded(
        warning_every in 1u64..=10,
        timeout_ms in 0u64..=200,
        steps in prop::collection::vec(step(), 1..=200),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let counters = Arc::new(Counters::default());
            let w = Arc::clone(&counters);
            let e = Arc::clone(&counters);

            let transport = Scripted::default();
            let config = SupervisorConfig::builder()
                .warning_every(warning_every)
                .shutdown_timeout(Duration::from_millis(timeout_ms))
                .on_warning(move |_| {
                    w.warnings.fetch_add(1, Ordering::SeqCst);
                })
                .on_escalation(move |_| {
                    e.escalations.fetch_add(1, Ordering::SeqCst);
                })
                .build();
            let sup = ReconnectSupervisor::new(transport.clone(), config);

            let mut failures = 0u64;
            let mut elapsed_ms = 0u64;

            // Checks the closed episode against the counters, then resets them
            let settle = |failures: u64, elapsed_ms: u64| {
                let warnings = counters.warnings.swap(0, Ordering::SeqCst);
                let escalations = counters.escalations.swap(0, Ordering::SeqCst);
                (
                    warnings == failures / warning_every,
                    escalations == u64::from(failures > 0 && elapsed_ms > timeout_ms),
                )
            };

            for step in &steps {
                match *step {
                    Step::Fail(gap) => {
                        tokio::time::advance(Duration::from_millis(gap)).await;
                        if failures > 0 {
                            elapsed_ms += gap;
                        }
                        prop_assert_eq!(sup.attempt().await, AttemptOutcome::Failed);
                        failures += 1;
                        prop_assert_eq!(sup.state().await.consecutive_failures(), failures);
                    }
                    Step::Flap(gap) => {
                        tokio::time::advance(Duration::from_millis(gap)).await;
                        transport.up.store(true, Ordering::SeqCst);
                        prop_assert_eq!(sup.attempt().await, AttemptOutcome::Connected);
                        transport.up.store(false, Ordering::SeqCst);
                        prop_assert!(sup.connection_lost().await);

                        let state = sup.state().await;
                        prop_assert_eq!(state.consecutive_failures(), 0);
                        prop_assert!(!state.error_escalated());

                        let (warn_ok, escalate_ok) = settle(failures, elapsed_ms);
                        prop_assert!(warn_ok, "warnings off for {} failures", failures);
                        prop_assert!(escalate_ok, "escalations off after {}ms", elapsed_ms);
                        failures = 0;
                        elapsed_ms = 0;
                    }
                }
            }

            let (warn_ok, escalate_ok) = settle(failures, elapsed_ms);
            prop_assert!(warn_ok, "warnings off for {} failures", failures);
            prop_assert!(escalate_ok, "escalations off after {}ms", elapsed_ms);
            Ok(())
        })?;
    }
}
