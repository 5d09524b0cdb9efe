//! Fixed-period background driver for a supervisor.

use crate::state::ConnectionStatus;
use crate::supervisor::ReconnectSupervisor;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Ticks every `period` and fires an attempt on the supervisor.
///
/// Each tick spawns its attempt instead of awaiting it, so a slow or hanging
/// connect never delays the timer. A tick that lands while an attempt is
/// still running is dropped by the supervisor's exclusion; missed ticks are
/// skipped, not replayed. The first tick fires one period after start.
///
/// While connected, a tick only probes [`Transport::is_connected`] and starts
/// reconnecting if the transport reports the connection gone.
///
/// The background task stops when the supervisor is closed, when
/// [`stop`](Self::stop) is called, or when the scheduler is dropped.
pub struct Scheduler {
    task: JoinHandle<()>,
}

impl Scheduler {
    /// Starts ticking on the current tokio runtime.
    pub fn start<T: Transport>(supervisor: Arc<ReconnectSupervisor<T>>) -> Self {
        let period = supervisor.config().period();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match supervisor.status() {
                    ConnectionStatus::Closed => break,
                    ConnectionStatus::Connected => {
                        if supervisor.transport().is_connected() {
                            continue;
                        }
                        supervisor.connection_lost().await;
                    }
                    ConnectionStatus::Disconnected => {}
                }

                let supervisor = Arc::clone(&supervisor);
                tokio::spawn(async move {
                    supervisor.attempt().await;
                });
            }

            tracing::trace!(
                supervisor = %supervisor.config().name(),
                "reconnect scheduler for {} stopped",
                supervisor.target()
            );
        });

        Self { task }
    }

    /// Stops ticking. Attempts already spawned run to completion.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Returns whether the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.is_running())
            .finish()
    }
}
