//! Periodic reconciliation driver.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{LedgerEngine, TallyError};

/// Shortest cadence accepted; `tokio::time::interval` rejects a zero period.
pub const MIN_CADENCE: Duration = Duration::from_millis(1);

/// Owns a background task that reconciles an engine on a fixed cadence.
///
/// The startup tick is performed by [`LedgerEngine::open`], so the first tick
/// here happens one full cadence after [`start`](Self::start). Dropping the
/// scheduler without calling [`stop`](Self::stop) also ends the task.
pub struct ReconciliationScheduler {
    cadence: Duration,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<u64>,
}

impl ReconciliationScheduler {
    pub fn start(engine: Arc<LedgerEngine>, cadence: Duration) -> Self {
        let cadence = cadence.max(MIN_CADENCE);
        let (shutdown, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut ticks = 0u64;
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        engine.reconcile();
                        ticks += 1;
                    }
                }
            }
            tracing::debug!(ticks, "reconciliation scheduler stopped");
            ticks
        });
        tracing::info!(cadence_secs = cadence.as_secs_f64(), "reconciliation scheduler started");
        Self {
            cadence,
            shutdown,
            task,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals the task and waits for it to finish. Returns the number of ticks run.
    pub async fn stop(self) -> Result<u64, TallyError> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|err| TallyError::Runtime(format!("scheduler task failed: {err}")))
    }
}
