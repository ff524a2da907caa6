//! Optional in-process trigger for the scheduler and reconciler ticks.
//!
//! The driver only calls the public tick operations on a timer. Running it is
//! equivalent to calling the tick endpoints from cron, and both can be used
//! side by side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::DriverConfig;
use crate::reconciler::Reconciler;
use crate::scheduler::Scheduler;

pub struct TickDriver {
    config: DriverConfig,
    scheduler: Arc<Scheduler>,
    reconciler: Arc<Reconciler>,
    max_to_start: u32,
    max_to_check: u32,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TickDriver {
    pub fn new(
        config: DriverConfig,
        scheduler: Arc<Scheduler>,
        reconciler: Arc<Reconciler>,
        max_to_start: u32,
        max_to_check: u32,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            scheduler,
            reconciler,
            max_to_start,
            max_to_check,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the two tick loops.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Tick driver already running");
            return;
        }

        info!(
            scheduler_interval_ms = self.config.scheduler_interval_ms,
            reconciler_interval_ms = self.config.reconciler_interval_ms,
            "Starting tick driver"
        );
        self.spawn_scheduler_loop();
        self.spawn_reconciler_loop();
    }

    /// Signal both loops to stop after their current tick.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping tick driver");
        let _ = self.shutdown_tx.send(());
    }

    fn spawn_scheduler_loop(&self) {
        let running = Arc::clone(&self.running);
        let scheduler = Arc::clone(&self.scheduler);
        let interval = Duration::from_millis(self.config.scheduler_interval_ms);
        let max_to_start = self.max_to_start;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Scheduler loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = scheduler.tick(max_to_start).await {
                            warn!("Scheduler tick failed: {}", e);
                        }
                    }
                }
            }
            info!("Scheduler loop stopped");
        });
    }

    fn spawn_reconciler_loop(&self) {
        let running = Arc::clone(&self.running);
        let reconciler = Arc::clone(&self.reconciler);
        let interval = Duration::from_millis(self.config.reconciler_interval_ms);
        let max_to_check = self.max_to_check;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Reconciler loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reconciler loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = reconciler.tick(max_to_check).await {
                            warn!("Reconciler tick failed: {}", e);
                        }
                    }
                }
            }
            info!("Reconciler loop stopped");
        });
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::CapacityLedger;
    use crate::combination::{
        CombinationFilter, CombinationStatus, CombinationStore, SqliteCombinationStore,
    };
    use crate::config::{JobsConfig, ReconcilerConfig, SchedulerConfig};
    use crate::registry::WorkRegistry;
    use crate::testing::{fixtures, MockCombinationSource, MockJobRunner};

    #[tokio::test]
    async fn test_driver_runs_ticks_until_stopped() {
        let store = Arc::new(SqliteCombinationStore::in_memory(2).unwrap());
        let runner = Arc::new(MockJobRunner::new());
        WorkRegistry::new(store.clone(), Arc::new(MockCombinationSource::new()))
            .register(&fixtures::keys("1", 3));

        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            runner.clone(),
            &SchedulerConfig::default(),
            JobsConfig::default(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            runner.clone(),
            ReconcilerConfig::default(),
            JobsConfig::default(),
        ));
        let config = DriverConfig {
            enabled: true,
            scheduler_interval_ms: 10,
            reconciler_interval_ms: 10,
        };

        let driver = TickDriver::new(config, scheduler, reconciler, 1, 10);
        driver.start();
        assert!(driver.is_running());

        tokio::time::sleep(Duration::from_millis(300)).await;
        driver.stop();
        assert!(!driver.is_running());

        // Two slots, both taken by the scheduler loop; the third waits.
        let processing = store
            .count(&CombinationFilter::new().with_status(CombinationStatus::Processing))
            .unwrap();
        assert_eq!(processing, 2);
        assert_eq!(store.snapshot().unwrap().in_use, 2);
    }
}
