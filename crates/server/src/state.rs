use std::sync::Arc;

use gtfs_batch_core::{
    BatchStore, CombinationSource, Config, JobRunner, Reconciler, Recovery, Reporter,
    SanitizedConfig, Scheduler, WorkRegistry,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn BatchStore>,
    registry: WorkRegistry,
    scheduler: Arc<Scheduler>,
    reconciler: Arc<Reconciler>,
    recovery: Recovery,
    reporter: Reporter,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn BatchStore>,
        runner: Arc<dyn JobRunner>,
        source: Arc<dyn CombinationSource>,
    ) -> Self {
        let registry = WorkRegistry::new(Arc::clone(&store), source);
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&runner),
            &config.scheduler,
            config.jobs.clone(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            runner,
            config.reconciler.clone(),
            config.jobs.clone(),
        ));
        let recovery = Recovery::new(Arc::clone(&store), config.reconciler.max_retries);
        let reporter = Reporter::new(Arc::clone(&store));

        Self {
            config,
            store,
            registry,
            scheduler,
            reconciler,
            recovery,
            reporter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn BatchStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &WorkRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    pub fn recovery(&self) -> &Recovery {
        &self.recovery
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}
