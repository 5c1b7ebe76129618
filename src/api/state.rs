use std::sync::Arc;

use crate::config::Config;
use crate::ledger::TaskStore;
use crate::observability::Metrics;
use crate::worker::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn TaskStore>,
    pub metrics: Arc<Metrics>,
    /// Absent when the API runs without a background dispatcher (tests)
    pub dispatcher: Option<Arc<Dispatcher>>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn TaskStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            metrics,
            dispatcher: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }
}
