//! DispatcherBuilder - wiring for a Dispatcher.

use std::sync::Arc;

use super::decider::{Decider, DefaultDecider};
use super::dispatcher::Dispatcher;
use super::executor::ExecutorFactory;
use crate::config::DispatcherConfig;
use crate::error::{CourierError, Result};
use crate::ports::{
    Clock, IdGenerator, NoTokenProvider, SinkFactory, SystemClock, TokenProvider, UlidGenerator,
};
use crate::queue::{ExecutionHistoryLog, InMemoryTaskStore, TaskQueueStore};

/// Builds a [`Dispatcher`] from its collaborators.
///
/// Only the sink factory is required; everything else defaults to the
/// in-memory or system implementation. The factory runs on each `start()`.
///
/// ```ignore
/// let dispatcher = DispatcherBuilder::new(ReqwestSink::factory())
///     .config(config.dispatcher.clone())
///     .token_provider(tokens)
///     .build()?;
/// ```
pub struct DispatcherBuilder {
    sinks: SinkFactory,
    config: DispatcherConfig,
    store: Option<Arc<dyn TaskQueueStore>>,
    history: Option<Arc<ExecutionHistoryLog>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    decider: Option<Arc<dyn Decider>>,
}

impl DispatcherBuilder {
    pub fn new(sinks: SinkFactory) -> Self {
        Self {
            sinks,
            config: DispatcherConfig::default(),
            store: None,
            history: None,
            tokens: None,
            clock: None,
            ids: None,
            decider: None,
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn TaskQueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn history(mut self, history: Arc<ExecutionHistoryLog>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    /// Validates the configuration and assembles the dispatcher. The scan
    /// loop is not started.
    pub fn build(self) -> Result<Dispatcher> {
        let config = self.config;
        if config.poll_interval.is_zero() || config.error_interval.is_zero() {
            return Err(CourierError::configuration(
                "poll and error intervals must be greater than zero",
            ));
        }
        if config.request_timeout.is_zero() {
            return Err(CourierError::configuration(
                "request timeout must be greater than zero",
            ));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new()));
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(ExecutionHistoryLog::with_capacity(config.history_capacity)));
        let decider = self.decider.unwrap_or_else(|| {
            Arc::new(DefaultDecider::new(
                config.backoff.clone(),
                config.max_retries,
            ))
        });
        let executors = ExecutorFactory::new(
            self.sinks,
            self.tokens.unwrap_or_else(|| Arc::new(NoTokenProvider)),
            config.request_timeout,
            config.token_timeout,
        );

        Ok(Dispatcher::assemble(
            config, store, history, executors, decider, clock, ids,
        ))
    }
}
