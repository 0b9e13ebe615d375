//! Service wiring: store, dispatcher, broadcaster, transport and pump.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::info;

use resellsync_events::{Broadcaster, SessionRegistry};
use resellsync_infra::{AppConfig, BroadcastPump, InMemoryEntityStore, TransitionDispatcher, WorkerHandle};

use crate::app::errors::ApiError;
use crate::transport::ChannelTransport;

pub type Store = Arc<InMemoryEntityStore>;
pub type Dispatcher = TransitionDispatcher<Store>;

/// Everything the HTTP handlers share.
#[derive(Debug)]
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    broadcaster: Arc<Broadcaster>,
    transport: Arc<ChannelTransport>,
    config: AppConfig,
    pump: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    pub fn build(config: AppConfig) -> io::Result<Self> {
        Self::with_store(config, Arc::new(InMemoryEntityStore::new()))
    }

    /// Wire services around an existing store and start the broadcast pump.
    pub fn with_store(config: AppConfig, store: Store) -> io::Result<Self> {
        let transport = Arc::new(ChannelTransport::new());
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::new(SessionRegistry::new()),
            transport.clone(),
            config.replay_capacity,
        ));
        let pump = BroadcastPump::spawn(store.outbox(), broadcaster.clone())?;

        info!(
            replay_capacity = config.replay_capacity,
            session_buffer = config.session_buffer,
            "services ready"
        );

        Ok(Self {
            dispatcher: Arc::new(TransitionDispatcher::new(store)),
            broadcaster,
            transport,
            config,
            pump: Mutex::new(Some(pump)),
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn store(&self) -> &Store {
        self.dispatcher.store()
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn transport(&self) -> &Arc<ChannelTransport> {
        &self.transport
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run a store-touching call off the async runtime, bounded by the
    /// configured store timeout.
    ///
    /// A timeout is reported as `Unavailable`. The call itself keeps running
    /// and may still commit; clients reconcile through the push channel or a
    /// snapshot read.
    pub async fn run<T, E, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Dispatcher) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<ApiError> + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let task = tokio::task::spawn_blocking(move || f(&*dispatcher));

        match tokio::time::timeout(self.config.store_timeout, task).await {
            Ok(Ok(result)) => result.map_err(Into::into),
            Ok(Err(join_err)) => Err(ApiError::Unavailable(format!("store call failed: {join_err}"))),
            Err(_) => Err(ApiError::Unavailable(format!(
                "store did not respond within {} ms",
                self.config.store_timeout.as_millis()
            ))),
        }
    }

    /// Stop the broadcast pump after flushing queued events.
    pub fn shutdown(&self) {
        let handle = match self.pump.lock() {
            Ok(mut pump) => pump.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.shutdown();
            info!("broadcast pump stopped");
        }
    }
}
