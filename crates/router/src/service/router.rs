//! Router construction and task lifecycle.

use std::sync::Arc;

use courier_store::RegistrationStore;
use courier_transport::EventTransport;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RouterConfig;
use crate::error::{Error, RouterResult};
use crate::foundation::{ActivationQueue, ContextLifecycle, DispatchPolicy};
use crate::registry::ListenerRegistry;
use crate::stats::DispatchStats;

use super::commands::RouterCommand;
use super::dispatch::RouterCore;
use super::handle::RouterHandle;
use super::observers::{ObserverBridge, ObserverRegistry};

/// Builder for [`EventRouter`].
///
/// All five collaborators are required; [`build`](Self::build) fails
/// with a configuration error naming the first one missing.
pub struct EventRouterBuilder<S, T>
where
    S: RegistrationStore,
    T: EventTransport,
{
    config: Option<RouterConfig>,
    store: Option<Arc<S>>,
    transport: Option<Arc<T>>,
    policy: Option<Arc<dyn DispatchPolicy>>,
    activation: Option<Arc<dyn ActivationQueue>>,
    lifecycle: Option<Arc<dyn ContextLifecycle>>,
}

impl<S, T> Default for EventRouterBuilder<S, T>
where
    S: RegistrationStore,
    T: EventTransport,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T> EventRouterBuilder<S, T>
where
    S: RegistrationStore + 'static,
    T: EventTransport + 'static,
{
    /// Create a new router builder
    #[must_use]
    pub const fn new() -> Self {
        Self {
            config: None,
            store: None,
            transport: None,
            policy: None,
            activation: None,
            lifecycle: None,
        }
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the registration store
    #[must_use]
    pub fn with_store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the event transport
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the dispatch policy
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn DispatchPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the activation queue
    #[must_use]
    pub fn with_activation_queue(mut self, activation: Arc<dyn ActivationQueue>) -> Self {
        self.activation = Some(activation);
        self
    }

    /// Set the context lifecycle
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn ContextLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Build the router
    pub fn build(self) -> RouterResult<EventRouter<S, T>> {
        let config = self.config.unwrap_or_default();
        let store = self
            .store
            .ok_or_else(|| Error::configuration("Registration store not set"))?;
        let transport = self
            .transport
            .ok_or_else(|| Error::configuration("Event transport not set"))?;
        let policy = self
            .policy
            .ok_or_else(|| Error::configuration("Dispatch policy not set"))?;
        let activation = self
            .activation
            .ok_or_else(|| Error::configuration("Activation queue not set"))?;
        let lifecycle = self
            .lifecycle
            .ok_or_else(|| Error::configuration("Context lifecycle not set"))?;

        let observers = Arc::new(ObserverRegistry::new());
        let stats = Arc::new(DispatchStats::new(config.enable_stats));

        let mut registry = ListenerRegistry::new();
        registry.set_delegate(Arc::new(ObserverBridge::new(observers.clone())));

        let (command_tx, command_rx) = match config.channel_capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };

        let core = RouterCore::new(
            registry,
            store,
            transport,
            policy,
            activation,
            lifecycle,
            config.clone(),
            stats.clone(),
        );

        Ok(EventRouter {
            config,
            observers,
            stats,
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            core: Mutex::new(Some(core)),
            state: Mutex::new(ServiceState::NotStarted),
            task: Mutex::new(None),
            cancellation_token: CancellationToken::new(),
        })
    }
}

/// Service state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceState {
    NotStarted,
    Running,
    Stopped,
}

/// The event routing service.
///
/// Owns the actor task; use [`handle`](Self::handle) to get a
/// [`RouterHandle`] for talking to it. A router starts at most once.
pub struct EventRouter<S, T>
where
    S: RegistrationStore,
    T: EventTransport,
{
    config: RouterConfig,
    observers: Arc<ObserverRegistry>,
    stats: Arc<DispatchStats>,
    command_tx: flume::Sender<RouterCommand>,
    command_rx: Mutex<Option<flume::Receiver<RouterCommand>>>,
    core: Mutex<Option<RouterCore<S, T>>>,
    state: Mutex<ServiceState>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl<S, T> EventRouter<S, T>
where
    S: RegistrationStore + 'static,
    T: EventTransport + 'static,
{
    /// Start the router task.
    pub fn start(&self) -> RouterResult<()> {
        let mut state = self.state.lock();
        if *state != ServiceState::NotStarted {
            return Err(Error::invalid_state("Router already started"));
        }

        let command_rx = self
            .command_rx
            .lock()
            .take()
            .ok_or_else(|| Error::internal("Command channel already taken"))?;
        let mut core = self
            .core
            .lock()
            .take()
            .ok_or_else(|| Error::internal("Router core already taken"))?;

        info!("Starting event router");

        let token = self.cancellation_token.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    command = command_rx.recv_async() => match command {
                        Ok(command) => core.handle_command(command).await,
                        Err(_) => break,
                    },
                }
            }
            debug!("Router task exiting");
        });

        *self.task.lock() = Some(task);
        *state = ServiceState::Running;
        info!("Event router started");
        Ok(())
    }

    /// Stop the router task. Commands still queued are dropped; a
    /// stopped router cannot be restarted.
    pub async fn stop(&self) -> RouterResult<()> {
        let task = {
            let mut state = self.state.lock();
            if *state != ServiceState::Running {
                return Ok(());
            }
            *state = ServiceState::Stopped;
            self.task.lock().take()
        };

        info!("Stopping event router");
        self.cancellation_token.cancel();
        if let Some(task) = task {
            task.await?;
        }
        info!("Event router stopped");
        Ok(())
    }

    /// Get a handle to the running router.
    pub fn handle(&self) -> RouterResult<RouterHandle> {
        if *self.state.lock() != ServiceState::Running {
            return Err(Error::invalid_state("Router not running"));
        }
        Ok(RouterHandle::new(
            self.command_tx.clone(),
            self.observers.clone(),
            self.stats.clone(),
        ))
    }

    /// Whether the router task is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.state.lock() == ServiceState::Running
    }

    /// The configuration the router was built with
    #[must_use]
    pub const fn config(&self) -> &RouterConfig {
        &self.config
    }
}
