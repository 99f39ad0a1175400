//! Connection lifecycle for the console user's receiver
//!
//! The manager holds at most one transport, always bound to the receiver
//! socket of the most recently observed console user. Every state change
//! runs as a task on the shared dispatcher:
//!
//! - console user changes tear down the current transport before creating
//!   the next one, so two transports are never alive at once
//! - transport events are tagged with the generation of the transport that
//!   produced them; events from a replaced transport are discarded
//! - command sends encode on the dispatcher and go to whichever transport is
//!   current when the task runs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use cl_core::config::{AbsentOwnerPolicy, ClientConfig, SESSION_POLL_INTERVAL};
use cl_core::traits::{
    OwnerChangeSink, SessionMonitor, Transport, TransportEvent, TransportEventSink,
    TransportFactory, TransportOptions,
};
use cl_core::SessionOwnerId;
use cl_protocol::{encode_command, AbsoluteTime, Command, InputSourceSelector};

use crate::dispatcher::{Dispatcher, DispatcherClient};
use crate::events::{ClientEvent, EventHub};
#[cfg(unix)]
use crate::monitor::{ConsoleUserMonitor, DeviceOwnerProbe};
#[cfg(unix)]
use crate::transport::DatagramTransportFactory;

type SharedState = Arc<Mutex<ManagerState>>;
type WeakState = Weak<Mutex<ManagerState>>;

/// Keeps a datagram connection to the console user's receiver
///
/// All methods return immediately; the work runs on the dispatcher.
/// Dropping the manager blocks until its teardown has run on the dispatcher.
pub struct ConnectionManager {
    client: DispatcherClient,
    state: SharedState,
}

struct ActiveTransport {
    owner: SessionOwnerId,
    generation: u64,
    transport: Box<dyn Transport>,
}

struct ManagerState {
    config: ClientConfig,
    client: DispatcherClient,
    self_ref: WeakState,
    monitor: Box<dyn SessionMonitor>,
    factory: Arc<dyn TransportFactory>,
    transport: Option<ActiveTransport>,
    generation: u64,
    monitor_epoch: u64,
    started: bool,
    events: EventHub,
}

fn lock(state: &Mutex<ManagerState>) -> MutexGuard<'_, ManagerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` against the manager state on the dispatcher, if it still exists
fn with_state<F>(client: &DispatcherClient, state: WeakState, f: F)
where
    F: FnOnce(&mut ManagerState) + Send + 'static,
{
    client.enqueue(move || {
        if let Some(state) = state.upgrade() {
            let mut guard = lock(&state);
            f(&mut *guard);
        }
    });
}

impl ConnectionManager {
    /// Create a manager; nothing happens until [`ConnectionManager::start`]
    pub fn new(
        dispatcher: Dispatcher,
        config: ClientConfig,
        monitor: Box<dyn SessionMonitor>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let client = DispatcherClient::new(dispatcher);
        let state = Arc::new_cyclic(|self_ref| {
            Mutex::new(ManagerState {
                config,
                client: client.clone(),
                self_ref: self_ref.clone(),
                monitor,
                factory,
                transport: None,
                generation: 0,
                monitor_epoch: 0,
                started: false,
                events: EventHub::default(),
            })
        });

        Self { client, state }
    }

    /// Begin observing the console user. No effect if already started.
    pub fn start(&self) {
        self.run(ManagerState::start_observing);
    }

    /// Stop observing and destroy the current transport. Idempotent.
    pub fn stop(&self) {
        self.run(ManagerState::stop_observing);
    }

    /// Run a shell command in the console user's session
    pub fn send_shell_command(&self, command: impl Into<String>) {
        self.send(Command::shell(command));
    }

    /// Select a keyboard input source in the console user's session
    pub fn select_input_source(&self, selector: InputSourceSelector, time_stamp: AbsoluteTime) {
        self.send(Command::select_input_source(selector, time_stamp));
    }

    /// Subscribe to relayed connection events.
    ///
    /// The stream ends when the manager is dropped.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.run(move |state| state.events.subscribe(tx));
        rx
    }

    /// The dispatcher this manager runs on
    pub fn dispatcher(&self) -> &Dispatcher {
        self.client.dispatcher()
    }

    fn send(&self, command: Command) {
        self.run(move |state| state.send_command(&command));
    }

    fn run<F>(&self, f: F)
    where
        F: FnOnce(&mut ManagerState) + Send + 'static,
    {
        with_state(&self.client, Arc::downgrade(&self.state), f);
    }
}

#[cfg(unix)]
impl ConnectionManager {
    /// Manager wired to the console device monitor and Unix datagram transports
    pub fn with_defaults(
        dispatcher: Dispatcher,
        runtime: tokio::runtime::Handle,
        config: ClientConfig,
    ) -> Self {
        let probe = Arc::new(DeviceOwnerProbe::new(&config.console_device));
        let monitor = Box::new(ConsoleUserMonitor::new(runtime.clone(), probe));
        let factory = Arc::new(DatagramTransportFactory::new(runtime));
        Self::new(dispatcher, config, monitor, factory)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let state = Arc::clone(&self.state);
        self.client.detach(move || {
            let mut state = lock(&state);
            state.stop_observing();
            state.events.clear();
        });
    }
}

impl ManagerState {
    fn start_observing(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.monitor_epoch += 1;

        let sink = self.owner_change_sink(self.monitor_epoch);
        self.monitor.async_start(SESSION_POLL_INTERVAL, sink);
        tracing::debug!("Console user observation started");
    }

    fn stop_observing(&mut self) {
        if self.started {
            self.started = false;
            self.monitor_epoch += 1;
            self.monitor.async_stop();
            tracing::debug!("Console user observation stopped");
        }
        self.close_transport();
    }

    fn owner_change_sink(&self, epoch: u64) -> OwnerChangeSink {
        let client = self.client.clone();
        let state = self.self_ref.clone();
        Arc::new(move |owner: Option<SessionOwnerId>| {
            with_state(&client, state.clone(), move |manager| {
                manager.handle_owner_changed(epoch, owner)
            });
        })
    }

    fn transport_event_sink(&self, generation: u64) -> TransportEventSink {
        let client = self.client.clone();
        let state = self.self_ref.clone();
        Arc::new(move |event: TransportEvent| {
            with_state(&client, state.clone(), move |manager| {
                manager.handle_transport_event(generation, event)
            });
        })
    }

    fn handle_owner_changed(&mut self, epoch: u64, owner: Option<SessionOwnerId>) {
        if !self.started || epoch != self.monitor_epoch {
            tracing::trace!(?owner, "Ignoring console user change from a stopped monitor");
            return;
        }

        match owner {
            Some(owner) => {
                // The old transport must be gone before the new one exists
                self.close_transport();
                self.open_transport(owner);
            }
            None => match self.config.absent_owner_policy {
                AbsentOwnerPolicy::Close => {
                    tracing::info!("No console user");
                    self.close_transport();
                }
                AbsentOwnerPolicy::KeepLast => {
                    tracing::info!("No console user; keeping the last user's transport");
                }
            },
        }
    }

    fn open_transport(&mut self, owner: SessionOwnerId) {
        self.generation += 1;
        let generation = self.generation;
        let address = self.config.socket_path(owner);

        tracing::info!(uid = %owner, socket = %address.display(), "Console user changed");

        let events = self.transport_event_sink(generation);
        let mut transport = self
            .factory
            .create(address, TransportOptions::default(), events);
        transport.async_start();

        self.transport = Some(ActiveTransport {
            owner,
            generation,
            transport,
        });
    }

    fn close_transport(&mut self) {
        if let Some(active) = self.transport.take() {
            tracing::debug!(
                uid = %active.owner,
                socket = %active.transport.address().display(),
                "Destroying transport"
            );
        }
    }

    fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        let Some(active) = self
            .transport
            .as_ref()
            .filter(|active| active.generation == generation)
        else {
            tracing::trace!(generation, ?event, "Dropping event from a destroyed transport");
            return;
        };

        match &event {
            TransportEvent::Connected => {
                tracing::info!(uid = %active.owner, "Console user server client is connected");
            }
            TransportEvent::ConnectFailed(err) => {
                tracing::debug!(uid = %active.owner, error = %err, "Console user server client connect failed");
            }
            TransportEvent::Closed => {
                tracing::info!(uid = %active.owner, "Console user server client is closed");
            }
        }

        self.events.emit(event.into());
    }

    fn send_command(&self, command: &Command) {
        let payload = match encode_command(command) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(
                    operation = command.operation_type().name(),
                    field = err.field().unwrap_or("unknown"),
                    "{}",
                    err
                );
                return;
            }
        };

        // No console user: nothing to reach, nothing to report
        if let Some(active) = &self.transport {
            active.transport.async_send(payload);
        }
    }
}
