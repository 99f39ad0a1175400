//! Test doubles for the connection manager's collaborators

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use cl_client::Dispatcher;
use cl_core::traits::{
    OwnerChangeSink, SessionMonitor, Transport, TransportEvent, TransportEventSink,
    TransportFactory, TransportOptions,
};
use cl_core::SessionOwnerId;

/// Block until every task queued so far on the dispatcher has run
pub fn settle(dispatcher: &Dispatcher) {
    dispatcher
        .enqueue_and_wait(|| ())
        .expect("dispatcher stopped");
}

#[derive(Default)]
struct MonitorShared {
    sink: Mutex<Option<OwnerChangeSink>>,
    poll_interval: Mutex<Option<Duration>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

/// Session monitor driven by the test
pub struct ManualMonitor {
    shared: Arc<MonitorShared>,
}

/// Test-side handle onto a [`ManualMonitor`]
#[derive(Clone)]
pub struct MonitorHandle {
    shared: Arc<MonitorShared>,
}

impl ManualMonitor {
    pub fn new() -> (Box<dyn SessionMonitor>, MonitorHandle) {
        let shared = Arc::new(MonitorShared::default());
        (
            Box::new(Self {
                shared: Arc::clone(&shared),
            }),
            MonitorHandle { shared },
        )
    }
}

impl SessionMonitor for ManualMonitor {
    fn async_start(&mut self, poll_interval: Duration, sink: OwnerChangeSink) {
        *self.shared.poll_interval.lock().unwrap() = Some(poll_interval);
        *self.shared.sink.lock().unwrap() = Some(sink);
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn async_stop(&mut self) {
        self.shared.sink.lock().unwrap().take();
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl MonitorHandle {
    /// Report a console user change, as the OS source would
    pub fn set_owner(&self, uid: Option<u32>) {
        if let Some(sink) = self.sink() {
            sink(uid.map(SessionOwnerId::new));
        }
    }

    /// The sink currently installed by the manager
    pub fn sink(&self) -> Option<OwnerChangeSink> {
        self.shared.sink.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        *self.shared.poll_interval.lock().unwrap()
    }
}

/// What the factory saw for one created transport
pub struct CreatedTransport {
    pub address: PathBuf,
    pub options: TransportOptions,
    pub events: TransportEventSink,
    pub live_at_create: usize,
}

#[derive(Default)]
struct FactoryShared {
    created: Mutex<Vec<CreatedTransport>>,
    sent: Mutex<Vec<(PathBuf, Bytes)>>,
    started: Mutex<Vec<PathBuf>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

/// Transport factory recording everything its transports do
#[derive(Clone, Default)]
pub struct RecordingFactory {
    shared: Arc<FactoryShared>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_count(&self) -> usize {
        self.shared.created.lock().unwrap().len()
    }

    pub fn addresses(&self) -> Vec<PathBuf> {
        self.shared
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.address.clone())
            .collect()
    }

    pub fn options(&self, index: usize) -> TransportOptions {
        self.shared.created.lock().unwrap()[index].options
    }

    pub fn live_at_create(&self) -> Vec<usize> {
        self.shared
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.live_at_create)
            .collect()
    }

    /// Emit an event as the `index`-th created transport
    pub fn emit(&self, index: usize, event: TransportEvent) {
        let sink = Arc::clone(&self.shared.created.lock().unwrap()[index].events);
        sink(event);
    }

    pub fn sent(&self) -> Vec<(PathBuf, Bytes)> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<PathBuf> {
        self.shared.started.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }
}

impl TransportFactory for RecordingFactory {
    fn create(
        &self,
        address: PathBuf,
        options: TransportOptions,
        events: TransportEventSink,
    ) -> Box<dyn Transport> {
        let live_at_create = self.shared.live.fetch_add(1, Ordering::SeqCst);
        self.shared
            .max_live
            .fetch_max(live_at_create + 1, Ordering::SeqCst);

        self.shared.created.lock().unwrap().push(CreatedTransport {
            address: address.clone(),
            options,
            events,
            live_at_create,
        });

        Box::new(RecordingTransport {
            address,
            shared: Arc::clone(&self.shared),
        })
    }
}

struct RecordingTransport {
    address: PathBuf,
    shared: Arc<FactoryShared>,
}

impl Transport for RecordingTransport {
    fn address(&self) -> &Path {
        &self.address
    }

    fn async_start(&mut self) {
        self.shared.started.lock().unwrap().push(self.address.clone());
    }

    fn async_send(&self, payload: Bytes) {
        self.shared
            .sent
            .lock()
            .unwrap()
            .push((self.address.clone(), payload));
    }
}

impl Drop for RecordingTransport {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}
