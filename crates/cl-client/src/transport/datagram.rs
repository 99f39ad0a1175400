//! Reconnecting Unix datagram client
//!
//! One background task per transport drives the connection:
//!
//! 1. connect to the server socket; on failure report `ConnectFailed`
//! 2. while connected, forward queued datagrams and check every
//!    server-check interval that the socket file is still the one we
//!    connected to; a missing or replaced socket, or a failed send, reports
//!    `Closed`
//! 3. wait the reconnect interval and go back to 1
//!
//! Datagrams queued while disconnected are dropped.

use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::net::UnixDatagram;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use cl_core::traits::{
    Transport, TransportEvent, TransportEventSink, TransportFactory, TransportOptions,
};
use cl_core::TransportError;

/// Creates [`DatagramTransport`]s on a tokio runtime
#[derive(Clone)]
pub struct DatagramTransportFactory {
    runtime: Handle,
}

impl DatagramTransportFactory {
    /// Create a factory whose transports run on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl TransportFactory for DatagramTransportFactory {
    fn create(
        &self,
        address: PathBuf,
        options: TransportOptions,
        events: TransportEventSink,
    ) -> Box<dyn Transport> {
        Box::new(DatagramTransport::new(
            self.runtime.clone(),
            address,
            options,
            events,
        ))
    }
}

/// Event sink that can be switched off; emission and switch-off are
/// serialized so nothing is emitted once `disable` returns
#[derive(Clone)]
struct Emitter(Arc<Mutex<Option<TransportEventSink>>>);

impl Emitter {
    fn new(sink: TransportEventSink) -> Self {
        Self(Arc::new(Mutex::new(Some(sink))))
    }

    fn emit(&self, event: TransportEvent) {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = guard.as_ref() {
            sink(event);
        }
    }

    fn disable(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Reconnecting client for one Unix datagram server socket
pub struct DatagramTransport {
    address: PathBuf,
    options: TransportOptions,
    runtime: Handle,
    emitter: Emitter,
    send_tx: mpsc::UnboundedSender<Bytes>,
    send_rx: Option<mpsc::UnboundedReceiver<Bytes>>,
    cancel: CancellationToken,
}

impl DatagramTransport {
    /// Create a transport; it does not connect until `async_start`
    pub fn new(
        runtime: Handle,
        address: PathBuf,
        options: TransportOptions,
        events: TransportEventSink,
    ) -> Self {
        let (send_tx, send_rx) = mpsc::unbounded_channel();
        Self {
            address,
            options,
            runtime,
            emitter: Emitter::new(events),
            send_tx,
            send_rx: Some(send_rx),
            cancel: CancellationToken::new(),
        }
    }
}

impl Transport for DatagramTransport {
    fn address(&self) -> &Path {
        &self.address
    }

    fn async_start(&mut self) {
        let Some(send_rx) = self.send_rx.take() else {
            return;
        };

        let worker = Worker {
            address: self.address.clone(),
            options: self.options,
            emitter: self.emitter.clone(),
            send_rx,
            cancel: self.cancel.clone(),
        };
        self.runtime.spawn(worker.run());
    }

    fn async_send(&self, payload: Bytes) {
        let _ = self.send_tx.send(payload);
    }
}

impl Drop for DatagramTransport {
    fn drop(&mut self) {
        self.emitter.disable();
        self.cancel.cancel();
    }
}

/// Why a connected session ended
enum Disconnect {
    Cancelled,
    Lost(TransportError),
}

/// (device, inode) of the server socket, used to notice a replaced socket
type ServerIdentity = (u64, u64);

struct Worker {
    address: PathBuf,
    options: TransportOptions,
    emitter: Emitter,
    send_rx: mpsc::UnboundedReceiver<Bytes>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!(socket = %self.address.display(), "Datagram transport started");

        loop {
            match self.connect().await {
                Ok((socket, identity)) => {
                    tracing::debug!(socket = %self.address.display(), "Connected");
                    self.emitter.emit(TransportEvent::Connected);

                    match self.serve(&socket, identity).await {
                        Disconnect::Cancelled => break,
                        Disconnect::Lost(err) => {
                            tracing::debug!(error = %err, "Connection lost");
                            self.emitter.emit(TransportEvent::Closed);
                        }
                    }
                }
                Err(err) => {
                    tracing::trace!(error = %err, "Connect failed");
                    self.emitter.emit(TransportEvent::ConnectFailed(err));
                }
            }

            if !self.wait_reconnect().await {
                break;
            }
        }

        tracing::debug!(socket = %self.address.display(), "Datagram transport stopped");
    }

    async fn connect(&self) -> Result<(UnixDatagram, Option<ServerIdentity>), TransportError> {
        let socket =
            UnixDatagram::unbound().map_err(|e| TransportError::connect(&self.address, &e))?;
        socket
            .connect(&self.address)
            .map_err(|e| TransportError::connect(&self.address, &e))?;

        Ok((socket, server_identity(&self.address).await))
    }

    async fn serve(&mut self, socket: &UnixDatagram, identity: Option<ServerIdentity>) -> Disconnect {
        let mut check = tokio::time::interval(self.options.server_check_interval);
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        check.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Disconnect::Cancelled,

                payload = self.send_rx.recv() => {
                    let Some(payload) = payload else {
                        return Disconnect::Cancelled;
                    };
                    if let Err(e) = socket.send(&payload).await {
                        return Disconnect::Lost(TransportError::send(&self.address, &e));
                    }
                    tracing::trace!(bytes = payload.len(), "Datagram sent");
                }

                _ = check.tick() => {
                    let current = server_identity(&self.address).await;
                    if current.is_none() || current != identity {
                        return Disconnect::Lost(TransportError::ServerGone(self.address.clone()));
                    }
                }
            }
        }
    }

    /// Sleep for the reconnect interval, dropping sends. False when cancelled.
    async fn wait_reconnect(&mut self) -> bool {
        let delay = tokio::time::sleep(self.options.reconnect_interval);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = &mut delay => return true,
                payload = self.send_rx.recv() => match payload {
                    Some(payload) => {
                        tracing::trace!(bytes = payload.len(), "Not connected; dropping datagram");
                    }
                    None => return false,
                },
            }
        }
    }
}

async fn server_identity(path: &Path) -> Option<ServerIdentity> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata
        .file_type()
        .is_socket()
        .then(|| (metadata.dev(), metadata.ino()))
}
