//! UDP transport endpoint shared by all sessions on one local address.
//!
//! The endpoint owns the socket and a background receive task. Listeners
//! are invoked from that task, once per datagram, in registration order.
//! The task runs while at least one listener is registered.

use crate::config::EndpointConfig;
use crate::error::{EngineError, EngineResult};
use crate::transport::{DatagramListener, ListenerId, Transport};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

type ListenerList = Arc<RwLock<Vec<(ListenerId, DatagramListener)>>>;

struct ReceiveTask {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// A bound UDP socket with a listener registry.
pub struct TransportEndpoint {
    socket: Arc<UdpSocket>,
    // Same socket, used for sends outside the reactor.
    sender: std::net::UdpSocket,
    local_addr: SocketAddr,
    recv_buffer_size: usize,
    listeners: ListenerList,
    next_id: AtomicU64,
    receiver: Mutex<Option<ReceiveTask>>,
    runtime: Handle,
}

impl TransportEndpoint {
    /// Binds the socket and joins the multicast group.
    ///
    /// Must be called from within a tokio runtime. Bind and join failures
    /// are fatal transport errors.
    pub fn bind(config: &EndpointConfig) -> EngineResult<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| EngineError::Runtime(e.to_string()))?;

        let requested = config.socket_addr();
        let socket = std::net::UdpSocket::bind(requested)
            .map_err(|e| EngineError::transport_fatal(format!("bind {requested}: {e}")))?;

        if config.join_multicast {
            let interface = match config.local_addr {
                IpAddr::V4(addr) => addr,
                IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
            };
            socket
                .join_multicast_v4(&config.multicast_group, &interface)
                .map_err(|e| {
                    EngineError::transport_fatal(format!(
                        "join multicast {}: {e}",
                        config.multicast_group
                    ))
                })?;
        }

        socket
            .set_nonblocking(true)
            .map_err(|e| EngineError::transport_fatal(format!("set_nonblocking: {e}")))?;

        let sender = socket
            .try_clone()
            .map_err(|e| EngineError::transport_fatal(format!("clone socket: {e}")))?;

        let socket = {
            let _guard = runtime.enter();
            UdpSocket::from_std(socket)
                .map_err(|e| EngineError::transport_fatal(format!("register socket: {e}")))?
        };
        let local_addr = socket
            .local_addr()
            .map_err(|e| EngineError::transport_fatal(format!("local_addr: {e}")))?;

        info!(
            local = %local_addr,
            multicast = config.join_multicast,
            "CoIoT endpoint bound"
        );

        Ok(Arc::new(Self {
            socket: Arc::new(socket),
            sender,
            local_addr,
            recv_buffer_size: config.recv_buffer_size,
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
            receiver: Mutex::new(None),
            runtime,
        }))
    }

    /// Returns the bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns true while the receive task is running.
    pub fn is_receiving(&self) -> bool {
        self.receiver
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    fn start_receiver(&self) {
        let mut receiver = self.receiver.lock();
        if receiver.is_some() {
            return;
        }
        let shutdown = Arc::new(Notify::new());
        let handle = self.runtime.spawn(receive_loop(
            Arc::clone(&self.socket),
            Arc::clone(&self.listeners),
            self.recv_buffer_size,
            Arc::clone(&shutdown),
        ));
        debug!(local = %self.local_addr, "receive task started");
        *receiver = Some(ReceiveTask { shutdown, handle });
    }

    fn stop_receiver(&self) {
        if let Some(task) = self.receiver.lock().take() {
            task.shutdown.notify_one();
            debug!(local = %self.local_addr, "receive task stopping");
        }
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    listeners: ListenerList,
    buffer_size: usize,
    shutdown: Arc<Notify>,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, source)) => {
                    trace!(%source, len, "datagram received");
                    let payload = Bytes::copy_from_slice(&buf[..len]);
                    // Snapshot so listeners may (un)register from inside a callback.
                    let snapshot: Vec<DatagramListener> = listeners
                        .read()
                        .iter()
                        .map(|(_, listener)| Arc::clone(listener))
                        .collect();
                    for listener in snapshot {
                        listener(source, payload.clone());
                    }
                }
                Err(e) => warn!(error = %e, "CoIoT receive failed"),
            }
        }
    }
}

impl Transport for TransportEndpoint {
    fn send(&self, target: SocketAddr, payload: &[u8]) -> EngineResult<()> {
        self.sender
            .send_to(payload, target)
            .map_err(|e| EngineError::transport_retryable(format!("send to {target}: {e}")))?;
        trace!(%target, len = payload.len(), "datagram sent");
        Ok(())
    }

    fn register(&self, listener: DatagramListener) -> EngineResult<ListenerId> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        self.start_receiver();
        Ok(id)
    }

    fn unregister(&self, id: ListenerId) {
        let remaining = {
            let mut listeners = self.listeners.write();
            listeners.retain(|(existing, _)| *existing != id);
            listeners.len()
        };
        if remaining == 0 {
            self.stop_receiver();
        }
    }
}

impl Drop for TransportEndpoint {
    fn drop(&mut self) {
        self.stop_receiver();
    }
}

impl std::fmt::Debug for TransportEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEndpoint")
            .field("local_addr", &self.local_addr)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Hands out one shared endpoint per local address.
///
/// Entries are weak: an endpoint is closed once the last session holding
/// it is dropped, and the next `acquire` binds a fresh socket.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: Mutex<HashMap<SocketAddr, Weak<TransportEndpoint>>>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live endpoint for the configured address, binding one if needed.
    pub fn acquire(&self, config: &EndpointConfig) -> EngineResult<Arc<TransportEndpoint>> {
        let mut endpoints = self.endpoints.lock();
        endpoints.retain(|_, endpoint| endpoint.strong_count() > 0);

        if config.port != 0 {
            if let Some(endpoint) = endpoints.get(&config.socket_addr()).and_then(Weak::upgrade) {
                return Ok(endpoint);
            }
        }

        let endpoint = TransportEndpoint::bind(config)?;
        endpoints.insert(endpoint.local_addr(), Arc::downgrade(&endpoint));
        Ok(endpoint)
    }

    /// Returns the number of live endpoints.
    pub fn len(&self) -> usize {
        self.endpoints
            .lock()
            .values()
            .filter(|endpoint| endpoint.strong_count() > 0)
            .count()
    }

    /// Returns true if no endpoint is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
