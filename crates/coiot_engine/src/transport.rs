//! Transport layer abstraction for CoIoT sessions.

use crate::error::{EngineError, EngineResult};
use bytes::Bytes;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Callback invoked once per received datagram.
pub type DatagramListener = Arc<dyn Fn(SocketAddr, Bytes) + Send + Sync>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// A datagram transport shared by one or more sessions.
///
/// This trait abstracts the network layer, allowing the UDP endpoint to be
/// replaced by [`MockTransport`] in tests.
pub trait Transport: Send + Sync {
    /// Sends one datagram. Never blocks on the network.
    fn send(&self, target: SocketAddr, payload: &[u8]) -> EngineResult<()>;

    /// Registers a listener for every received datagram.
    fn register(&self, listener: DatagramListener) -> EngineResult<ListenerId>;

    /// Removes a listener. Unknown ids are ignored.
    fn unregister(&self, id: ListenerId);
}

/// A datagram recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    /// Destination address.
    pub target: SocketAddr,
    /// Raw datagram bytes.
    pub payload: Vec<u8>,
}

/// A mock transport for testing.
///
/// Records outgoing datagrams and lets tests inject incoming ones with
/// [`MockTransport::deliver`].
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentDatagram>>,
    listeners: Mutex<Vec<(ListenerId, DatagramListener)>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all datagrams sent so far.
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.sent.lock().clone()
    }

    /// Drains the recorded datagrams.
    pub fn take_sent(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Makes subsequent sends fail with a retryable error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Delivers a datagram to every registered listener.
    pub fn deliver(&self, source: SocketAddr, payload: impl Into<Bytes>) {
        let payload = payload.into();
        let listeners: Vec<DatagramListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(source, payload.clone());
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, target: SocketAddr, payload: &[u8]) -> EngineResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::transport_retryable("mock transport is failing"));
        }
        self.sent.lock().push(SentDatagram {
            target,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn register(&self, listener: DatagramListener) -> EngineResult<ListenerId> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, listener));
        Ok(id)
    }

    fn unregister(&self, id: ListenerId) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn addr() -> SocketAddr {
        "192.168.1.40:5683".parse().unwrap()
    }

    #[test]
    fn records_sent_datagrams() {
        let transport = MockTransport::new();
        transport.send(addr(), &[0x50, 0x01]).unwrap();
        transport.send(addr(), &[0x50, 0x02]).unwrap();

        assert_eq!(transport.sent().len(), 2);
        assert_eq!(transport.take_sent()[1].payload, vec![0x50, 0x02]);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn failing_send() {
        let transport = MockTransport::new();
        transport.set_failing(true);
        let err = transport.send(addr(), &[0x50]).unwrap_err();
        assert!(!err.is_fatal());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn deliver_reaches_registered_listeners() {
        let transport = MockTransport::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = transport
            .register(Arc::new(move |source, payload| {
                assert_eq!(source, addr());
                assert_eq!(&payload[..], b"hi");
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        transport.deliver(addr(), &b"hi"[..]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        transport.unregister(id);
        assert_eq!(transport.listener_count(), 0);
        transport.deliver(addr(), &b"hi"[..]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
