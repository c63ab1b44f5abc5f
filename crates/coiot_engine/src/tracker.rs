//! At most one outstanding request per purpose.

use crate::error::EngineResult;
use crate::transport::Transport;
use coiot_codec::{encode_message, Message, MessageType};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Resource path of the device description.
pub const DESCRIPTION_PATH: &str = "/cit/d";

/// Resource path of the device status.
pub const STATUS_PATH: &str = "/cit/s";

/// What a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Device description request.
    Discovery,
    /// Status observe request.
    Status,
}

impl RequestKind {
    /// Returns the resource path the request targets.
    pub fn path(self) -> &'static str {
        match self {
            RequestKind::Discovery => DESCRIPTION_PATH,
            RequestKind::Status => STATUS_PATH,
        }
    }
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A matching response arrived.
    Responded,
    /// Replaced by a newer request or the session stopped.
    Cancelled,
    /// No response within the request timeout.
    TimedOut,
}

const PENDING: u8 = 0;
const RESPONDED: u8 = 1;
const CANCELLED: u8 = 2;
const TIMED_OUT: u8 = 3;

#[derive(Debug)]
struct HandleState {
    kind: RequestKind,
    message_id: u16,
    outcome: AtomicU8,
}

/// Cancellable handle for one sent request.
///
/// The outcome is set exactly once; later transitions are ignored.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    state: Arc<HandleState>,
}

impl RequestHandle {
    fn new(kind: RequestKind, message_id: u16) -> Self {
        Self {
            state: Arc::new(HandleState {
                kind,
                message_id,
                outcome: AtomicU8::new(PENDING),
            }),
        }
    }

    fn finish(&self, code: u8) -> bool {
        self.state
            .outcome
            .compare_exchange(PENDING, code, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Cancels the request. Returns false if it had already finished.
    pub fn cancel(&self) -> bool {
        self.finish(CANCELLED)
    }

    /// Marks the request as answered. Returns false if it had already finished.
    pub fn complete(&self) -> bool {
        self.finish(RESPONDED)
    }

    fn time_out(&self) -> bool {
        self.finish(TIMED_OUT)
    }

    /// Returns true while no outcome has been recorded.
    pub fn is_pending(&self) -> bool {
        self.state.outcome.load(Ordering::Acquire) == PENDING
    }

    /// Returns the outcome, if any.
    pub fn outcome(&self) -> Option<RequestOutcome> {
        match self.state.outcome.load(Ordering::Acquire) {
            RESPONDED => Some(RequestOutcome::Responded),
            CANCELLED => Some(RequestOutcome::Cancelled),
            TIMED_OUT => Some(RequestOutcome::TimedOut),
            _ => None,
        }
    }

    /// Returns the CoAP message id of the request.
    pub fn message_id(&self) -> u16 {
        self.state.message_id
    }

    /// Returns the request kind.
    pub fn kind(&self) -> RequestKind {
        self.state.kind
    }
}

struct InFlight {
    handle: RequestHandle,
    deadline: Instant,
}

/// Tracks the single in-flight request of each kind for one device.
pub struct RequestTracker {
    target: SocketAddr,
    timeout: Duration,
    next_message_id: u16,
    inflight: HashMap<RequestKind, InFlight>,
}

impl RequestTracker {
    /// Creates a tracker for requests to `target`.
    pub fn new(target: SocketAddr, timeout: Duration) -> Self {
        Self {
            target,
            timeout,
            next_message_id: rand::random(),
            inflight: HashMap::new(),
        }
    }

    /// Cancels any in-flight request of `kind` and sends a new one.
    ///
    /// Nothing is tracked if the send fails.
    pub fn send_or_replace<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        kind: RequestKind,
        message_type: MessageType,
        now: Instant,
    ) -> EngineResult<RequestHandle> {
        if let Some(previous) = self.inflight.remove(&kind) {
            if previous.handle.cancel() {
                trace!(?kind, mid = previous.handle.message_id(), "replaced in-flight request");
            }
        }

        let message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);

        let request = Message::get(message_type, message_id, kind.path());
        let bytes = encode_message(&request)?;
        transport.send(self.target, &bytes)?;

        debug!(?kind, mid = message_id, target = %self.target, "request sent");
        let handle = RequestHandle::new(kind, message_id);
        self.inflight.insert(
            kind,
            InFlight {
                handle: handle.clone(),
                deadline: now + self.timeout,
            },
        );
        Ok(handle)
    }

    /// Marks the in-flight request of `kind` as answered.
    pub fn complete(&mut self, kind: RequestKind) -> bool {
        self.inflight
            .remove(&kind)
            .is_some_and(|request| request.handle.complete())
    }

    /// Returns true if a request of `kind` is in flight.
    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.inflight
            .get(&kind)
            .is_some_and(|request| request.handle.is_pending())
    }

    /// Removes requests whose deadline has passed and reports them.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<(RequestKind, RequestOutcome)> {
        let mut expired = Vec::new();
        self.inflight.retain(|kind, request| {
            if !request.handle.is_pending() {
                return false;
            }
            if now >= request.deadline && request.handle.time_out() {
                expired.push((*kind, RequestOutcome::TimedOut));
                return false;
            }
            true
        });
        expired
    }

    /// Cancels every in-flight request.
    pub fn cancel_all(&mut self) {
        for (_, request) in self.inflight.drain() {
            request.handle.cancel();
        }
    }
}
