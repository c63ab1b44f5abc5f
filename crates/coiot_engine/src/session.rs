//! Per-device session state machine.
//!
//! ```text
//! Uninitialized ──start──▶ Discovering ──description──▶ Ready
//!                    │                                   │
//!                    └──persisted description──▶ Ready   │ version change
//!                                                        ▼
//!                              Discovering ◀──retry── Reinitializing
//! ```
//!
//! `Stopped` is terminal and reachable from every state. All mutable
//! state sits behind one mutex, held for the whole of one packet.

use crate::config::{EndpointConfig, SessionConfig};
use crate::endpoint::{EndpointRegistry, TransportEndpoint};
use crate::error::{EngineError, EngineResult};
use crate::handler::DeviceHandler;
use crate::tracker::{RequestKind, RequestTracker, DESCRIPTION_PATH, STATUS_PATH};
use crate::transport::{ListenerId, Transport};
use coiot_codec::{decode_message, option, Code, Message, MessageType};
use coiot_protocol::channels::{ACCUMULATED_TOTAL, ACCUMULATED_WATTS, CURRENT_WATTS, GROUP_METER, TOTAL_KWH};
use coiot_protocol::{
    parse_status, ChannelKey, DecodeContext, DecodeWarning, DescriptionCache, DescriptionError,
    DeviceIdentity, DeviceProfile, ProtocolError, ProtocolVersion, TypedValue, Unit, UpdateBatch,
    VersionStrategy,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// The current state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Uninitialized,
    /// Waiting for a device description.
    Discovering,
    /// Description known, status updates are decoded.
    Ready,
    /// The device changed protocol version; maps were cleared.
    Reinitializing,
    /// Terminal.
    Stopped,
}

impl SessionState {
    /// Returns true if inbound packets are processed in this state.
    pub fn accepts_packets(&self) -> bool {
        !matches!(self, SessionState::Uninitialized | SessionState::Stopped)
    }

    /// Returns true if discovery is retried periodically in this state.
    pub fn needs_discovery(&self) -> bool {
        matches!(self, SessionState::Discovering | SessionState::Reinitializing)
    }

    /// Returns true if the session has been stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "Uninitialized",
            SessionState::Discovering => "Discovering",
            SessionState::Ready => "Ready",
            SessionState::Reinitializing => "Reinitializing",
            SessionState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Packets from the device address.
    pub packets_received: u64,
    /// Packets that could not be used.
    pub packets_dropped: u64,
    /// Status packets suppressed as duplicates.
    pub duplicates: u64,
    /// Updates handed to the device handler.
    pub updates_emitted: u64,
    /// Discovery requests sent.
    pub discoveries_sent: u64,
    /// Protocol version changes.
    pub reinitializations: u64,
    /// Samples skipped with a decode warning.
    pub decode_warnings: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Description,
    Status,
    Other,
}

fn classify(message: &Message, payload: &str) -> PayloadKind {
    match message.uri_path().as_str() {
        DESCRIPTION_PATH => PayloadKind::Description,
        STATUS_PATH => PayloadKind::Status,
        "" if payload.contains("\"blk\"") => PayloadKind::Description,
        "" if payload.contains("\"G\"") => PayloadKind::Status,
        _ => PayloadKind::Other,
    }
}

fn identify(message: &Message) -> EngineResult<(DeviceIdentity, ProtocolVersion)> {
    let raw = message
        .option(option::COIOT_GLOBAL_DEVID)
        .ok_or_else(|| ProtocolError::InvalidDeviceId(String::new()))?
        .as_str()?;
    let identity = DeviceIdentity::parse(raw)?;
    let version = identity.version()?;
    Ok((identity, version))
}

struct SessionInner {
    state: SessionState,
    device_id: Option<String>,
    strategy: Option<VersionStrategy>,
    last_serial: Option<u32>,
    last_payload_hash: Option<[u8; 32]>,
    cache: DescriptionCache,
    tracker: RequestTracker,
    observing: bool,
    last_discovery: Option<Instant>,
    listener: Option<ListenerId>,
    stats: SessionStats,
}

impl SessionInner {
    fn reset_memo(&mut self) {
        self.last_serial = None;
        self.last_payload_hash = None;
    }
}

/// Synchronizes one device's state over CoIoT.
pub struct Session<T: Transport + 'static, H: DeviceHandler + 'static> {
    config: SessionConfig,
    transport: Arc<T>,
    handler: Arc<H>,
    inner: Mutex<SessionInner>,
}

impl<T: Transport + 'static, H: DeviceHandler + 'static> Session<T, H> {
    /// Creates a session. Nothing is sent until [`Session::start`].
    pub fn new(config: SessionConfig, transport: Arc<T>, handler: Arc<H>) -> Self {
        let tracker = RequestTracker::new(config.device_socket_addr(), config.request_timeout);
        Self {
            config,
            transport,
            handler,
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                device_id: None,
                strategy: None,
                last_serial: None,
                last_payload_hash: None,
                cache: DescriptionCache::new(),
                tracker,
                observing: false,
                last_discovery: None,
                listener: None,
                stats: SessionStats::default(),
            }),
        }
    }

    /// Registers with the transport and starts discovery.
    ///
    /// A persisted description, if the handler has one, is ingested first
    /// and the session goes straight to `Ready`; discovery is still sent to
    /// refresh it. Only fatal transport errors are returned.
    pub fn start(self: &Arc<Self>) -> EngineResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.state {
            SessionState::Uninitialized => {}
            SessionState::Stopped => return Err(EngineError::Stopped),
            other => {
                return Err(EngineError::InvalidStateTransition {
                    from: other.to_string(),
                    to: "start".into(),
                })
            }
        }

        let weak = Arc::downgrade(self);
        let listener = self.transport.register(Arc::new(move |source, payload| {
            if let Some(session) = weak.upgrade() {
                session.handle_datagram(source, &payload);
            }
        }))?;
        inner.listener = Some(listener);

        inner.state = SessionState::Discovering;
        if let Some(stored) = self.handler.persisted_description() {
            match inner.cache.ingest_payload(&stored, None) {
                Ok(report) => {
                    info!(
                        device = %self.config.device_name,
                        blocks = report.blocks,
                        sensors = report.sensors,
                        "seeded from persisted description"
                    );
                    inner.state = SessionState::Ready;
                }
                Err(e) => {
                    warn!(device = %self.config.device_name, error = %e, "persisted description unusable");
                    inner.cache.clear();
                }
            }
        }

        match self.send_request(inner, RequestKind::Discovery, Instant::now()) {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(device = %self.config.device_name, error = %e, "discovery send failed, will retry");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Stops the session. In-flight requests are cancelled and the
    /// transport listener is removed.
    pub fn stop(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state.is_stopped() {
            return;
        }
        inner.state = SessionState::Stopped;
        inner.tracker.cancel_all();
        inner.observing = false;
        if let Some(id) = inner.listener.take() {
            self.transport.unregister(id);
        }
        info!(device = %self.config.device_name, "session stopped");
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Returns the bound protocol version, if any packet was accepted yet.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.inner.lock().strategy.map(VersionStrategy::version)
    }

    /// Returns the device id from the last accepted packet.
    pub fn device_id(&self) -> Option<String> {
        self.inner.lock().device_id.clone()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> SessionStats {
        self.inner.lock().stats.clone()
    }

    /// Returns a copy of the description cache.
    pub fn description(&self) -> DescriptionCache {
        self.inner.lock().cache.clone()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Processes one inbound datagram.
    pub fn handle_datagram(&self, source: SocketAddr, payload: &[u8]) {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if !inner.state.accepts_packets() {
            return;
        }
        if source.ip() != self.config.device_addr {
            trace!(device = %self.config.device_name, %source, "ignoring packet from other source");
            return;
        }
        inner.stats.packets_received += 1;

        let message = match decode_message(payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(device = %self.config.device_name, error = %e, "undecodable datagram");
                inner.reset_memo();
                inner.stats.packets_dropped += 1;
                return;
            }
        };
        if message.code != Code::CONTENT && message.code != Code::COIOT_PUBLISH {
            debug!(device = %self.config.device_name, code = %message.code, "unexpected response code");
            inner.stats.packets_dropped += 1;
            return;
        }
        let (identity, version) = match identify(&message) {
            Ok(found) => found,
            Err(e) => {
                debug!(device = %self.config.device_name, error = %e, "packet without usable device id");
                inner.reset_memo();
                inner.stats.packets_dropped += 1;
                return;
            }
        };
        let serial = message
            .option(option::COIOT_STATUS_SERIAL)
            .and_then(|opt| opt.as_uint().ok());

        self.handler.set_online();
        self.bind_version(inner, &identity, version, now);

        let text = message.payload_str();
        match classify(&message, &text) {
            PayloadKind::Description => self.on_description(inner, &text, version, now),
            PayloadKind::Status => self.on_status(inner, &text, serial, now),
            PayloadKind::Other => {
                debug!(
                    device = %self.config.device_name,
                    path = %message.uri_path(),
                    "unrecognized payload"
                );
                inner.stats.packets_dropped += 1;
            }
        }

        // Re-arm after dispatch so this packet was checked against the memo.
        if !inner.observing && !inner.state.is_stopped() {
            match self.send_request(inner, RequestKind::Status, now) {
                Ok(()) => inner.observing = true,
                Err(e) => warn!(device = %self.config.device_name, error = %e, "status request failed"),
            }
        }
    }

    fn bind_version(
        &self,
        inner: &mut SessionInner,
        identity: &DeviceIdentity,
        version: ProtocolVersion,
        now: Instant,
    ) {
        inner.device_id = Some(identity.device_id.clone());
        match inner.strategy {
            None => {
                inner.strategy = Some(VersionStrategy::for_version(version));
                info!(
                    device = %self.config.device_name,
                    id = %identity.device_id,
                    %version,
                    "CoIoT version bound"
                );
                if let Err(e) = inner.cache.check_id_width(version) {
                    warn!(device = %self.config.device_name, error = %e, "cached description is stale");
                    inner.cache.clear();
                    inner.state = SessionState::Discovering;
                    self.ensure_discovery(inner, now);
                }
            }
            Some(strategy) if strategy.version() != version => {
                warn!(
                    device = %self.config.device_name,
                    from = %strategy.version(),
                    to = %version,
                    "device changed CoIoT version, reinitializing"
                );
                inner.cache.clear();
                inner.strategy = Some(VersionStrategy::for_version(version));
                inner.state = SessionState::Reinitializing;
                inner.observing = false;
                inner.stats.reinitializations += 1;
                self.handler.reinitialize();
                if let Err(e) = self.send_request(inner, RequestKind::Discovery, now) {
                    warn!(device = %self.config.device_name, error = %e, "discovery send failed");
                }
            }
            Some(_) => {}
        }
    }

    fn on_description(&self, inner: &mut SessionInner, payload: &str, version: ProtocolVersion, now: Instant) {
        inner.tracker.complete(RequestKind::Discovery);
        trace!(device = %self.config.device_name, payload, "description received");

        match inner.cache.ingest_payload(payload, Some(version)) {
            Ok(report) => {
                if report.is_inconsistent() {
                    warn!(
                        device = %self.config.device_name,
                        rejected = ?report.rejected,
                        "sensors link to unknown blocks"
                    );
                }
                info!(
                    device = %self.config.device_name,
                    blocks = report.blocks,
                    sensors = report.sensors,
                    synthetic = report.synthetic_blocks.len(),
                    "description ingested"
                );
                self.handler.persist_description(payload);
                inner.state = SessionState::Ready;
            }
            Err(DescriptionError::IdWidthMismatch { id, version }) => {
                warn!(
                    device = %self.config.device_name,
                    sensor_id = %id,
                    %version,
                    "description does not match protocol version, rediscovering"
                );
                if inner.cache.is_empty() {
                    inner.state = SessionState::Discovering;
                }
                self.ensure_discovery(inner, now);
            }
            Err(DescriptionError::Malformed(e)) => {
                debug!(device = %self.config.device_name, error = %e, "unreadable description");
                inner.reset_memo();
                inner.stats.packets_dropped += 1;
                if inner.cache.is_empty() {
                    inner.state = SessionState::Discovering;
                }
            }
        }
    }

    fn on_status(&self, inner: &mut SessionInner, payload: &str, serial: Option<u32>, now: Instant) {
        inner.tracker.complete(RequestKind::Status);
        let profile = self.handler.profile();

        let hash: [u8; 32] = Sha256::digest(payload.as_bytes()).into();
        if let Some(serial) = serial {
            if inner.last_serial == Some(serial) && inner.last_payload_hash == Some(hash) {
                // Battery devices restart their serial at wake-up.
                if !(profile.has_battery && serial & 0xFF == 0) {
                    trace!(device = %self.config.device_name, serial, "duplicate status ignored");
                    inner.stats.duplicates += 1;
                    return;
                }
                debug!(device = %self.config.device_name, serial, "repeated serial after wake-up, decoding");
            }
        }

        if inner.cache.is_empty() && !self.seed_for_status(inner, now) {
            debug!(
                device = %self.config.device_name,
                serial = ?serial,
                "no description yet, status dropped"
            );
            inner.stats.packets_dropped += 1;
            return;
        }

        let batch = match parse_status(payload) {
            Ok(batch) => batch,
            Err(e) => {
                debug!(device = %self.config.device_name, error = %e, "unreadable status");
                inner.reset_memo();
                inner.stats.packets_dropped += 1;
                return;
            }
        };
        if batch.skipped > 0 {
            debug!(device = %self.config.device_name, skipped = batch.skipped, "malformed status entries skipped");
        }
        let Some(strategy) = inner.strategy else {
            return;
        };

        let ctx = DecodeContext::new(&profile, &inner.cache);
        let mut updates = UpdateBatch::new();
        let mut unknown = 0usize;
        let mut stale = false;
        for sample in &batch.samples {
            let Some(sensor) = inner.cache.sensor(&sample.sensor_id) else {
                debug!(device = %self.config.device_name, sensor_id = %sample.sensor_id, "status for unknown sensor");
                unknown += 1;
                inner.stats.decode_warnings += 1;
                continue;
            };
            let result = if inner.cache.block(&sensor.links).is_none() {
                Err(DecodeWarning::MissingBlock {
                    sensor_id: sensor.id.clone(),
                    links: sensor.links.clone(),
                })
            } else {
                strategy.decode(&ctx, sensor, sample, &mut updates)
            };
            if let Err(warning) = result {
                debug!(device = %self.config.device_name, %warning, "sample skipped");
                stale |= warning.indicates_stale_description();
                inner.stats.decode_warnings += 1;
            }
        }
        if !batch.samples.is_empty() && unknown == batch.samples.len() {
            stale = true;
        }

        let touches_meter = updates.touches_indexed_meter();
        let mut emitted = updates.len() as u64;
        let mut changed = 0usize;
        for update in updates.into_updates() {
            trace!(device = %self.config.device_name, key = %update.key, value = %update.value, "update");
            if self.handler.update_channel(&update.key, update.value) {
                changed += 1;
            }
        }
        if changed > 0 {
            debug!(
                device = %self.config.device_name,
                changed,
                serial = ?serial,
                "channels updated from CoIoT status"
            );
        }
        if touches_meter && changed > 0 && profile.aggregates_meters() {
            emitted += self.aggregate_meters(&profile);
        }
        inner.stats.updates_emitted += emitted;

        if stale {
            debug!(device = %self.config.device_name, "description inconsistent with status, rediscovering");
            self.ensure_discovery(inner, now);
        }

        inner.last_serial = serial;
        inner.last_payload_hash = Some(hash);
    }

    /// Starts discovery and tries the persisted description so the current
    /// batch can still be decoded. Returns true if the cache is usable.
    fn seed_for_status(&self, inner: &mut SessionInner, now: Instant) -> bool {
        self.ensure_discovery(inner, now);
        let Some(stored) = self.handler.persisted_description() else {
            return false;
        };
        let version = inner.strategy.map(VersionStrategy::version);
        match inner.cache.ingest_payload(&stored, version) {
            Ok(_) if !inner.cache.is_empty() => {
                debug!(device = %self.config.device_name, "decoding with persisted description");
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(device = %self.config.device_name, error = %e, "persisted description unusable");
                false
            }
        }
    }

    /// Sums the per-output meters into the unindexed meter group.
    fn aggregate_meters(&self, profile: &DeviceProfile) -> u64 {
        let mut watts = 0.0;
        let mut total = 0.0;
        let mut present = false;
        for i in 1..=profile.num_meters {
            let group = format!("{GROUP_METER}{i}");
            if let Some(value) = self.handler.channel_value(&ChannelKey::new(&group, CURRENT_WATTS)) {
                watts += value.max(0.0);
                present = true;
            }
            if let Some(value) = self.handler.channel_value(&ChannelKey::new(&group, TOTAL_KWH)) {
                total += value.max(0.0);
                present = true;
            }
        }
        if !present {
            return 0;
        }
        debug!(device = %self.config.device_name, watts, total, "meters aggregated");
        self.handler.update_channel(
            &ChannelKey::new(GROUP_METER, ACCUMULATED_WATTS),
            TypedValue::quantity(watts, 2, Unit::Watt),
        );
        self.handler.update_channel(
            &ChannelKey::new(GROUP_METER, ACCUMULATED_TOTAL),
            TypedValue::quantity(total, 3, Unit::KilowattHour),
        );
        2
    }

    /// Expires timed-out requests and retries discovery when due.
    pub fn tick(&self, now: Instant) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state.is_stopped() {
            return;
        }

        for (kind, outcome) in inner.tracker.poll_expired(now) {
            debug!(device = %self.config.device_name, ?kind, ?outcome, "request expired");
            if kind == RequestKind::Status {
                inner.observing = false;
            }
        }

        if !inner.state.needs_discovery() || inner.tracker.is_pending(RequestKind::Discovery) {
            return;
        }
        let due = inner
            .last_discovery
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.discovery_retry_interval);
        if due {
            info!(device = %self.config.device_name, state = %inner.state, "retrying discovery");
            if inner.state == SessionState::Reinitializing {
                inner.state = SessionState::Discovering;
            }
            if let Err(e) = self.send_request(inner, RequestKind::Discovery, now) {
                warn!(device = %self.config.device_name, error = %e, "discovery send failed");
            }
        }
    }

    /// Runs [`Session::tick`] on a tokio interval until the session is
    /// stopped or dropped.
    pub fn spawn_maintenance(self: &Arc<Self>, period: Duration) -> EngineResult<JoinHandle<()>> {
        let runtime = Handle::try_current().map_err(|e| EngineError::Runtime(e.to_string()))?;
        let weak = Arc::downgrade(self);
        Ok(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if session.state().is_stopped() {
                    break;
                }
                session.tick(Instant::now());
            }
        }))
    }

    fn ensure_discovery(&self, inner: &mut SessionInner, now: Instant) {
        if inner.tracker.is_pending(RequestKind::Discovery) {
            return;
        }
        if let Err(e) = self.send_request(inner, RequestKind::Discovery, now) {
            warn!(device = %self.config.device_name, error = %e, "discovery send failed");
        }
    }

    fn send_request(&self, inner: &mut SessionInner, kind: RequestKind, now: Instant) -> EngineResult<()> {
        let message_type = match kind {
            RequestKind::Discovery => MessageType::Confirmable,
            RequestKind::Status => self.config.status_request_type,
        };
        inner.reset_memo();
        if kind == RequestKind::Discovery {
            inner.last_discovery = Some(now);
        }
        inner
            .tracker
            .send_or_replace(self.transport.as_ref(), kind, message_type, now)?;
        if kind == RequestKind::Discovery {
            inner.stats.discoveries_sent += 1;
        }
        Ok(())
    }
}

impl<H: DeviceHandler + 'static> Session<TransportEndpoint, H> {
    /// Acquires the shared endpoint, creates a session on it and starts it.
    pub fn connect(
        registry: &EndpointRegistry,
        endpoint: &EndpointConfig,
        config: SessionConfig,
        handler: Arc<H>,
    ) -> EngineResult<Arc<Self>> {
        let transport = registry.acquire(endpoint)?;
        let session = Arc::new(Session::new(config, transport, handler));
        session.start()?;
        Ok(session)
    }
}

impl<T: Transport + 'static, H: DeviceHandler + 'static> Drop for Session<T, H> {
    fn drop(&mut self) {
        if let Some(id) = self.inner.get_mut().listener.take() {
            self.transport.unregister(id);
        }
    }
}

impl<T: Transport + 'static, H: DeviceHandler + 'static> fmt::Debug for Session<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.config.device_name)
            .field("state", &self.state())
            .finish()
    }
}
