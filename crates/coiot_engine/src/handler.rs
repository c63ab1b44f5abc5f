//! Device handler interface consumed by the session.

use coiot_protocol::{ChannelKey, DeviceProfile, TypedValue};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The layer that owns channel state for a device.
///
/// The session pushes decoded values through this trait and reads a few
/// values back for meter aggregation.
pub trait DeviceHandler: Send + Sync {
    /// Applies one update. Returns true if the stored value changed.
    fn update_channel(&self, key: &ChannelKey, value: TypedValue) -> bool;

    /// Returns the current numeric value of a channel, if known.
    fn channel_value(&self, key: &ChannelKey) -> Option<f64>;

    /// Returns the device class flags.
    fn profile(&self) -> DeviceProfile;

    /// Returns the last persisted raw description payload.
    fn persisted_description(&self) -> Option<String> {
        None
    }

    /// Stores the raw description payload after a successful ingest.
    fn persist_description(&self, _payload: &str) {}

    /// Called when the device switched protocol versions.
    fn reinitialize(&self) {}

    /// Called for every accepted packet.
    fn set_online(&self) {}
}

/// An in-memory device handler for testing.
#[derive(Debug, Default)]
pub struct MemoryDeviceHandler {
    profile: DeviceProfile,
    channels: RwLock<BTreeMap<ChannelKey, TypedValue>>,
    updates: RwLock<Vec<(ChannelKey, TypedValue)>>,
    persisted: RwLock<Option<String>>,
    reinitializations: AtomicU64,
    online: AtomicBool,
}

impl MemoryDeviceHandler {
    /// Creates a handler for a device class.
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    /// Pre-seeds the persisted description.
    pub fn with_persisted_description(self, payload: impl Into<String>) -> Self {
        *self.persisted.write() = Some(payload.into());
        self
    }

    /// Returns the current value of a channel.
    pub fn value(&self, key: &ChannelKey) -> Option<TypedValue> {
        self.channels.read().get(key).cloned()
    }

    /// Returns every update received, in order.
    pub fn updates(&self) -> Vec<(ChannelKey, TypedValue)> {
        self.updates.read().clone()
    }

    /// Drains the recorded updates.
    pub fn take_updates(&self) -> Vec<(ChannelKey, TypedValue)> {
        std::mem::take(&mut *self.updates.write())
    }

    /// Returns the stored description payload.
    pub fn stored_description(&self) -> Option<String> {
        self.persisted.read().clone()
    }

    /// Returns how many times the device was reinitialized.
    pub fn reinitializations(&self) -> u64 {
        self.reinitializations.load(Ordering::SeqCst)
    }

    /// Returns true once any packet has been accepted.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl DeviceHandler for MemoryDeviceHandler {
    fn update_channel(&self, key: &ChannelKey, value: TypedValue) -> bool {
        self.updates.write().push((key.clone(), value.clone()));
        let previous = self.channels.write().insert(key.clone(), value.clone());
        previous.as_ref() != Some(&value)
    }

    fn channel_value(&self, key: &ChannelKey) -> Option<f64> {
        self.channels.read().get(key).and_then(TypedValue::as_f64)
    }

    fn profile(&self) -> DeviceProfile {
        self.profile.clone()
    }

    fn persisted_description(&self) -> Option<String> {
        self.persisted.read().clone()
    }

    fn persist_description(&self, payload: &str) {
        *self.persisted.write() = Some(payload.to_string());
    }

    fn reinitialize(&self) {
        self.reinitializations.fetch_add(1, Ordering::SeqCst);
    }

    fn set_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coiot_protocol::Unit;

    #[test]
    fn update_reports_change() {
        let handler = MemoryDeviceHandler::new(DeviceProfile::relay());
        let key = ChannelKey::new("relay", "output");

        assert!(handler.update_channel(&key, TypedValue::Bool(true)));
        assert!(!handler.update_channel(&key, TypedValue::Bool(true)));
        assert!(handler.update_channel(&key, TypedValue::Bool(false)));
        assert_eq!(handler.updates().len(), 3);
        assert_eq!(handler.value(&key), Some(TypedValue::Bool(false)));
    }

    #[test]
    fn numeric_read_back() {
        let handler = MemoryDeviceHandler::new(DeviceProfile::roller());
        let key = ChannelKey::new("meter1", "currentWatts");
        handler.update_channel(&key, TypedValue::quantity(42.5, 2, Unit::Watt));
        assert_eq!(handler.channel_value(&key), Some(42.5));
        assert_eq!(handler.channel_value(&ChannelKey::new("meter2", "currentWatts")), None);
    }

    #[test]
    fn persisted_description_round_trip() {
        let handler = MemoryDeviceHandler::new(DeviceProfile::relay())
            .with_persisted_description(r#"{"blk":[],"sen":[]}"#);
        assert!(handler.persisted_description().is_some());
        handler.persist_description("{}");
        assert_eq!(handler.stored_description().as_deref(), Some("{}"));
    }

    #[test]
    fn lifecycle_flags() {
        let handler = MemoryDeviceHandler::new(DeviceProfile::relay());
        assert!(!handler.is_online());
        handler.set_online();
        handler.reinitialize();
        assert!(handler.is_online());
        assert_eq!(handler.reinitializations(), 1);
    }
}
