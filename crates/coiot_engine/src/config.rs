//! Configuration for endpoints and sessions.

use coiot_codec::MessageType;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Well-known CoIoT UDP port.
pub const COIOT_PORT: u16 = 5683;

/// Multicast group devices publish status updates to.
pub const COIOT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 187);

/// Configuration for a transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Local address to bind.
    pub local_addr: IpAddr,
    /// Local port to bind.
    pub port: u16,
    /// Multicast group to join.
    pub multicast_group: Ipv4Addr,
    /// Whether to join the multicast group.
    pub join_multicast: bool,
    /// Receive buffer size; longer datagrams are truncated.
    pub recv_buffer_size: usize,
}

impl EndpointConfig {
    /// Creates a configuration bound to all interfaces on the CoIoT port.
    pub fn new() -> Self {
        Self {
            local_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: COIOT_PORT,
            multicast_group: COIOT_MULTICAST_GROUP,
            join_multicast: true,
            recv_buffer_size: 2048,
        }
    }

    /// Sets the local address.
    pub fn with_local_addr(mut self, addr: IpAddr) -> Self {
        self.local_addr = addr;
        self
    }

    /// Sets the local port (0 picks an ephemeral port).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the multicast group.
    pub fn with_multicast_group(mut self, group: Ipv4Addr) -> Self {
        self.multicast_group = group;
        self
    }

    /// Disables joining the multicast group.
    pub fn without_multicast(mut self) -> Self {
        self.join_multicast = false;
        self
    }

    /// Sets the receive buffer size.
    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Returns the socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.local_addr, self.port)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for one device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name used in log output.
    pub device_name: String,
    /// Device IP address. Packets from other sources are ignored.
    pub device_addr: IpAddr,
    /// Device CoAP port.
    pub device_port: u16,
    /// Time after which an unanswered request is considered lost.
    pub request_timeout: Duration,
    /// Interval between discovery attempts while no description is known.
    pub discovery_retry_interval: Duration,
    /// Message type of status (observe) requests.
    pub status_request_type: MessageType,
}

impl SessionConfig {
    /// Creates a session configuration for a device.
    pub fn new(device_name: impl Into<String>, device_addr: IpAddr) -> Self {
        Self {
            device_name: device_name.into(),
            device_addr,
            device_port: COIOT_PORT,
            request_timeout: Duration::from_secs(15),
            discovery_retry_interval: Duration::from_secs(60),
            status_request_type: MessageType::NonConfirmable,
        }
    }

    /// Sets the device port.
    pub fn with_device_port(mut self, port: u16) -> Self {
        self.device_port = port;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the discovery retry interval.
    pub fn with_discovery_retry_interval(mut self, interval: Duration) -> Self {
        self.discovery_retry_interval = interval;
        self
    }

    /// Sets the message type used for status requests.
    pub fn with_status_request_type(mut self, message_type: MessageType) -> Self {
        self.status_request_type = message_type;
        self
    }

    /// Returns the device's socket address.
    pub fn device_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.device_addr, self.device_port)
    }
}
