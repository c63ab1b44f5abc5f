//! Builders for CoIoT datagrams as a device would send them.

use coiot_codec::{encode_message, option, CoapOption, Code, Message, MessageType};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Address the fixtures pretend the device lives at.
pub const DEVICE_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 40), 5683));

/// A device response or publication under construction.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    message: Message,
}

impl PacketBuilder {
    /// Starts a `2.05 Content` response.
    pub fn content(message_id: u16) -> Self {
        Self {
            message: Message::new(MessageType::NonConfirmable, Code::CONTENT, message_id),
        }
    }

    /// Starts a multicast `0.30` publication.
    pub fn publish(message_id: u16) -> Self {
        Self {
            message: Message::new(MessageType::NonConfirmable, Code::COIOT_PUBLISH, message_id),
        }
    }

    /// Sets the Uri-Path.
    pub fn path(mut self, path: &str) -> Self {
        self.message.set_uri_path(path);
        self
    }

    /// Sets the global device id option (`model#id#version`).
    pub fn device_id(mut self, id: &str) -> Self {
        self.message.add_option(CoapOption::string(option::COIOT_GLOBAL_DEVID, id));
        self
    }

    /// Sets the status serial option.
    pub fn serial(mut self, serial: u32) -> Self {
        self.message.add_option(CoapOption::uint(option::COIOT_STATUS_SERIAL, serial));
        self
    }

    /// Sets the status validity option.
    pub fn validity(mut self, seconds: u32) -> Self {
        self.message.add_option(CoapOption::uint(option::COIOT_STATUS_VALIDITY, seconds));
        self
    }

    /// Sets the JSON payload.
    pub fn payload(mut self, payload: &str) -> Self {
        self.message.payload = payload.as_bytes().to_vec();
        self
    }

    /// Returns the message without encoding it.
    pub fn message(self) -> Message {
        self.message
    }

    /// Encodes the datagram.
    ///
    /// # Panics
    ///
    /// Panics if the message cannot be encoded, which indicates a broken fixture.
    pub fn build(self) -> Vec<u8> {
        encode_message(&self.message).expect("fixture packet encodes")
    }
}

/// A description response to `/cit/d`.
pub fn description_packet(device_id: &str, description: &str) -> Vec<u8> {
    PacketBuilder::content(1)
        .path("/cit/d")
        .device_id(device_id)
        .payload(description)
        .build()
}

/// A multicast status publication with a serial.
pub fn status_packet(device_id: &str, serial: u32, status: &str) -> Vec<u8> {
    PacketBuilder::publish(serial as u16)
        .path("/cit/s")
        .device_id(device_id)
        .validity(38_400)
        .serial(serial)
        .payload(status)
        .build()
}

/// A status response without Uri-Path, classified by its payload.
pub fn bare_status_packet(device_id: &str, serial: u32, status: &str) -> Vec<u8> {
    PacketBuilder::content(serial as u16)
        .device_id(device_id)
        .serial(serial)
        .payload(status)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coiot_codec::decode_message;

    #[test]
    fn status_packet_carries_coiot_options() {
        let bytes = status_packet("SHSW-1#A4CF12F45678#1", 300, r#"{"G":[[0,112,1]]}"#);
        let message = decode_message(&bytes).unwrap();
        assert_eq!(message.code, Code::COIOT_PUBLISH);
        assert_eq!(message.uri_path(), "/cit/s");
        assert_eq!(
            message.option(option::COIOT_GLOBAL_DEVID).unwrap().as_str().unwrap(),
            "SHSW-1#A4CF12F45678#1"
        );
        assert_eq!(message.option(option::COIOT_STATUS_SERIAL).unwrap().as_uint().unwrap(), 300);
        assert_eq!(message.payload_str(), r#"{"G":[[0,112,1]]}"#);
    }

    #[test]
    fn bare_status_has_no_path() {
        let message = decode_message(&bare_status_packet("X#1", 1, "{}")).unwrap();
        assert_eq!(message.uri_path(), "");
        assert_eq!(message.code, Code::CONTENT);
    }
}
