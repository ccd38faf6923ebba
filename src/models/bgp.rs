/*!
BGP message types (RFC 4271 section 4). Grounded in
`original_source/src/ubgp/bgp.h` (`ubgp_msgtype`, `bgp_open_t`, the FSM
state enum) for the type/field shapes, and the teacher's
`models/bgp/mod.rs` for how those map onto idiomatic Rust enums.
*/
use crate::models::attr::Attributes;
use crate::models::asn::Asn;
use crate::net::NetAddrAp;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::net::Ipv4Addr;

/// BGP message type octet (RFC 4271 section 4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BgpMessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    Keepalive = 4,
    RouteRefresh = 5,
}

/// Finite state machine state (RFC 4271 section 8), used by BGP4MP
/// STATE_CHANGE records to report FSM transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BgpState {
    Idle = 1,
    Connect = 2,
    Active = 3,
    OpenSent = 4,
    OpenConfirm = 5,
    Established = 6,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMessage {
    pub version: u8,
    pub my_asn: Asn,
    pub hold_time: u16,
    pub identifier: Ipv4Addr,
    /// Raw optional parameters (capability negotiation is not decoded
    /// structurally; the filter VM never inspects OPEN parameters).
    pub params: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMessage {
    pub withdrawn: Vec<NetAddrAp>,
    pub attributes: Attributes,
    pub nlri: Vec<NetAddrAp>,
}

impl UpdateMessage {
    pub fn new() -> UpdateMessage {
        UpdateMessage::default()
    }

    /// True for an end-of-RIB marker (RFC 4724 section 2): an UPDATE with
    /// no NLRI, no withdrawn routes, and no attributes.
    pub fn is_end_of_rib(&self) -> bool {
        self.withdrawn.is_empty() && self.nlri.is_empty() && self.attributes.list.is_empty()
    }
}

/// NOTIFICATION error code/subcode (RFC 4271 section 4.5, section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationCode {
    pub error_code: u8,
    pub error_subcode: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub code: NotificationCode,
    pub data: Vec<u8>,
}

/// A decoded BGP message, tagged by [`BgpMessageType`].
#[derive(Debug, Clone)]
pub enum BgpMessage {
    Open(OpenMessage),
    Update(UpdateMessage),
    Notification(NotificationMessage),
    Keepalive,
    RouteRefresh { afi: crate::net::Afi, safi: crate::net::Safi },
}

impl BgpMessage {
    pub fn message_type(&self) -> BgpMessageType {
        match self {
            BgpMessage::Open(_) => BgpMessageType::Open,
            BgpMessage::Update(_) => BgpMessageType::Update,
            BgpMessage::Notification(_) => BgpMessageType::Notification,
            BgpMessage::Keepalive => BgpMessageType::Keepalive,
            BgpMessage::RouteRefresh { .. } => BgpMessageType::RouteRefresh,
        }
    }

    pub fn as_update(&self) -> Option<&UpdateMessage> {
        match self {
            BgpMessage::Update(u) => Some(u),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_rib() {
        assert!(UpdateMessage::new().is_end_of_rib());
    }

    #[test]
    fn test_message_type() {
        assert_eq!(BgpMessage::Keepalive.message_type(), BgpMessageType::Keepalive);
    }
}
