//! Core data model: addresses, AS numbers, communities, AS paths,
//! attributes, BGP messages, and MRT records.

pub mod asn;
pub mod aspath;
pub mod attr;
pub mod bgp;
pub mod community;
pub mod mrt;

pub use asn::{Asn, AsnLength};
pub use aspath::{AsPath, AsSegment, SegmentType};
pub use attr::{AttrFlags, AttrType, Attribute, Attributes};
pub use bgp::{BgpMessage, BgpMessageType, BgpState, OpenMessage, UpdateMessage};
pub use community::{Community, ExtendedCommunity, LargeCommunity};
pub use mrt::{CommonHeader, EntryType, MrtMessage, MrtRecord};
