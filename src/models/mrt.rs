/*!
MRT (RFC 6396) record model: common header, entry type/subtype codes, and
the BGP4MP/TABLE_DUMP/TABLE_DUMPV2 payload shapes. Type and subtype codes
are grounded byte-for-byte in `original_source/src/ubgp/mrt.h`; the enum
style (`num_enum` with explicit repr) follows the teacher's
`models/mrt/mod.rs::EntryType`.
*/
use crate::models::asn::Asn;
use crate::models::attr::Attributes;
use crate::models::bgp::BgpState;
use crate::net::NetAddr;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::net::IpAddr;
use std::rc::Rc;

/// MRT common header (RFC 6396 section 2), with the optional extended
/// microsecond timestamp for `_ET` entry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonHeader {
    pub timestamp: u32,
    pub microsecond_timestamp: Option<u32>,
    pub entry_type: EntryType,
    pub entry_subtype: u16,
    pub length: u32,
}

/// MRT record type (RFC 6396 section 4). Only types this crate decodes
/// are enumerated here; the rest are carried as `catch_all`-free rejects
/// by `TryFromPrimitive`, matching the original's `MRT_ETYPENOTSUP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum EntryType {
    Null = 0,
    Start = 1,
    Die = 2,
    IAmDead = 3,
    PeerDown = 4,
    Bgp = 5,
    Rip = 6,
    Idrp = 7,
    Ripng = 8,
    Bgp4Plus = 9,
    Bgp4Plus01 = 10,
    OspfV2 = 11,
    TableDump = 12,
    TableDumpV2 = 13,
    Bgp4Mp = 16,
    Bgp4MpEt = 17,
    Isis = 32,
    IsisEt = 33,
    OspfV3 = 48,
    OspfV3Et = 49,
}

impl EntryType {
    pub const fn has_extended_timestamp(self) -> bool {
        matches!(self, EntryType::Bgp4MpEt | EntryType::IsisEt | EntryType::OspfV3Et)
    }
}

/// Legacy ZEBRA/BGP subtype (deprecated by BGP4MP, RFC 6396 section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum ZebraBgpSubtype {
    Null = 0,
    Update = 1,
    PrefUpdate = 2,
    StateChange = 3,
    Sync = 4,
    Open = 5,
    Notify = 6,
    Keepalive = 7,
}

/// BGP4MP subtype (RFC 6396 section 4.2, RFC 8050 ADDPATH extensions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Bgp4MpSubtype {
    StateChange = 0,
    Message = 1,
    Entry = 2,
    Snapshot = 3,
    MessageAs4 = 4,
    StateChangeAs4 = 5,
    MessageLocal = 6,
    MessageAs4Local = 7,
    MessageAddpath = 8,
    MessageAs4Addpath = 9,
    MessageLocalAddpath = 10,
    MessageAs4LocalAddpath = 11,
}

impl Bgp4MpSubtype {
    pub const fn is_as4(self) -> bool {
        matches!(
            self,
            Bgp4MpSubtype::MessageAs4
                | Bgp4MpSubtype::StateChangeAs4
                | Bgp4MpSubtype::MessageAs4Local
                | Bgp4MpSubtype::MessageAs4Addpath
                | Bgp4MpSubtype::MessageAs4LocalAddpath
        )
    }

    pub const fn is_addpath(self) -> bool {
        matches!(
            self,
            Bgp4MpSubtype::MessageAddpath
                | Bgp4MpSubtype::MessageAs4Addpath
                | Bgp4MpSubtype::MessageLocalAddpath
                | Bgp4MpSubtype::MessageAs4LocalAddpath
        )
    }
}

/// TABLE_DUMP_V2 subtype (RFC 6396 section 4.3, RFC 6397 GEO_PEER_TABLE,
/// RFC 8050 ADDPATH extensions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum TableDumpV2Subtype {
    PeerIndexTable = 1,
    RibIpv4Unicast = 2,
    RibIpv4Multicast = 3,
    RibIpv6Unicast = 4,
    RibIpv6Multicast = 5,
    RibGeneric = 6,
    GeoPeerTable = 7,
    RibIpv4UnicastAddpath = 8,
    RibIpv4MulticastAddpath = 9,
    RibIpv6UnicastAddpath = 10,
    RibIpv6MulticastAddpath = 11,
    RibGenericAddpath = 12,
}

impl TableDumpV2Subtype {
    pub const fn is_addpath(self) -> bool {
        matches!(
            self,
            TableDumpV2Subtype::RibIpv4UnicastAddpath
                | TableDumpV2Subtype::RibIpv4MulticastAddpath
                | TableDumpV2Subtype::RibIpv6UnicastAddpath
                | TableDumpV2Subtype::RibIpv6MulticastAddpath
                | TableDumpV2Subtype::RibGenericAddpath
        )
    }
}

/// One entry of a PEER_INDEX_TABLE. Shared (via `Rc`) across every RIB
/// entry that references it, since the table is read once per MRT file
/// and each of potentially millions of RIB entries just borrows a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub asn: Asn,
    pub router_id: std::net::Ipv4Addr,
    pub addr: IpAddr,
}

/// The PEER_INDEX_TABLE record that must precede any TABLE_DUMPV2 RIB
/// entry (RFC 6396 section 4.3.1).
#[derive(Debug, Clone)]
pub struct PeerIndexTable {
    pub collector_id: std::net::Ipv4Addr,
    pub view_name: String,
    pub peers: Vec<Rc<PeerEntry>>,
}

impl PeerIndexTable {
    pub fn peer(&self, idx: u16) -> Option<&Rc<PeerEntry>> {
        self.peers.get(idx as usize)
    }
}

/// One RIB_ENTRY within a TABLE_DUMPV2 RIB message (RFC 6396 section
/// 4.3.2/4.3.4).
#[derive(Debug, Clone)]
pub struct RibEntry {
    pub peer: Rc<PeerEntry>,
    pub originated: u32,
    pub path_id: u32,
    pub attributes: Attributes,
}

/// A full TABLE_DUMPV2 RIB message: one NLRI prefix with its list of
/// per-peer entries (RFC 6396 section 4.3.2-4.3.4).
#[derive(Debug, Clone)]
pub struct RibMessage {
    pub seqno: u32,
    pub prefix: NetAddr,
    pub entries: Vec<RibEntry>,
}

/// A legacy TABLE_DUMP record (RFC 6396 section 4.1, one entry per
/// record rather than batched by prefix).
#[derive(Debug, Clone)]
pub struct TableDumpMessage {
    pub view_number: u16,
    pub seqno: u16,
    pub prefix: NetAddr,
    pub peer_asn: Asn,
    pub peer_addr: IpAddr,
    pub originated: u32,
    pub attributes: Attributes,
}

/// A BGP4MP_STATE_CHANGE record (RFC 6396 section 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bgp4MpStateChange {
    pub peer_asn: Asn,
    pub local_asn: Asn,
    pub interface_index: u16,
    pub peer_addr: IpAddr,
    pub local_addr: IpAddr,
    pub old_state: BgpState,
    pub new_state: BgpState,
}

/// A BGP4MP_MESSAGE record (RFC 6396 section 4.2): a raw BGP message
/// exchanged between `peer_addr` and `local_addr`.
#[derive(Debug, Clone)]
pub struct Bgp4MpMessage {
    pub peer_asn: Asn,
    pub local_asn: Asn,
    pub interface_index: u16,
    pub peer_addr: IpAddr,
    pub local_addr: IpAddr,
    pub message: crate::models::bgp::BgpMessage,
}

/// The decoded payload of an MRT record, tagged by [`CommonHeader::entry_type`]
/// and `entry_subtype`.
#[derive(Debug, Clone)]
pub enum MrtMessage {
    Bgp4MpStateChange(Bgp4MpStateChange),
    Bgp4MpMessage(Bgp4MpMessage),
    TableDump(TableDumpMessage),
    PeerIndexTable(Rc<PeerIndexTable>),
    Rib(RibMessage),
}

/// A full MRT record: header plus decoded payload.
#[derive(Debug, Clone)]
pub struct MrtRecord {
    pub header: CommonHeader,
    pub message: MrtMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_roundtrip() {
        assert_eq!(u16::from(EntryType::Bgp4MpEt), 17);
        assert_eq!(EntryType::try_from(17u16), Ok(EntryType::Bgp4MpEt));
    }

    #[test]
    fn test_has_extended_timestamp() {
        assert!(EntryType::Bgp4MpEt.has_extended_timestamp());
        assert!(!EntryType::Bgp4Mp.has_extended_timestamp());
    }

    #[test]
    fn test_bgp4mp_subtype_classification() {
        assert!(Bgp4MpSubtype::MessageAs4Addpath.is_as4());
        assert!(Bgp4MpSubtype::MessageAs4Addpath.is_addpath());
        assert!(!Bgp4MpSubtype::Message.is_as4());
    }

    #[test]
    fn test_peer_index_table_lookup() {
        let peer = Rc::new(PeerEntry {
            asn: Asn::new_32bit(100),
            router_id: "1.1.1.1".parse().unwrap(),
            addr: "1.1.1.1".parse().unwrap(),
        });
        let table = PeerIndexTable {
            collector_id: "1.1.1.1".parse().unwrap(),
            view_name: String::new(),
            peers: vec![peer.clone()],
        };
        assert_eq!(table.peer(0), Some(&peer));
        assert_eq!(table.peer(1), None);
    }
}
