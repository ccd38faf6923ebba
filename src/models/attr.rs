/*!
BGP path attributes (RFC 4271 section 5, RFC 4760, RFC 6793, RFC 8092).
Type codes grounded in `original_source/src/ubgp/bgpattribs.h`; flag bits
and the optional/transitive/partial/extended-length layout grounded in the
same header's `ATTR_*` flag constants. Per-attribute decoding lives in
`crate::parser::bgp::attributes`; this module only holds the data model,
matching the teacher's split between `models/bgp/attributes/*.rs` (types)
and `parser/bgp/attributes/attr_*.rs` (codecs).
*/
use crate::models::aspath::AsPath;
use crate::models::community::{Community, ExtendedCommunity, LargeCommunity};
use crate::net::NetAddrAp;
use bitflags::bitflags;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::cell::RefCell;
use std::net::{Ipv4Addr, IpAddr};

bitflags! {
    /// The four high bits of an attribute's flags octet (RFC 4271 4.3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttrFlags: u8 {
        const EXTENDED_LENGTH = 1 << 4;
        const PARTIAL         = 1 << 5;
        const TRANSITIVE      = 1 << 6;
        const OPTIONAL        = 1 << 7;
    }
}

/// Attribute type code (RFC 4271 + extensions). Unknown codes are kept
/// verbatim via `catch_all` so a filter can still reference them by number
/// and the decoder can round-trip attributes it does not understand.
#[derive(Debug, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum AttrType {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,
    Community = 8,
    OriginatorId = 9,
    ClusterList = 10,
    MpReachNlri = 14,
    MpUnreachNlri = 15,
    ExtendedCommunities = 16,
    As4Path = 17,
    As4Aggregator = 18,
    PmsiTunnel = 22,
    TunnelEncapsulation = 23,
    Aigp = 26,
    LargeCommunity = 32,
    OnlyToCustomer = 35,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// BGP route origin (RFC 4271 section 5.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl Origin {
    pub const fn from_u8(v: u8) -> Option<Origin> {
        match v {
            0 => Some(Origin::Igp),
            1 => Some(Origin::Egp),
            2 => Some(Origin::Incomplete),
            _ => None,
        }
    }
}

/// AGGREGATOR attribute value: the AS and router ID of the aggregating
/// speaker (RFC 4271 section 5.1.7 / RFC 6793 for the 4-byte variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Aggregator {
    pub asn: crate::models::asn::Asn,
    pub router_id: Ipv4Addr,
}

/// One next-hop-reachable NLRI batch carried in MP_REACH_NLRI (RFC 4760).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpReach {
    pub afi: crate::net::Afi,
    pub safi: crate::net::Safi,
    pub next_hops: Vec<IpAddr>,
    pub nlri: Vec<NetAddrAp>,
}

/// One withdrawal batch carried in MP_UNREACH_NLRI (RFC 4760).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpUnreach {
    pub afi: crate::net::Afi,
    pub safi: crate::net::Safi,
    pub withdrawn: Vec<NetAddrAp>,
}

/// A decoded path attribute value. `Raw` is the escape hatch for
/// attribute codes this crate does not model explicitly: the filter VM's
/// `HASATTR`/generic byte-compare opcodes only need the flags and payload
/// bytes, not a structured decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Origin(Origin),
    AsPath(AsPath),
    As4Path(AsPath),
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    As4Aggregator(Aggregator),
    Community(Vec<Community>),
    LargeCommunity(Vec<LargeCommunity>),
    ExtendedCommunities(Vec<ExtendedCommunity>),
    OriginatorId(Ipv4Addr),
    ClusterList(Vec<Ipv4Addr>),
    MpReachNlri(MpReach),
    MpUnreachNlri(MpUnreach),
    OnlyToCustomer(crate::models::asn::Asn),
    Raw { code: u8, bytes: Vec<u8> },
}

impl Attribute {
    pub fn attr_type(&self) -> AttrType {
        match self {
            Attribute::Origin(_) => AttrType::Origin,
            Attribute::AsPath(_) => AttrType::AsPath,
            Attribute::As4Path(_) => AttrType::As4Path,
            Attribute::NextHop(_) => AttrType::NextHop,
            Attribute::MultiExitDisc(_) => AttrType::MultiExitDisc,
            Attribute::LocalPref(_) => AttrType::LocalPref,
            Attribute::AtomicAggregate => AttrType::AtomicAggregate,
            Attribute::Aggregator(_) => AttrType::Aggregator,
            Attribute::As4Aggregator(_) => AttrType::As4Aggregator,
            Attribute::Community(_) => AttrType::Community,
            Attribute::LargeCommunity(_) => AttrType::LargeCommunity,
            Attribute::ExtendedCommunities(_) => AttrType::ExtendedCommunities,
            Attribute::OriginatorId(_) => AttrType::OriginatorId,
            Attribute::ClusterList(_) => AttrType::ClusterList,
            Attribute::MpReachNlri(_) => AttrType::MpReachNlri,
            Attribute::MpUnreachNlri(_) => AttrType::MpUnreachNlri,
            Attribute::OnlyToCustomer(_) => AttrType::OnlyToCustomer,
            Attribute::Raw { code, .. } => AttrType::from(*code),
        }
    }
}

/// Number of slots in the notable-attribute cache (spec section 4.4).
const NOTABLE_SLOTS: usize = 16;

/// The well-known attribute codes the notable-attribute cache covers,
/// indexed by their position in the cache table.
const NOTABLE_TYPES: [AttrType; 14] = [
    AttrType::Origin,
    AttrType::AsPath,
    AttrType::NextHop,
    AttrType::MultiExitDisc,
    AttrType::LocalPref,
    AttrType::AtomicAggregate,
    AttrType::Aggregator,
    AttrType::Community,
    AttrType::MpReachNlri,
    AttrType::MpUnreachNlri,
    AttrType::ExtendedCommunities,
    AttrType::As4Path,
    AttrType::As4Aggregator,
    AttrType::LargeCommunity,
];

fn notable_slot(ty: AttrType) -> Option<usize> {
    NOTABLE_TYPES.iter().position(|&t| t == ty)
}

/// The full attribute list of an UPDATE message, plus the notable-attribute
/// cache the spec calls for (section 4.4): a 16-entry table mapping the
/// most frequently filtered attribute codes to their position in `list`,
/// populated lazily on first lookup so repeated `get()` calls for the same
/// type don't rescan. `None` means "not yet looked up", `Some(None)` means
/// "looked up, absent" (the `0xffff` sentinel in the original's byte-offset
/// table), `Some(Some(idx))` means "found at `list[idx]`" (the original's
/// byte offset, here a list index since this crate doesn't retain raw wire
/// bytes). Callers must finish building `list` before the first `get()`
/// call, as every construction site in this crate does.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub list: Vec<Attribute>,
    notable: RefCell<[Option<Option<u16>>; NOTABLE_SLOTS]>,
}

impl Attributes {
    pub fn new() -> Attributes {
        Attributes::default()
    }

    pub fn get(&self, ty: AttrType) -> Option<&Attribute> {
        let Some(slot) = notable_slot(ty) else {
            return self.list.iter().find(|a| a.attr_type() == ty);
        };

        let cached = self.notable.borrow()[slot];
        let found = match cached {
            Some(found) => found,
            None => {
                let found = self.list.iter().position(|a| a.attr_type() == ty).map(|i| i as u16);
                self.notable.borrow_mut()[slot] = Some(found);
                found
            }
        };
        found.map(|idx| &self.list[idx as usize])
    }

    pub fn as_path(&self) -> Option<&AsPath> {
        match self.get(AttrType::AsPath) {
            Some(Attribute::AsPath(p)) => Some(p),
            _ => None,
        }
    }

    pub fn as4_path(&self) -> Option<&AsPath> {
        match self.get(AttrType::As4Path) {
            Some(Attribute::As4Path(p)) => Some(p),
            _ => None,
        }
    }

    /// The AS path a filter should actually match against: the AS4_PATH
    /// reconciled over AS_PATH if both are present (RFC 6793), otherwise
    /// whichever of the two exists.
    pub fn real_as_path(&self) -> Option<AsPath> {
        match (self.as_path(), self.as4_path()) {
            (Some(p), Some(p4)) => Some(AsPath::reconcile_as4(p, p4)),
            (Some(p), None) => Some(p.clone()),
            (None, Some(p4)) => Some(p4.clone()),
            (None, None) => None,
        }
    }

    pub fn communities(&self) -> &[Community] {
        match self.get(AttrType::Community) {
            Some(Attribute::Community(c)) => c,
            _ => &[],
        }
    }
}

impl PartialEq for AttrType {
    fn eq(&self, other: &Self) -> bool {
        u8::from(*self) == u8::from(*other)
    }
}
impl Eq for AttrType {}
impl std::hash::Hash for AttrType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        u8::from(*self).hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asn::Asn;

    #[test]
    fn test_attr_type_roundtrip() {
        assert_eq!(u8::from(AttrType::AsPath), 2);
        assert_eq!(AttrType::from(2u8), AttrType::AsPath);
        assert_eq!(AttrType::from(200u8), AttrType::Unknown(200));
    }

    #[test]
    fn test_real_as_path_prefers_reconciled() {
        let mut attrs = Attributes::new();
        attrs.list.push(Attribute::AsPath(AsPath::from_sequence(vec![
            Asn::new_16bit(100),
            Asn::new_16bit(Asn::AS_TRANS as u16),
        ])));
        attrs
            .list
            .push(Attribute::As4Path(AsPath::from_sequence(vec![Asn::new_32bit(70000)])));
        let real = attrs.real_as_path().unwrap();
        let asns: Vec<u32> = real.iter_asns().map(|a| a.value()).collect();
        assert_eq!(asns, vec![100, 70000]);
    }

    #[test]
    fn test_get_returns_none_when_absent() {
        let attrs = Attributes::new();
        assert!(attrs.get(AttrType::MultiExitDisc).is_none());
    }

    #[test]
    fn test_notable_cache_repeated_lookups_agree_with_uncached() {
        let mut attrs = Attributes::new();
        attrs.list.push(Attribute::Origin(Origin::Igp));
        attrs
            .list
            .push(Attribute::AsPath(AsPath::from_sequence(vec![Asn::new_32bit(100)])));

        assert_eq!(attrs.get(AttrType::Origin), Some(&Attribute::Origin(Origin::Igp)));
        // second lookup exercises the populated cache path
        assert_eq!(attrs.get(AttrType::Origin), Some(&Attribute::Origin(Origin::Igp)));
        assert!(attrs.get(AttrType::LocalPref).is_none());
        assert!(attrs.get(AttrType::LocalPref).is_none());
    }
}
