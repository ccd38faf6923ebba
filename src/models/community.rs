/*!
BGP community attributes: standard (RFC 1997), extended (RFC 4360), and
large (RFC 8092) communities. Grounded in the teacher's
`models/bgp/community.rs` for the three-way split and well-known value
constants, simplified to the generic form this crate's filter VM actually
matches against (spec's community grammar works on the 32/64/96-bit value,
not per-flowspec-subtype structure).
*/
use std::fmt::{self, Display, Formatter};

/// A standard 4-octet community (RFC 1997): `(high 16 bits, low 16 bits)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Community {
    pub asn_part: u16,
    pub value_part: u16,
}

impl Community {
    pub const NO_EXPORT: Community = Community::from_u32(0xffff_ff01);
    pub const NO_ADVERTISE: Community = Community::from_u32(0xffff_ff02);
    pub const NO_EXPORT_SUBCONFED: Community = Community::from_u32(0xffff_ff03);
    pub const NO_PEER: Community = Community::from_u32(0xffff_ff04);
    pub const BLACKHOLE: Community = Community::from_u32(0xffff_029a);
    pub const PLANNED_SHUT: Community = Community::from_u32(0xffff_0000);
    pub const ACCEPT_OWN: Community = Community::from_u32(0xffff_0001);
    pub const ROUTE_FILTER_TRANSLATED_V4: Community = Community::from_u32(0xffff_0002);
    pub const ROUTE_FILTER_V4: Community = Community::from_u32(0xffff_0003);
    pub const ROUTE_FILTER_TRANSLATED_V6: Community = Community::from_u32(0xffff_0004);
    pub const ROUTE_FILTER_V6: Community = Community::from_u32(0xffff_0005);
    pub const LLGR_STALE: Community = Community::from_u32(0xffff_0006);
    pub const NO_LLGR: Community = Community::from_u32(0xffff_0007);
    pub const ACCEPT_OWN_NEXTHOP: Community = Community::from_u32(0xffff_0008);

    /// Look up a well-known mnemonic by name (spec.md section 6's `-m`/`-M`
    /// grammar), matching `original_source/src/bgpgrep/main.c`'s `comm_tab[]`
    /// in spirit: case-sensitive, underscored names, numeric `hi:lo` forms
    /// are parsed separately by the caller.
    pub fn from_mnemonic(name: &str) -> Option<Community> {
        Some(match name {
            "PLANNED_SHUT" => Community::PLANNED_SHUT,
            "ACCEPT_OWN" => Community::ACCEPT_OWN,
            "ACCEPT_OWN_NEXTHOP" => Community::ACCEPT_OWN_NEXTHOP,
            "ROUTE_FILTER_TRANSLATED_V4" => Community::ROUTE_FILTER_TRANSLATED_V4,
            "ROUTE_FILTER_V4" => Community::ROUTE_FILTER_V4,
            "ROUTE_FILTER_TRANSLATED_V6" => Community::ROUTE_FILTER_TRANSLATED_V6,
            "ROUTE_FILTER_V6" => Community::ROUTE_FILTER_V6,
            "LLGR_STALE" => Community::LLGR_STALE,
            "NO_LLGR" => Community::NO_LLGR,
            "BLACKHOLE" => Community::BLACKHOLE,
            "NO_EXPORT_SUBCONFED" => Community::NO_EXPORT_SUBCONFED,
            "NO_EXPORT" => Community::NO_EXPORT,
            "NO_ADVERTISE" => Community::NO_ADVERTISE,
            "NO_PEER" => Community::NO_PEER,
            _ => return None,
        })
    }

    /// Parse one `-m`/`-M` token: either a well-known mnemonic or a literal
    /// `hi:lo` pair.
    pub fn parse_token(token: &str) -> Result<Community, String> {
        if let Some(c) = Community::from_mnemonic(token) {
            return Ok(c);
        }
        let (hi, lo) = token
            .split_once(':')
            .ok_or_else(|| format!("invalid community token: {token}"))?;
        let hi: u16 = hi.parse().map_err(|_| format!("invalid community token: {token}"))?;
        let lo: u16 = lo.parse().map_err(|_| format!("invalid community token: {token}"))?;
        Ok(Community::new(hi, lo))
    }

    pub const fn new(asn_part: u16, value_part: u16) -> Community {
        Community { asn_part, value_part }
    }

    pub const fn from_u32(v: u32) -> Community {
        Community {
            asn_part: (v >> 16) as u16,
            value_part: v as u16,
        }
    }

    pub const fn as_u32(self) -> u32 {
        ((self.asn_part as u32) << 16) | self.value_part as u32
    }

    pub const fn is_well_known(self) -> bool {
        self.asn_part == 0xffff
    }
}

impl Display for Community {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asn_part, self.value_part)
    }
}

/// A large community (RFC 8092): three 32-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LargeCommunity {
    pub global_admin: u32,
    pub local1: u32,
    pub local2: u32,
}

impl LargeCommunity {
    pub const fn new(global_admin: u32, local1: u32, local2: u32) -> LargeCommunity {
        LargeCommunity {
            global_admin,
            local1,
            local2,
        }
    }
}

impl Display for LargeCommunity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.global_admin, self.local1, self.local2)
    }
}

/// An extended community (RFC 4360): type octet, subtype octet, six
/// value octets. This crate treats the 6-byte value opaquely rather than
/// decoding per-subtype, since filtering only needs byte-exact matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtendedCommunity {
    pub community_type: u8,
    pub subtype: u8,
    pub value: [u8; 6],
}

impl ExtendedCommunity {
    pub fn new(community_type: u8, subtype: u8, value: [u8; 6]) -> ExtendedCommunity {
        ExtendedCommunity {
            community_type,
            subtype,
            value,
        }
    }

    pub fn from_bytes(bytes: &[u8; 8]) -> ExtendedCommunity {
        let mut value = [0u8; 6];
        value.copy_from_slice(&bytes[2..8]);
        ExtendedCommunity {
            community_type: bytes[0],
            subtype: bytes[1],
            value,
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0] = self.community_type;
        out[1] = self.subtype;
        out[2..8].copy_from_slice(&self.value);
        out
    }

    /// High bit of the type octet marks a transitive-vs-non-transitive
    /// community (RFC 4360 section 3).
    pub const fn is_transitive(self) -> bool {
        self.community_type & 0x40 == 0
    }
}

impl Display for ExtendedCommunity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:", self.community_type, self.subtype)?;
        for b in self.value {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// An extended community over an IPv6 global administrator (RFC 5701):
/// 16 bytes of address followed by a 2-byte local admin field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6ExtendedCommunity {
    pub community_type: u8,
    pub subtype: u8,
    pub global_admin: std::net::Ipv6Addr,
    pub local_admin: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_community_u32_roundtrip() {
        let c = Community::new(65000, 100);
        assert_eq!(Community::from_u32(c.as_u32()), c);
    }

    #[test]
    fn test_well_known() {
        assert!(Community::NO_EXPORT.is_well_known());
        assert!(!Community::new(65000, 1).is_well_known());
    }

    #[test]
    fn test_extended_community_roundtrip() {
        let bytes = [0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x64];
        let ec = ExtendedCommunity::from_bytes(&bytes);
        assert_eq!(ec.to_bytes(), bytes);
        assert!(ec.is_transitive());
    }

    #[test]
    fn test_large_community_display() {
        let lc = LargeCommunity::new(65000, 1, 2);
        assert_eq!(lc.to_string(), "65000:1:2");
    }

    #[test]
    fn test_parse_token_mnemonic_and_literal() {
        assert_eq!(Community::parse_token("NO_EXPORT").unwrap(), Community::NO_EXPORT);
        assert_eq!(Community::parse_token("65000:100").unwrap(), Community::new(65000, 100));
        assert!(Community::parse_token("garbage").is_err());
    }
}
