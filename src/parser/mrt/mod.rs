/*!
MRT record decoding (RFC 6396). Grounded in
`original_source/src/ubgp/mrt.c`/`mrt.h` for framing, the PEER_INDEX_TABLE
cache, and per-subtype RIB entry layouts; module split mirrors the
teacher's `parser/mrt/messages/*` family (`table_dump_v2` broken out
further into the same kinds of sub-messages: `peer_index_table`,
`rib_generic_entries`).
*/
pub mod header;

use crate::error::MrtError;
use crate::models::asn::Asn;
use crate::models::bgp::BgpState;
use crate::models::mrt::{
    Bgp4MpMessage, Bgp4MpStateChange, Bgp4MpSubtype, CommonHeader, EntryType, MrtMessage, MrtRecord, PeerEntry,
    PeerIndexTable, RibEntry, RibMessage, TableDumpMessage, TableDumpV2Subtype, ZebraBgpSubtype,
};
use crate::net::{Afi, NetAddr};
use crate::parser::bgp::{self, DecodeOpts};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Rc;

/// Decode one MRT record's payload, given its already-parsed common
/// header and raw message bytes. `peer_index` must be `Some` for any
/// TABLE_DUMPV2 RIB subtype other than `PEER_INDEX_TABLE` itself
/// (`MRT_ENEEDSPEERIDX` in the original).
pub fn decode_message(
    header: &CommonHeader,
    body: &[u8],
    peer_index: Option<&Rc<PeerIndexTable>>,
) -> Result<MrtMessage, MrtError> {
    match header.entry_type {
        EntryType::Bgp4Mp | EntryType::Bgp4MpEt => decode_bgp4mp(header.entry_subtype, body),
        EntryType::TableDump => decode_table_dump(body),
        EntryType::TableDumpV2 => decode_table_dump_v2(header.entry_subtype, body, peer_index),
        other => Err(MrtError::TypeNotSupported(u16::from(other))),
    }
}

fn decode_bgp4mp(subtype: u16, body: &[u8]) -> Result<MrtMessage, MrtError> {
    let subtype = Bgp4MpSubtype::try_from(subtype).map_err(|_| MrtError::BadBgp4mpHeader(format!("unknown subtype {subtype}")))?;
    let asn32 = subtype.is_as4();
    let addpath = subtype.is_addpath();
    let asn_len = if asn32 { 4 } else { 2 };

    let mut i = 0;
    let read_asn = |buf: &[u8], i: &mut usize| -> Result<Asn, MrtError> {
        let b = buf
            .get(*i..*i + asn_len)
            .ok_or_else(|| MrtError::BadBgp4mpHeader("truncated peer/local ASN".into()))?;
        *i += asn_len;
        Ok(if asn32 {
            Asn::new_32bit(u32::from_be_bytes(b.try_into().unwrap()))
        } else {
            Asn::new_16bit(u16::from_be_bytes(b.try_into().unwrap()))
        })
    };

    let peer_asn = read_asn(body, &mut i)?;
    let local_asn = read_asn(body, &mut i)?;
    let interface_index = u16::from_be_bytes(
        body.get(i..i + 2)
            .ok_or_else(|| MrtError::BadBgp4mpHeader("truncated interface index".into()))?
            .try_into()
            .unwrap(),
    );
    i += 2;
    let afi = Afi::from_u16(u16::from_be_bytes(
        body.get(i..i + 2)
            .ok_or_else(|| MrtError::BadBgp4mpHeader("truncated AFI".into()))?
            .try_into()
            .unwrap(),
    ))
    .ok_or(MrtError::AfiNotSupported(0))?;
    i += 2;

    let (peer_addr, local_addr) = read_addr_pair(body, &mut i, afi)?;

    match subtype {
        Bgp4MpSubtype::StateChange | Bgp4MpSubtype::StateChangeAs4 => {
            let old_state = BgpState::try_from(u16::from_be_bytes(body[i..i + 2].try_into().unwrap()) as u8)
                .map_err(|_| MrtError::BadBgp4mpHeader("invalid old FSM state".into()))?;
            let new_state = BgpState::try_from(u16::from_be_bytes(body[i + 2..i + 4].try_into().unwrap()) as u8)
                .map_err(|_| MrtError::BadBgp4mpHeader("invalid new FSM state".into()))?;
            Ok(MrtMessage::Bgp4MpStateChange(Bgp4MpStateChange {
                peer_asn,
                local_asn,
                interface_index,
                peer_addr,
                local_addr,
                old_state,
                new_state,
            }))
        }
        _ => {
            let opts = DecodeOpts { asn32, addpath };
            let message = bgp::decode_message(&body[i..], opts).map_err(MrtError::Bgp)?;
            Ok(MrtMessage::Bgp4MpMessage(Bgp4MpMessage {
                peer_asn,
                local_asn,
                interface_index,
                peer_addr,
                local_addr,
                message,
            }))
        }
    }
}

fn read_addr_pair(body: &[u8], i: &mut usize, afi: Afi) -> Result<(IpAddr, IpAddr), MrtError> {
    let len = afi.byte_len();
    let peer = body.get(*i..*i + len).ok_or_else(|| MrtError::BadBgp4mpHeader("truncated peer address".into()))?;
    *i += len;
    let local = body.get(*i..*i + len).ok_or_else(|| MrtError::BadBgp4mpHeader("truncated local address".into()))?;
    *i += len;
    Ok((to_ip(peer, afi), to_ip(local, afi)))
}

fn to_ip(bytes: &[u8], afi: Afi) -> IpAddr {
    match afi {
        Afi::Ipv4 => IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(bytes).unwrap())),
        Afi::Ipv6 => IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(bytes).unwrap())),
    }
}

/// Legacy TABLE_DUMP record (RFC 6396 section 4.1): one NLRI per record.
fn decode_table_dump(body: &[u8]) -> Result<MrtMessage, MrtError> {
    if body.len() < 22 {
        return Err(MrtError::BadRibEntry("truncated TABLE_DUMP record".into()));
    }
    let view_number = u16::from_be_bytes([body[0], body[1]]);
    let seqno = u16::from_be_bytes([body[2], body[3]]);
    // legacy TABLE_DUMP is IPv4-only in this crate's scope (RFC 6396 4.1);
    // IPv6 TABLE_DUMP used the deprecated BGP4PLUS types, out of scope.
    let prefix_addr = Ipv4Addr::from(<[u8; 4]>::try_from(&body[4..8]).unwrap());
    let bitlen = body[8];
    if bitlen > Afi::Ipv4.max_bitlen() {
        return Err(MrtError::BadRibEntry(format!("prefix length {bitlen} exceeds IPv4 width")));
    }
    let prefix = NetAddr::new(Afi::Ipv4, &prefix_addr.octets(), bitlen);
    let _status = body[9];
    let originated = u32::from_be_bytes(body[10..14].try_into().unwrap());
    let peer_addr = Ipv4Addr::from(<[u8; 4]>::try_from(&body[14..18]).unwrap());
    let peer_asn = Asn::new_16bit(u16::from_be_bytes([body[18], body[19]]));
    let attr_len = u16::from_be_bytes([body[20], body[21]]) as usize;
    let attr_bytes = body
        .get(22..22 + attr_len)
        .ok_or_else(|| MrtError::BadRibEntry("declared attribute length exceeds record".into()))?;
    let attributes = crate::parser::bgp::attributes::parse_attributes(attr_bytes, false, false).map_err(MrtError::Bgp)?;

    Ok(MrtMessage::TableDump(TableDumpMessage {
        view_number,
        seqno,
        prefix,
        peer_asn,
        peer_addr: IpAddr::V4(peer_addr),
        originated,
        attributes,
    }))
}

fn decode_table_dump_v2(subtype: u16, body: &[u8], peer_index: Option<&Rc<PeerIndexTable>>) -> Result<MrtMessage, MrtError> {
    let subtype = TableDumpV2Subtype::try_from(subtype).map_err(|_| MrtError::RibNotSupported(format!("subtype {subtype}")))?;

    if subtype == TableDumpV2Subtype::PeerIndexTable {
        return Ok(MrtMessage::PeerIndexTable(Rc::new(decode_peer_index_table(body)?)));
    }

    let peer_index = peer_index.ok_or(MrtError::NeedsPeerIndex)?;
    let addpath = subtype.is_addpath();

    let afi = match subtype {
        TableDumpV2Subtype::RibIpv4Unicast | TableDumpV2Subtype::RibIpv4Multicast | TableDumpV2Subtype::RibIpv4UnicastAddpath | TableDumpV2Subtype::RibIpv4MulticastAddpath => {
            Some(Afi::Ipv4)
        }
        TableDumpV2Subtype::RibIpv6Unicast | TableDumpV2Subtype::RibIpv6Multicast | TableDumpV2Subtype::RibIpv6UnicastAddpath | TableDumpV2Subtype::RibIpv6MulticastAddpath => {
            Some(Afi::Ipv6)
        }
        _ => None,
    };

    let mut i = 0;
    let seqno = u32::from_be_bytes(body.get(0..4).ok_or_else(|| MrtError::BadRibEntry("truncated seqno".into()))?.try_into().unwrap());
    i += 4;

    let (afi, generic_afi_safi_consumed) = if let Some(afi) = afi {
        (afi, 0)
    } else {
        let afi = Afi::from_u16(u16::from_be_bytes(body[i..i + 2].try_into().unwrap())).ok_or(MrtError::AfiNotSupported(0))?;
        (afi, 3) // AFI(2) + SAFI(1) for RIB_GENERIC
    };
    i += generic_afi_safi_consumed;

    let bitlen = *body.get(i).ok_or_else(|| MrtError::BadRibEntry("truncated prefix bitlen".into()))?;
    i += 1;
    if bitlen > afi.max_bitlen() {
        return Err(MrtError::BadRibEntry(format!("prefix length {bitlen} exceeds {afi:?} width")));
    }
    let byte_len = crate::net::naddrsize(bitlen as u32);
    let prefix_bytes = body.get(i..i + byte_len).ok_or_else(|| MrtError::BadRibEntry("truncated prefix bytes".into()))?;
    let prefix = NetAddr::new(afi, prefix_bytes, bitlen);
    i += byte_len;

    let entry_count = u16::from_be_bytes(body.get(i..i + 2).ok_or_else(|| MrtError::BadRibEntry("truncated entry count".into()))?.try_into().unwrap());
    i += 2;

    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let peer_idx = u16::from_be_bytes(body.get(i..i + 2).ok_or_else(|| MrtError::BadRibEntry("truncated peer index".into()))?.try_into().unwrap());
        i += 2;
        let originated = u32::from_be_bytes(body.get(i..i + 4).ok_or_else(|| MrtError::BadRibEntry("truncated originated time".into()))?.try_into().unwrap());
        i += 4;
        let path_id = if addpath {
            let v = u32::from_be_bytes(body.get(i..i + 4).ok_or_else(|| MrtError::BadRibEntry("truncated path id".into()))?.try_into().unwrap());
            i += 4;
            v
        } else {
            0
        };
        let attr_len = u16::from_be_bytes(body.get(i..i + 2).ok_or_else(|| MrtError::BadRibEntry("truncated attribute length".into()))?.try_into().unwrap()) as usize;
        i += 2;
        let attr_bytes = body.get(i..i + attr_len).ok_or_else(|| MrtError::BadRibEntry("declared attribute length exceeds record".into()))?;
        i += attr_len;
        let attributes = crate::parser::bgp::attributes::parse_attributes(attr_bytes, true, addpath).map_err(MrtError::Bgp)?;

        let peer = peer_index.peer(peer_idx).ok_or_else(|| MrtError::BadRibEntry(format!("unknown peer index {peer_idx}")))?;
        entries.push(RibEntry {
            peer: peer.clone(),
            originated,
            path_id,
            attributes,
        });
    }

    Ok(MrtMessage::Rib(RibMessage { seqno, prefix, entries }))
}

fn decode_peer_index_table(body: &[u8]) -> Result<PeerIndexTable, MrtError> {
    if body.len() < 6 {
        return Err(MrtError::BadPeerIndexHeader("truncated PEER_INDEX_TABLE header".into()));
    }
    let collector_id = Ipv4Addr::from(<[u8; 4]>::try_from(&body[0..4]).unwrap());
    let view_len = u16::from_be_bytes([body[4], body[5]]) as usize;
    let mut i = 6 + view_len;
    let view_name = String::from_utf8_lossy(&body[6..6 + view_len]).into_owned();

    let peer_count = u16::from_be_bytes(
        body.get(i..i + 2)
            .ok_or_else(|| MrtError::BadPeerIndex("truncated peer count".into()))?
            .try_into()
            .unwrap(),
    );
    i += 2;

    let mut peers = Vec::with_capacity(peer_count as usize);
    for _ in 0..peer_count {
        let peer_type = *body.get(i).ok_or_else(|| MrtError::BadPeerIndex("truncated peer type".into()))?;
        i += 1;
        let is_ipv6 = peer_type & 0b01 != 0;
        let is_as4 = peer_type & 0b10 != 0;

        let router_id = Ipv4Addr::from(<[u8; 4]>::try_from(body.get(i..i + 4).ok_or_else(|| MrtError::BadPeerIndex("truncated router id".into()))?).unwrap());
        i += 4;

        let addr_len = if is_ipv6 { 16 } else { 4 };
        let addr_bytes = body.get(i..i + addr_len).ok_or_else(|| MrtError::BadPeerIndex("truncated peer address".into()))?;
        let addr = if is_ipv6 {
            IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(addr_bytes).unwrap()))
        } else {
            IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(addr_bytes).unwrap()))
        };
        i += addr_len;

        let asn_len = if is_as4 { 4 } else { 2 };
        let asn_bytes = body.get(i..i + asn_len).ok_or_else(|| MrtError::BadPeerIndex("truncated peer ASN".into()))?;
        let asn = if is_as4 {
            Asn::new_32bit(u32::from_be_bytes(asn_bytes.try_into().unwrap()))
        } else {
            Asn::new_16bit(u16::from_be_bytes(asn_bytes.try_into().unwrap()))
        };
        i += asn_len;

        peers.push(Rc::new(PeerEntry { asn, router_id, addr }));
    }

    Ok(PeerIndexTable { collector_id, view_name, peers })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_peer_index_table() {
        let mut body = Vec::new();
        body.extend_from_slice(&[1, 1, 1, 1]); // collector id
        body.extend_from_slice(&0u16.to_be_bytes()); // view name length
        body.extend_from_slice(&1u16.to_be_bytes()); // peer count
        body.push(0b10); // type: ipv4, as4
        body.extend_from_slice(&[2, 2, 2, 2]); // router id
        body.extend_from_slice(&[3, 3, 3, 3]); // peer addr
        body.extend_from_slice(&70000u32.to_be_bytes()); // asn

        let table = decode_peer_index_table(&body).unwrap();
        assert_eq!(table.peers.len(), 1);
        assert_eq!(table.peers[0].asn.value(), 70000);
    }

    #[test]
    fn test_decode_bgp4mp_state_change() {
        let mut body = Vec::new();
        body.extend_from_slice(&65000u16.to_be_bytes()); // peer asn
        body.extend_from_slice(&65001u16.to_be_bytes()); // local asn
        body.extend_from_slice(&1u16.to_be_bytes()); // ifindex
        body.extend_from_slice(&1u16.to_be_bytes()); // AFI ipv4
        body.extend_from_slice(&[192, 0, 2, 1]); // peer addr
        body.extend_from_slice(&[192, 0, 2, 2]); // local addr
        body.extend_from_slice(&1u16.to_be_bytes()); // old state: idle
        body.extend_from_slice(&2u16.to_be_bytes()); // new state: connect

        let msg = decode_bgp4mp(u16::from(Bgp4MpSubtype::StateChange), &body).unwrap();
        match msg {
            MrtMessage::Bgp4MpStateChange(sc) => {
                assert_eq!(sc.old_state, BgpState::Idle);
                assert_eq!(sc.new_state, BgpState::Connect);
            }
            _ => panic!("expected state change"),
        }
    }

    #[test]
    fn test_decode_table_dump_truncated_record_errors() {
        // 18 bytes: past the `body.len() < 14` bound this used to check,
        // but still short of the peer ASN/attr-length fields it indexes.
        let body = vec![0u8; 18];
        assert!(decode_table_dump(&body).is_err());
    }
}
