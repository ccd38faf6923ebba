/*!
BGP message decoding (RFC 4271 section 4). Grounded in
`original_source/src/ubgp/bgp.h`/`bgp.c` for the header layout (16-byte
marker, 2-byte length, 1-byte type) and per-message field shapes.
*/
pub mod attributes;

use crate::error::BgpError;
use crate::models::asn::Asn;
use crate::models::bgp::{
    BgpMessage, BgpMessageType, NotificationCode, NotificationMessage, OpenMessage, UpdateMessage,
};
use crate::net::Afi;
use std::net::Ipv4Addr;

pub const HEADER_LEN: usize = 19;
const MARKER_LEN: usize = 16;

/// Decode options threaded through every message: whether AS numbers are
/// 4-byte (`BGPF_ASN32BIT`) and whether NLRI entries carry ADDPATH
/// identifiers (`BGPF_ADDPATH`), per `original_source/src/ubgp/bgp.h`'s flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOpts {
    pub asn32: bool,
    pub addpath: bool,
}

/// Decode one full BGP message (header + body) from `bytes`. `bytes` must
/// contain exactly one message (the caller is responsible for framing,
/// e.g. via the MRT BGP4MP_MESSAGE payload or a raw TCP byte stream).
pub fn decode_message(bytes: &[u8], opts: DecodeOpts) -> Result<BgpMessage, BgpError> {
    if bytes.len() < HEADER_LEN {
        return Err(BgpError::BadHeader("message shorter than fixed header".into()));
    }
    let length = u16::from_be_bytes([bytes[MARKER_LEN], bytes[MARKER_LEN + 1]]) as usize;
    if length != bytes.len() {
        return Err(BgpError::BadHeader(format!(
            "header length {length} does not match buffer length {}",
            bytes.len()
        )));
    }
    let msg_type = bytes[MARKER_LEN + 2];
    let body = &bytes[HEADER_LEN..];

    let ty = BgpMessageType::try_from(msg_type).map_err(|_| BgpError::BadType(msg_type))?;
    match ty {
        BgpMessageType::Open => Ok(BgpMessage::Open(decode_open(body)?)),
        BgpMessageType::Update => Ok(BgpMessage::Update(decode_update(body, opts)?)),
        BgpMessageType::Notification => Ok(BgpMessage::Notification(decode_notification(body)?)),
        BgpMessageType::Keepalive => Ok(BgpMessage::Keepalive),
        BgpMessageType::RouteRefresh => {
            if body.len() < 4 {
                return Err(BgpError::BadHeader("truncated ROUTE_REFRESH body".into()));
            }
            let afi = Afi::from_u16(u16::from_be_bytes([body[0], body[1]])).ok_or(BgpError::BadHeader("unsupported AFI".into()))?;
            let safi = crate::net::Safi::from_u8(body[3]).ok_or(BgpError::BadHeader("unsupported SAFI".into()))?;
            Ok(BgpMessage::RouteRefresh { afi, safi })
        }
    }
}

fn decode_open(body: &[u8]) -> Result<OpenMessage, BgpError> {
    if body.len() < 10 {
        return Err(BgpError::BadHeader("truncated OPEN body".into()));
    }
    let version = body[0];
    let my_as = u16::from_be_bytes([body[1], body[2]]);
    let hold_time = u16::from_be_bytes([body[3], body[4]]);
    let identifier = Ipv4Addr::from(<[u8; 4]>::try_from(&body[5..9]).unwrap());
    let param_len = body[9] as usize;
    let params = body
        .get(10..10 + param_len)
        .ok_or_else(|| BgpError::BadParamLength(format!("declared {param_len} bytes, body too short")))?
        .to_vec();
    Ok(OpenMessage {
        version,
        my_asn: Asn::new_16bit(my_as),
        hold_time,
        identifier,
        params,
    })
}

fn decode_update(body: &[u8], opts: DecodeOpts) -> Result<UpdateMessage, BgpError> {
    if body.len() < 2 {
        return Err(BgpError::BadWithdrawn("truncated withdrawn-routes length".into()));
    }
    let wdrawn_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    let wdrawn_bytes = body
        .get(2..2 + wdrawn_len)
        .ok_or_else(|| BgpError::BadWithdrawn("declared length exceeds message body".into()))?;
    let withdrawn = attributes::parse_nlri_list(wdrawn_bytes, Afi::Ipv4, opts.addpath)?;

    let after_wdrawn = 2 + wdrawn_len;
    let attr_len_bytes = body
        .get(after_wdrawn..after_wdrawn + 2)
        .ok_or_else(|| BgpError::BadAttribute("truncated attribute-length field".into()))?;
    let attr_len = u16::from_be_bytes([attr_len_bytes[0], attr_len_bytes[1]]) as usize;
    let attrs_start = after_wdrawn + 2;
    let attr_bytes = body
        .get(attrs_start..attrs_start + attr_len)
        .ok_or_else(|| BgpError::BadAttribute("declared length exceeds message body".into()))?;
    let attributes = attributes::parse_attributes(attr_bytes, opts.asn32, opts.addpath)?;

    let nlri_bytes = &body[attrs_start + attr_len..];
    let nlri = attributes::parse_nlri_list(nlri_bytes, Afi::Ipv4, opts.addpath)?;

    Ok(UpdateMessage {
        withdrawn,
        attributes,
        nlri,
    })
}

fn decode_notification(body: &[u8]) -> Result<NotificationMessage, BgpError> {
    if body.len() < 2 {
        return Err(BgpError::BadHeader("truncated NOTIFICATION body".into()));
    }
    Ok(NotificationMessage {
        code: NotificationCode {
            error_code: body[0],
            error_subcode: body[1],
        },
        data: body[2..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(msg_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0xffu8; MARKER_LEN];
        let length = (HEADER_LEN + body.len()) as u16;
        out.extend_from_slice(&length.to_be_bytes());
        out.push(msg_type);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_decode_keepalive() {
        let bytes = wrap(4, &[]);
        let msg = decode_message(&bytes, DecodeOpts::default()).unwrap();
        assert!(matches!(msg, BgpMessage::Keepalive));
    }

    #[test]
    fn test_decode_open() {
        let mut body = vec![4]; // version
        body.extend_from_slice(&65000u16.to_be_bytes());
        body.extend_from_slice(&180u16.to_be_bytes());
        body.extend_from_slice(&[1, 2, 3, 4]);
        body.push(0); // no params
        let bytes = wrap(1, &body);
        let msg = decode_message(&bytes, DecodeOpts::default()).unwrap();
        match msg {
            BgpMessage::Open(open) => {
                assert_eq!(open.my_asn.value(), 65000);
                assert_eq!(open.identifier, Ipv4Addr::new(1, 2, 3, 4));
            }
            _ => panic!("expected OPEN"),
        }
    }

    #[test]
    fn test_decode_update_with_withdrawn_and_nlri() {
        let prefix: crate::net::NetAddr = "10.0.0.0/8".parse().unwrap();
        let mut wdrawn = vec![prefix.bitlen()];
        wdrawn.extend_from_slice(prefix.bytes());

        let mut body = Vec::new();
        body.extend_from_slice(&(wdrawn.len() as u16).to_be_bytes());
        body.extend_from_slice(&wdrawn);
        body.extend_from_slice(&0u16.to_be_bytes()); // no attributes
        let nlri_prefix: crate::net::NetAddr = "192.0.2.0/24".parse().unwrap();
        body.push(nlri_prefix.bitlen());
        body.extend_from_slice(nlri_prefix.bytes());

        let bytes = wrap(2, &body);
        let msg = decode_message(&bytes, DecodeOpts::default()).unwrap();
        let update = msg.as_update().unwrap();
        assert_eq!(update.withdrawn.len(), 1);
        assert_eq!(update.withdrawn[0].prefix, prefix);
        assert_eq!(update.nlri.len(), 1);
        assert_eq!(update.nlri[0].prefix, nlri_prefix);
    }

    #[test]
    fn test_decode_notification() {
        let bytes = wrap(3, &[6, 2, 0xaa]);
        let msg = decode_message(&bytes, DecodeOpts::default()).unwrap();
        match msg {
            BgpMessage::Notification(n) => {
                assert_eq!(n.code.error_code, 6);
                assert_eq!(n.code.error_subcode, 2);
                assert_eq!(n.data, vec![0xaa]);
            }
            _ => panic!("expected NOTIFICATION"),
        }
    }

    #[test]
    fn test_length_mismatch_errors() {
        let mut bytes = wrap(4, &[]);
        bytes[16] = 0xff; // corrupt declared length
        assert!(decode_message(&bytes, DecodeOpts::default()).is_err());
    }
}
