/*!
MRT common header parsing (RFC 6396 section 2). Grounded directly in the
teacher's `parser/mrt/mrt_header.rs`: a zerocopy `#[repr(C)]` struct over
the 12-byte fixed header, with a 4-byte extension read separately for
`_ET` entry types.
*/
use crate::error::MrtError;
use crate::models::mrt::{CommonHeader, EntryType};
use std::io::Read;
use zerocopy::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// On-wire MRT common header layout (12 bytes, network byte order).
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RawMrtCommonHeader {
    timestamp: U32,
    entry_type: U16,
    entry_subtype: U16,
    length: U32,
}

const _: () = assert!(std::mem::size_of::<RawMrtCommonHeader>() == 12);

/// Parse the 12- or 16-byte MRT common header, returning a
/// [`CommonHeader`] whose `length` is always the length of the *message*
/// that follows (the on-wire `_ET` length includes the extra 4-byte
/// microsecond field; we subtract it here rather than carry two distinct
/// length conventions through the rest of the decoder).
pub fn parse_common_header<T: Read>(input: &mut T) -> Result<CommonHeader, MrtError> {
    let mut base_bytes = [0u8; 12];
    input.read_exact(&mut base_bytes)?;

    let raw = RawMrtCommonHeader::ref_from_bytes(&base_bytes).expect("exactly 12 bytes, no alignment requirement");

    let timestamp = raw.timestamp.get();
    let entry_type = EntryType::try_from(raw.entry_type.get()).map_err(|_| MrtError::TypeNotSupported(raw.entry_type.get()))?;
    let entry_subtype = raw.entry_subtype.get();
    let mut length = raw.length.get();

    let microsecond_timestamp = if entry_type.has_extended_timestamp() {
        if length < 4 {
            return Err(MrtError::BadPeerIndexHeader("ET record length underflows microsecond field".into()));
        }
        length -= 4;
        let mut micros = [0u8; 4];
        input.read_exact(&mut micros)?;
        Some(u32::from_be_bytes(micros))
    } else {
        None
    };

    Ok(CommonHeader {
        timestamp,
        microsecond_timestamp,
        entry_type,
        entry_subtype,
        length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_standard_header() {
        let bytes = [
            0, 0, 0, 1, // timestamp
            0, 16, // BGP4MP
            0, 4, // subtype
            0, 0, 0, 5, // length
        ];
        let mut cursor = Cursor::new(bytes);
        let header = parse_common_header(&mut cursor).unwrap();
        assert_eq!(header.timestamp, 1);
        assert_eq!(header.entry_type, EntryType::Bgp4Mp);
        assert_eq!(header.entry_subtype, 4);
        assert_eq!(header.length, 5);
        assert_eq!(header.microsecond_timestamp, None);
    }

    #[test]
    fn test_parse_et_header_subtracts_microsecond_length() {
        let bytes = [
            0, 0, 0, 1, // timestamp
            0, 17, // BGP4MP_ET
            0, 4, // subtype
            0, 0, 0, 9, // length (includes 4-byte microsecond field)
            0, 0, 0, 42, // microseconds
        ];
        let mut cursor = Cursor::new(bytes);
        let header = parse_common_header(&mut cursor).unwrap();
        assert_eq!(header.length, 5);
        assert_eq!(header.microsecond_timestamp, Some(42));
    }

    #[test]
    fn test_invalid_et_length_errors() {
        let bytes = [0, 0, 0, 1, 0, 17, 0, 4, 0, 0, 0, 2, 0, 0, 0, 0];
        let mut cursor = Cursor::new(bytes);
        assert!(parse_common_header(&mut cursor).is_err());
    }
}
