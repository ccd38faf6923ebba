/*!
Top-level parsing pipeline: MRT framing ([`mrt`]) over BGP message decoding
([`bgp`]), tied together by [`MrtIngester`], a per-file iterator that
mirrors the read loop in `original_source/src/bgpgrep/mrtdataread.c` —
read a common header, read exactly that many body bytes, decode, repeat
until a clean EOF at a record boundary.
*/
pub mod bgp;
pub mod mrt;

use crate::error::MrtError;
use crate::io::Codec;
use crate::models::mrt::{MrtMessage, MrtRecord, PeerIndexTable};
use std::io::{BufRead, BufReader, Read};
use std::rc::Rc;

/// Iterates the records of a single MRT byte stream, caching the most
/// recent PEER_INDEX_TABLE so later TABLE_DUMPV2 RIB entries in the same
/// file can resolve their peer references (RFC 6396 section 4.3.1).
pub struct MrtIngester {
    reader: BufReader<Box<dyn Read>>,
    peer_index: Option<Rc<PeerIndexTable>>,
    finished: bool,
}

impl MrtIngester {
    /// Open `path` (or `-` for stdin) as an MRT stream, inferring
    /// compression from the file extension unless `force` overrides it.
    pub fn open(path: &str, force: Option<Codec>) -> Result<MrtIngester, MrtError> {
        let reader = crate::io::open_source(path, force)?;
        Ok(MrtIngester::from_reader(reader))
    }

    /// Wrap an already-open byte stream (e.g. a decompressed reader, or
    /// [`crate::io::mem_source`] in tests).
    pub fn from_reader(reader: Box<dyn Read>) -> MrtIngester {
        MrtIngester {
            reader: BufReader::new(reader),
            peer_index: None,
            finished: false,
        }
    }

    /// The PEER_INDEX_TABLE currently in effect, if one has been read yet.
    pub fn peer_index(&self) -> Option<&Rc<PeerIndexTable>> {
        self.peer_index.as_ref()
    }

    fn next_record(&mut self) -> Result<Option<MrtRecord>, MrtError> {
        if self.finished {
            return Ok(None);
        }
        // Distinguish a clean EOF at a record boundary from a truncated
        // header: peek before committing to `parse_common_header`'s
        // `read_exact`, which would otherwise report the same
        // `UnexpectedEof` for both cases.
        match self.reader.fill_buf() {
            Ok(buf) if buf.is_empty() => {
                self.finished = true;
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) => return Err(MrtError::from(e)),
        }

        let header = mrt::header::parse_common_header(&mut self.reader)?;
        let mut body = vec![0u8; header.length as usize];
        std::io::Read::read_exact(&mut self.reader, &mut body)?;

        let message = mrt::decode_message(&header, &body, self.peer_index.as_ref())?;
        if let MrtMessage::PeerIndexTable(ref table) = message {
            self.peer_index = Some(table.clone());
        }
        Ok(Some(MrtRecord { header, message }))
    }
}

impl Iterator for MrtIngester {
    type Item = Result<MrtRecord, MrtError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mrt::EntryType;

    fn keepalive_bgp4mp_record() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&65000u16.to_be_bytes()); // peer asn
        body.extend_from_slice(&65001u16.to_be_bytes()); // local asn
        body.extend_from_slice(&1u16.to_be_bytes()); // ifindex
        body.extend_from_slice(&1u16.to_be_bytes()); // AFI ipv4
        body.extend_from_slice(&[192, 0, 2, 1]);
        body.extend_from_slice(&[192, 0, 2, 2]);
        // raw BGP KEEPALIVE: 16-byte marker + length(19) + type(4)
        body.extend_from_slice(&[0xff; 16]);
        body.extend_from_slice(&19u16.to_be_bytes());
        body.push(4);

        let mut record = Vec::new();
        record.extend_from_slice(&0u32.to_be_bytes()); // timestamp
        record.extend_from_slice(&u16::from(EntryType::Bgp4Mp).to_be_bytes());
        record.extend_from_slice(&1u16.to_be_bytes()); // subtype: MESSAGE
        record.extend_from_slice(&(body.len() as u32).to_be_bytes());
        record.extend_from_slice(&body);
        record
    }

    #[test]
    fn test_ingester_yields_one_record_then_stops() {
        let bytes = keepalive_bgp4mp_record();
        let mut ingester = MrtIngester::from_reader(Box::new(crate::io::mem_source(bytes)));
        let record = ingester.next().unwrap().unwrap();
        assert_eq!(record.header.entry_type, EntryType::Bgp4Mp);
        assert!(matches!(record.message, MrtMessage::Bgp4MpMessage(_)));
        assert!(ingester.next().is_none());
    }

    #[test]
    fn test_ingester_concatenated_records() {
        let mut bytes = keepalive_bgp4mp_record();
        bytes.extend_from_slice(&keepalive_bgp4mp_record());
        let ingester = MrtIngester::from_reader(Box::new(crate::io::mem_source(bytes)));
        let records: Vec<_> = ingester.collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(records.len(), 2);
    }
}
