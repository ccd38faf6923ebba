//! End-to-end test of the CLI driver over a synthetic in-memory MRT
//! stream: one BGP4MP_MESSAGE carrying a BGP UPDATE announcing a single
//! IPv4 prefix, built the same way `src/parser/mod.rs`'s own unit tests
//! build a `keepalive_bgp4mp_record`.
#![cfg(feature = "cli")]

use bgpgrep::cli::{build_program, process_file, Filters, Opts};
use std::io::Write as _;

const ENTRY_TYPE_BGP4MP: u16 = 16;
const BGP4MP_MESSAGE: u16 = 1;

fn bgp_update_message(prefix_bytes: &[u8], prefix_bitlen: u8) -> Vec<u8> {
    let mut attrs = Vec::new();
    // ORIGIN: IGP
    attrs.extend_from_slice(&[0x40, 1, 1, 0]);
    // AS_PATH: one AS_SEQUENCE {65001, 65002}
    attrs.extend_from_slice(&[0x40, 2, 6, 2, 2]);
    attrs.extend_from_slice(&65001u16.to_be_bytes());
    attrs.extend_from_slice(&65002u16.to_be_bytes());
    // NEXT_HOP
    attrs.extend_from_slice(&[0x40, 3, 4]);
    attrs.extend_from_slice(&[192, 0, 2, 1]);

    let mut nlri = Vec::new();
    nlri.push(prefix_bitlen);
    nlri.extend_from_slice(prefix_bytes);

    let mut body = Vec::new();
    body.extend_from_slice(&0u16.to_be_bytes()); // withdrawn routes length
    body.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
    body.extend_from_slice(&attrs);
    body.extend_from_slice(&nlri);

    let mut msg = Vec::new();
    msg.extend_from_slice(&[0xffu8; 16]); // marker
    msg.extend_from_slice(&((19 + body.len()) as u16).to_be_bytes());
    msg.push(2); // UPDATE
    msg.extend_from_slice(&body);
    msg
}

fn bgp4mp_update_record(peer_asn: u16, peer_addr: [u8; 4]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&peer_asn.to_be_bytes());
    body.extend_from_slice(&65055u16.to_be_bytes()); // local asn
    body.extend_from_slice(&1u16.to_be_bytes()); // ifindex
    body.extend_from_slice(&1u16.to_be_bytes()); // AFI ipv4
    body.extend_from_slice(&peer_addr);
    body.extend_from_slice(&[192, 0, 2, 254]); // local addr
    body.extend_from_slice(&bgp_update_message(&[198, 51, 100], 24));

    let mut record = Vec::new();
    record.extend_from_slice(&0u32.to_be_bytes()); // timestamp
    record.extend_from_slice(&ENTRY_TYPE_BGP4MP.to_be_bytes());
    record.extend_from_slice(&BGP4MP_MESSAGE.to_be_bytes());
    record.extend_from_slice(&(body.len() as u32).to_be_bytes());
    record.extend_from_slice(&body);
    record
}

fn write_fixture() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bgp4mp_update_record(65000, [192, 0, 2, 1])).unwrap();
    file.flush().unwrap();
    file
}

fn base_opts() -> Opts {
    Opts {
        files: Vec::new(),
        hex_dump: false,
        dump_bytecode: false,
        only_peers: false,
        output: None,
        filters: Filters::default(),
    }
}

#[test]
fn test_matching_peer_as_emits_announce_row() {
    let fixture = write_fixture();
    let mut opts = base_opts();
    opts.filters.peer_as = vec![65000];
    let program = build_program(&opts.filters).unwrap();

    let mut sink = Vec::new();
    process_file(fixture.path().to_str().unwrap(), &opts, &program, &mut sink).unwrap();
    let out = String::from_utf8(sink).unwrap();

    assert!(out.starts_with('+'), "expected an announce row, got: {out}");
    assert!(out.contains("198.51.100.0/24"));
    assert!(out.contains("65001 65002"));
    assert!(out.contains("IGP"));
    assert!(out.contains("192.0.2.1 65000"));
}

#[test]
fn test_non_matching_peer_as_emits_nothing() {
    let fixture = write_fixture();
    let mut opts = base_opts();
    opts.filters.peer_as = vec![1];
    let program = build_program(&opts.filters).unwrap();

    let mut sink = Vec::new();
    process_file(fixture.path().to_str().unwrap(), &opts, &program, &mut sink).unwrap();
    assert!(sink.is_empty());
}

#[test]
fn test_exact_prefix_filter_matches() {
    let fixture = write_fixture();
    let mut opts = base_opts();
    opts.filters.exact = vec!["198.51.100.0/24".parse().unwrap()];
    let program = build_program(&opts.filters).unwrap();

    let mut sink = Vec::new();
    process_file(fixture.path().to_str().unwrap(), &opts, &program, &mut sink).unwrap();
    let out = String::from_utf8(sink).unwrap();
    assert!(out.contains("198.51.100.0/24"));
}

#[test]
fn test_conflicting_prefix_relations_rejected() {
    let mut filters = Filters::default();
    filters.exact = vec!["10.0.0.0/8".parse().unwrap()];
    filters.subnet = vec!["10.0.0.0/8".parse().unwrap()];
    assert!(build_program(&filters).is_err());
}

#[test]
fn test_hex_dump_emits_debug_representation_instead_of_row() {
    let fixture = write_fixture();
    let mut opts = base_opts();
    opts.hex_dump = true;
    let program = build_program(&opts.filters).unwrap();

    let mut sink = Vec::new();
    process_file(fixture.path().to_str().unwrap(), &opts, &program, &mut sink).unwrap();
    let out = String::from_utf8(sink).unwrap();
    assert!(!out.starts_with('+'));
    assert!(out.contains("UpdateMessage"));
}
