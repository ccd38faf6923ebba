/*!
Error types used across the crate: [`BgpError`] for BGP message decoding,
[`MrtError`] for MRT framing, and [`VmError`] for the filter VM. All three
carry roughly the taxonomy from RFC 4271/6396 plus the VM's own control-flow
errors; see `spec.md` section 7.
*/
use std::fmt::{Display, Formatter};
use std::io;
use std::{error::Error, fmt};

/// Errors that can occur while decoding or encoding a single BGP message.
#[derive(Debug)]
pub enum BgpError {
    Io(io::Error),
    Eof(io::Error),
    InvalidOperation(String),
    BadHeader(String),
    BadType(u8),
    BadParamLength(String),
    BadWithdrawn(String),
    BadAttribute(String),
    BadNlri(String),
}

impl Error for BgpError {}

impl Display for BgpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BgpError::Io(e) => write!(f, "I/O error: {e}"),
            BgpError::Eof(e) => write!(f, "unexpected end of message: {e}"),
            BgpError::InvalidOperation(s) => write!(f, "invalid operation: {s}"),
            BgpError::BadHeader(s) => write!(f, "bad BGP header: {s}"),
            BgpError::BadType(t) => write!(f, "bad BGP message type: {t}"),
            BgpError::BadParamLength(s) => write!(f, "bad parameter length: {s}"),
            BgpError::BadWithdrawn(s) => write!(f, "bad withdrawn routes: {s}"),
            BgpError::BadAttribute(s) => write!(f, "bad path attribute: {s}"),
            BgpError::BadNlri(s) => write!(f, "bad NLRI: {s}"),
        }
    }
}

impl From<io::Error> for BgpError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => BgpError::Eof(e),
            _ => BgpError::Io(e),
        }
    }
}

/// Errors that can occur while decoding an MRT record.
#[derive(Debug)]
pub enum MrtError {
    Io(io::Error),
    Eof(io::Error),
    Bgp(BgpError),
    NotPeerIndex,
    BadBgp4mpHeader(String),
    BadZebraHeader(String),
    BadPeerIndexHeader(String),
    BadPeerIndex(String),
    NeedsPeerIndex,
    RibNotSupported(String),
    BadRibEntry(String),
    AfiNotSupported(u16),
    TypeNotSupported(u16),
}

impl Error for MrtError {}

impl Display for MrtError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MrtError::Io(e) => write!(f, "I/O error: {e}"),
            MrtError::Eof(e) => write!(f, "truncated MRT record: {e}"),
            MrtError::Bgp(e) => write!(f, "{e}"),
            MrtError::NotPeerIndex => write!(f, "expected PEER_INDEX_TABLE record"),
            MrtError::BadBgp4mpHeader(s) => write!(f, "bad BGP4MP header: {s}"),
            MrtError::BadZebraHeader(s) => write!(f, "bad Zebra BGP header: {s}"),
            MrtError::BadPeerIndexHeader(s) => write!(f, "bad peer index header: {s}"),
            MrtError::BadPeerIndex(s) => write!(f, "bad peer index: {s}"),
            MrtError::NeedsPeerIndex => write!(f, "RIB entry seen before PEER_INDEX_TABLE"),
            MrtError::RibNotSupported(s) => write!(f, "unsupported RIB subtype: {s}"),
            MrtError::BadRibEntry(s) => write!(f, "bad RIB entry: {s}"),
            MrtError::AfiNotSupported(afi) => write!(f, "unsupported AFI: {afi}"),
            MrtError::TypeNotSupported(t) => write!(f, "unsupported MRT type: {t}"),
        }
    }
}

impl From<io::Error> for MrtError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => MrtError::Eof(e),
            _ => MrtError::Io(e),
        }
    }
}

impl From<BgpError> for MrtError {
    fn from(e: BgpError) -> Self {
        match e {
            BgpError::Io(io) => MrtError::Io(io),
            BgpError::Eof(io) => MrtError::Eof(io),
            other => MrtError::Bgp(other),
        }
    }
}

/// Filter VM error codes. Negative by convention (spec section 4.6/7); `0`
/// means FAIL and `1` means PASS, matching the original's `bgp_filter`
/// return convention, so these are kept as a signed code rather than a
/// plain Rust error for interop with [`crate::vm::Vm::run`]'s return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum VmError {
    OutOfMemory = -1,
    StackOverflow = -2,
    StackUnderflow = -3,
    FuncUndefined = -4,
    KUndefined = -5,
    BadAccessor = -6,
    TrieMismatch = -7,
    TrieUndefined = -8,
    PacketMismatch = -9,
    BadPacket = -10,
    IllegalOpcode = -11,
    DanglingBlk = -12,
    SpuriousEndblk = -13,
    SurprisingBytes = -14,
    BadArray = -15,
}

impl VmError {
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl Error for VmError {}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VmError::OutOfMemory => "out of memory",
            VmError::StackOverflow => "stack overflow",
            VmError::StackUnderflow => "stack underflow",
            VmError::FuncUndefined => "reference to undefined function",
            VmError::KUndefined => "reference to undefined constant",
            VmError::BadAccessor => "illegal packet accessor",
            VmError::TrieMismatch => "trie/prefix family mismatch",
            VmError::TrieUndefined => "reference to undefined trie",
            VmError::PacketMismatch => "mismatched packet type for this filter",
            VmError::BadPacket => "packet corruption detected",
            VmError::IllegalOpcode => "illegal instruction",
            VmError::DanglingBlk => "dangling BLK at execution end",
            VmError::SpuriousEndblk => "ENDBLK with no BLK",
            VmError::SurprisingBytes => "cannot make sense of these bytes",
            VmError::BadArray => "array access out of bounds",
        };
        write!(f, "{msg}")
    }
}
