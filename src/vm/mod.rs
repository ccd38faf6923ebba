/*!
Stack-based bytecode filter VM. Grounded in
`original_source/src/ubgp/filterpacket.h` (stack cells, heap zones, `filter_vm_t`
layout) and `filterintrin.h` (opcode list, access-mask bits). The CLI
compiler that turns `-a`/`-p`/`-m`/... flags into bytecode for this VM
lives in [`compiler`].
*/
pub mod compiler;

use crate::error::VmError;
use crate::models::asn::Asn;
use crate::models::bgp::UpdateMessage;
use crate::net::{Afi, NetAddr};
use crate::trie::PatriciaTrie;
use std::rc::Rc;

/// VM instruction opcodes, in the order `original_source/src/ubgp/filterintrin.h`
/// declares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    Blk,
    EndBlk,
    Load,
    LoadK,
    Unpack,
    Store,
    Discard,
    Not,
    CPass,
    CFail,
    Settle,
    HasAttr,
    Exact,
    Subnet,
    Supernet,
    Related,
    PfxContains,
    AddrContains,
    AsContains,
    PeerAsIn,
    PeerAddrExact,
    AspMatch,
    AspStarts,
    AspEnds,
    AspExact,
    AspLoop,
    AspPattern,
    CommExact,
    SetTrie,
    SetTrie6,
    ClrTrie,
    ClrTrie6,
    PfxCmp,
    AddrCmp,
    AsCmp,
}

/// Which NLRI stream an opcode walks: matches `FOPC_ACCESS_{NLRI,WITHDRAWN,ALL}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMask {
    Nlri,
    Withdrawn,
    All,
}

/// Which AS_PATH variant an AS-path opcode reads: matches
/// `FOPC_ACCESS_{AS_PATH,AS4_PATH,REAL_AS_PATH}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsPathAccess {
    AsPath,
    As4Path,
    RealAsPath,
}

/// One bytecode instruction: an opcode plus an immediate operand sized to
/// whatever that opcode needs (constant pool index, trie slot id, access
/// mask, or a literal). `original_source`'s `FOPC_EXARG` widens an
/// instruction's argument across multiple code words; this port instead
/// gives every instruction a full `i64` operand up front, which is the
/// natural representation once the bytecode is no longer a packed byte
/// stream but a `Vec<Instr>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub opcode: Opcode,
    pub arg: i64,
}

impl Instr {
    pub fn new(opcode: Opcode, arg: i64) -> Instr {
        Instr { opcode, arg }
    }

    pub fn bare(opcode: Opcode) -> Instr {
        Instr { opcode, arg: 0 }
    }
}

/// A stack cell. The original's `stack_cell_t` is a tagged union of
/// integer, address, and "wide AS" values; here that's a plain enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Bool(bool),
    Int(i64),
    Asn(Asn),
    Prefix(NetAddr),
    /// One token of an AS-path pattern: `Some(asn)` for a literal, `None`
    /// for `?` (any one AS). Only ever read back by [`Opcode::AspPattern`].
    AsToken(Option<Asn>),
}

impl Cell {
    fn truthy(&self) -> bool {
        match self {
            Cell::Bool(b) => *b,
            Cell::Int(i) => *i != 0,
            Cell::Asn(a) => a.value() != 0,
            Cell::Prefix(_) => true,
            Cell::AsToken(_) => true,
        }
    }
}

/// The constant pool ("kp" in the original): literals referenced by
/// `LOADK`, populated by the compiler.
#[derive(Debug, Clone, Default)]
pub struct ConstPool {
    pub cells: Vec<Cell>,
}

/// A compiled filter program: bytecode plus its constant pool and the two
/// address tries (`VM_TMPTRIE`/`VM_TMPTRIE6`) any `SETTRIE`/`SETTRIE6`
/// instructions populate at compile time.
#[derive(Clone)]
pub struct Program {
    pub code: Vec<Instr>,
    pub kp: ConstPool,
    pub trie4: Rc<PatriciaTrie<()>>,
    pub trie6: Rc<PatriciaTrie<()>>,
}

impl Program {
    /// Dump the compiled bytecode, one instruction per line, for the
    /// CLI's `-d` flag (`original_source`'s `filter_dump`).
    pub fn dump(&self, sink: &mut impl std::io::Write) -> std::io::Result<()> {
        for (i, instr) in self.code.iter().enumerate() {
            writeln!(sink, "{i:>4}  {:?} {}", instr.opcode, instr.arg)?;
        }
        Ok(())
    }
}

/// The packet-shaped view a running filter inspects: a reconstructed BGP
/// UPDATE plus the ambient peer/AS-path context the CLI flags in spec
/// section 6 address (`-a`/`-A` AS path, `-m`/`-M` communities, `-p`/`-P`
/// etc. prefixes).
pub struct FilterPacket<'a> {
    pub update: &'a UpdateMessage,
    pub as_path: Option<&'a crate::models::aspath::AsPath>,
    pub as4_path: Option<&'a crate::models::aspath::AsPath>,
    pub real_as_path: Option<crate::models::aspath::AsPath>,
    /// The BGP speaker this message was received from, when known (set by
    /// the ingestion pipeline from the enclosing BGP4MP/RIB record; a bare
    /// `UpdateMessage` carries no peer of its own).
    pub peer_asn: Option<Asn>,
    pub peer_addr: Option<NetAddr>,
}

impl<'a> FilterPacket<'a> {
    pub fn from_update(update: &'a UpdateMessage) -> FilterPacket<'a> {
        FilterPacket {
            update,
            as_path: update.attributes.as_path(),
            as4_path: update.attributes.as4_path(),
            real_as_path: update.attributes.real_as_path(),
            peer_asn: None,
            peer_addr: None,
        }
    }

    /// Attach the peer this message was received from (spec.md section 6's
    /// `-a`/`-A`/`-i`/`-I` peer filters).
    pub fn with_peer(mut self, peer_asn: Asn, peer_addr: std::net::IpAddr) -> FilterPacket<'a> {
        self.peer_asn = Some(peer_asn);
        self.peer_addr = Some(NetAddr::host(peer_addr));
        self
    }

    fn as_path_for(&self, access: AsPathAccess) -> Option<&crate::models::aspath::AsPath> {
        match access {
            AsPathAccess::AsPath => self.as_path,
            AsPathAccess::As4Path => self.as4_path,
            AsPathAccess::RealAsPath => self.real_as_path.as_ref(),
        }
    }

    fn addrs_for(&self, mask: AccessMask) -> Vec<&NetAddr> {
        match mask {
            AccessMask::Nlri => self.update.nlri.iter().map(|p| &p.prefix).collect(),
            AccessMask::Withdrawn => self.update.withdrawn.iter().map(|p| &p.prefix).collect(),
            AccessMask::All => self
                .update
                .nlri
                .iter()
                .chain(self.update.withdrawn.iter())
                .map(|p| &p.prefix)
                .collect(),
        }
    }
}

/// The filter VM proper: program counter, operand stack, and the two
/// working tries `STORE`/`DISCARD` mutate at run time.
pub struct Vm {
    program: Program,
    block_depth: u32,
    access: AccessMask,
    as_path_access: AsPathAccess,
}

impl Vm {
    pub fn new(program: Program) -> Vm {
        Vm {
            program,
            block_depth: 0,
            access: AccessMask::Nlri,
            as_path_access: AsPathAccess::RealAsPath,
        }
    }

    pub fn set_access(&mut self, mask: AccessMask) {
        self.access = mask;
    }

    pub fn set_as_path_access(&mut self, access: AsPathAccess) {
        self.as_path_access = access;
    }

    /// Execute the compiled program against `packet`, returning whether it
    /// passes (`true`) or fails (`false`) the filter, mirroring
    /// `bgp_filter`'s boolean return rather than the original's
    /// `0`/`1`/negative-error convention (errors are a `Result::Err` here).
    pub fn run(&mut self, packet: &FilterPacket) -> Result<bool, VmError> {
        let mut stack: Vec<Cell> = Vec::new();
        self.block_depth = 0;

        let mut pc = 0usize;
        while pc < self.program.code.len() {
            let instr = self.program.code[pc];
            pc += 1;

            match instr.opcode {
                Opcode::Nop => {}
                Opcode::Blk => self.block_depth += 1,
                Opcode::EndBlk => {
                    self.block_depth = self.block_depth.checked_sub(1).ok_or(VmError::SpuriousEndblk)?;
                }
                Opcode::Load => stack.push(Cell::Int(instr.arg)),
                Opcode::LoadK => {
                    let cell = self
                        .program
                        .kp
                        .cells
                        .get(instr.arg as usize)
                        .ok_or(VmError::KUndefined)?
                        .clone();
                    stack.push(cell);
                }
                Opcode::Unpack => {
                    // Constant-pool arrays are stored pre-flattened in this
                    // port (the compiler emits one LOADK per element), so
                    // UNPACK is a no-op kept for bytecode compatibility.
                }
                Opcode::Store | Opcode::Discard => {
                    let cell = stack.pop().ok_or(VmError::StackUnderflow)?;
                    let Cell::Prefix(addr) = cell else {
                        return Err(VmError::BadAccessor);
                    };
                    // SETTRIE/SETTRIE6 select which trie is current by
                    // family; STORE/DISCARD act on whichever matches the
                    // address's own family, mirroring the original's
                    // "depends on address" comment in filterintrin.h.
                    let trie = Rc::get_mut(if addr.family() == Some(Afi::Ipv6) {
                        &mut self.program.trie6
                    } else {
                        &mut self.program.trie4
                    });
                    if let Some(trie) = trie {
                        if instr.opcode == Opcode::Store {
                            trie.insert(&addr, ());
                        } else {
                            trie.remove(&addr);
                        }
                    }
                }
                Opcode::Not => {
                    let cell = stack.pop().ok_or(VmError::StackUnderflow)?;
                    stack.push(Cell::Bool(!cell.truthy()));
                }
                Opcode::CPass => {
                    let cell = stack.pop().ok_or(VmError::StackUnderflow)?;
                    if cell.truthy() {
                        return Ok(true);
                    }
                }
                Opcode::CFail => {
                    let cell = stack.pop().ok_or(VmError::StackUnderflow)?;
                    if !cell.truthy() {
                        return Ok(false);
                    }
                }
                Opcode::Settle => {
                    stack.clear();
                }
                Opcode::HasAttr => {
                    let codes = self.decode_int_list(instr.arg as usize)?;
                    let has = packet
                        .update
                        .attributes
                        .list
                        .iter()
                        .any(|a| codes.contains(&(u8::from(a.attr_type()) as i64)));
                    stack.push(Cell::Bool(has));
                }
                Opcode::Exact => {
                    let addrs = packet.addrs_for(self.access);
                    let ok = addrs.iter().any(|a| self.current_trie(a).contains_exact(a));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::Subnet => {
                    let addrs = packet.addrs_for(self.access);
                    let ok = addrs.iter().any(|a| self.current_trie(a).is_subnet_of(a));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::Supernet => {
                    let addrs = packet.addrs_for(self.access);
                    let ok = addrs.iter().any(|a| self.current_trie(a).is_supernet_of(a));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::Related | Opcode::PfxContains | Opcode::AddrContains => {
                    let addrs = packet.addrs_for(self.access);
                    let ok = addrs
                        .iter()
                        .any(|a| !self.current_trie(a).related_to(a).is_empty() || self.current_trie(a).contains_exact(a));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::AsContains => {
                    let target = Asn::new_32bit(instr.arg as u32);
                    let ok = packet
                        .as_path_for(self.as_path_access)
                        .is_some_and(|p| p.iter_asns().any(|a| a == target));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::AspMatch | Opcode::AspStarts | Opcode::AspEnds | Opcode::AspExact => {
                    let pattern = self.decode_asn_pattern(instr.arg as usize)?;
                    let path: Vec<Asn> = packet
                        .as_path_for(self.as_path_access)
                        .map(|p| p.iter_asns().collect())
                        .unwrap_or_default();
                    let ok = match instr.opcode {
                        Opcode::AspMatch => contains_subsequence(&path, &pattern),
                        Opcode::AspStarts => path.starts_with(&pattern),
                        Opcode::AspEnds => path.ends_with(&pattern),
                        Opcode::AspExact => path == pattern,
                        _ => unreachable!(),
                    };
                    stack.push(Cell::Bool(ok));
                }
                Opcode::AspPattern => {
                    let patterns = self.decode_as_patterns(instr.arg as usize)?;
                    let path: Vec<Asn> = packet
                        .as_path_for(self.as_path_access)
                        .map(|p| p.iter_asns().collect())
                        .unwrap_or_default();
                    let ok = patterns
                        .iter()
                        .any(|(anchor_start, anchor_end, segments)| match_as_pattern(&path, *anchor_start, *anchor_end, segments));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::PeerAsIn => {
                    let candidates = self.decode_asn_pattern(instr.arg as usize)?;
                    let ok = packet.peer_asn.is_some_and(|p| candidates.iter().any(|a| *a == p));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::PeerAddrExact => {
                    let candidates = self.decode_prefix_list(instr.arg as usize)?;
                    let ok = packet
                        .peer_addr
                        .as_ref()
                        .is_some_and(|addr| candidates.iter().any(|c| crate::net::prefixeq(c, addr)));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::AspLoop => {
                    let path: Vec<Asn> = packet
                        .as_path_for(self.as_path_access)
                        .map(|p| p.iter_asns().collect())
                        .unwrap_or_default();
                    stack.push(Cell::Bool(has_as_loop(&path)));
                }
                Opcode::CommExact => {
                    let targets = self.decode_int_list(instr.arg as usize)?;
                    let ok = packet
                        .update
                        .attributes
                        .communities()
                        .iter()
                        .any(|c| targets.contains(&(c.as_u32() as i64)));
                    stack.push(Cell::Bool(ok));
                }
                Opcode::SetTrie | Opcode::SetTrie6 | Opcode::ClrTrie | Opcode::ClrTrie6 => {
                    // Trie contents are fixed at compile time in this port
                    // (the CLI compiler builds `program.trie4`/`trie6`
                    // directly); these opcodes are accepted for bytecode
                    // compatibility but perform no additional work.
                }
                Opcode::PfxCmp | Opcode::AddrCmp | Opcode::AsCmp => {
                    let b = stack.pop().ok_or(VmError::StackUnderflow)?;
                    let a = stack.pop().ok_or(VmError::StackUnderflow)?;
                    stack.push(Cell::Bool(a == b));
                }
            }
        }

        if self.block_depth != 0 {
            return Err(VmError::DanglingBlk);
        }

        // Every condition is compiled as `push value; CFAIL`, which pops
        // and only short-circuits to `false`; a fully-matching filter (or
        // no filter at all) falls through with nothing left on the stack,
        // which means PASS, not FAIL.
        match stack.pop() {
            Some(cell) => Ok(cell.truthy()),
            None => Ok(true),
        }
    }

    fn current_trie(&self, addr: &NetAddr) -> &PatriciaTrie<()> {
        if addr.family() == Some(Afi::Ipv6) {
            &self.program.trie6
        } else {
            &self.program.trie4
        }
    }

    fn decode_asn_pattern(&self, kp_index: usize) -> Result<Vec<Asn>, VmError> {
        match self.program.kp.cells.get(kp_index) {
            Some(Cell::Int(len)) => {
                let len = *len as usize;
                let mut out = Vec::with_capacity(len);
                for i in 0..len {
                    match self.program.kp.cells.get(kp_index + 1 + i) {
                        Some(Cell::Asn(a)) => out.push(*a),
                        _ => return Err(VmError::KUndefined),
                    }
                }
                Ok(out)
            }
            _ => Err(VmError::KUndefined),
        }
    }

    fn decode_prefix_list(&self, kp_index: usize) -> Result<Vec<NetAddr>, VmError> {
        match self.program.kp.cells.get(kp_index) {
            Some(Cell::Int(len)) => {
                let len = *len as usize;
                let mut out = Vec::with_capacity(len);
                for i in 0..len {
                    match self.program.kp.cells.get(kp_index + 1 + i) {
                        Some(Cell::Prefix(p)) => out.push(*p),
                        _ => return Err(VmError::KUndefined),
                    }
                }
                Ok(out)
            }
            _ => Err(VmError::KUndefined),
        }
    }

    /// Decode an `-p`/`-P` OR-list of patterns, laid out as `[num_patterns,
    /// (flags, num_segments, (seg_len, tokens...)...)...]` (see
    /// [`compiler::FilterBuilder::add_as_path_exprs`]). Multiple `-p`/`-P`
    /// occurrences compile to one instruction carrying all of them, since
    /// they're meant to OR together.
    fn decode_as_patterns(&self, kp_index: usize) -> Result<Vec<(bool, bool, Vec<Vec<Option<Asn>>>)>, VmError> {
        let Some(Cell::Int(num_patterns)) = self.program.kp.cells.get(kp_index) else {
            return Err(VmError::KUndefined);
        };
        let mut i = kp_index + 1;
        let mut patterns = Vec::with_capacity(*num_patterns as usize);
        for _ in 0..*num_patterns {
            let Some(Cell::Int(flags)) = self.program.kp.cells.get(i) else {
                return Err(VmError::KUndefined);
            };
            let anchor_start = flags & 0b01 != 0;
            let anchor_end = flags & 0b10 != 0;
            i += 1;
            let Some(Cell::Int(num_segments)) = self.program.kp.cells.get(i) else {
                return Err(VmError::KUndefined);
            };
            i += 1;
            let mut segments = Vec::with_capacity(*num_segments as usize);
            for _ in 0..*num_segments {
                let Some(Cell::Int(seg_len)) = self.program.kp.cells.get(i) else {
                    return Err(VmError::KUndefined);
                };
                i += 1;
                let mut seg = Vec::with_capacity(*seg_len as usize);
                for _ in 0..*seg_len {
                    match self.program.kp.cells.get(i) {
                        Some(Cell::AsToken(tok)) => seg.push(*tok),
                        _ => return Err(VmError::KUndefined),
                    }
                    i += 1;
                }
                segments.push(seg);
            }
            patterns.push((anchor_start, anchor_end, segments));
        }
        Ok(patterns)
    }

    fn decode_int_list(&self, kp_index: usize) -> Result<Vec<i64>, VmError> {
        match self.program.kp.cells.get(kp_index) {
            Some(Cell::Int(len)) => {
                let len = *len as usize;
                let mut out = Vec::with_capacity(len);
                for i in 0..len {
                    match self.program.kp.cells.get(kp_index + 1 + i) {
                        Some(Cell::Int(v)) => out.push(*v),
                        _ => return Err(VmError::KUndefined),
                    }
                }
                Ok(out)
            }
            _ => Err(VmError::KUndefined),
        }
    }
}

/// Detect an AS-path loop (spec.md section 8, scenario 5): an ASN that
/// reappears after collapsing adjacent duplicates (prepending) and
/// ignoring `AS_TRANS` occurrences, which are padding rather than real
/// path entries.
fn has_as_loop(path: &[Asn]) -> bool {
    let mut collapsed: Vec<Asn> = Vec::new();
    for asn in path {
        if asn.is_trans() {
            continue;
        }
        if collapsed.last() == Some(asn) {
            continue;
        }
        collapsed.push(*asn);
    }
    let mut seen = std::collections::HashSet::new();
    collapsed.iter().any(|asn| !seen.insert(asn.value()))
}

fn contains_subsequence(haystack: &[Asn], needle: &[Asn]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// A `?`-capable token matches any ASN when it's a wildcard, else the one
/// literal it names.
fn token_matches(token: &Option<Asn>, asn: &Asn) -> bool {
    token.map_or(true, |t| t == *asn)
}

fn seq_matches_at(path: &[Asn], start: usize, tokens: &[Option<Asn>]) -> bool {
    if start + tokens.len() > path.len() {
        return false;
    }
    tokens.iter().enumerate().all(|(i, t)| token_matches(t, &path[start + i]))
}

/// The first position at or after `from` where `tokens` matches contiguously.
fn find_seq_from(path: &[Asn], from: usize, tokens: &[Option<Asn>]) -> Option<usize> {
    if tokens.is_empty() {
        return Some(from);
    }
    if from > path.len() || tokens.len() > path.len() - from {
        return None;
    }
    (from..=path.len() - tokens.len()).find(|&i| seq_matches_at(path, i, tokens))
}

/// Match a `-p`/`-P` AS-path expression: `segments` (split on `*`) must
/// appear in order with an arbitrary gap between them; `anchor_start`/
/// `anchor_end` pin the first/last segment to the path's ends (`^`/`$`).
fn match_as_pattern(path: &[Asn], anchor_start: bool, anchor_end: bool, segments: &[Vec<Option<Asn>>]) -> bool {
    if segments.is_empty() {
        return true;
    }
    let last = segments.len() - 1;
    let mut cursor = 0usize;
    for (idx, seg) in segments.iter().enumerate() {
        if idx == 0 && anchor_start {
            if !seq_matches_at(path, 0, seg) {
                return false;
            }
            cursor = seg.len();
            if idx == last && anchor_end && cursor != path.len() {
                return false;
            }
            continue;
        }
        if idx == last && anchor_end {
            if seg.len() > path.len() {
                return false;
            }
            let start = path.len() - seg.len();
            if start < cursor {
                return false;
            }
            if !seq_matches_at(path, start, seg) {
                return false;
            }
            cursor = path.len();
            continue;
        }
        match find_seq_from(path, cursor, seg) {
            Some(pos) => cursor = pos + seg.len(),
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::aspath::AsPath;
    use crate::models::bgp::UpdateMessage;
    use crate::net::NetAddrAp;

    fn update_with_nlri(prefixes: &[&str]) -> UpdateMessage {
        let mut u = UpdateMessage::new();
        for p in prefixes {
            u.nlri.push(NetAddrAp::new(p.parse().unwrap(), 0));
        }
        u
    }

    #[test]
    fn test_cpass_on_true_passes() {
        let program = Program {
            code: vec![Instr::bare(Opcode::Load), Instr::bare(Opcode::CPass)],
            kp: ConstPool::default(),
            trie4: Rc::new(PatriciaTrie::new(32)),
            trie6: Rc::new(PatriciaTrie::new(128)),
        };
        let mut code = program.code.clone();
        code[0].arg = 1;
        let program = Program { code, ..program };
        let mut vm = Vm::new(program);
        let update = update_with_nlri(&["10.0.0.0/8"]);
        let packet = FilterPacket::from_update(&update);
        assert!(vm.run(&packet).unwrap());
    }

    #[test]
    fn test_exact_against_trie() {
        let mut trie4 = PatriciaTrie::new(32);
        trie4.insert(&"10.0.0.0/8".parse().unwrap(), ());
        let program = Program {
            code: vec![Instr::bare(Opcode::Exact)],
            kp: ConstPool::default(),
            trie4: Rc::new(trie4),
            trie6: Rc::new(PatriciaTrie::new(128)),
        };
        let mut vm = Vm::new(program);
        let update = update_with_nlri(&["10.0.0.0/8"]);
        let packet = FilterPacket::from_update(&update);
        assert!(vm.run(&packet).unwrap());

        let update2 = update_with_nlri(&["192.0.2.0/24"]);
        let packet2 = FilterPacket::from_update(&update2);
        assert!(!vm.run(&packet2).unwrap());
    }

    #[test]
    fn test_asp_starts() {
        let kp = ConstPool {
            cells: vec![Cell::Int(1), Cell::Asn(Asn::new_32bit(100))],
        };
        let program = Program {
            code: vec![Instr::new(Opcode::AspStarts, 0)],
            kp,
            trie4: Rc::new(PatriciaTrie::new(32)),
            trie6: Rc::new(PatriciaTrie::new(128)),
        };
        let mut update = UpdateMessage::new();
        update.attributes.list.push(crate::models::attr::Attribute::AsPath(AsPath::from_sequence(vec![
            Asn::new_32bit(100),
            Asn::new_32bit(200),
        ])));
        let mut vm = Vm::new(program);
        vm.set_as_path_access(AsPathAccess::AsPath);
        let packet = FilterPacket::from_update(&update);
        assert!(vm.run(&packet).unwrap());
    }

    #[test]
    fn test_as_loop_detection_ignores_prepend_and_as_trans() {
        // [1, 2, 3, 2, 4]: non-adjacent repeat of 2 is a loop.
        let looping = AsPath::from_sequence(vec![
            Asn::new_32bit(1),
            Asn::new_32bit(2),
            Asn::new_32bit(3),
            Asn::new_32bit(2),
            Asn::new_32bit(4),
        ]);
        assert!(has_as_loop(&looping.iter_asns().collect::<Vec<_>>()));

        // Adjacent repeat (prepending) is not a loop.
        let prepended = AsPath::from_sequence(vec![Asn::new_32bit(1), Asn::new_32bit(1), Asn::new_32bit(2)]);
        assert!(!has_as_loop(&prepended.iter_asns().collect::<Vec<_>>()));

        // AS_TRANS padding doesn't count either.
        let trans = AsPath::from_sequence(vec![
            Asn::new_16bit(Asn::AS_TRANS as u16),
            Asn::new_32bit(1),
            Asn::new_16bit(Asn::AS_TRANS as u16),
            Asn::new_32bit(2),
        ]);
        assert!(!has_as_loop(&trans.iter_asns().collect::<Vec<_>>()));
    }

    #[test]
    fn test_match_as_pattern_segments_and_anchors() {
        let path: Vec<Asn> = vec![1, 2, 3, 4, 5].into_iter().map(Asn::new_32bit).collect();

        // "1 * 4 5$": 1 anywhere, then 4 5 anchored to the end.
        let segments = vec![
            vec![Some(Asn::new_32bit(1))],
            vec![Some(Asn::new_32bit(4)), Some(Asn::new_32bit(5))],
        ];
        assert!(match_as_pattern(&path, false, true, &segments));

        // "^1 ?" : 1 anchored to the start, followed by a wildcard anywhere after.
        let segments2 = vec![vec![Some(Asn::new_32bit(1))], vec![None]];
        assert!(match_as_pattern(&path, true, false, &segments2));

        // "^1 2 3 4 5$": exact full-path match.
        let exact = vec![path.iter().copied().map(Some).collect::<Vec<_>>()];
        assert!(match_as_pattern(&path, true, true, &exact));
        let not_exact = vec![vec![Some(Asn::new_32bit(1)), Some(Asn::new_32bit(2))]];
        assert!(!match_as_pattern(&path, true, true, &not_exact));

        // out-of-order segments fail.
        let reversed = vec![vec![Some(Asn::new_32bit(5))], vec![Some(Asn::new_32bit(1))]];
        assert!(!match_as_pattern(&path, false, false, &reversed));
    }

    #[test]
    fn test_dangling_blk_errors() {
        let program = Program {
            code: vec![Instr::bare(Opcode::Blk)],
            kp: ConstPool::default(),
            trie4: Rc::new(PatriciaTrie::new(32)),
            trie6: Rc::new(PatriciaTrie::new(128)),
        };
        let mut vm = Vm::new(program);
        let update = UpdateMessage::new();
        let packet = FilterPacket::from_update(&update);
        assert_eq!(vm.run(&packet), Err(VmError::DanglingBlk));
    }
}
