/*!
AS_PATH attribute (RFC 4271 section 5.1.2) and the AS4_PATH reconciliation
machinery of RFC 6793. Grounded in `original_source/src/ubgp/bgpattribs.h`
(`as_pathent_t`, segment type constants) and the teacher's
`models/bgp/aspath/*.rs` module split (builder/iters/storage kept separate
from the public type there; this crate keeps it to one file since the
segment representation is much smaller in scope).
*/
use crate::models::asn::Asn;
use std::fmt::{self, Display, Formatter};

/// AS_PATH segment type octet values (RFC 4271 section 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SegmentType {
    Set = 1,
    Sequence = 2,
    ConfedSequence = 3,
    ConfedSet = 4,
}

impl SegmentType {
    pub const fn from_u8(v: u8) -> Option<SegmentType> {
        match v {
            1 => Some(SegmentType::Set),
            2 => Some(SegmentType::Sequence),
            3 => Some(SegmentType::ConfedSequence),
            4 => Some(SegmentType::ConfedSet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsSegment {
    pub segment_type: SegmentType,
    pub asns: Vec<Asn>,
}

/// A full AS_PATH: an ordered list of segments. Most paths are a single
/// `Sequence` segment; `Set`/confederation segments appear at
/// aggregation/confederation boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AsPath {
    pub segments: Vec<AsSegment>,
}

impl AsPath {
    pub fn new() -> AsPath {
        AsPath::default()
    }

    pub fn from_sequence(asns: Vec<Asn>) -> AsPath {
        AsPath {
            segments: vec![AsSegment {
                segment_type: SegmentType::Sequence,
                asns,
            }],
        }
    }

    /// The flattened, origin-ordered sequence of ASNs a filter matches
    /// against: `Set`/confederation segments contribute no ordering
    /// guarantee but their members are still visited.
    pub fn iter_asns(&self) -> impl Iterator<Item = Asn> + '_ {
        self.segments.iter().flat_map(|seg| seg.asns.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.asns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path length for AS4_PATH reconciliation (RFC 6793 section 4.2.3):
    /// every `Set` segment counts as a single hop regardless of its
    /// member count, matching `original_source/src/ubgp/bgp.c`'s
    /// `ascount`/`as4count` accumulation.
    fn reconcile_len(&self) -> usize {
        self.segments
            .iter()
            .map(|s| if s.segment_type == SegmentType::Set { 1 } else { s.asns.len() })
            .sum()
    }

    /// The AS that originated the route: the last ASN of the last
    /// `Sequence` segment (or of the whole path if it has only `Set`
    /// segments, conventionally the last element overall).
    pub fn origin_asn(&self) -> Option<Asn> {
        self.segments.last()?.asns.last().copied()
    }

    /// The first ASN of the path: the peer directly connected to the
    /// collector, by convention the AS_PATH's leftmost entry.
    pub fn first_asn(&self) -> Option<Asn> {
        self.segments.first()?.asns.first().copied()
    }

    /// Reconcile a (possibly AS_TRANS-substituted) 2-byte AS_PATH with an
    /// AS4_PATH attribute per RFC 6793 section 4.2.3: the AS4_PATH's
    /// segments right-align over the AS_PATH's, replacing its trailing
    /// run; any `AS_TRANS` entries in the 2-byte path that fall before the
    /// AS4_PATH's coverage are kept as-is (the four-byte information for
    /// them was lost). If AS4_PATH is longer than AS_PATH (a malformed or
    /// truncated combination), AS4_PATH is ignored entirely
    /// (`original_source/src/ubgp/bgp.c`'s `ascount < as4count` check).
    pub fn reconcile_as4(as_path: &AsPath, as4_path: &AsPath) -> AsPath {
        if as4_path.is_empty() {
            return as_path.clone();
        }
        let as_len = as_path.reconcile_len();
        let as4_len = as4_path.reconcile_len();
        if as4_len > as_len {
            return as_path.clone();
        }

        let mut remaining = as_len - as4_len;
        let mut segments = Vec::new();
        for seg in &as_path.segments {
            if remaining == 0 {
                break;
            }
            let hops = if seg.segment_type == SegmentType::Set { 1 } else { seg.asns.len() };
            if hops <= remaining {
                segments.push(seg.clone());
                remaining -= hops;
            } else {
                segments.push(AsSegment {
                    segment_type: seg.segment_type,
                    asns: seg.asns[..remaining].to_vec(),
                });
                remaining = 0;
            }
        }
        segments.extend(as4_path.segments.iter().cloned());
        AsPath { segments }
    }
}

impl Display for AsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            let (open, close) = match seg.segment_type {
                SegmentType::Set => ("{", "}"),
                SegmentType::Sequence => ("", ""),
                SegmentType::ConfedSequence => ("(", ")"),
                SegmentType::ConfedSet => ("[", "]"),
            };
            write!(f, "{open}")?;
            let mut seg_first = true;
            for asn in &seg.asns {
                if !seg_first {
                    write!(f, " ")?;
                }
                seg_first = false;
                write!(f, "{asn}")?;
            }
            write!(f, "{close}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(asns: &[u32]) -> AsPath {
        AsPath::from_sequence(asns.iter().map(|&a| Asn::new_32bit(a)).collect())
    }

    #[test]
    fn test_origin_and_first() {
        let p = seq(&[100, 200, 300]);
        assert_eq!(p.first_asn(), Some(Asn::new_32bit(100)));
        assert_eq!(p.origin_asn(), Some(Asn::new_32bit(300)));
    }

    #[test]
    fn test_display_sequence() {
        let p = seq(&[100, 200]);
        assert_eq!(p.to_string(), "100 200");
    }

    #[test]
    fn test_reconcile_as4_replaces_trailing_run() {
        let as_path = seq(&[100, Asn::AS_TRANS, Asn::AS_TRANS]);
        let as4_path = seq(&[70000, 80000]);
        let merged = AsPath::reconcile_as4(&as_path, &as4_path);
        let asns: Vec<u32> = merged.iter_asns().map(|a| a.value()).collect();
        assert_eq!(asns, vec![100, 70000, 80000]);
    }

    #[test]
    fn test_reconcile_as4_empty_as4_path_is_noop() {
        let as_path = seq(&[100, 200]);
        let empty = AsPath::new();
        assert_eq!(AsPath::reconcile_as4(&as_path, &empty), as_path);
    }

    #[test]
    fn test_reconcile_as4_longer_than_as_path_is_ignored() {
        let as_path = seq(&[100]);
        let as4_path = seq(&[100, 200, 300]);
        assert_eq!(AsPath::reconcile_as4(&as_path, &as4_path), as_path);
    }

    #[test]
    fn test_reconcile_as4_equal_length_replaces_wholly() {
        let as_path = seq(&[100, 200, 300]);
        let as4_path = seq(&[100, 200, 300]);
        assert_eq!(AsPath::reconcile_as4(&as_path, &as4_path), as4_path);
    }

    #[test]
    fn test_reconcile_as4_set_segment_counts_as_one_hop() {
        let as_path = AsPath {
            segments: vec![
                AsSegment { segment_type: SegmentType::Set, asns: vec![Asn::new_32bit(100), Asn::new_32bit(101)] },
                AsSegment { segment_type: SegmentType::Sequence, asns: vec![Asn::new_32bit(200), Asn::AS_TRANS.into()] },
            ],
        };
        let as4_path = seq(&[70000]);
        // reconcile_len(as_path) = 1 (set) + 2 (sequence) = 3; as4_len = 1; keep = 2.
        let merged = AsPath::reconcile_as4(&as_path, &as4_path);
        assert_eq!(merged.segments[0].segment_type, SegmentType::Set);
        assert_eq!(merged.segments[0].asns, vec![Asn::new_32bit(100), Asn::new_32bit(101)]);
        assert_eq!(merged.segments[1].asns, vec![Asn::new_32bit(200)]);
        assert_eq!(merged.segments[2].asns, vec![Asn::new_32bit(70000)]);
    }
}
