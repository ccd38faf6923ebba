/*!
Output row formatting (spec.md section 6): one pipe-delimited line per
matched route. Grounded in the teacher's `Elem::to_psv()` in shape (a
free function writing to a sink rather than building an intermediate
string) but specialized to the single row format this crate defines —
no JSON/PSV mode switch, since this crate has exactly one output shape.
*/
use crate::models::asn::Asn;
use crate::models::attr::{Aggregator, Origin};
use crate::models::community::Community;
use crate::models::aspath::AsPath;
use crate::net::NetAddr;
use std::io::{self, Write};
use std::net::IpAddr;

/// Which of the four row kinds a line reports (spec.md section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// `+`: a new NLRI announced over a live BGP session.
    Announce,
    /// `-`: a withdrawn route.
    Withdraw,
    /// `=`: one entry of a RIB (TABLE_DUMP/TABLE_DUMPV2) snapshot.
    RibSnapshot,
    /// `#`: a BGP4MP_STATE_CHANGE header line.
    StateChange,
}

impl RowKind {
    const fn symbol(self) -> char {
        match self {
            RowKind::Announce => '+',
            RowKind::Withdraw => '-',
            RowKind::RibSnapshot => '=',
            RowKind::StateChange => '#',
        }
    }
}

/// The peer that originated a row, printed as `feeder_ip feeder_as
/// [pathid]` (spec.md section 6; the path id is only present under
/// ADDPATH).
#[derive(Debug, Clone, Copy)]
pub struct Feeder {
    pub addr: IpAddr,
    pub asn: Asn,
    pub path_id: Option<u32>,
}

/// The timestamp field: seconds, plus an optional microsecond component
/// carried only by `_ET` MRT records.
#[derive(Debug, Clone, Copy)]
pub struct RowTimestamp {
    pub seconds: u32,
    pub microseconds: Option<u32>,
}

/// Everything needed to render one output line. One `Row` may cover
/// several prefixes at once (a BGP UPDATE shares one attribute set
/// across all of its NLRI); RIB snapshot entries, which carry distinct
/// attributes per peer, are emitted one `Row` per entry instead.
pub struct Row<'a> {
    pub kind: RowKind,
    pub prefixes: &'a [NetAddr],
    pub as_path: Option<&'a AsPath>,
    pub next_hops: &'a [IpAddr],
    pub origin: Option<Origin>,
    pub atomic_aggregate: bool,
    pub aggregator: Option<&'a Aggregator>,
    pub communities: &'a [Community],
    pub feeder: Feeder,
    pub timestamp: RowTimestamp,
    pub asn32: bool,
    /// `old->new` FSM transition text, printed in place of `as_path` for
    /// [`RowKind::StateChange`] rows (a state transition has no AS path of
    /// its own).
    pub state_transition: Option<&'a str>,
}

fn join<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    items.iter().map(f).collect::<Vec<_>>().join(",")
}

/// Write one row to `sink`, terminated with `\n`. Writer errors are
/// propagated rather than swallowed (spec.md section 7: "writer errors
/// on the output stream are fatal").
pub fn write_row(sink: &mut impl Write, row: &Row) -> io::Result<()> {
    let prefixes = join(row.prefixes, |p| p.to_string());
    let as_path = row
        .state_transition
        .map(str::to_string)
        .or_else(|| row.as_path.map(|p| p.to_string()))
        .unwrap_or_default();
    let next_hops = join(row.next_hops, |h| h.to_string());
    let origin = match row.origin {
        Some(Origin::Igp) => "IGP",
        Some(Origin::Egp) => "EGP",
        Some(Origin::Incomplete) => "INCOMPLETE",
        None => "",
    };
    let atomic = if row.atomic_aggregate { "AT" } else { "" };
    let aggregator = row
        .aggregator
        .map(|a| format!("{}:{}", a.asn, a.router_id))
        .unwrap_or_default();
    let communities = join(row.communities, |c| c.to_string());

    let mut feeder = format!("{} {}", row.feeder.addr, row.feeder.asn);
    if let Some(path_id) = row.feeder.path_id {
        feeder.push(' ');
        feeder.push_str(&path_id.to_string());
    }

    let timestamp = match row.timestamp.microseconds {
        Some(us) => format!("{}.{us}", row.timestamp.seconds),
        None => row.timestamp.seconds.to_string(),
    };

    writeln!(
        sink,
        "{}|{prefixes}|{as_path}|{next_hops}|{origin}|{atomic}|{aggregator}|{communities}|{feeder}|{timestamp}|{}",
        row.kind.symbol(),
        row.asn32 as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asn::Asn;

    fn feeder() -> Feeder {
        Feeder {
            addr: "192.0.2.1".parse().unwrap(),
            asn: Asn::new_16bit(65000),
            path_id: None,
        }
    }

    #[test]
    fn test_write_row_exact_prefix_scenario() {
        let prefix: NetAddr = "10.0.0.0/8".parse().unwrap();
        let prefixes = [prefix];
        let row = Row {
            kind: RowKind::Announce,
            prefixes: &prefixes,
            as_path: None,
            next_hops: &[],
            origin: None,
            atomic_aggregate: false,
            aggregator: None,
            communities: &[],
            feeder: feeder(),
            timestamp: RowTimestamp { seconds: 0, microseconds: None },
            asn32: false,
            state_transition: None,
        };
        let mut buf = Vec::new();
        write_row(&mut buf, &row).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert!(line.starts_with("+|10.0.0.0/8|"));
        assert!(line.ends_with("|0\n"));
    }

    #[test]
    fn test_write_row_with_microseconds() {
        let prefix: NetAddr = "192.0.2.0/24".parse().unwrap();
        let prefixes = [prefix];
        let row = Row {
            kind: RowKind::RibSnapshot,
            prefixes: &prefixes,
            as_path: None,
            next_hops: &[],
            origin: Some(Origin::Igp),
            atomic_aggregate: false,
            aggregator: None,
            communities: &[],
            feeder: feeder(),
            timestamp: RowTimestamp { seconds: 100, microseconds: Some(42) },
            asn32: true,
            state_transition: None,
        };
        let mut buf = Vec::new();
        write_row(&mut buf, &row).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert!(line.contains("|IGP|"));
        assert!(line.contains("|100.42|"));
        assert!(line.ends_with("|1\n"));
    }

    #[test]
    fn test_write_row_state_change() {
        let row = Row {
            kind: RowKind::StateChange,
            prefixes: &[],
            as_path: None,
            next_hops: &[],
            origin: None,
            atomic_aggregate: false,
            aggregator: None,
            communities: &[],
            feeder: feeder(),
            timestamp: RowTimestamp { seconds: 1, microseconds: None },
            asn32: false,
            state_transition: Some("Idle->Established"),
        };
        let mut buf = Vec::new();
        write_row(&mut buf, &row).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert!(line.starts_with('#'));
        assert!(line.contains("|Idle->Established|"));
    }
}
