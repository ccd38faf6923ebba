//! `bgpgrep`: read MRT archives, reconstruct the BGP UPDATE messages they
//! carry, evaluate a filter expression against each one, and emit matching
//! routes as text.
//!
//! ```no_run
//! use bgpgrep::parser::MrtIngester;
//!
//! let ingester = MrtIngester::open("rib.20240101.0000.bz2", None).unwrap();
//! for record in ingester {
//!     let record = record.unwrap();
//!     println!("{:?}", record.header);
//! }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod error;
pub mod format;
pub mod io;
pub mod models;
pub mod net;
pub mod parser;
pub mod trie;
pub mod vm;

pub use error::{BgpError, MrtError, VmError};
pub use models::mrt::MrtRecord;
