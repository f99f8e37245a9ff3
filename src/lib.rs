//! Offline IP address to Autonomous System Number lookup.
//!
//! This crate loads a pre-built database — in one of four on-disk formats,
//! `ULTR`/`IP2A`/`ASN2`/`ASND` — or a trie built in-process from CIDR
//! records, and answers "which AS number (and, where available,
//! organization name) announces this address?" against it. It performs no
//! network I/O and fetches nothing on its own; building a database from the
//! upstream feed is a separate, explicit step via [`Builder`].
//!
//! ```no_run
//! # fn main() -> Result<(), ip2asn_core::Error> {
//! let db = ip2asn_core::Database::load_from_path("example.ultr")?;
//! if let Some((asn, name)) = db.lookup_v4_str("8.8.8.8") {
//!     println!("AS{asn} ({})", name.unwrap_or("unknown"));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod asn2;
mod asnd;
mod builder;
mod database;
mod error;
mod ip2a;
mod ip_address;
mod ipv4;
mod parser;
mod range_table;
mod trie;
mod ultra_compact;
mod varint;

pub use builder::Builder;
pub use database::Database;
pub use error::{
  Error,
  Warning,
};
pub use ip_address::IpAddress;
pub use ipv4::{
  format_ipv4,
  parse_ipv4,
  parse_ipv4_strict,
};
pub use parser::{
  parse_line,
  ParseErrorKind,
  ParsedRecord,
};
pub use range_table::{
  OverlapMode,
  RangeTable,
};
pub use trie::{
  FrozenTrie,
  TrieBuilder,
};

use std::io::Write;

/// Serializes `table` to the primary `ULTR` format and writes the
/// zlib-compressed bytes to `writer`.
pub fn build_ultra_compact<W: Write>(table: &RangeTable, writer: &mut W) -> Result<(), Error> {
  ultra_compact::write(table, writer)
}

/// Serializes `table` to the delta-encoded, ASN-only `IP2A` format and
/// writes the zlib-compressed bytes to `writer`.
pub fn build_ip2a<W: Write>(table: &RangeTable, writer: &mut W) -> Result<(), Error> {
  ip2a::write(table, writer)
}

/// Serializes `table` to the fixed-width `ASN2` format. When `compressed`
/// is `true`, the entire output (header included) is wrapped in a single
/// zlib stream.
pub fn build_asn2<W: Write>(table: &RangeTable, writer: &mut W, compressed: bool) -> Result<(), Error> {
  asn2::write(table, writer, compressed)
}

/// Serializes `table` to the fixed-width, uncompressed, little-endian
/// `ASND` format.
pub fn build_asnd<W: Write>(table: &RangeTable, writer: &mut W) -> Result<(), Error> {
  asnd::write(table, writer)
}

#[cfg(test)]
mod integration_tests {
  use pretty_assertions::assert_eq;
  use test_log::test;

  use super::*;

  #[test]
  fn s8_every_codec_round_trips_the_same_table() {
    let starts = vec![0x0101_0000, 0x0808_0800];
    let ends = vec![0x0101_00ff, 0x0808_08ff];
    let asns = vec![13335, 15169];
    let mut names = std::collections::HashMap::new();
    names.insert(13335, "CLOUDFLARENET".to_owned());
    names.insert(15169, "GOOGLE".to_owned());
    let table =
      RangeTable::from_sorted(starts, ends, asns, names, OverlapMode::Disjoint).unwrap();

    let mut ultra_bytes = Vec::new();
    build_ultra_compact(&table, &mut ultra_bytes).unwrap();
    let ultra_db = Database::load(&ultra_bytes).unwrap();
    assert_eq!(ultra_db.lookup_v4(0x0808_0808), Some((15169, Some("GOOGLE"))));

    let mut ip2a_bytes = Vec::new();
    build_ip2a(&table, &mut ip2a_bytes).unwrap();
    let ip2a_db = Database::load(&ip2a_bytes).unwrap();
    assert_eq!(ip2a_db.lookup_v4(0x0101_0101), Some((13335, None)));

    let mut asn2_bytes = Vec::new();
    build_asn2(&table, &mut asn2_bytes, true).unwrap();
    let asn2_db = Database::load(&asn2_bytes).unwrap();
    assert_eq!(asn2_db.lookup_v4(0x0808_0808), Some((15169, Some("GOOGLE"))));

    let mut asnd_bytes = Vec::new();
    build_asnd(&table, &mut asnd_bytes).unwrap();
    let asnd_db = Database::load(&asnd_bytes).unwrap();
    assert_eq!(asnd_db.lookup_v4(0x0101_0101), Some((13335, Some("CLOUDFLARENET"))));
  }

  #[test]
  fn builder_feeds_directly_into_every_codec() {
    let data = "8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n";
    let table = Builder::new().with_source(data.as_bytes()).unwrap().build().unwrap();

    let mut bytes = Vec::new();
    build_ultra_compact(&table, &mut bytes).unwrap();
    let db = Database::load(&bytes).unwrap();
    assert_eq!(db.lookup_v4_str("8.8.8.8"), Some((15169, Some("GOOGLE"))));
  }
}
