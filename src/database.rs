//! The façade: loads a file of unknown codec by sniffing its magic bytes
//! and dispatches lookups to whichever backing store was built.

use std::fs;
use std::path::Path;

use crate::error::Error;
use crate::ip_address::IpAddress;
use crate::ipv4::parse_ipv4;
use crate::range_table::RangeTable;
use crate::trie::FrozenTrie;
use crate::{
  asn2,
  asnd,
  ip2a,
  ultra_compact,
};

/// An immutable, loaded IP-to-ASN database.
///
/// `Database` holds either a [`RangeTable`] (the on-disk codecs, IPv4 only)
/// or a [`FrozenTrie`] (built in-process from CIDR records, either address
/// family). Both backing stores are plain owned data with no interior
/// mutability, so `Database` is `Send + Sync` and safe to share behind an
/// `Arc` across threads; swapping in a freshly loaded database for a live
/// one is the caller's responsibility, not something this type manages.
#[derive(Debug)]
pub enum Database {
  /// Backed by a binary-search range table, as produced by the four on-disk
  /// codecs. IPv4 only.
  Ranges(RangeTable),
  /// Backed by a longest-prefix-match trie, covering both address families.
  Trie(FrozenTrie<(u32, Option<String>)>),
}

impl Database {
  /// Loads a database from an in-memory buffer, detecting the codec from
  /// its magic bytes.
  ///
  /// `ULTR` and `IP2A` files are zlib-compressed at the outermost layer
  /// (their magic is the first four bytes *inside* the decompressed
  /// payload, not of the file itself), so dispatch cannot sniff them by
  /// peeking at the raw bytes the way it can for `ASND` (never compressed)
  /// or a plain `ASN2` file. `ASND` is checked first since it is cheap and
  /// unambiguous; everything else is tried in turn — decompressing and
  /// checking the inner magic — and the first reader to succeed wins.
  /// `asn2::read` already knows how to sniff both the plain and
  /// zlib-wrapped `ASN2` cases, so it is tried last and its error is the one
  /// surfaced for genuinely unrecognized input.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip(bytes)))]
  pub fn load(bytes: &[u8]) -> Result<Self, Error> {
    if bytes.len() >= 4 && bytes[0..4] == asnd::MAGIC.to_le_bytes() {
      return asnd::read(bytes).map(Database::Ranges);
    }
    if let Ok(table) = ultra_compact::read(bytes) {
      return Ok(Database::Ranges(table));
    }
    if let Ok(table) = ip2a::read(bytes) {
      return Ok(Database::Ranges(table));
    }
    asn2::read(bytes).map(Database::Ranges)
  }

  /// Loads a database from a file at `path`, detecting the codec from its
  /// magic bytes.
  #[cfg_attr(feature = "tracing", tracing::instrument)]
  pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
    let bytes = fs::read(path.as_ref())?;
    Self::load(&bytes)
  }

  /// Wraps a pre-built trie as a `Database`.
  pub fn from_trie(trie: FrozenTrie<(u32, Option<String>)>) -> Self {
    Database::Trie(trie)
  }

  /// Looks up an IPv4 address given as a 32-bit integer.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
  pub fn lookup_v4(&self, ip: u32) -> Option<(u32, Option<&str>)> {
    match self {
      Database::Ranges(table) => table.lookup(ip),
      Database::Trie(trie) => trie
        .lookup(IpAddress::V4(ip))
        .map(|(asn, name)| (*asn, name.as_deref())),
    }
  }

  /// Parses `s` as a dotted-quad IPv4 address and looks it up. Returns
  /// `None` for both "not found" and "failed to parse" — lookup by string
  /// never raises [`Error::InvalidAddress`]; that variant is reserved for
  /// callers who want to distinguish the two explicitly via [`parse_ipv4`].
  pub fn lookup_v4_str(&self, s: &str) -> Option<(u32, Option<&str>)> {
    parse_ipv4(s).and_then(|ip| self.lookup_v4(ip))
  }

  /// Looks up an IPv6 address given as a 128-bit integer. Always `None`
  /// against a [`Database::Ranges`] backing store, since none of the
  /// on-disk codecs carry IPv6 ranges.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
  pub fn lookup_v6(&self, ip: u128) -> Option<(u32, Option<&str>)> {
    match self {
      Database::Ranges(_) => None,
      Database::Trie(trie) => trie
        .lookup(IpAddress::V6(ip))
        .map(|(asn, name)| (*asn, name.as_deref())),
    }
  }

  /// Looks up either address family via the tagged [`IpAddress`].
  pub fn lookup(&self, address: IpAddress) -> Option<(u32, Option<&str>)> {
    match address {
      IpAddress::V4(ip) => self.lookup_v4(ip),
      IpAddress::V6(ip) => self.lookup_v6(ip),
    }
  }

  /// Number of stored ranges or trie entries.
  pub fn entry_count(&self) -> usize {
    match self {
      Database::Ranges(table) => table.entry_count(),
      Database::Trie(_) => 0,
    }
  }

  /// Number of distinct ASNs with a known organization name. `0` for a
  /// trie-backed database; trie payloads carry names inline and aren't
  /// deduplicated into a side table the way `RangeTable` does.
  pub fn unique_asn_count(&self) -> usize {
    match self {
      Database::Ranges(table) => table.unique_asn_count(),
      Database::Trie(_) => 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use test_log::test;

  use super::*;
  use crate::range_table::OverlapMode;
  use crate::trie::TrieBuilder;

  fn assert_send_sync<T: Send + Sync>() {}

  #[test]
  fn database_is_send_and_sync() {
    assert_send_sync::<Database>();
  }

  #[test]
  fn loads_an_ultra_compact_buffer_and_looks_up() {
    let starts = vec![0x0808_0800];
    let ends = vec![0x0808_08ff];
    let asns = vec![15169];
    let mut names = std::collections::HashMap::new();
    names.insert(15169, "GOOGLE".to_owned());
    let table = RangeTable::from_sorted(starts, ends, asns, names, OverlapMode::Disjoint).unwrap();

    let mut bytes = Vec::new();
    ultra_compact::write(&table, &mut bytes).unwrap();

    let db = Database::load(&bytes).unwrap();
    assert_eq!(db.lookup_v4(0x0808_0808), Some((15169, Some("GOOGLE"))));
    assert_eq!(db.lookup_v4_str("8.8.8.8"), Some((15169, Some("GOOGLE"))));
    assert_eq!(db.lookup_v4_str("not an ip"), None);
  }

  #[test]
  fn rejects_unrecognized_bytes() {
    assert!(Database::load(b"not a database").is_err());
  }

  #[test]
  fn ranges_backed_database_never_matches_ipv6() {
    let table = RangeTable::from_sorted(
      vec![0],
      vec![10],
      vec![1],
      std::collections::HashMap::new(),
      OverlapMode::Disjoint,
    )
    .unwrap();
    let db = Database::Ranges(table);
    assert_eq!(db.lookup_v6(0), None);
  }

  #[test]
  fn trie_backed_database_supports_both_families() {
    let mut builder = TrieBuilder::new();
    builder.insert(IpAddress::V4(0x0A00_0000), 8, (1u32, Some("EXAMPLE".to_owned())));
    builder.insert(IpAddress::V6(0x2001_0db8 << 96), 32, (7u32, None));
    let db = Database::from_trie(builder.finalize());

    assert_eq!(db.lookup_v4(0x0A01_0101), Some((1, Some("EXAMPLE"))));
    assert_eq!(db.lookup_v6((0x2001_0db8 << 96) | 1), Some((7, None)));
    assert_eq!(db.entry_count(), 0);
  }
}
