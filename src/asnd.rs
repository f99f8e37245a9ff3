//! The fixed-width "ASND" format: IPv4 only, uncompressed, little-endian
//! throughout, identified by magic `0x4153_4E44` (ASCII `"ASND"`).
//!
//! Layout:
//!
//! ```text
//! magic                 LE32 = 0x4153_4E44
//! version               LE32 = 1
//! entry_count           LE32
//! string_table_offset   LE32
//! entries: entry_count * (LE32 start, LE32 end, LE32 asn_packed)
//! at string_table_offset:
//!   count               LE32
//!   entries: count * (LE32 asn, LE16 name_len, name_len UTF-8 bytes)
//! ```
//!
//! The top 8 bits of `asn_packed` are reserved: writers must zero them and
//! readers mask them off, leaving room for a future flags byte without
//! changing the entry width.

use std::io::Write;

use crate::error::Error;
use crate::range_table::{
  OverlapMode,
  RangeTable,
};

/// The 4-byte magic identifying this format.
pub const MAGIC: u32 = 0x4153_4E44;
const SUPPORTED_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;
const ASN_MASK: u32 = 0x00FF_FFFF;

/// Serializes `table` to the ASND format and writes it to `writer`.
pub fn write<W: Write>(table: &RangeTable, writer: &mut W) -> Result<(), Error> {
  let entry_count = table.entry_count() as u32;
  let string_table_offset = (HEADER_LEN + table.entry_count() * 12) as u32;

  let mut buffer = Vec::new();
  buffer.extend_from_slice(&MAGIC.to_le_bytes());
  buffer.extend_from_slice(&SUPPORTED_VERSION.to_le_bytes());
  buffer.extend_from_slice(&entry_count.to_le_bytes());
  buffer.extend_from_slice(&string_table_offset.to_le_bytes());

  for i in 0..table.entry_count() {
    let asn_packed = table.asns()[i] & ASN_MASK;
    buffer.extend_from_slice(&table.starts()[i].to_le_bytes());
    buffer.extend_from_slice(&table.ends()[i].to_le_bytes());
    buffer.extend_from_slice(&asn_packed.to_le_bytes());
  }

  let sorted_names: std::collections::BTreeMap<&u32, &String> = table.names().iter().collect();
  buffer.extend_from_slice(&(sorted_names.len() as u32).to_le_bytes());
  for (&asn, name) in sorted_names {
    buffer.extend_from_slice(&(asn & ASN_MASK).to_le_bytes());
    buffer.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buffer.extend_from_slice(name.as_bytes());
  }

  writer.write_all(&buffer)?;
  Ok(())
}

/// Reads and decodes an ASND file from `bytes`.
pub fn read(bytes: &[u8]) -> Result<RangeTable, Error> {
  if bytes.len() < HEADER_LEN || u32::from_le_bytes(bytes[0..4].try_into().unwrap()) != MAGIC {
    return Err(Error::InvalidFormat { reason: "missing ASND magic".into() });
  }

  let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
  if version != SUPPORTED_VERSION {
    return Err(Error::UnsupportedVersion { found: version });
  }

  let entry_count = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
  let string_table_offset = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;

  let mut starts = Vec::with_capacity(entry_count);
  let mut ends = Vec::with_capacity(entry_count);
  let mut asns = Vec::with_capacity(entry_count);

  let mut offset = HEADER_LEN;
  for _ in 0..entry_count {
    let entry = bytes.get(offset..offset + 12).ok_or_else(|| Error::InvalidFormat {
      reason: "truncated entry".into(),
    })?;
    starts.push(u32::from_le_bytes(entry[0..4].try_into().unwrap()));
    ends.push(u32::from_le_bytes(entry[4..8].try_into().unwrap()));
    let asn_packed = u32::from_le_bytes(entry[8..12].try_into().unwrap());
    asns.push(asn_packed & ASN_MASK);
    offset += 12;
  }

  let mut names = std::collections::HashMap::new();
  if let Some(count_bytes) = bytes.get(string_table_offset..string_table_offset + 4) {
    let count = u32::from_le_bytes(count_bytes.try_into().unwrap());
    let mut cursor = string_table_offset + 4;
    for _ in 0..count {
      let asn_bytes = bytes.get(cursor..cursor + 4).ok_or_else(|| Error::CorruptedData {
        reason: "truncated string table entry".into(),
      })?;
      let asn = u32::from_le_bytes(asn_bytes.try_into().unwrap()) & ASN_MASK;
      cursor += 4;
      let name_len = u16::from_le_bytes(
        bytes
          .get(cursor..cursor + 2)
          .ok_or_else(|| Error::CorruptedData { reason: "truncated name length".into() })?
          .try_into()
          .unwrap(),
      ) as usize;
      cursor += 2;
      let name_bytes = bytes.get(cursor..cursor + name_len).ok_or_else(|| Error::CorruptedData {
        reason: "name byte length points past end of buffer".into(),
      })?;
      cursor += name_len;
      if let Ok(name) = std::str::from_utf8(name_bytes) {
        names.insert(asn, name.to_owned());
      }
    }
  }

  RangeTable::from_sorted(starts, ends, asns, names, OverlapMode::Disjoint)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use test_log::test;

  use super::*;

  #[test]
  fn round_trips_with_reserved_bits_masked() {
    let starts = vec![0x0A00_0000];
    let ends = vec![0x0A00_00ff];
    let asns = vec![64512];
    let mut names = std::collections::HashMap::new();
    names.insert(64512, "EXAMPLE".to_owned());
    let table = RangeTable::from_sorted(starts, ends, asns, names, OverlapMode::Disjoint).unwrap();

    let mut bytes = Vec::new();
    write(&table, &mut bytes).unwrap();
    let loaded = read(&bytes).unwrap();

    assert_eq!(loaded.lookup(0x0A00_0050), Some((64512, Some("EXAMPLE"))));
  }

  #[test]
  fn masks_reserved_top_byte_of_asn_packed() {
    let starts = vec![0];
    let ends = vec![10];
    // An ASN value with bits set in the reserved top byte.
    let asns = vec![0xFF00_0001];
    let table =
      RangeTable::from_sorted(starts, ends, asns, std::collections::HashMap::new(), OverlapMode::Disjoint)
        .unwrap();

    let mut bytes = Vec::new();
    write(&table, &mut bytes).unwrap();
    let loaded = read(&bytes).unwrap();

    assert_eq!(loaded.lookup(5), Some((0x0000_0001, None)));
  }

  #[test]
  fn rejects_bad_magic() {
    assert!(read(b"nope").is_err());
  }
}
