//! The fixed-width "ASN2" format, optionally zlib-compressed, identified by
//! the big-endian magic `0x4153_4E32` (ASCII `"ASN2"`).
//!
//! Layout:
//!
//! ```text
//! magic                BE32 = 0x4153_4E32
//! version              BE16 = 2
//! flags                BE16 (bit 0 = compressed)
//! range_count          BE32
//! asn_table_offset     BE32
//! ranges: range_count * (BE32 start, BE32 end, BE32 asn)
//! at asn_table_offset:
//!   count              BE32
//!   entries: count * (BE32 asn, BE16 name_len, name_len UTF-8 bytes)
//! ```
//!
//! If the `compressed` flag is set, the *entire* file (header included) is
//! wrapped in a single zlib stream; decompressing it yields a buffer whose
//! first bytes are this same header again. Since the flag itself lives
//! inside the compressed payload, a reader cannot consult it before
//! decompressing: it instead sniffs the first four raw bytes for the plain
//! magic, and only attempts zlib decompression when they don't match,
//! verifying the flag's consistency against the decompressed header
//! afterward.

use std::collections::BTreeMap;
use std::io::{
  Read,
  Write,
};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::Error;
use crate::range_table::{
  OverlapMode,
  RangeTable,
};

/// The 4-byte magic identifying this format, in its raw (big-endian) form.
pub const MAGIC: u32 = 0x4153_4E32;
const MAGIC_BYTES: [u8; 4] = MAGIC.to_be_bytes();
const SUPPORTED_VERSION: u16 = 2;
const FLAG_COMPRESSED: u16 = 0b1;
const HEADER_LEN: usize = 4 + 2 + 2 + 4 + 4;

/// Serializes `table` to the ASN2 format. When `compressed` is `true`, the
/// entire output (header included) is wrapped in a single zlib stream.
pub fn write<W: Write>(table: &RangeTable, writer: &mut W, compressed: bool) -> Result<(), Error> {
  let range_count = table.entry_count() as u32;
  let asn_table_offset = (HEADER_LEN + table.entry_count() * 12) as u32;
  let flags = if compressed { FLAG_COMPRESSED } else { 0 };

  let mut buffer = Vec::new();
  buffer.extend_from_slice(&MAGIC_BYTES);
  buffer.extend_from_slice(&SUPPORTED_VERSION.to_be_bytes());
  buffer.extend_from_slice(&flags.to_be_bytes());
  buffer.extend_from_slice(&range_count.to_be_bytes());
  buffer.extend_from_slice(&asn_table_offset.to_be_bytes());

  for i in 0..table.entry_count() {
    buffer.extend_from_slice(&table.starts()[i].to_be_bytes());
    buffer.extend_from_slice(&table.ends()[i].to_be_bytes());
    buffer.extend_from_slice(&table.asns()[i].to_be_bytes());
  }

  let sorted_names: BTreeMap<&u32, &String> = table.names().iter().collect();
  buffer.extend_from_slice(&(sorted_names.len() as u32).to_be_bytes());
  for (&asn, name) in sorted_names {
    buffer.extend_from_slice(&asn.to_be_bytes());
    buffer.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buffer.extend_from_slice(name.as_bytes());
  }

  if compressed {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&buffer)?;
    writer.write_all(&encoder.finish()?)?;
  } else {
    writer.write_all(&buffer)?;
  }
  Ok(())
}

/// Reads and decodes an ASN2 file from `bytes`.
pub fn read(bytes: &[u8]) -> Result<RangeTable, Error> {
  let was_compressed = !(bytes.len() >= 4 && bytes[0..4] == MAGIC_BYTES);
  let buffer = if was_compressed {
    let mut out = Vec::new();
    ZlibDecoder::new(bytes)
      .read_to_end(&mut out)
      .map_err(|_| Error::DecompressionFailed)?;
    out
  } else {
    bytes.to_vec()
  };

  if buffer.len() < HEADER_LEN || buffer[0..4] != MAGIC_BYTES {
    return Err(Error::InvalidFormat { reason: "missing ASN2 magic".into() });
  }

  let version = u16::from_be_bytes(buffer[4..6].try_into().unwrap());
  if version != SUPPORTED_VERSION {
    return Err(Error::UnsupportedVersion { found: version as u32 });
  }

  let flags = u16::from_be_bytes(buffer[6..8].try_into().unwrap());
  let flag_compressed = flags & FLAG_COMPRESSED != 0;
  if flag_compressed != was_compressed {
    return Err(Error::InvalidFormat {
      reason: format!(
        "compressed flag ({flag_compressed}) disagrees with how the file was actually framed ({was_compressed})"
      ),
    });
  }

  let range_count = u32::from_be_bytes(buffer[8..12].try_into().unwrap()) as usize;
  let asn_table_offset = u32::from_be_bytes(buffer[12..16].try_into().unwrap()) as usize;

  let mut starts = Vec::with_capacity(range_count);
  let mut ends = Vec::with_capacity(range_count);
  let mut asns = Vec::with_capacity(range_count);

  let mut offset = HEADER_LEN;
  for _ in 0..range_count {
    let entry = buffer.get(offset..offset + 12).ok_or_else(|| Error::InvalidFormat {
      reason: "truncated range entry".into(),
    })?;
    starts.push(u32::from_be_bytes(entry[0..4].try_into().unwrap()));
    ends.push(u32::from_be_bytes(entry[4..8].try_into().unwrap()));
    asns.push(u32::from_be_bytes(entry[8..12].try_into().unwrap()));
    offset += 12;
  }

  let mut names = std::collections::HashMap::new();
  let count_bytes = buffer
    .get(asn_table_offset..asn_table_offset + 4)
    .ok_or_else(|| Error::InvalidFormat { reason: "ASN table offset out of range".into() })?;
  let asn_count = u32::from_be_bytes(count_bytes.try_into().unwrap());
  let mut cursor = asn_table_offset + 4;
  for _ in 0..asn_count {
    let asn_bytes = buffer.get(cursor..cursor + 4).ok_or_else(|| Error::CorruptedData {
      reason: "truncated ASN table entry".into(),
    })?;
    let asn = u32::from_be_bytes(asn_bytes.try_into().unwrap());
    cursor += 4;
    let name_len = u16::from_be_bytes(
      buffer
        .get(cursor..cursor + 2)
        .ok_or_else(|| Error::CorruptedData { reason: "truncated name length".into() })?
        .try_into()
        .unwrap(),
    ) as usize;
    cursor += 2;
    let name_bytes = buffer.get(cursor..cursor + name_len).ok_or_else(|| Error::CorruptedData {
      reason: "name byte length points past end of buffer".into(),
    })?;
    cursor += name_len;
    if let Ok(name) = std::str::from_utf8(name_bytes) {
      names.insert(asn, name.to_owned());
    }
  }

  RangeTable::from_sorted(starts, ends, asns, names, OverlapMode::Disjoint)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use test_log::test;

  use super::*;

  fn sample_table() -> RangeTable {
    let starts = vec![0x0808_0800];
    let ends = vec![0x0808_08ff];
    let asns = vec![15169];
    let mut names = std::collections::HashMap::new();
    names.insert(15169, "GOOGLE".to_owned());
    RangeTable::from_sorted(starts, ends, asns, names, OverlapMode::Disjoint).unwrap()
  }

  #[test]
  fn round_trips_uncompressed() {
    let table = sample_table();
    let mut bytes = Vec::new();
    write(&table, &mut bytes, false).unwrap();
    let loaded = read(&bytes).unwrap();
    assert_eq!(loaded.lookup(0x0808_0808), Some((15169, Some("GOOGLE"))));
  }

  #[test]
  fn round_trips_compressed() {
    let table = sample_table();
    let mut bytes = Vec::new();
    write(&table, &mut bytes, true).unwrap();
    assert_ne!(&bytes[0..4], &MAGIC_BYTES);
    let loaded = read(&bytes).unwrap();
    assert_eq!(loaded.lookup(0x0808_0808), Some((15169, Some("GOOGLE"))));
  }

  #[test]
  fn rejects_bad_magic() {
    assert!(read(b"nope").is_err());
  }

  #[test]
  fn rejects_compressed_flag_disagreeing_with_actual_framing() {
    let table = sample_table();
    let mut bytes = Vec::new();
    write(&table, &mut bytes, false).unwrap();

    // The file is plain (uncompressed), but claim the compressed bit anyway.
    bytes[7] |= FLAG_COMPRESSED as u8;

    let err = read(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat { .. }));
  }
}
