//! The primary on-disk format, identified by magic `"ULTR"`.
//!
//! Layout (before zlib compression):
//!
//! ```text
//! "ULTR"                              4 bytes, ASCII
//! range_count                         LE32
//! asn_count                           LE32
//! for each range (sorted by start):
//!   start                             BE32 (absolute)
//!   varint(end - start)
//!   varint(asn)
//! asn_count (repeated)                LE32
//! for each ASN (ascending):
//!   varint(asn)
//!   varint(name_byte_length)
//!   name (UTF-8, no terminator)
//! ```
//!
//! `start` is big-endian so the raw bytes match dotted-quad order for
//! debugging; the two counts are little-endian by historical convention;
//! varints are little-endian base-128. These conventions are preserved
//! exactly because files already on disk depend on them.

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
use crate::varint;

/// The 4-byte magic identifying this format.
pub const MAGIC: &[u8; 4] = b"ULTR";

const DECOMPRESS_RETRIES: u32 = 3;
const DECOMPRESS_INITIAL_MULTIPLIER: usize = 8;

/// Serializes `table` to the Ultra-Compact format and writes the
/// zlib-compressed bytes to `writer`.
pub fn write<W: Write>(table: &RangeTable, writer: &mut W) -> Result<(), Error> {
  let mut buffer = Vec::new();
  buffer.extend_from_slice(MAGIC);
  buffer.extend_from_slice(&(table.entry_count() as u32).to_le_bytes());
  buffer.extend_from_slice(&(table.unique_asn_count() as u32).to_le_bytes());

  for i in 0..table.entry_count() {
    let start = table.starts()[i];
    let end = table.ends()[i];
    let asn = table.asns()[i];
    buffer.extend_from_slice(&start.to_be_bytes());
    buffer.extend_from_slice(&varint::encode(end - start));
    buffer.extend_from_slice(&varint::encode(asn));
  }

  buffer.extend_from_slice(&(table.unique_asn_count() as u32).to_le_bytes());

  let sorted_names: BTreeMap<&u32, &String> = table.names().iter().collect();
  for (&asn, name) in sorted_names {
    buffer.extend_from_slice(&varint::encode(asn));
    buffer.extend_from_slice(&varint::encode(name.len() as u32));
    buffer.extend_from_slice(name.as_bytes());
  }

  let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(&buffer)?;
  let compressed = encoder.finish()?;
  writer.write_all(&compressed)?;
  Ok(())
}

/// Reads and decodes an Ultra-Compact file from `bytes`, returning the
/// reconstructed [`RangeTable`].
pub fn read(bytes: &[u8]) -> Result<RangeTable, Error> {
  let buffer = decompress(bytes)?;

  if buffer.len() < 12 || &buffer[0..4] != MAGIC {
    return Err(Error::InvalidFormat { reason: "missing ULTR magic".into() });
  }

  let range_count = u32::from_le_bytes(buffer[4..8].try_into().unwrap()) as usize;
  let header_asn_count = u32::from_le_bytes(buffer[8..12].try_into().unwrap());

  let mut starts = Vec::with_capacity(range_count);
  let mut ends = Vec::with_capacity(range_count);
  let mut asns = Vec::with_capacity(range_count);

  let mut offset = 12usize;
  for _ in 0..range_count {
    let start_bytes = buffer.get(offset..offset + 4).ok_or_else(|| Error::InvalidFormat {
      reason: "truncated range entry".into(),
    })?;
    let start = u32::from_be_bytes(start_bytes.try_into().unwrap());
    offset += 4;

    let size = varint::decode(&buffer, &mut offset)?;
    let asn = varint::decode(&buffer, &mut offset)?;

    starts.push(start);
    ends.push(start.wrapping_add(size));
    asns.push(asn);
  }

  let table_asn_count_bytes = buffer.get(offset..offset + 4).ok_or_else(|| Error::InvalidFormat {
    reason: "truncated ASN table count".into(),
  })?;
  let table_asn_count = u32::from_le_bytes(table_asn_count_bytes.try_into().unwrap());
  offset += 4;

  if table_asn_count != header_asn_count {
    return Err(Error::InvalidFormat {
      reason: format!(
        "duplicated ASN count disagreement: header says {header_asn_count}, table prefix says {table_asn_count}"
      ),
    });
  }

  let mut names = std::collections::HashMap::with_capacity(table_asn_count as usize);
  for _ in 0..table_asn_count {
    let asn = varint::decode(&buffer, &mut offset)?;
    let name_len = varint::decode(&buffer, &mut offset)? as usize;
    let name_bytes = buffer.get(offset..offset + name_len).ok_or_else(|| Error::CorruptedData {
      reason: "name byte length points past end of buffer".into(),
    })?;
    offset += name_len;

    if let Ok(name) = std::str::from_utf8(name_bytes) {
      names.insert(asn, name.to_owned());
    }
    // An invalid UTF-8 name entry is silently dropped per §7: a missing
    // name is a survivable degradation, not a load failure.
  }

  RangeTable::from_sorted(starts, ends, asns, names, OverlapMode::Disjoint)
}

/// Decompresses zlib-wrapped `compressed` bytes, starting with an output
/// buffer `8x` the compressed size and doubling on failure up to three
/// attempts before giving up with `DecompressionFailed`.
fn decompress(compressed: &[u8]) -> Result<Vec<u8>, Error> {
  let mut capacity = compressed.len().saturating_mul(DECOMPRESS_INITIAL_MULTIPLIER).max(64);

  for _ in 0..DECOMPRESS_RETRIES {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut output = Vec::with_capacity(capacity);
    match decoder.read_to_end(&mut output) {
      Ok(_) if !output.is_empty() || compressed.is_empty() => return Ok(output),
      Ok(_) => {
        capacity *= 2;
      }
      Err(_) => {
        capacity *= 2;
      }
    }
  }

  Err(Error::DecompressionFailed)
}
