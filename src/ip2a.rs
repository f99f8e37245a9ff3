//! The secondary "IP2A" format: delta-encoded ranges, no name table,
//! identified by magic `"IP2A"`.
//!
//! Layout (before zlib compression):
//!
//! ```text
//! "IP2A"                     4 bytes, ASCII
//! version                    LE32, currently 1
//! count                      LE32
//! for each range (sorted):
//!   varint(start - prev_start)   (prev_start = 0 for the first record)
//!   varint(end - start)
//!   varint(asn)
//! ```
//!
//! Lookup against this format returns only the ASN; there is no name table.

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
pub const MAGIC: &[u8; 4] = b"IP2A";

const SUPPORTED_VERSION: u32 = 1;

/// Serializes `table` to the IP2A format and writes the zlib-compressed
/// bytes to `writer`.
pub fn write<W: Write>(table: &RangeTable, writer: &mut W) -> Result<(), Error> {
  let mut buffer = Vec::new();
  buffer.extend_from_slice(MAGIC);
  buffer.extend_from_slice(&SUPPORTED_VERSION.to_le_bytes());
  buffer.extend_from_slice(&(table.entry_count() as u32).to_le_bytes());

  let mut prev_start = 0u32;
  for i in 0..table.entry_count() {
    let start = table.starts()[i];
    let end = table.ends()[i];
    let asn = table.asns()[i];
    buffer.extend_from_slice(&varint::encode(start.wrapping_sub(prev_start)));
    buffer.extend_from_slice(&varint::encode(end - start));
    buffer.extend_from_slice(&varint::encode(asn));
    prev_start = start;
  }

  let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(&buffer)?;
  let compressed = encoder.finish()?;
  writer.write_all(&compressed)?;
  Ok(())
}

/// Reads and decodes an IP2A file from `bytes`. Names are never populated
/// (this format carries no name table).
pub fn read(bytes: &[u8]) -> Result<RangeTable, Error> {
  let mut buffer = Vec::new();
  ZlibDecoder::new(bytes)
    .read_to_end(&mut buffer)
    .map_err(|_| Error::DecompressionFailed)?;

  if buffer.len() < 12 || &buffer[0..4] != MAGIC {
    return Err(Error::InvalidFormat { reason: "missing IP2A magic".into() });
  }

  let version = u32::from_le_bytes(buffer[4..8].try_into().unwrap());
  if version != SUPPORTED_VERSION {
    return Err(Error::UnsupportedVersion { found: version });
  }

  let count = u32::from_le_bytes(buffer[8..12].try_into().unwrap()) as usize;
  let mut starts = Vec::with_capacity(count);
  let mut ends = Vec::with_capacity(count);
  let mut asns = Vec::with_capacity(count);

  let mut offset = 12usize;
  let mut prev_start = 0u32;
  for _ in 0..count {
    let delta = varint::decode(&buffer, &mut offset)?;
    let size = varint::decode(&buffer, &mut offset)?;
    let asn = varint::decode(&buffer, &mut offset)?;

    let start = prev_start.wrapping_add(delta);
    starts.push(start);
    ends.push(start.wrapping_add(size));
    asns.push(asn);
    prev_start = start;
  }

  RangeTable::from_sorted(starts, ends, asns, std::collections::HashMap::new(), OverlapMode::Disjoint)
}
