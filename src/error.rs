//! Crate-wide error and warning types.

use std::fmt::{
  self,
  Display,
  Formatter,
};

/// The primary error type for the crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
  /// An IPv4 or IPv6 string failed to parse. Never raised by lookup by
  /// `u32`/`u128`; malformed query strings simply yield no match.
  InvalidAddress {
    /// The string that failed to parse.
    input: String,
  },

  /// The magic bytes did not match any recognized codec, or a header field
  /// was self-inconsistent (claimed counts exceeding available bytes, the
  /// duplicated ASN count disagreeing, and so on).
  InvalidFormat {
    /// Human-readable detail of what was inconsistent.
    reason: String,
  },

  /// A varint overflowed 32 bits, a name byte length pointed past the end of
  /// the buffer, or range arrays handed to the range table violated
  /// sortedness or disjointness.
  CorruptedData {
    /// Human-readable detail of what was corrupt.
    reason: String,
  },

  /// The file's version field is newer than this reader knows how to parse.
  UnsupportedVersion {
    /// The version number found in the file.
    found: u32,
  },

  /// Zlib decompression returned a non-positive output length after the
  /// retry budget was exhausted.
  DecompressionFailed,

  /// A pass-through failure from the byte-source collaborator.
  Io(std::io::Error),
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Error::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl Display for Error {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Error::InvalidAddress { input } => write!(f, "invalid address: {input}"),
      Error::InvalidFormat { reason } => write!(f, "invalid format: {reason}"),
      Error::CorruptedData { reason } => write!(f, "corrupted data: {reason}"),
      Error::UnsupportedVersion { found } => write!(f, "unsupported version: {found}"),
      Error::DecompressionFailed => write!(f, "decompression failed"),
      Error::Io(e) => write!(f, "I/O error: {e}"),
    }
  }
}

impl From<std::io::Error> for Error {
  fn from(err: std::io::Error) -> Self {
    Error::Io(err)
  }
}

/// A non-fatal warning surfaced during resilient-mode TSV ingestion.
#[derive(Debug)]
#[non_exhaustive]
pub enum Warning {
  /// A line could not be parsed and was skipped.
  Parse {
    /// The 1-based line number where the warning occurred.
    line_number: usize,
    /// The content of the line that was skipped.
    line_content: String,
    /// A message describing the parse error.
    message: String,
  },
  /// A line contained a start IP and end IP of different families.
  IpFamilyMismatch {
    /// The 1-based line number where the warning occurred.
    line_number: usize,
    /// The content of the line that was skipped.
    line_content: String,
  },
  /// A name entry in an ASN table could not be decoded as UTF-8 and was
  /// dropped; the range itself is still usable, only the name is missing.
  InvalidName {
    /// The ASN whose name entry was dropped.
    asn: u32,
  },
}

impl Display for Warning {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Warning::Parse {
        line_number,
        line_content,
        message,
      } => write!(
        f,
        "parse warning on line {line_number}: {message} in line: \"{line_content}\""
      ),
      Warning::IpFamilyMismatch {
        line_number,
        line_content,
      } => write!(
        f,
        "IP family mismatch on line {line_number}: \"{line_content}\""
      ),
      Warning::InvalidName { asn } => {
        write!(f, "name for AS{asn} was not valid UTF-8 and was dropped")
      }
    }
  }
}
