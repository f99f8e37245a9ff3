//! The TSV-to-[`RangeTable`] ingestion pipeline: reads the upstream feed,
//! interning organization names and accumulating sorted ranges, either
//! stopping at the first malformed line (strict mode) or skipping it
//! (resilient mode, the default).

use std::collections::HashMap;
use std::fs::File;
use std::io::{
  BufRead,
  BufReader,
};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{
  Error,
  Warning,
};
use crate::ip_address::IpAddress;
use crate::parser::{
  parse_line,
  ParseErrorKind,
};
use crate::range_table::{
  OverlapMode,
  RangeTable,
};

/// Builds a [`RangeTable`] from a TSV feed.
#[derive(Default)]
pub struct Builder<'a> {
  source: Option<Box<dyn BufRead + Send + 'a>>,
  strict: bool,
  overlap_mode: OverlapMode_,
  on_warning: Option<Box<dyn Fn(Warning) + Send + 'a>>,
}

// A local newtype so `OverlapMode` (which has no `Default`) doesn't force
// `Builder` to implement `Default` by hand; `Disjoint` is the feed's normal
// mode.
#[derive(Default)]
struct OverlapMode_(Option<OverlapMode>);

impl<'a> std::fmt::Debug for Builder<'a> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Builder")
      .field("source", &self.source.as_ref().map(|_| "Some(...)"))
      .field("strict", &self.strict)
      .field("on_warning", &self.on_warning.as_ref().map(|_| "Some(...)"))
      .finish()
  }
}

impl<'a> Builder<'a> {
  /// Creates a new builder with default (resilient) settings.
  pub fn new() -> Self {
    Self::default()
  }

  /// Configures the builder to read from a file path. A gzip-compressed
  /// source is detected automatically by its magic bytes and decompressed
  /// transparently.
  pub fn from_path<P: AsRef<Path>>(mut self, path: P) -> Result<Self, Error> {
    let file = File::open(path.as_ref())?;
    self.source = Some(Self::sniff_gzip(BufReader::new(file))?);
    Ok(self)
  }

  /// Configures the builder to read from any `BufRead` source. A
  /// gzip-compressed source is detected automatically.
  pub fn with_source(mut self, source: impl BufRead + Send + 'a) -> Result<Self, Error> {
    self.source = Some(Self::sniff_gzip(source)?);
    Ok(self)
  }

  /// Switches to strict mode: `build()` returns `Err` on the first
  /// malformed line instead of skipping it.
  pub fn strict(mut self) -> Self {
    self.strict = true;
    self
  }

  /// Declares that the feed may contain overlapping ranges, switching the
  /// resulting table's lookup semantics to [`OverlapMode::Tolerant`].
  pub fn overlap_allowed(mut self) -> Self {
    self.overlap_mode = OverlapMode_(Some(OverlapMode::Tolerant));
    self
  }

  /// Registers a callback invoked for each skipped line in resilient mode.
  pub fn on_warning<F>(mut self, callback: F) -> Self
  where
    F: Fn(Warning) + Send + 'a,
  {
    self.on_warning = Some(Box::new(callback));
    self
  }

  fn sniff_gzip(
    mut reader: impl BufRead + Send + 'a,
  ) -> Result<Box<dyn BufRead + Send + 'a>, Error> {
    let is_gzipped = reader.fill_buf()?.starts_with(&[0x1f, 0x8b]);
    Ok(if is_gzipped {
      Box::new(BufReader::new(GzDecoder::new(reader)))
    } else {
      Box::new(reader)
    })
  }

  /// Builds the `RangeTable`, consuming the builder.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
  pub fn build(self) -> Result<RangeTable, Error> {
    let source = self.source.ok_or_else(|| {
      Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no data source provided"))
    })?;

    let mut starts = Vec::new();
    let mut ends = Vec::new();
    let mut asns = Vec::new();
    let mut names: HashMap<u32, String> = HashMap::new();

    for (i, line_result) in source.lines().enumerate() {
      let line_number = i + 1;
      let line = line_result?;
      if line.is_empty() || line.starts_with('#') {
        continue;
      }

      let record = match parse_line(&line) {
        Ok(record) => record,
        Err(kind) => {
          if self.strict {
            return Err(Error::InvalidFormat {
              reason: format!("line {line_number}: {kind}"),
            });
          }
          self.warn(line_number, &line, &kind);
          continue;
        }
      };

      let (IpAddress::V4(start), IpAddress::V4(end)) = (record.start, record.end) else {
        if self.strict {
          return Err(Error::InvalidFormat {
            reason: format!("line {line_number}: non-IPv4 record"),
          });
        }
        if let Some(callback) = &self.on_warning {
          callback(Warning::IpFamilyMismatch { line_number, line_content: line });
        }
        continue;
      };

      starts.push(start);
      ends.push(end);
      asns.push(record.asn);
      names.entry(record.asn).or_insert(record.organization);
    }

    let mode = self.overlap_mode.0.unwrap_or(OverlapMode::Disjoint);
    RangeTable::from_sorted(starts, ends, asns, names, mode)
  }

  fn warn(&self, line_number: usize, line: &str, kind: &ParseErrorKind) {
    if let Some(callback) = &self.on_warning {
      callback(Warning::Parse {
        line_number,
        line_content: line.to_owned(),
        message: kind.to_string(),
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use pretty_assertions::assert_eq;
  use test_log::test;

  use super::*;

  #[test]
  fn builds_a_table_from_well_formed_tsv() {
    let data = "8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n1.1.1.0\t1.1.1.255\t13335\tAU\tCLOUDFLARENET\n";
    let table = Builder::new().with_source(data.as_bytes()).unwrap().build().unwrap();

    assert_eq!(table.lookup(0x0808_0808), Some((15169, Some("GOOGLE"))));
    assert_eq!(table.entry_count(), 2);
  }

  #[test]
  fn resilient_mode_skips_malformed_lines() {
    let data = "not-a-line-at-all\n8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n";
    let table = Builder::new().with_source(data.as_bytes()).unwrap().build().unwrap();
    assert_eq!(table.entry_count(), 1);
  }

  #[test]
  fn strict_mode_fails_on_first_malformed_line() {
    let data = "not-a-line-at-all\n8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n";
    let result = Builder::new().with_source(data.as_bytes()).unwrap().strict().build();
    assert!(result.is_err());
  }

  #[test]
  fn on_warning_callback_fires_for_skipped_lines() {
    let data = "garbage\n8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n";
    let warnings = RefCell::new(Vec::new());
    let table = Builder::new()
      .with_source(data.as_bytes())
      .unwrap()
      .on_warning(|w| warnings.borrow_mut().push(w.to_string()))
      .build()
      .unwrap();

    assert_eq!(table.entry_count(), 1);
    assert_eq!(warnings.borrow().len(), 1);
  }

  #[test]
  fn comments_and_blank_lines_are_ignored() {
    let data = "# comment\n\n8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n";
    let table = Builder::new().with_source(data.as_bytes()).unwrap().build().unwrap();
    assert_eq!(table.entry_count(), 1);
  }

  #[test]
  fn missing_source_is_an_error() {
    assert!(Builder::new().build().is_err());
  }

  #[test]
  fn rejects_out_of_order_feed_as_corrupted_data() {
    let data = "8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n1.1.1.0\t1.1.1.255\t13335\tAU\tCLOUDFLARENET\n";
    let result = Builder::new().with_source(data.as_bytes()).unwrap().build();
    assert!(matches!(result, Err(Error::CorruptedData { .. })));
  }
}
