//! Immutable parallel-array database over disjoint (or, in overlap-tolerant
//! mode, possibly-overlapping) IPv4 ranges, serving lookups via binary
//! search.
//!
//! <https://en.wikipedia.org/wiki/Autonomous_system_(Internet)>

use std::collections::HashMap;

use crate::error::Error;

/// How a [`RangeTable`] resolves a query address that falls inside more than
/// one stored range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapMode {
  /// The feed is known to be disjoint; a single binary-search step is
  /// sufficient and is all that is performed.
  Disjoint,
  /// The feed may contain overlapping ranges; after the binary-search step,
  /// scan outward to find the most specific (smallest) containing range.
  Tolerant,
}

/// An immutable, read-optimized table of IPv4 ranges mapped to ASNs, plus an
/// ASN-to-organization-name lookup.
///
/// `starts`, `ends`, and `asns` are parallel arrays of equal length, sorted
/// by `starts` (invariant 1). Constructing a `RangeTable` via
/// [`RangeTable::from_sorted`] validates that the arrays agree in length,
/// that every range's start does not exceed its end, and that starts are
/// non-decreasing with no adjacent overlap in disjoint mode.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeTable {
  starts: Vec<u32>,
  ends: Vec<u32>,
  asns: Vec<u32>,
  names: HashMap<u32, String>,
  mode: OverlapMode,
}

impl RangeTable {
  /// Builds a `RangeTable` from parallel arrays already sorted by `starts`.
  ///
  /// Returns `Error::CorruptedData` if `starts`/`ends`/`asns` differ in
  /// length, if `starts` is not non-decreasing, if any `starts[i] > ends[i]`,
  /// or (in [`OverlapMode::Disjoint`]) if any two adjacent ranges overlap.
  pub fn from_sorted(
    starts: Vec<u32>,
    ends: Vec<u32>,
    asns: Vec<u32>,
    names: HashMap<u32, String>,
    mode: OverlapMode,
  ) -> Result<Self, Error> {
    if starts.len() != ends.len() || starts.len() != asns.len() {
      return Err(Error::CorruptedData {
        reason: "starts/ends/asns arrays must have equal length".into(),
      });
    }

    for i in 0..starts.len() {
      if starts[i] > ends[i] {
        return Err(Error::CorruptedData {
          reason: format!("range {i} has start {} greater than end {}", starts[i], ends[i]),
        });
      }
      if i > 0 {
        if starts[i] < starts[i - 1] {
          return Err(Error::CorruptedData {
            reason: format!("starts is not non-decreasing at index {i}"),
          });
        }
        if mode == OverlapMode::Disjoint && ends[i - 1] >= starts[i] {
          return Err(Error::CorruptedData {
            reason: format!("ranges {} and {i} overlap in disjoint mode", i - 1),
          });
        }
      }
    }

    Ok(Self { starts, ends, asns, names, mode })
  }

  /// Looks up `ip`, returning `Some((asn, name))` if a stored range contains
  /// it, `None` otherwise.
  pub fn lookup(&self, ip: u32) -> Option<(u32, Option<&str>)> {
    let i = self.floor_index(ip)?;

    match self.mode {
      OverlapMode::Disjoint => {
        if ip <= self.ends[i] {
          Some(self.entry(i))
        } else {
          None
        }
      }
      OverlapMode::Tolerant => self.lookup_tolerant(ip, i),
    }
  }

  /// Largest index `i` with `starts[i] <= ip`, or `None` if `ip` is before
  /// every stored range (or the table is empty).
  fn floor_index(&self, ip: u32) -> Option<usize> {
    if self.starts.is_empty() || ip < self.starts[0] {
      return None;
    }
    match self.starts.partition_point(|&start| start <= ip) {
      0 => None,
      n => Some(n - 1),
    }
  }

  /// Overlap-tolerant lookup: scan backward then forward from the
  /// binary-search floor for the smallest containing range.
  fn lookup_tolerant(&self, ip: u32, floor: usize) -> Option<(u32, Option<&str>)> {
    let mut best: Option<usize> = None;

    let mut j = floor as isize;
    while j >= 0 {
      let idx = j as usize;
      if self.starts[idx] > ip {
        break;
      }
      if self.ends[idx] >= ip {
        best = Some(match best {
          Some(b) if (self.ends[b] - self.starts[b]) <= (self.ends[idx] - self.starts[idx]) => b,
          _ => idx,
        });
      }
      j -= 1;
    }

    let mut j = floor + 1;
    while j < self.starts.len() && self.starts[j] <= ip {
      if self.ends[j] >= ip {
        best = Some(match best {
          Some(b) if (self.ends[b] - self.starts[b]) <= (self.ends[j] - self.starts[j]) => b,
          _ => j,
        });
      }
      j += 1;
    }

    best.map(|i| self.entry(i))
  }

  fn entry(&self, i: usize) -> (u32, Option<&str>) {
    let asn = self.asns[i];
    (asn, self.names.get(&asn).map(String::as_str))
  }

  /// `(entry_count, unique_asn_count)`, both O(1).
  pub fn stats(&self) -> (usize, usize) {
    (self.starts.len(), self.names.len())
  }

  /// Number of stored ranges.
  pub fn entry_count(&self) -> usize {
    self.starts.len()
  }

  /// Number of distinct ASNs with a known organization name.
  pub fn unique_asn_count(&self) -> usize {
    self.names.len()
  }

  /// The overlap-handling mode this table was built with.
  pub fn overlap_mode(&self) -> OverlapMode {
    self.mode
  }

  pub(crate) fn starts(&self) -> &[u32] {
    &self.starts
  }

  pub(crate) fn ends(&self) -> &[u32] {
    &self.ends
  }

  pub(crate) fn asns(&self) -> &[u32] {
    &self.asns
  }

  pub(crate) fn names(&self) -> &HashMap<u32, String> {
    &self.names
  }
}
