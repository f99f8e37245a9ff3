//! Line-by-line parsing of the upstream five-column IP-to-ASN feed.
//!
//! `start_ip \t end_ip \t asn \t country_code \t org_name`

use std::fmt::{
  self,
  Display,
  Formatter,
};

use crate::ip_address::IpAddress;
use crate::ipv4::parse_ipv4;

/// The typed result of parsing one feed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
  /// The first address of the range (inclusive).
  pub start: IpAddress,
  /// The last address of the range (inclusive).
  pub end: IpAddress,
  /// The Autonomous System Number, with any `AS`/`as` prefix already stripped.
  pub asn: u32,
  /// Opaque two-letter (or feed-specific) country code, retained verbatim.
  pub country_code: String,
  /// Free-form organization name, possibly containing spaces.
  pub organization: String,
}

/// The specific reason a line failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorKind {
  /// The line did not have exactly five tab-separated columns.
  IncorrectColumnCount {
    /// The number of columns found.
    found: usize,
  },
  /// A field could not be parsed as a valid IP address.
  InvalidIpAddress {
    /// The name of the field that failed to parse, e.g. `"start_ip"`.
    field: &'static str,
    /// The value that could not be parsed.
    value: String,
  },
  /// The ASN field could not be parsed as a decimal integer.
  InvalidAsnNumber {
    /// The value that could not be parsed.
    value: String,
  },
  /// `start_ip` was greater than `end_ip`.
  InvalidRange,
  /// `start_ip` and `end_ip` belonged to different address families.
  IpFamilyMismatch,
}

impl Display for ParseErrorKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      ParseErrorKind::IncorrectColumnCount { found } => {
        write!(f, "expected 5 columns, found {found}")
      }
      ParseErrorKind::InvalidIpAddress { field, value } => {
        write!(f, "invalid IP address for field `{field}`: {value}")
      }
      ParseErrorKind::InvalidAsnNumber { value } => write!(f, "invalid ASN: {value}"),
      ParseErrorKind::InvalidRange => write!(f, "start IP is greater than end IP"),
      ParseErrorKind::IpFamilyMismatch => {
        write!(f, "start and end IPs are of different families")
      }
    }
  }
}

/// Parses one feed line into a [`ParsedRecord`].
///
/// A `country_code` that is not exactly two ASCII alphabetic characters is
/// still accepted verbatim: country is opaque to the core, so a malformed
/// country column does not fail the line.
pub fn parse_line(line: &str) -> Result<ParsedRecord, ParseErrorKind> {
  let fields: Vec<&str> = line.split('\t').collect();
  if fields.len() != 5 {
    return Err(ParseErrorKind::IncorrectColumnCount { found: fields.len() });
  }
  let [start_field, end_field, asn_field, country_field, org_field] = [
    fields[0], fields[1], fields[2], fields[3], fields[4],
  ];

  let start = parse_ipv4(start_field).ok_or_else(|| ParseErrorKind::InvalidIpAddress {
    field: "start_ip",
    value: start_field.to_owned(),
  })?;
  let end = parse_ipv4(end_field).ok_or_else(|| ParseErrorKind::InvalidIpAddress {
    field: "end_ip",
    value: end_field.to_owned(),
  })?;

  if start > end {
    return Err(ParseErrorKind::InvalidRange);
  }

  let has_as_prefix = asn_field.len() > 2
    && asn_field.as_bytes()[0].to_ascii_uppercase() == b'A'
    && asn_field.as_bytes()[1].to_ascii_uppercase() == b'S';
  let asn_text = if has_as_prefix { &asn_field[2..] } else { asn_field };
  let asn: u32 = asn_text.parse().map_err(|_| ParseErrorKind::InvalidAsnNumber {
    value: asn_field.to_owned(),
  })?;

  Ok(ParsedRecord {
    start: IpAddress::V4(start),
    end: IpAddress::V4(end),
    asn,
    country_code: country_field.to_owned(),
    organization: org_field.to_owned(),
  })
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use test_log::test;

  use super::*;

  #[test]
  fn parses_a_well_formed_line() {
    let record = parse_line("8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE").unwrap();
    assert_eq!(record.start, IpAddress::V4(0x0808_0800));
    assert_eq!(record.end, IpAddress::V4(0x0808_08ff));
    assert_eq!(record.asn, 15169);
    assert_eq!(record.country_code, "US");
    assert_eq!(record.organization, "GOOGLE");
  }

  #[test]
  fn strips_as_prefix_from_asn() {
    let record = parse_line("1.1.1.0\t1.1.1.255\tAS13335\tAU\tCLOUDFLARENET").unwrap();
    assert_eq!(record.asn, 13335);
  }

  #[test]
  fn strips_lowercase_as_prefix() {
    let record = parse_line("1.1.1.0\t1.1.1.255\tas13335\tAU\tCLOUDFLARENET").unwrap();
    assert_eq!(record.asn, 13335);
  }

  #[test]
  fn rejects_wrong_column_count() {
    let err = parse_line("1.1.1.0\t1.1.1.255\t13335").unwrap_err();
    assert_eq!(err, ParseErrorKind::IncorrectColumnCount { found: 3 });
  }

  #[test]
  fn rejects_unparseable_ip() {
    let err = parse_line("not-an-ip\t1.1.1.255\t13335\tAU\tCLOUDFLARENET").unwrap_err();
    assert!(matches!(err, ParseErrorKind::InvalidIpAddress { field: "start_ip", .. }));
  }

  #[test]
  fn rejects_start_after_end() {
    let err = parse_line("1.1.1.255\t1.1.1.0\t13335\tAU\tCLOUDFLARENET").unwrap_err();
    assert_eq!(err, ParseErrorKind::InvalidRange);
  }

  #[test]
  fn rejects_non_numeric_asn() {
    let err = parse_line("1.1.1.0\t1.1.1.255\tnotanumber\tAU\tCLOUDFLARENET").unwrap_err();
    assert!(matches!(err, ParseErrorKind::InvalidAsnNumber { .. }));
  }

  #[test]
  fn accepts_free_form_org_names_with_spaces() {
    let record = parse_line("1.1.1.0\t1.1.1.255\t1\tUS\tExample Org Inc.").unwrap();
    assert_eq!(record.organization, "Example Org Inc.");
  }

  #[test]
  fn accepts_malformed_country_code_verbatim() {
    let record = parse_line("1.1.1.0\t1.1.1.255\t1\t??\tSomeOrg").unwrap();
    assert_eq!(record.country_code, "??");
  }
}
