//! Strict dotted-quad IPv4 address parsing and formatting.
//!
//! <https://en.wikipedia.org/wiki/IPv4>
//!
//! The parser accepts exactly four decimal octets separated by three dots,
//! each octet in `0..=255`, with no leading signs, no hexadecimal, and no
//! shorthand forms. It works directly over the input bytes and never
//! allocates an intermediate substring.

use crate::error::Error;

/// Parses a dotted-quad IPv4 address string into its 32-bit representation.
///
/// Returns `None` for anything that is not exactly four decimal octets
/// joined by three dots: leading zeros (`"01.0.0.0"`), out-of-range octets
/// (`"256.0.0.0"`), extra components, and non-digit characters are all
/// rejected.
pub fn parse_ipv4(s: &str) -> Option<u32> {
  let bytes = s.as_bytes();
  let mut value: u32 = 0;
  let mut octet_index = 0u8;
  let mut cursor = 0usize;

  loop {
    let (octet, consumed) = parse_octet(&bytes[cursor..])?;
    value = (value << 8) | octet as u32;
    cursor += consumed;
    octet_index += 1;

    if octet_index == 4 {
      return if cursor == bytes.len() { Some(value) } else { None };
    }

    if bytes.get(cursor) != Some(&b'.') {
      return None;
    }
    cursor += 1;
  }
}

/// Parses a dotted-quad IPv4 address, returning `Error::InvalidAddress` on
/// failure instead of `None`. Prefer [`parse_ipv4`] for the façade's lookup
/// path, where an unparseable address is simply "no match," not an error.
pub fn parse_ipv4_strict(s: &str) -> Result<u32, Error> {
  parse_ipv4(s).ok_or_else(|| Error::InvalidAddress { input: s.to_owned() })
}

/// Reads one decimal octet (`0..=255`, no leading zero unless the octet is
/// exactly `"0"`) from the start of `bytes`. Returns the octet value and the
/// number of bytes consumed.
fn parse_octet(bytes: &[u8]) -> Option<(u8, usize)> {
  let first = *bytes.first()?;
  if !first.is_ascii_digit() {
    return None;
  }

  if first == b'0' {
    // A leading zero is only valid as the lone digit "0".
    return Some((0, 1));
  }

  let mut value: u32 = (first - b'0') as u32;
  let mut consumed = 1;

  for &b in bytes.iter().skip(1).take(2) {
    if !b.is_ascii_digit() {
      break;
    }
    value = value * 10 + (b - b'0') as u32;
    consumed += 1;
  }

  if value > 255 {
    None
  } else {
    Some((value as u8, consumed))
  }
}

/// Renders a 32-bit IPv4 address in canonical dotted-quad form.
///
/// `format_ipv4` is the left inverse of [`parse_ipv4`]: for every `x`,
/// `parse_ipv4(&format_ipv4(x)) == Some(x)`.
pub fn format_ipv4(address: u32) -> String {
  let octets = address.to_be_bytes();
  format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}

/// Returns bit `index` of `address` in MSB-first order: `index = 0` is the
/// highest bit of the first octet, `index = 31` is the lowest bit of the
/// last octet.
///
/// # Panics
///
/// Panics if `index >= 32`.
pub fn bit(address: u32, index: u32) -> bool {
  assert!(index < 32, "IPv4 bit index out of range: {index}");
  (address >> (31 - index)) & 1 == 1
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use proptest::prelude::*;
  use test_log::test;

  use super::*;

  #[test]
  fn parses_loopback() {
    assert_eq!(parse_ipv4("127.0.0.1"), Some(0x7f00_0001));
  }

  #[test]
  fn parses_broadcast() {
    assert_eq!(parse_ipv4("255.255.255.255"), Some(u32::MAX));
  }

  #[test]
  fn parses_all_zero() {
    assert_eq!(parse_ipv4("0.0.0.0"), Some(0));
  }

  #[test]
  fn rejects_out_of_range_octet() {
    assert_eq!(parse_ipv4("256.0.0.0"), None);
  }

  #[test]
  fn rejects_leading_zero() {
    assert_eq!(parse_ipv4("012.0.0.1"), None);
  }

  #[test]
  fn rejects_too_few_components() {
    assert_eq!(parse_ipv4("1.2.3"), None);
  }

  #[test]
  fn rejects_too_many_components() {
    assert_eq!(parse_ipv4("1.2.3.4.5"), None);
  }

  #[test]
  fn rejects_trailing_garbage() {
    assert_eq!(parse_ipv4("1.2.3.4x"), None);
  }

  #[test]
  fn rejects_non_decimal_input() {
    assert_eq!(parse_ipv4("not an ip"), None);
    assert_eq!(parse_ipv4("0x7f.0.0.1"), None);
  }

  #[test]
  fn rejects_empty_string() {
    assert_eq!(parse_ipv4(""), None);
  }

  #[test]
  fn bit_is_msb_first() {
    let addr = 0b1000_0000_0000_0000_0000_0000_0000_0001u32;
    assert!(bit(addr, 0));
    assert!(!bit(addr, 1));
    assert!(bit(addr, 31));
  }

  #[test]
  #[should_panic]
  fn bit_panics_out_of_range() {
    bit(0, 32);
  }

  proptest! {
    #[test]
    fn round_trips_format_then_parse(x in any::<u32>()) {
      prop_assert_eq!(parse_ipv4(&format_ipv4(x)), Some(x));
    }

    #[test]
    fn rejects_out_of_range_octets_systematically(a in 256u32..1000, b in 0u8.., c in 0u8.., d in 0u8..) {
      let s = format!("{a}.{b}.{c}.{d}");
      prop_assert_eq!(parse_ipv4(&s), None);
    }
  }
}
