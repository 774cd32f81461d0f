//! Fixed-width codecs shared by every descriptor and record: dual little/big
//! endian integers, the two ISO 9660 date/time shapes, UCS-2 transcoding for
//! Joliet, and the character-class validators for d-/a-/c-characters.

use crate::error::{Error, Result};

/// Encode a `u16` as the 4-byte "both byte orders" field used throughout
/// ISO 9660 (little-endian half, then big-endian half).
pub fn encode_dual_u16(value: u16) -> [u8; 4] {
  let mut out = [0u8; 4];
  out[0..2].copy_from_slice(&value.to_le_bytes());
  out[2..4].copy_from_slice(&value.to_be_bytes());
  out
}

/// Decode a 4-byte dual-endian `u16` field, verifying both halves agree.
pub fn decode_dual_u16(buf: &[u8]) -> Result<u16> {
  if buf.len() < 4 {
    return Err(Error::UnexpectedEof { needed: 4, got: buf.len() });
  }
  let le = u16::from_le_bytes([buf[0], buf[1]]);
  let be = u16::from_be_bytes([buf[2], buf[3]]);
  if le != be {
    return Err(Error::MismatchedDualEndian { le: le as u32, be: be as u32 });
  }
  Ok(le)
}

/// Encode a `u32` as the 8-byte "both byte orders" field.
pub fn encode_dual_u32(value: u32) -> [u8; 8] {
  let mut out = [0u8; 8];
  out[0..4].copy_from_slice(&value.to_le_bytes());
  out[4..8].copy_from_slice(&value.to_be_bytes());
  out
}

/// Decode an 8-byte dual-endian `u32` field, verifying both halves agree.
pub fn decode_dual_u32(buf: &[u8]) -> Result<u32> {
  if buf.len() < 8 {
    return Err(Error::UnexpectedEof { needed: 8, got: buf.len() });
  }
  let le = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
  let be = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
  if le != be {
    return Err(Error::MismatchedDualEndian { le, be });
  }
  Ok(le)
}

/// A date/time as recorded on an ISO 9660 volume. Shared by both the 17-byte
/// ASCII form (volume descriptor dates) and the 7-byte binary form (directory
/// record recording times, Rock Ridge TF timestamps).
///
/// `centisecond` is always zero for values that came from (or will be
/// written as) a `BinaryDateTime`; only `AsciiDateTime` carries sub-second
/// precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsoDateTime {
  pub year: i32,
  pub month: u8,
  pub day: u8,
  pub hour: u8,
  pub minute: u8,
  pub second: u8,
  pub centisecond: u8,
  /// Offset from GMT in 15-minute intervals, range [-48, 52].
  pub gmt_offset: i8,
}

impl IsoDateTime {
  /// Nanosecond component implied by `centisecond` (1 cs = 10,000,000 ns).
  pub fn nanosecond(&self) -> u32 {
    self.centisecond as u32 * 10_000_000
  }

  /// Validate that the calendar fields actually form a real date, using
  /// `chrono` for the leap-year/days-in-month arithmetic.
  fn validate_calendar(&self) -> Result<()> {
    chrono::NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
      .and_then(|d| d.and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32))
      .ok_or_else(|| {
        Error::DateTimeParseError(format!(
          "{:04}-{:02}-{:02} {:02}:{:02}:{:02} is not a valid calendar date/time",
          self.year, self.month, self.day, self.hour, self.minute, self.second
        ))
      })?;
    Ok(())
  }

  /// Convert to a `chrono::NaiveDateTime`, discarding the GMT offset (ISO
  /// 9660 dates are local-time-plus-offset, not normalized to UTC).
  pub fn to_naive(&self) -> Result<chrono::NaiveDateTime> {
    chrono::NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
      .and_then(|d| {
        d.and_hms_nano_opt(
          self.hour as u32,
          self.minute as u32,
          self.second as u32,
          self.nanosecond(),
        )
      })
      .ok_or_else(|| {
        Error::DateTimeParseError(format!(
          "{:04}-{:02}-{:02} {:02}:{:02}:{:02} is not a valid calendar date/time",
          self.year, self.month, self.day, self.hour, self.minute, self.second
        ))
      })
  }
}

const ASCII_SENTINEL: &[u8; 16] = b"0000000000000000";

/// Encode a date/time as the 17-byte ASCII form. `None` encodes the
/// "unspecified" sentinel (sixteen ASCII '0's followed by a zero offset).
pub fn encode_ascii_datetime(dt: Option<&IsoDateTime>) -> Result<[u8; 17]> {
  let mut out = [0u8; 17];
  match dt {
    None => {
      out[0..16].copy_from_slice(ASCII_SENTINEL);
      out[16] = 0;
    }
    Some(dt) => {
      if !(-48..=52).contains(&dt.gmt_offset) {
        return Err(Error::OffsetOutOfRange(dt.gmt_offset));
      }
      dt.validate_calendar()?;
      let text = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}{:02}",
        dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second, dt.centisecond
      );
      out[0..16].copy_from_slice(text.as_bytes());
      out[16] = dt.gmt_offset as u8;
    }
  }
  Ok(out)
}

/// Decode the 17-byte ASCII date/time form. Returns `None` for the
/// "unspecified" sentinel.
pub fn decode_ascii_datetime(buf: &[u8]) -> Result<Option<IsoDateTime>> {
  if buf.len() < 17 {
    return Err(Error::UnexpectedEof { needed: 17, got: buf.len() });
  }
  let digits = &buf[0..16];
  let offset = buf[16] as i8;

  if digits == ASCII_SENTINEL.as_slice() && offset == 0 {
    return Ok(None);
  }

  if !(-48..=52).contains(&offset) {
    return Err(Error::OffsetOutOfRange(offset));
  }

  if !digits.iter().all(u8::is_ascii_digit) {
    return Err(Error::DateTimeParseError(
      "ascii date/time field contains non-digit bytes".into(),
    ));
  }

  let text = std::str::from_utf8(digits)
    .map_err(|_| Error::DateTimeParseError("ascii date/time field is not valid utf-8".into()))?;
  let field = |range: std::ops::Range<usize>| -> Result<u32> {
    text[range].parse::<u32>().map_err(|_| {
      Error::DateTimeParseError(format!("could not parse field from {:?}", text))
    })
  };

  let dt = IsoDateTime {
    year: field(0..4)? as i32,
    month: field(4..6)? as u8,
    day: field(6..8)? as u8,
    hour: field(8..10)? as u8,
    minute: field(10..12)? as u8,
    second: field(12..14)? as u8,
    centisecond: field(14..16)? as u8,
    gmt_offset: offset,
  };
  Ok(Some(dt))
}

/// Encode a date/time as the 7-byte binary form used by directory records
/// and Rock Ridge `TF` timestamps. Encoders refuse to produce the all-zero
/// sentinel for a real instant; callers that want "unspecified" pass `None`.
pub fn encode_binary_datetime(dt: Option<&IsoDateTime>) -> Result<[u8; 7]> {
  match dt {
    None => Ok([0u8; 7]),
    Some(dt) => {
      if !(1900..=2155).contains(&dt.year) {
        return Err(Error::YearOutOfRange(dt.year));
      }
      if !(-48..=52).contains(&dt.gmt_offset) {
        return Err(Error::OffsetOutOfRange(dt.gmt_offset));
      }
      dt.validate_calendar()?;
      Ok([
        (dt.year - 1900) as u8,
        dt.month,
        dt.day,
        dt.hour,
        dt.minute,
        dt.second,
        dt.gmt_offset as u8,
      ])
    }
  }
}

/// Decode the 7-byte binary date/time form. All-zero bytes decode to `None`
/// ("unspecified") by convention.
pub fn decode_binary_datetime(buf: &[u8]) -> Result<Option<IsoDateTime>> {
  if buf.len() < 7 {
    return Err(Error::UnexpectedEof { needed: 7, got: buf.len() });
  }
  if buf[0..7] == [0, 0, 0, 0, 0, 0, 0] {
    return Ok(None);
  }
  let offset = buf[6] as i8;
  if !(-48..=52).contains(&offset) {
    return Err(Error::OffsetOutOfRange(offset));
  }
  Ok(Some(IsoDateTime {
    year: 1900 + buf[0] as i32,
    month: buf[1],
    day: buf[2],
    hour: buf[3],
    minute: buf[4],
    second: buf[5],
    centisecond: 0,
    gmt_offset: offset,
  }))
}

/// Encode a string as big-endian UCS-2 (the encoding Joliet uses for every
/// string field and long directory identifiers).
pub fn encode_ucs2_be(s: &str) -> Vec<u8> {
  let mut out = Vec::with_capacity(s.len() * 2);
  for unit in s.encode_utf16() {
    out.extend_from_slice(&unit.to_be_bytes());
  }
  out
}

/// Decode a big-endian UCS-2 byte string. An odd-length input decodes to an
/// empty string, matching the Joliet decoder's defined behavior for
/// malformed length-1 identifiers.
pub fn decode_ucs2_be(buf: &[u8]) -> String {
  if buf.len() % 2 != 0 {
    return String::new();
  }
  let units: Vec<u16> = buf
    .chunks_exact(2)
    .map(|c| u16::from_be_bytes([c[0], c[1]]))
    .collect();
  String::from_utf16_lossy(&units)
}

/// Character classes used to validate identifier fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
  /// `d-characters`: `[0-9A-Z_]`.
  D,
  /// `a-characters`: `[ !"%&'()*+,\-./0-9:;<=>?A-Z_]`.
  A,
  /// `d1-characters`: locale-defined subset; the covered profile treats this
  /// identically to `d-characters`.
  D1,
  /// `a1-characters`: locale-defined subset; the covered profile treats this
  /// identically to `a-characters`.
  A1,
  /// `c-characters`: anything except ASCII control codes and
  /// `{'*','/',':',';','?','\\'}`.
  C,
}

fn is_d_character(c: char) -> bool {
  c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

fn is_a_character(c: char) -> bool {
  matches!(c,
    ' ' | '!' | '"' | '%' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | '-' | '.' | '/'
      | ':' | ';' | '<' | '=' | '>' | '?'
  ) || c.is_ascii_uppercase()
    || c.is_ascii_digit()
    || c == '_'
}

fn is_c_character(c: char) -> bool {
  if (c as u32) <= 0x1F {
    return false;
  }
  !matches!(c, '*' | '/' | ':' | ';' | '?' | '\\')
}

/// Validate that every character of `s` belongs to `class`, optionally also
/// permitting SEPARATOR 1 (`.`) and SEPARATOR 2 (`;`). Rejects any code
/// point above U+FFFF regardless of class.
pub fn validate_characters(s: &str, class: CharacterClass, allow_separators: bool) -> Result<()> {
  for c in s.chars() {
    if (c as u32) > 0xFFFF {
      return Err(Error::Unsupported(format!(
        "code point U+{:04X} exceeds the representable U+FFFF limit",
        c as u32
      )));
    }
    let in_class = match class {
      CharacterClass::D | CharacterClass::D1 => is_d_character(c),
      CharacterClass::A | CharacterClass::A1 => is_a_character(c),
      CharacterClass::C => is_c_character(c),
    };
    let in_separators = allow_separators && (c == '.' || c == ';');
    if !in_class && !in_separators {
      return Err(Error::Unsupported(format!(
        "character '{}' is not valid for {:?} (separators allowed: {})",
        c, class, allow_separators
      )));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dual_u16_round_trips() {
    for v in [0u16, 1, 255, 256, 65535, 12345] {
      let encoded = encode_dual_u16(v);
      assert_eq!(decode_dual_u16(&encoded).unwrap(), v);
    }
  }

  #[test]
  fn dual_u16_mismatch_is_an_error() {
    let mut encoded = encode_dual_u16(42);
    encoded[2] ^= 0xFF;
    assert!(matches!(
      decode_dual_u16(&encoded),
      Err(Error::MismatchedDualEndian { .. })
    ));
  }

  #[test]
  fn dual_u32_round_trips() {
    for v in [0u32, 1, 2048, 0xDEAD_BEEF, u32::MAX] {
      let encoded = encode_dual_u32(v);
      assert_eq!(decode_dual_u32(&encoded).unwrap(), v);
    }
  }

  #[test]
  fn dual_u32_mismatch_is_an_error() {
    let mut encoded = encode_dual_u32(7);
    encoded[5] ^= 0xFF;
    assert!(matches!(
      decode_dual_u32(&encoded),
      Err(Error::MismatchedDualEndian { .. })
    ));
  }

  #[test]
  fn ascii_datetime_round_trips_a_real_instant() {
    let dt = IsoDateTime {
      year: 2024,
      month: 3,
      day: 14,
      hour: 9,
      minute: 26,
      second: 53,
      centisecond: 58,
      gmt_offset: 8,
    };
    let encoded = encode_ascii_datetime(Some(&dt)).unwrap();
    let decoded = decode_ascii_datetime(&encoded).unwrap().unwrap();
    assert_eq!(decoded, dt);
  }

  #[test]
  fn ascii_datetime_sentinel_round_trips_to_none() {
    let encoded = encode_ascii_datetime(None).unwrap();
    assert_eq!(&encoded[0..16], ASCII_SENTINEL);
    assert_eq!(encoded[16], 0);
    assert_eq!(decode_ascii_datetime(&encoded).unwrap(), None);
  }

  #[test]
  fn ascii_datetime_rejects_offset_out_of_range() {
    let dt = IsoDateTime {
      year: 2000,
      month: 1,
      day: 1,
      hour: 0,
      minute: 0,
      second: 0,
      centisecond: 0,
      gmt_offset: 53,
    };
    assert!(matches!(
      encode_ascii_datetime(Some(&dt)),
      Err(Error::OffsetOutOfRange(53))
    ));
  }

  #[test]
  fn binary_datetime_round_trips() {
    let dt = IsoDateTime {
      year: 2001,
      month: 9,
      day: 11,
      hour: 8,
      minute: 46,
      second: 30,
      centisecond: 0,
      gmt_offset: -20,
    };
    let encoded = encode_binary_datetime(Some(&dt)).unwrap();
    let decoded = decode_binary_datetime(&encoded).unwrap().unwrap();
    assert_eq!(decoded, dt);
  }

  #[test]
  fn binary_datetime_all_zero_decodes_to_none() {
    assert_eq!(decode_binary_datetime(&[0u8; 7]).unwrap(), None);
  }

  #[test]
  fn binary_datetime_rejects_year_out_of_range() {
    let dt = IsoDateTime {
      year: 2200,
      month: 1,
      day: 1,
      hour: 0,
      minute: 0,
      second: 0,
      centisecond: 0,
      gmt_offset: 0,
    };
    assert!(matches!(
      encode_binary_datetime(Some(&dt)),
      Err(Error::YearOutOfRange(2200))
    ));
  }

  #[test]
  fn ucs2_round_trips() {
    let s = "Ubuntu 24.04";
    let encoded = encode_ucs2_be(s);
    assert_eq!(decode_ucs2_be(&encoded), s);
  }

  #[test]
  fn ucs2_round_trips_astral_plane() {
    let s = "𝄞 clef";
    let encoded = encode_ucs2_be(s);
    assert_eq!(decode_ucs2_be(&encoded), s);
  }

  #[test]
  fn ucs2_odd_length_decodes_to_empty() {
    assert_eq!(decode_ucs2_be(&[0x00]), "");
  }

  #[test]
  fn character_class_accepts_d_characters() {
    assert!(validate_characters("VOL_ID", CharacterClass::D, false).is_ok());
  }

  #[test]
  fn character_class_rejects_lowercase_for_d() {
    assert!(validate_characters("vol_id", CharacterClass::D, false).is_err());
  }

  #[test]
  fn character_class_separators_are_opt_in() {
    assert!(validate_characters("README.TXT;1", CharacterClass::D, false).is_err());
    assert!(validate_characters("README.TXT;1", CharacterClass::D, true).is_ok());
  }

  #[test]
  fn character_class_rejects_above_bmp() {
    assert!(validate_characters("𝄞", CharacterClass::C, false).is_err());
  }
}
