//! The variable-length Directory Record: the codec for a single record and
//! the `FileFlags` bitset carried in byte 25.

use crate::error::{Error, Result};
use crate::primitives::{
  decode_binary_datetime, decode_dual_u16, decode_dual_u32, decode_ucs2_be, encode_binary_datetime,
  encode_dual_u16, encode_dual_u32, encode_ucs2_be, IsoDateTime,
};

bitflags::bitflags! {
  /// File Flags, byte 25 of a Directory Record. Bits 5 and 6 are reserved
  /// and MUST be zero; a record with either set fails to decode.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct FileFlags: u8 {
    const HIDDEN = 1 << 0;
    const DIRECTORY = 1 << 1;
    const ASSOCIATED_FILE = 1 << 2;
    const RECORD_FORMAT = 1 << 3;
    const PROTECTION = 1 << 4;
    const MULTI_EXTENT = 1 << 7;
  }
}

const RESERVED_FLAG_BITS: u8 = 0b0110_0000;

/// A Directory Record's file identifier: either one of the two special
/// single-byte markers, or a name whose bytes are interpreted per the
/// owning hierarchy (d-characters for Primary, UCS-2 BE for Joliet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileIdentifier {
  /// Identifier byte 0x00: "." (self).
  CurrentDirectory,
  /// Identifier byte 0x01: ".." (parent).
  ParentDirectory,
  /// Raw identifier bytes, not yet decoded into a name.
  Name(Vec<u8>),
}

impl FileIdentifier {
  /// Decode into a displayable name. `joliet` selects UCS-2 BE decoding for
  /// `Name` variants; the two special markers are hierarchy-independent.
  pub fn decode(&self, joliet: bool) -> String {
    match self {
      FileIdentifier::CurrentDirectory => ".".to_string(),
      FileIdentifier::ParentDirectory => "..".to_string(),
      FileIdentifier::Name(bytes) => {
        if joliet {
          decode_ucs2_be(bytes)
        } else {
          String::from_utf8_lossy(bytes).into_owned()
        }
      }
    }
  }

  fn raw_bytes(&self) -> Vec<u8> {
    match self {
      FileIdentifier::CurrentDirectory => vec![0u8],
      FileIdentifier::ParentDirectory => vec![1u8],
      FileIdentifier::Name(bytes) => bytes.clone(),
    }
  }

  /// Build a `Name` identifier from a decoded string, encoding it per
  /// `joliet`. Symmetric counterpart to `decode`, kept for round-trip tests
  /// and a prospective writer.
  pub fn encode_name(name: &str, joliet: bool) -> FileIdentifier {
    let bytes = if joliet {
      encode_ucs2_be(name)
    } else {
      name.as_bytes().to_vec()
    };
    FileIdentifier::Name(bytes)
  }
}

/// A decoded Directory Record. The System Use tail (bytes past the padded
/// file identifier) is copied out of the sector buffer, never aliased, so
/// Rock Ridge parsing can outlive the buffer that produced it.
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
  pub extended_attribute_length: u8,
  pub extent_location: u32,
  pub data_length: u32,
  pub recording_time: Option<IsoDateTime>,
  pub file_flags: FileFlags,
  pub file_unit_size: u8,
  pub interleave_gap_size: u8,
  pub volume_sequence_number: u16,
  pub identifier: FileIdentifier,
  pub system_use: Vec<u8>,
}

impl DirectoryRecord {
  pub fn is_directory(&self) -> bool {
    self.file_flags.contains(FileFlags::DIRECTORY)
  }

  /// Length this record would occupy on disc once encoded, including the
  /// identifier padding byte.
  pub fn encoded_len(&self) -> usize {
    let id_len = self.identifier.raw_bytes().len();
    let pad = if id_len % 2 == 0 { 1 } else { 0 };
    33 + id_len + pad + self.system_use.len()
  }

  /// Encode this record back to its on-disc byte form. `length` is
  /// recomputed from the current field contents rather than stored.
  pub fn encode(&self) -> Result<Vec<u8>> {
    let id_bytes = self.identifier.raw_bytes();
    let id_len = id_bytes.len();
    let pad = if id_len % 2 == 0 { 1 } else { 0 };
    let total_len = 33 + id_len + pad + self.system_use.len();
    if total_len > u8::MAX as usize {
      return Err(Error::FormatStructure(format!(
        "directory record would be {} bytes, exceeding the 255-byte limit",
        total_len
      )));
    }

    let mut out = vec![0u8; total_len];
    out[0] = total_len as u8;
    out[1] = self.extended_attribute_length;
    out[2..10].copy_from_slice(&encode_dual_u32(self.extent_location));
    out[10..18].copy_from_slice(&encode_dual_u32(self.data_length));
    out[18..25].copy_from_slice(&encode_binary_datetime(self.recording_time.as_ref())?);
    out[25] = self.file_flags.bits();
    out[26] = self.file_unit_size;
    out[27] = self.interleave_gap_size;
    out[28..32].copy_from_slice(&encode_dual_u16(self.volume_sequence_number));
    out[32] = id_len as u8;
    out[33..33 + id_len].copy_from_slice(&id_bytes);
    let system_use_start = 33 + id_len + pad;
    out[system_use_start..].copy_from_slice(&self.system_use);
    Ok(out)
  }
}

/// Decode a single Directory Record from the front of `buf`. `buf[0]` is
/// trusted to be the record length and nonzero; callers (the directory
/// walker) are responsible for recognizing a zero length byte as
/// end-of-sector padding before calling this.
pub fn decode_directory_record(buf: &[u8]) -> Result<DirectoryRecord> {
  if buf.is_empty() {
    return Err(Error::UnexpectedEof { needed: 1, got: 0 });
  }
  let length = buf[0] as usize;
  if length == 0 {
    return Err(Error::FormatStructure("directory record length is zero".into()));
  }
  if length > buf.len() {
    return Err(Error::FormatStructure(format!(
      "directory record declares length {} but only {} bytes remain",
      length,
      buf.len()
    )));
  }
  let record = &buf[0..length];
  if record.len() < 33 {
    return Err(Error::FormatStructure(format!(
      "directory record length {} is shorter than the 33-byte minimum",
      length
    )));
  }

  let extended_attribute_length = record[1];
  let extent_location = decode_dual_u32(&record[2..10])?;
  let data_length = decode_dual_u32(&record[10..18])?;
  let recording_time = decode_binary_datetime(&record[18..25])?;

  let flags_byte = record[25];
  if flags_byte & RESERVED_FLAG_BITS != 0 {
    return Err(Error::InvalidFileFlags(flags_byte));
  }
  let file_flags = FileFlags::from_bits_truncate(flags_byte);

  let file_unit_size = record[26];
  let interleave_gap_size = record[27];
  let volume_sequence_number = decode_dual_u16(&record[28..32])?;

  let identifier_length = record[32] as usize;
  if 33 + identifier_length > record.len() {
    return Err(Error::FormatStructure(format!(
      "file identifier length {} overruns directory record of length {}",
      identifier_length, length
    )));
  }
  let id_bytes = &record[33..33 + identifier_length];
  let identifier = match (identifier_length, id_bytes.first()) {
    (1, Some(0)) => FileIdentifier::CurrentDirectory,
    (1, Some(1)) => FileIdentifier::ParentDirectory,
    _ => FileIdentifier::Name(id_bytes.to_vec()),
  };

  let pad = if identifier_length % 2 == 0 { 1 } else { 0 };
  let system_use_start = 33 + identifier_length + pad;
  let system_use = if system_use_start < record.len() {
    record[system_use_start..].to_vec()
  } else {
    Vec::new()
  };

  Ok(DirectoryRecord {
    extended_attribute_length,
    extent_location,
    data_length,
    recording_time,
    file_flags,
    file_unit_size,
    interleave_gap_size,
    volume_sequence_number,
    identifier,
    system_use,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_root_record() -> DirectoryRecord {
    DirectoryRecord {
      extended_attribute_length: 0,
      extent_location: 23,
      data_length: 2048,
      recording_time: Some(IsoDateTime {
        year: 2024,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
        centisecond: 0,
        gmt_offset: 0,
      }),
      file_flags: FileFlags::DIRECTORY,
      file_unit_size: 0,
      interleave_gap_size: 0,
      volume_sequence_number: 1,
      identifier: FileIdentifier::CurrentDirectory,
      system_use: Vec::new(),
    }
  }

  #[test]
  fn root_record_round_trips_as_34_bytes() {
    let record = sample_root_record();
    let encoded = record.encode().unwrap();
    assert_eq!(encoded.len(), 34);

    let decoded = decode_directory_record(&encoded).unwrap();
    let re_encoded = decoded.encode().unwrap();
    assert_eq!(encoded, re_encoded);
  }

  #[test]
  fn reserved_flag_bits_fail_to_decode() {
    let mut record = sample_root_record();
    record.file_flags = FileFlags::empty();
    let mut encoded = record.encode().unwrap();
    encoded[25] = 0x60;
    assert!(matches!(
      decode_directory_record(&encoded),
      Err(Error::InvalidFileFlags(0x60))
    ));
  }

  #[test]
  fn directory_flag_bit_is_the_only_flag_set() {
    let mut record = sample_root_record();
    record.file_flags = FileFlags::DIRECTORY;
    let encoded = record.encode().unwrap();
    assert_eq!(encoded[25], 0x02);

    let decoded = decode_directory_record(&encoded).unwrap();
    assert!(decoded.is_directory());
    assert_eq!(decoded.file_flags.bits(), 0x02);
  }

  #[test]
  fn long_filename_round_trips_with_version_suffix() {
    let mut record = sample_root_record();
    record.file_flags = FileFlags::empty();
    record.identifier = FileIdentifier::Name(b"README.TXT;1".to_vec());
    let encoded = record.encode().unwrap();
    let decoded = decode_directory_record(&encoded).unwrap();
    assert_eq!(decoded.identifier.decode(false), "README.TXT;1");
  }

  #[test]
  fn joliet_identifier_decodes_as_ucs2() {
    let mut record = sample_root_record();
    record.file_flags = FileFlags::empty();
    record.identifier = FileIdentifier::encode_name("Ubuntu 24.04", true);
    let encoded = record.encode().unwrap();
    let decoded = decode_directory_record(&encoded).unwrap();
    assert_eq!(decoded.identifier.decode(true), "Ubuntu 24.04");
  }

  #[test]
  fn system_use_tail_is_preserved_and_owned() {
    let mut record = sample_root_record();
    record.system_use = vec![b'P', b'X', 0x24, 0x01, 0xAA];
    let encoded = record.encode().unwrap();
    let decoded = decode_directory_record(&encoded).unwrap();
    assert_eq!(decoded.system_use, vec![b'P', b'X', 0x24, 0x01, 0xAA]);
  }

  #[test]
  fn zero_length_record_is_rejected() {
    let buf = [0u8; 8];
    assert!(matches!(
      decode_directory_record(&buf),
      Err(Error::FormatStructure(_))
    ));
  }
}
