//! Volume Descriptors: the fixed-layout 2048-byte records that populate the
//! Volume Descriptor Set starting at sector 16.

use crate::error::{Error, Result};
use crate::parse::take_string_n;
use crate::primitives::{
  decode_ascii_datetime, decode_dual_u16, decode_dual_u32, encode_ascii_datetime, encode_dual_u16, encode_dual_u32,
  IsoDateTime,
};

pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

const TYPE_BOOT_RECORD: u8 = 0;
const TYPE_PRIMARY: u8 = 1;
const TYPE_SUPPLEMENTARY: u8 = 2;
const TYPE_PARTITION: u8 = 3;
const TYPE_SET_TERMINATOR: u8 = 255;

/// The Joliet escape sequences that select UCS-2 level 1, 2, or 3 in a
/// Supplementary Volume Descriptor's `escape_sequences` field.
const JOLIET_ESCAPE_SEQUENCES: [&[u8]; 3] = [b"%/@", b"%/C", b"%/E"];

fn take_string(buf: &[u8]) -> String {
  take_string_n(buf, buf.len())
    .map(|(_, s)| s.to_string())
    .unwrap_or_else(|_| String::from_utf8_lossy(buf).trim_end().to_string())
}

/// Re-pad a decoded string field back to its declared on-disc width with
/// ASCII spaces, the inverse of `take_string`. Truncates rather than errors
/// if `s` is somehow longer than `width`, since encode is infallible
/// elsewhere in this module.
fn pad_field(s: &str, width: usize) -> Vec<u8> {
  let bytes = s.as_bytes();
  let n = bytes.len().min(width);
  let mut out = vec![0x20u8; width];
  out[..n].copy_from_slice(&bytes[..n]);
  out
}

fn check_header(record: &[u8], sector: u64) -> Result<u8> {
  if record.len() < 7 {
    return Err(Error::UnexpectedEof { needed: 7, got: record.len() });
  }
  let descriptor_type = record[0];
  let identifier = &record[1..6];
  if identifier != STANDARD_IDENTIFIER.as_slice() {
    let mut found = [0u8; 5];
    found.copy_from_slice(identifier);
    return Err(Error::InvalidSignature { sector, found });
  }
  Ok(descriptor_type)
}

/// A Primary Volume Descriptor (type 1): the mandatory root hierarchy.
#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptor {
  pub system_identifier: String,
  pub volume_identifier: String,
  pub volume_space_size: u32,
  pub volume_set_size: u16,
  pub volume_sequence_number: u16,
  pub logical_block_size: u16,
  pub path_table_size: u32,
  pub type_l_path_table_location: u32,
  pub type_m_path_table_location: u32,
  pub root_directory_record: Vec<u8>,
  pub volume_set_identifier: String,
  pub publisher_identifier: String,
  pub data_preparer_identifier: String,
  pub application_identifier: String,
  pub copyright_file_identifier: String,
  pub abstract_file_identifier: String,
  pub bibliographic_file_identifier: String,
  pub creation_date: Option<IsoDateTime>,
  pub modification_date: Option<IsoDateTime>,
  pub expiration_date: Option<IsoDateTime>,
  pub effective_date: Option<IsoDateTime>,
}

fn decode_primary_like(record: &[u8]) -> Result<PrimaryVolumeDescriptor> {
  if record.len() < 2048 {
    return Err(Error::UnexpectedEof { needed: 2048, got: record.len() });
  }
  let logical_block_size = decode_dual_u16(&record[128..132])?;
  let path_table_size = decode_dual_u32(&record[132..140])?;
  let type_l_path_table_location = u32::from_le_bytes(record[140..144].try_into().unwrap());
  let type_m_path_table_location = u32::from_be_bytes(record[148..152].try_into().unwrap());

  Ok(PrimaryVolumeDescriptor {
    system_identifier: take_string(&record[8..40]),
    volume_identifier: take_string(&record[40..72]),
    volume_space_size: decode_dual_u32(&record[80..88])?,
    volume_set_size: decode_dual_u16(&record[120..124])?,
    volume_sequence_number: decode_dual_u16(&record[124..128])?,
    logical_block_size,
    path_table_size,
    type_l_path_table_location,
    type_m_path_table_location,
    root_directory_record: record[156..190].to_vec(),
    volume_set_identifier: take_string(&record[190..318]),
    publisher_identifier: take_string(&record[318..446]),
    data_preparer_identifier: take_string(&record[446..574]),
    application_identifier: take_string(&record[574..702]),
    copyright_file_identifier: take_string(&record[702..740]),
    abstract_file_identifier: take_string(&record[740..776]),
    bibliographic_file_identifier: take_string(&record[776..813]),
    creation_date: decode_ascii_datetime(&record[813..830])?,
    modification_date: decode_ascii_datetime(&record[830..847])?,
    expiration_date: decode_ascii_datetime(&record[847..864])?,
    effective_date: decode_ascii_datetime(&record[864..881])?,
  })
}

/// Re-encode a `PrimaryVolumeDescriptor`-shaped body as a full 2048-byte
/// sector. `type_byte`/`volume_flags`/`escape_sequences` let the
/// Supplementary variant reuse this for its identical tail layout. Fields
/// this crate never decodes (the two optional path table location slots,
/// the application-use area, the reserved tail) re-encode as zero, matching
/// how a conforming image writer leaves them.
fn encode_primary_like(
  type_byte: u8,
  volume_flags: u8,
  escape_sequences: &[u8; 32],
  pvd: &PrimaryVolumeDescriptor,
) -> Result<Vec<u8>> {
  let mut out = vec![0u8; 2048];
  out[0] = type_byte;
  out[1..6].copy_from_slice(STANDARD_IDENTIFIER);
  out[6] = 1;
  out[7] = volume_flags;
  out[8..40].copy_from_slice(&pad_field(&pvd.system_identifier, 32));
  out[40..72].copy_from_slice(&pad_field(&pvd.volume_identifier, 32));
  out[80..88].copy_from_slice(&encode_dual_u32(pvd.volume_space_size));
  out[88..120].copy_from_slice(escape_sequences);
  out[120..124].copy_from_slice(&encode_dual_u16(pvd.volume_set_size));
  out[124..128].copy_from_slice(&encode_dual_u16(pvd.volume_sequence_number));
  out[128..132].copy_from_slice(&encode_dual_u16(pvd.logical_block_size));
  out[132..140].copy_from_slice(&encode_dual_u32(pvd.path_table_size));
  out[140..144].copy_from_slice(&pvd.type_l_path_table_location.to_le_bytes());
  out[148..152].copy_from_slice(&pvd.type_m_path_table_location.to_be_bytes());
  let root_len = pvd.root_directory_record.len().min(34);
  out[156..156 + root_len].copy_from_slice(&pvd.root_directory_record[..root_len]);
  out[190..318].copy_from_slice(&pad_field(&pvd.volume_set_identifier, 128));
  out[318..446].copy_from_slice(&pad_field(&pvd.publisher_identifier, 128));
  out[446..574].copy_from_slice(&pad_field(&pvd.data_preparer_identifier, 128));
  out[574..702].copy_from_slice(&pad_field(&pvd.application_identifier, 128));
  out[702..740].copy_from_slice(&pad_field(&pvd.copyright_file_identifier, 38));
  out[740..776].copy_from_slice(&pad_field(&pvd.abstract_file_identifier, 36));
  out[776..813].copy_from_slice(&pad_field(&pvd.bibliographic_file_identifier, 37));
  out[813..830].copy_from_slice(&encode_ascii_datetime(pvd.creation_date.as_ref())?);
  out[830..847].copy_from_slice(&encode_ascii_datetime(pvd.modification_date.as_ref())?);
  out[847..864].copy_from_slice(&encode_ascii_datetime(pvd.expiration_date.as_ref())?);
  out[864..881].copy_from_slice(&encode_ascii_datetime(pvd.effective_date.as_ref())?);
  out[881] = 1;
  Ok(out)
}

impl PrimaryVolumeDescriptor {
  /// Re-encode this descriptor as the full 2048-byte sector `decode_primary_like`
  /// would accept back. String fields re-pad to their declared width with
  /// ASCII spaces, so a decoded-then-encoded body matches the original bytes
  /// wherever this crate retains every decoded field.
  pub fn encode(&self) -> Result<Vec<u8>> {
    encode_primary_like(TYPE_PRIMARY, 0, &[0u8; 32], self)
  }
}

/// A Supplementary Volume Descriptor (type 2). Joliet volumes are expressed
/// as one of these carrying a recognized UCS-2 escape sequence; an SVD
/// without one is a non-Joliet supplementary tree and is still decoded, just
/// not treated as Joliet by the façade.
#[derive(Debug, Clone)]
pub struct SupplementaryVolumeDescriptor {
  pub volume_flags: u8,
  pub escape_sequences: [u8; 32],
  pub inner: PrimaryVolumeDescriptor,
}

impl SupplementaryVolumeDescriptor {
  /// Whether `escape_sequences` matches one of the three Joliet UCS-2
  /// levels, making this the Joliet hierarchy.
  pub fn is_joliet(&self) -> bool {
    JOLIET_ESCAPE_SEQUENCES
      .iter()
      .any(|seq| self.escape_sequences.starts_with(seq))
  }

  /// Re-encode this descriptor as the full 2048-byte sector, symmetric with
  /// `PrimaryVolumeDescriptor::encode`.
  pub fn encode(&self) -> Result<Vec<u8>> {
    encode_primary_like(TYPE_SUPPLEMENTARY, self.volume_flags, &self.escape_sequences, &self.inner)
  }
}

fn decode_supplementary(record: &[u8]) -> Result<SupplementaryVolumeDescriptor> {
  if record.len() < 2048 {
    return Err(Error::UnexpectedEof { needed: 2048, got: record.len() });
  }
  let mut escape_sequences = [0u8; 32];
  escape_sequences.copy_from_slice(&record[88..120]);
  Ok(SupplementaryVolumeDescriptor {
    volume_flags: record[7],
    escape_sequences,
    inner: decode_primary_like(record)?,
  })
}

/// A Boot Record Volume Descriptor (type 0). `boot_system_identifier` of
/// `"EL TORITO SPECIFICATION"` (NUL-padded to 32 bytes) identifies this as
/// the El Torito boot catalog pointer.
#[derive(Debug, Clone)]
pub struct BootRecordVolumeDescriptor {
  pub boot_system_identifier: [u8; 32],
  pub boot_identifier: [u8; 32],
  pub boot_catalog_sector: u32,
}

const EL_TORITO_SYSTEM_ID: &[u8] = b"EL TORITO SPECIFICATION";

impl BootRecordVolumeDescriptor {
  pub fn is_el_torito(&self) -> bool {
    self.boot_system_identifier.starts_with(EL_TORITO_SYSTEM_ID)
  }
}

fn decode_boot_record(record: &[u8]) -> Result<BootRecordVolumeDescriptor> {
  if record.len() < 2048 {
    return Err(Error::UnexpectedEof { needed: 2048, got: record.len() });
  }
  let mut boot_system_identifier = [0u8; 32];
  boot_system_identifier.copy_from_slice(&record[7..39]);
  let mut boot_identifier = [0u8; 32];
  boot_identifier.copy_from_slice(&record[39..71]);
  let boot_catalog_sector = u32::from_le_bytes(record[71..75].try_into().unwrap());
  Ok(BootRecordVolumeDescriptor {
    boot_system_identifier,
    boot_identifier,
    boot_catalog_sector,
  })
}

/// Type 3, Volume Partition Descriptor. The layout is defined by ECMA-119
/// but no reader in this crate's scope needs its fields, so it is kept
/// opaque: callers that care can reparse `raw`.
#[derive(Debug, Clone)]
pub struct VolumePartitionDescriptor {
  pub raw: Vec<u8>,
}

/// One decoded entry of the Volume Descriptor Set.
#[derive(Debug, Clone)]
pub enum VolumeDescriptor {
  BootRecord(BootRecordVolumeDescriptor),
  Primary(PrimaryVolumeDescriptor),
  Supplementary(SupplementaryVolumeDescriptor),
  Partition(VolumePartitionDescriptor),
  SetTerminator,
}

/// Scan the Volume Descriptor Set starting at `sectors[0]` (which must be
/// the sector-16 descriptor) until a Set Terminator or the input runs out.
/// `sectors` is a slice of already-read 2048-byte sectors; unrecognized
/// descriptor types are logged and skipped rather than treated as errors,
/// since future ECMA-119 amendments may define new types.
pub fn scan_volume_descriptor_set(sectors: &[[u8; 2048]]) -> Result<Vec<VolumeDescriptor>> {
  let mut out = Vec::new();
  for (i, sector) in sectors.iter().enumerate() {
    let sector_number = 16 + i as u64;
    log::trace!("scanning sector {}", sector_number);
    let descriptor_type = check_header(sector, sector_number)?;
    match descriptor_type {
      TYPE_BOOT_RECORD => {
        log::debug!("sector {}: boot record volume descriptor", sector_number);
        out.push(VolumeDescriptor::BootRecord(decode_boot_record(sector)?));
      }
      TYPE_PRIMARY => {
        log::debug!("sector {}: primary volume descriptor", sector_number);
        out.push(VolumeDescriptor::Primary(decode_primary_like(sector)?));
      }
      TYPE_SUPPLEMENTARY => {
        log::debug!("sector {}: supplementary volume descriptor", sector_number);
        out.push(VolumeDescriptor::Supplementary(decode_supplementary(sector)?));
      }
      TYPE_PARTITION => {
        log::debug!("sector {}: volume partition descriptor", sector_number);
        out.push(VolumeDescriptor::Partition(VolumePartitionDescriptor {
          raw: sector.to_vec(),
        }));
      }
      TYPE_SET_TERMINATOR => {
        log::debug!("sector {}: volume descriptor set terminator", sector_number);
        out.push(VolumeDescriptor::SetTerminator);
        return Ok(out);
      }
      other => {
        log::warn!(
          "sector {}: unrecognized volume descriptor type {}, skipping",
          sector_number,
          other
        );
      }
    }
  }
  log::warn!("volume descriptor set ended without a set terminator");
  Ok(out)
}
