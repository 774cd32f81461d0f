//! Error types for the ISO 9660 decoder.

use thiserror::Error;

/// Errors produced while decoding an ISO 9660 image or one of its overlays.
#[derive(Debug, Error)]
pub enum Error {
  /// The underlying reader failed.
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  /// Sector 16 did not carry a recognized standard identifier.
  #[error("unsupported format: expected \"CD001\" at sector 16, found {found:?}")]
  UnsupportedFormat { found: [u8; 5] },

  /// The volume declares a logical block size other than 2048.
  #[error("unsupported logical block size: {0} (only 2048 is supported)")]
  UnsupportedBlockSize(u16),

  /// A descriptor sector's standard identifier was not "CD001" mid-scan.
  #[error("invalid standard identifier at sector {sector}: {found:?}")]
  InvalidSignature { sector: u64, found: [u8; 5] },

  /// A directory record's reserved file-flag bits (5 or 6) were set.
  #[error("invalid file flags 0x{0:02x}: reserved bits 5/6 are set")]
  InvalidFileFlags(u8),

  /// A dual little/big-endian field's two halves disagreed.
  #[error("mismatched dual-endian field: little-endian half {le} != big-endian half {be}")]
  MismatchedDualEndian { le: u32, be: u32 },

  /// A binary date/time year fell outside 1900..=2155.
  #[error("year {0} is out of the representable range 1900..=2155")]
  YearOutOfRange(i32),

  /// A GMT offset fell outside [-48, 52] (15-minute units).
  #[error("gmt offset {0} is out of range [-48, 52]")]
  OffsetOutOfRange(i8),

  /// An ASCII date/time field contained non-digit bytes where digits were required.
  #[error("malformed ascii date/time field: {0}")]
  DateTimeParseError(String),

  /// A path table record's declared length would read past the table's end.
  #[error("path table overflow: record at offset {offset} extends past declared size {size}")]
  PathTableOverflow { offset: usize, size: usize },

  /// A length-prefixed field (directory record, SUSP entry, catalog slot) would
  /// read past the end of its containing buffer.
  #[error("structure error: {0}")]
  FormatStructure(String),

  /// The El Torito boot catalog's validation entry checksum did not sum to zero.
  #[error("el torito validation entry checksum invalid")]
  ChecksumInvalid,

  /// A read returned fewer bytes than required.
  #[error("unexpected end of file: needed {needed} bytes, got {got}")]
  UnexpectedEof { needed: usize, got: usize },

  /// A valid but unsupported encoding was encountered.
  #[error("unsupported: {0}")]
  Unsupported(String),

  /// A caller-supplied path did not resolve to an entry in the image.
  #[error("path not found: {0}")]
  PathNotFound(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
