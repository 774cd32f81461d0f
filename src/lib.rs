//! A read-only ISO 9660 library: ECMA-119 plus the Joliet, Rock Ridge, and
//! El Torito overlays.
//!
//! [`Image::open`] is the entry point — it scans the Volume Descriptor Set,
//! walks the directory tree (optionally through the Joliet hierarchy and
//! Rock Ridge attributes), and exposes any El Torito boot catalog as virtual
//! entries. Everything else in this crate is the plumbing that makes that
//! one call possible: [`primitives`] for the wire-level codecs,
//! [`descriptor`] for Volume Descriptors, [`directory_record`] for the
//! directory tree's node format, [`path_table`], [`rockridge`], and
//! [`eltorito`] for their respective overlays, and [`walker`]/[`read`] for
//! traversal and sector I/O.

mod descriptor;
mod directory_record;
mod eltorito;
mod error;
mod image;
mod layout;
mod parse;
mod path_table;
mod primitives;
mod read;
mod rockridge;
mod walker;

pub use descriptor::{
  BootRecordVolumeDescriptor, PrimaryVolumeDescriptor, SupplementaryVolumeDescriptor, VolumeDescriptor,
  VolumePartitionDescriptor,
};
pub use directory_record::{DirectoryRecord, FileFlags, FileIdentifier};
pub use eltorito::{ElToritoCatalog, ElToritoEntry, Emulation, Platform, ValidationEntry};
pub use error::Error;
pub use image::{Image, OpenOptions};
pub use layout::{ImageLayout, LayoutEntry, LayoutKind};
pub use path_table::{Endianness, PathTableRecord};
pub use primitives::{CharacterClass, IsoDateTime};
pub use read::{IsoRead, SECTOR_SIZE};
pub use rockridge::{FileType, PosixAttributes, RockRidgeAttributes, Timestamps};
pub use walker::{FilesystemEntry, WalkOptions};

/// Result type for operations that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ISO 9660 standard constants shared across modules.
pub mod constants {
  /// Standard identifier found at offset 1 of every Volume Descriptor.
  pub const ISO_STANDARD_ID: &[u8; 5] = b"CD001";

  /// Volume Descriptor type byte values (ECMA-119 §8.1.1).
  pub mod volume_type {
    pub const BOOT_RECORD: u8 = 0;
    pub const PRIMARY_VOLUME_DESCRIPTOR: u8 = 1;
    pub const SUPPLEMENTARY_VOLUME_DESCRIPTOR: u8 = 2;
    pub const VOLUME_PARTITION_DESCRIPTOR: u8 = 3;
    pub const VOLUME_DESCRIPTOR_SET_TERMINATOR: u8 = 255;
  }

  /// Sector size in bytes; the only block size this crate supports.
  pub const SECTOR_SIZE: usize = 2048;

  /// Sector number at which the Volume Descriptor Set begins.
  pub const VOLUME_DESCRIPTOR_SET_START_SECTOR: u64 = 16;
}
