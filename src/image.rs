//! The `Image` façade: the single entry point that ties the scanner, path
//! tables, walker, and El Torito parser together into one read-only view of
//! a disc.

use std::cell::RefCell;
use std::rc::Rc;

use crate::descriptor::{
  scan_volume_descriptor_set, BootRecordVolumeDescriptor, PrimaryVolumeDescriptor,
  SupplementaryVolumeDescriptor, VolumeDescriptor, STANDARD_IDENTIFIER,
};
use crate::directory_record::{decode_directory_record, DirectoryRecord, FileFlags, FileIdentifier};
use crate::eltorito::{parse_catalog, ElToritoCatalog};
use crate::error::{Error, Result};
use crate::layout::{ImageLayout, LayoutEntry, LayoutKind};
use crate::path_table::{decode_path_table, Endianness};
use crate::primitives::IsoDateTime;
use crate::read::IsoRead;
use crate::walker::{walk, FilesystemEntry, WalkOptions};

/// Safety cap on the Volume Descriptor Set scan: a well-formed image always
/// terminates it far sooner, but a corrupt one missing its Set Terminator
/// must not make `open()` read forever.
const MAX_VOLUME_DESCRIPTORS: usize = 512;

/// Configuration accepted by [`Image::open`]. Construct with
/// [`OpenOptions::new`] (or `Default::default`) and chain the builder
/// methods; every field defaults to the behavior a typical caller wants.
#[derive(Debug, Clone)]
pub struct OpenOptions {
  pub parse_on_open: bool,
  pub prefer_joliet: bool,
  pub rock_ridge_enabled: bool,
  pub el_torito_enabled: bool,
  pub strip_version_suffix: bool,
  pub boot_file_synthetic_dir: String,
}

impl Default for OpenOptions {
  fn default() -> Self {
    Self {
      parse_on_open: true,
      prefer_joliet: true,
      rock_ridge_enabled: true,
      el_torito_enabled: true,
      strip_version_suffix: true,
      boot_file_synthetic_dir: "[BOOT]".to_string(),
    }
  }
}

impl OpenOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_parse_on_open(mut self, value: bool) -> Self {
    self.parse_on_open = value;
    self
  }

  pub fn with_prefer_joliet(mut self, value: bool) -> Self {
    self.prefer_joliet = value;
    self
  }

  pub fn with_rock_ridge_enabled(mut self, value: bool) -> Self {
    self.rock_ridge_enabled = value;
    self
  }

  pub fn with_el_torito_enabled(mut self, value: bool) -> Self {
    self.el_torito_enabled = value;
    self
  }

  pub fn with_strip_version_suffix(mut self, value: bool) -> Self {
    self.strip_version_suffix = value;
    self
  }

  pub fn with_boot_file_synthetic_dir(mut self, value: impl Into<String>) -> Self {
    self.boot_file_synthetic_dir = value.into();
    self
  }
}

/// A fully decoded, read-only view of an ISO 9660 image and whichever
/// overlays it carries.
#[derive(Debug)]
pub struct Image<R> {
  options: OpenOptions,
  primary: PrimaryVolumeDescriptor,
  joliet: Option<SupplementaryVolumeDescriptor>,
  boot_record: Option<BootRecordVolumeDescriptor>,
  el_torito: Option<ElToritoCatalog>,
  entries: Vec<FilesystemEntry<R>>,
  layout: ImageLayout,
  root_extent_location: u32,
}

fn empty_primary() -> PrimaryVolumeDescriptor {
  PrimaryVolumeDescriptor {
    system_identifier: String::new(),
    volume_identifier: String::new(),
    volume_space_size: 0,
    volume_set_size: 0,
    volume_sequence_number: 0,
    logical_block_size: 2048,
    path_table_size: 0,
    type_l_path_table_location: 0,
    type_m_path_table_location: 0,
    root_directory_record: Vec::new(),
    volume_set_identifier: String::new(),
    publisher_identifier: String::new(),
    data_preparer_identifier: String::new(),
    application_identifier: String::new(),
    copyright_file_identifier: String::new(),
    abstract_file_identifier: String::new(),
    bibliographic_file_identifier: String::new(),
    creation_date: None,
    modification_date: None,
    expiration_date: None,
    effective_date: None,
  }
}

fn read_volume_descriptor_set<R: IsoRead>(source: &Rc<RefCell<R>>) -> Result<Vec<[u8; 2048]>> {
  let mut sectors = Vec::new();
  let mut sector_num = 16u64;
  loop {
    let mut buf = [0u8; 2048];
    source.borrow_mut().read_sector(sector_num, &mut buf)?;
    let is_terminator = buf[0] == 255;
    sectors.push(buf);
    sector_num += 1;
    if is_terminator || sectors.len() >= MAX_VOLUME_DESCRIPTORS {
      break;
    }
  }
  Ok(sectors)
}

impl<R: IsoRead> Image<R> {
  /// Open an ISO 9660 image from a sector-addressable reader. Checks the
  /// sector-16 signature unconditionally; the rest of the pipeline only
  /// runs when `options.parse_on_open` is set.
  pub fn open(reader: R, options: OpenOptions) -> Result<Self> {
    let source = Rc::new(RefCell::new(reader));

    let mut signature_sector = [0u8; 2048];
    source.borrow_mut().read_sector(16, &mut signature_sector)?;
    if &signature_sector[1..6] != STANDARD_IDENTIFIER.as_slice() {
      let mut found = [0u8; 5];
      found.copy_from_slice(&signature_sector[1..6]);
      return Err(Error::UnsupportedFormat { found });
    }

    let mut layout = ImageLayout::new();
    layout.push(LayoutEntry::new(LayoutKind::SystemArea, "system area", 0, 16 * 2048));

    if !options.parse_on_open {
      return Ok(Self {
        options,
        primary: empty_primary(),
        joliet: None,
        boot_record: None,
        el_torito: None,
        entries: Vec::new(),
        layout,
        root_extent_location: 0,
      });
    }

    let sectors = read_volume_descriptor_set(&source)?;
    let descriptors = scan_volume_descriptor_set(&sectors)?;

    let mut primary_descriptor = None;
    let mut joliet = None;
    let mut boot_record = None;

    for (i, descriptor) in descriptors.iter().enumerate() {
      let sector_offset = (16 + i as u64) * 2048;
      match descriptor {
        VolumeDescriptor::Primary(pvd) => {
          layout.push(
            LayoutEntry::new(LayoutKind::VolumeDescriptor, "primary volume descriptor", sector_offset, 2048)
              .with_property("type", "1"),
          );
          primary_descriptor = Some(pvd.clone());
        }
        VolumeDescriptor::Supplementary(svd) => {
          layout.push(
            LayoutEntry::new(LayoutKind::VolumeDescriptor, "supplementary volume descriptor", sector_offset, 2048)
              .with_property("type", "2")
              .with_property("joliet", svd.is_joliet().to_string()),
          );
          if svd.is_joliet() && joliet.is_none() {
            joliet = Some(svd.clone());
          }
        }
        VolumeDescriptor::BootRecord(brvd) => {
          layout.push(
            LayoutEntry::new(LayoutKind::VolumeDescriptor, "boot record volume descriptor", sector_offset, 2048)
              .with_property("type", "0")
              .with_property("el_torito", brvd.is_el_torito().to_string()),
          );
          boot_record = Some(brvd.clone());
        }
        VolumeDescriptor::Partition(_) => {
          layout.push(
            LayoutEntry::new(LayoutKind::VolumeDescriptor, "volume partition descriptor", sector_offset, 2048)
              .with_property("type", "3"),
          );
        }
        VolumeDescriptor::SetTerminator => {
          layout.push(
            LayoutEntry::new(LayoutKind::VolumeDescriptor, "volume descriptor set terminator", sector_offset, 2048)
              .with_property("type", "255"),
          );
        }
      }
    }

    let primary = primary_descriptor.ok_or_else(|| {
      Error::FormatStructure("volume descriptor set contained no primary volume descriptor".into())
    })?;

    if primary.logical_block_size != 2048 {
      return Err(Error::UnsupportedBlockSize(primary.logical_block_size));
    }

    log::debug!(
      "volume descriptor set scanned: joliet={} el_torito={}",
      joliet.is_some(),
      boot_record.as_ref().map(|b| b.is_el_torito()).unwrap_or(false)
    );

    let type_l_table = source
      .borrow_mut()
      .read_extent(primary.type_l_path_table_location as u64, primary.path_table_size)?;
    let path_table_records = decode_path_table(&type_l_table, Endianness::Little)?;
    layout.push(
      LayoutEntry::new(
        LayoutKind::PathTable,
        "path table (type L)",
        primary.type_l_path_table_location as u64 * 2048,
        primary.path_table_size as u64,
      )
      .with_property("record_count", path_table_records.len().to_string()),
    );

    let use_joliet = options.prefer_joliet && joliet.is_some();
    let root_bytes: Vec<u8> = if use_joliet {
      joliet.as_ref().unwrap().inner.root_directory_record.clone()
    } else {
      primary.root_directory_record.clone()
    };
    let root_record = decode_directory_record(&root_bytes)?;

    layout.push(LayoutEntry::new(
      LayoutKind::DirectoryRecord,
      "root directory record",
      root_record.extent_location as u64 * 2048,
      root_record.data_length as u64,
    ));

    let walk_options = WalkOptions {
      joliet: use_joliet,
      rock_ridge_enabled: options.rock_ridge_enabled,
      strip_version_suffix: options.strip_version_suffix,
    };
    let mut entries = walk(
      source.clone(),
      root_record.extent_location,
      root_record.data_length,
      &walk_options,
    )?;

    for entry in &entries {
      let kind = if entry.is_directory {
        LayoutKind::DirectoryRecord
      } else {
        LayoutKind::FileExtent
      };
      layout.push(LayoutEntry::new(
        kind,
        entry.full_path.clone(),
        entry.extent_location as u64 * 2048,
        entry.size,
      ));
    }

    let mut el_torito = None;
    if options.el_torito_enabled {
      if let Some(brvd) = boot_record.as_ref().filter(|b| b.is_el_torito()) {
        let mut catalog_sector = [0u8; 2048];
        source
          .borrow_mut()
          .read_sector(brvd.boot_catalog_sector as u64, &mut catalog_sector)?;
        let catalog = parse_catalog(&catalog_sector)?;
        layout.push(LayoutEntry::new(
          LayoutKind::BootCatalog,
          "boot catalog",
          brvd.boot_catalog_sector as u64 * 2048,
          2048,
        ));
        entries.extend(synthesize_boot_entries(&catalog, &options.boot_file_synthetic_dir, &source));
        el_torito = Some(catalog);
      }
    }

    Ok(Self {
      options,
      primary,
      joliet,
      boot_record,
      el_torito,
      entries,
      layout,
      root_extent_location: root_record.extent_location,
    })
  }

  pub fn volume_identifier(&self) -> &str {
    &self.primary.volume_identifier
  }

  pub fn system_identifier(&self) -> &str {
    &self.primary.system_identifier
  }

  pub fn volume_set_identifier(&self) -> &str {
    &self.primary.volume_set_identifier
  }

  pub fn publisher_identifier(&self) -> &str {
    &self.primary.publisher_identifier
  }

  pub fn data_preparer_identifier(&self) -> &str {
    &self.primary.data_preparer_identifier
  }

  pub fn application_identifier(&self) -> &str {
    &self.primary.application_identifier
  }

  pub fn copyright_file_identifier(&self) -> &str {
    &self.primary.copyright_file_identifier
  }

  pub fn abstract_file_identifier(&self) -> &str {
    &self.primary.abstract_file_identifier
  }

  pub fn bibliographic_file_identifier(&self) -> &str {
    &self.primary.bibliographic_file_identifier
  }

  pub fn creation_date(&self) -> Option<IsoDateTime> {
    self.primary.creation_date
  }

  pub fn modification_date(&self) -> Option<IsoDateTime> {
    self.primary.modification_date
  }

  pub fn expiration_date(&self) -> Option<IsoDateTime> {
    self.primary.expiration_date
  }

  pub fn effective_date(&self) -> Option<IsoDateTime> {
    self.primary.effective_date
  }

  pub fn volume_space_size(&self) -> u32 {
    self.primary.volume_space_size
  }

  pub fn root_extent_location(&self) -> u32 {
    self.root_extent_location
  }

  pub fn has_joliet(&self) -> bool {
    self.joliet.is_some()
  }

  pub fn has_rock_ridge(&self) -> bool {
    self
      .entries
      .iter()
      .any(|e| e.rock_ridge.as_ref().map(|rr| rr.has_rock_ridge()).unwrap_or(false))
  }

  pub fn has_el_torito(&self) -> bool {
    self.el_torito.is_some()
  }

  pub fn options(&self) -> &OpenOptions {
    &self.options
  }

  pub fn list_files(&self) -> impl Iterator<Item = &FilesystemEntry<R>> {
    self.entries.iter().filter(|e| !e.is_directory)
  }

  pub fn list_directories(&self) -> impl Iterator<Item = &FilesystemEntry<R>> {
    self.entries.iter().filter(|e| e.is_directory)
  }

  pub fn list_boot_entries(&self) -> impl Iterator<Item = &FilesystemEntry<R>> {
    let prefix = format!("{}/", self.options.boot_file_synthetic_dir);
    self.entries.iter().filter(move |e| e.full_path.starts_with(&prefix))
  }

  /// Look up a decoded entry by its full path (as produced by the walker).
  pub fn find(&self, path: &str) -> Option<&FilesystemEntry<R>> {
    self.entries.iter().find(|e| e.full_path == path)
  }

  /// Read a file's bytes by path.
  pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
    let entry = self.find(path).ok_or_else(|| Error::PathNotFound(path.to_string()))?;
    entry.read_bytes()
  }

  /// Read an already-resolved entry's bytes.
  pub fn read_extent(&self, entry: &FilesystemEntry<R>) -> Result<Vec<u8>> {
    entry.read_bytes()
  }

  pub fn layout(&self) -> &ImageLayout {
    &self.layout
  }

  /// Release the underlying byte source. Equivalent to dropping the image;
  /// provided for callers that want an explicit close point.
  pub fn close(self) {
    drop(self);
  }
}

fn synthesize_boot_entries<R: IsoRead>(
  catalog: &ElToritoCatalog,
  synthetic_dir: &str,
  source: &Rc<RefCell<R>>,
) -> Vec<FilesystemEntry<R>> {
  let mut out = Vec::new();
  let mut push_entry = |name: String, load_rba: u32, sector_count: u16| {
    let record = DirectoryRecord {
      extended_attribute_length: 0,
      extent_location: load_rba,
      data_length: sector_count as u32 * 512,
      recording_time: None,
      file_flags: FileFlags::empty(),
      file_unit_size: 0,
      interleave_gap_size: 0,
      volume_sequence_number: 1,
      identifier: FileIdentifier::Name(name.as_bytes().to_vec()),
      system_use: Vec::new(),
    };
    out.push(FilesystemEntry {
      name: name.clone(),
      full_path: format!("{}/{}", synthetic_dir, name),
      is_directory: false,
      size: sector_count as u64 * 512,
      extent_location: load_rba,
      uid: None,
      gid: None,
      mode: 0o444,
      creation_time: None,
      modification_time: None,
      record,
      rock_ridge: None,
      source: source.clone(),
    });
  };

  push_entry(
    "default".to_string(),
    catalog.default_entry.load_rba,
    catalog.default_entry.sector_count,
  );
  for (i, entry) in catalog.section_entries.iter().enumerate() {
    push_entry(format!("section_{}", i), entry.load_rba, entry.sector_count);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::directory_record::{DirectoryRecord as DR, FileFlags as FF, FileIdentifier as FI};
  use crate::primitives::{encode_dual_u16, encode_dual_u32};
  use std::io::Cursor;

  fn string_field(buf: &mut [u8], start: usize, len: usize, value: &str) {
    let bytes = value.as_bytes();
    buf[start..start + bytes.len()].copy_from_slice(bytes);
    for b in &mut buf[start + bytes.len()..start + len] {
      *b = 0x20;
    }
  }

  fn sentinel_datetime(buf: &mut [u8], start: usize) {
    buf[start..start + 16].copy_from_slice(b"0000000000000000");
    buf[start + 16] = 0;
  }

  fn root_record_bytes(extent: u32, len: u32) -> Vec<u8> {
    DR {
      extended_attribute_length: 0,
      extent_location: extent,
      data_length: len,
      recording_time: None,
      file_flags: FF::DIRECTORY,
      file_unit_size: 0,
      interleave_gap_size: 0,
      volume_sequence_number: 1,
      identifier: FI::CurrentDirectory,
      system_use: Vec::new(),
    }
    .encode()
    .unwrap()
  }

  fn build_minimal_image() -> Cursor<Vec<u8>> {
    // Layout: sectors 0..16 system area, 16 primary, 17 terminator, 18 path
    // table, 19 root directory extent.
    let mut data = vec![0u8; 2048 * 20];

    let pvd_sector = 16usize;
    let base = pvd_sector * 2048;
    data[base] = 1;
    data[base + 1..base + 6].copy_from_slice(b"CD001");
    data[base + 6] = 1;
    string_field(&mut data, base + 40, 32, "TESTVOL");
    data[base + 80..base + 88].copy_from_slice(&encode_dual_u32(20));
    data[base + 120..base + 124].copy_from_slice(&encode_dual_u16(1));
    data[base + 124..base + 128].copy_from_slice(&encode_dual_u16(1));
    data[base + 128..base + 132].copy_from_slice(&encode_dual_u16(2048));
    data[base + 132..base + 140].copy_from_slice(&encode_dual_u32(10));
    data[base + 140..base + 144].copy_from_slice(&18u32.to_le_bytes());
    data[base + 148..base + 152].copy_from_slice(&18u32.to_be_bytes());
    let root_record = root_record_bytes(19, 2048);
    data[base + 156..base + 156 + root_record.len()].copy_from_slice(&root_record);
    for offset in [813usize, 830, 847, 864] {
      sentinel_datetime(&mut data, base + offset);
    }

    let terminator_sector = 17usize;
    let tbase = terminator_sector * 2048;
    data[tbase] = 255;
    data[tbase + 1..tbase + 6].copy_from_slice(b"CD001");
    data[tbase + 6] = 1;

    let path_table_sector = 18usize;
    let pbase = path_table_sector * 2048;
    data[pbase] = 1; // identifier length
    data[pbase + 2..pbase + 6].copy_from_slice(&19u32.to_le_bytes());
    data[pbase + 6..pbase + 8].copy_from_slice(&1u16.to_le_bytes());
    data[pbase + 8] = 0; // root identifier byte

    let root_extent_sector = 19usize;
    let rbase = root_extent_sector * 2048;
    let mut root_dir = Vec::new();
    root_dir.extend(
      DR {
        extended_attribute_length: 0,
        extent_location: 19,
        data_length: 2048,
        recording_time: None,
        file_flags: FF::DIRECTORY,
        file_unit_size: 0,
        interleave_gap_size: 0,
        volume_sequence_number: 1,
        identifier: FI::CurrentDirectory,
        system_use: Vec::new(),
      }
      .encode()
      .unwrap(),
    );
    root_dir.extend(
      DR {
        extended_attribute_length: 0,
        extent_location: 19,
        data_length: 2048,
        recording_time: None,
        file_flags: FF::DIRECTORY,
        file_unit_size: 0,
        interleave_gap_size: 0,
        volume_sequence_number: 1,
        identifier: FI::ParentDirectory,
        system_use: Vec::new(),
      }
      .encode()
      .unwrap(),
    );
    root_dir.extend(
      DR {
        extended_attribute_length: 0,
        extent_location: 5,
        data_length: 12,
        recording_time: None,
        file_flags: FF::empty(),
        file_unit_size: 0,
        interleave_gap_size: 0,
        volume_sequence_number: 1,
        identifier: FI::Name(b"HELLO.TXT;1".to_vec()),
        system_use: Vec::new(),
      }
      .encode()
      .unwrap(),
    );
    data[rbase..rbase + root_dir.len()].copy_from_slice(&root_dir);

    Cursor::new(data)
  }

  #[test]
  fn open_rejects_missing_signature() {
    let data = vec![0u8; 2048 * 20];
    let err = Image::open(Cursor::new(data), OpenOptions::new()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { .. }));
  }

  #[test]
  fn open_decodes_volume_identifier_and_walks_root() {
    let image = Image::open(build_minimal_image(), OpenOptions::new()).unwrap();
    assert_eq!(image.volume_identifier(), "TESTVOL");
    assert_eq!(image.volume_space_size(), 20);
    let names: Vec<&str> = image.list_files().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"HELLO.TXT"));
    assert!(!image.has_el_torito());
    assert_eq!(image.root_extent_location(), 19);
  }

  #[test]
  fn parse_on_open_false_skips_the_scan() {
    let image = Image::open(build_minimal_image(), OpenOptions::new().with_parse_on_open(false)).unwrap();
    assert_eq!(image.volume_identifier(), "");
    assert_eq!(image.list_files().count(), 0);
  }

  #[test]
  fn find_and_read_file_round_trips() {
    let image = Image::open(build_minimal_image(), OpenOptions::new()).unwrap();
    let entry = image.find("/HELLO.TXT").unwrap();
    assert_eq!(entry.size, 12);
    assert_eq!(image.read_extent(entry).unwrap().len(), 12);
  }

  #[test]
  fn opens_from_a_real_file_on_disk() {
    use std::io::Write;

    let cursor = build_minimal_image();
    let mut temp_file = tempfile::NamedTempFile::new().unwrap();
    temp_file.write_all(cursor.get_ref()).unwrap();
    let file = temp_file.reopen().unwrap();

    let image = Image::open(file, OpenOptions::new()).unwrap();
    assert_eq!(image.volume_identifier(), "TESTVOL");
  }
}
