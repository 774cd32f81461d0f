//! The directory-tree walker: turns a root Directory Record plus a byte
//! source into a flat collection of `FilesystemEntry` values.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::directory_record::{decode_directory_record, DirectoryRecord, FileIdentifier};
use crate::error::Result;
use crate::primitives::IsoDateTime;
use crate::read::IsoRead;
use crate::rockridge::{parse_system_use, RockRidgeAttributes};

const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Options controlling how the walker resolves names and overlays. Mirrors
/// the subset of `OpenOptions` the traversal itself needs.
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
  pub joliet: bool,
  pub rock_ridge_enabled: bool,
  pub strip_version_suffix: bool,
}

/// One node of the decoded filesystem tree. Holds a cheap, shared handle to
/// the byte source so its extent can be read on demand without the image
/// façade needing to stay borrowed.
#[derive(Clone, Debug)]
pub struct FilesystemEntry<R> {
  pub name: String,
  pub full_path: String,
  pub is_directory: bool,
  pub size: u64,
  pub extent_location: u32,
  pub uid: Option<u32>,
  pub gid: Option<u32>,
  pub mode: u32,
  pub creation_time: Option<IsoDateTime>,
  pub modification_time: Option<IsoDateTime>,
  pub record: DirectoryRecord,
  pub rock_ridge: Option<RockRidgeAttributes>,
  pub(crate) source: Rc<RefCell<R>>,
}

impl<R: IsoRead> FilesystemEntry<R> {
  /// Read this entry's full extent. Valid for both files and directories;
  /// directories read back the same raw Directory Record bytes the walker
  /// consumed.
  pub fn read_bytes(&self) -> Result<Vec<u8>> {
    self
      .source
      .borrow_mut()
      .read_extent(self.extent_location as u64, self.size as u32)
  }
}

fn strip_version(name: &str) -> &str {
  match name.rfind(';') {
    Some(idx) => &name[..idx],
    None => name,
  }
}

fn best_name(
  record: &DirectoryRecord,
  rock_ridge: Option<&RockRidgeAttributes>,
  joliet: bool,
  strip_version_suffix: bool,
) -> String {
  if let Some(name) = rock_ridge.and_then(|rr| rr.alternate_name.as_deref()) {
    return name.to_string();
  }
  let decoded = record.identifier.decode(joliet);
  if strip_version_suffix {
    strip_version(&decoded).to_string()
  } else {
    decoded
  }
}

/// Decode every Directory Record in one directory extent. Skips "." and
/// ".." from the returned list (callers use `extent_location`/`data_length`
/// of the directory record itself for those invariants) but otherwise
/// preserves disc order. A record that would straddle a sector boundary is
/// skipped; the walker resumes at the next sector.
fn decode_directory_extent(buf: &[u8]) -> Vec<DirectoryRecord> {
  let mut out = Vec::new();
  let mut sector_offset = 0usize;
  while sector_offset + 1 <= buf.len() {
    let sector_end = (sector_offset + 2048).min(buf.len());
    let mut offset = sector_offset;
    while offset < sector_end {
      let remaining = &buf[offset..sector_end];
      if remaining.is_empty() || remaining[0] == 0 {
        break;
      }
      let length = remaining[0] as usize;
      if length > remaining.len() {
        log::debug!("directory record at offset {} crosses a sector boundary, skipping", offset);
        break;
      }
      log::trace!("decoding directory record at offset {} (length {})", offset, length);
      match decode_directory_record(remaining) {
        Ok(record) => {
          offset += length;
          out.push(record);
        }
        Err(err) => {
          log::debug!("skipping malformed directory record at offset {}: {}", offset, err);
          break;
        }
      }
    }
    sector_offset += 2048;
  }
  out
}

#[allow(clippy::too_many_arguments)]
fn walk_directory<R: IsoRead>(
  source: &Rc<RefCell<R>>,
  extent_location: u32,
  data_length: u32,
  parent_path: &str,
  options: &WalkOptions,
  visited: &mut HashSet<u32>,
  out: &mut Vec<FilesystemEntry<R>>,
) -> Result<()> {
  if !visited.insert(extent_location) {
    log::debug!("cycle detected at extent {}, skipping", extent_location);
    return Ok(());
  }

  log::trace!("reading directory extent {} ({} bytes)", extent_location, data_length);
  let buf = source.borrow_mut().read_extent(extent_location as u64, data_length)?;
  for record in decode_directory_extent(&buf) {
    log::trace!("walking record {:?} at extent {}", record.identifier, record.extent_location);
    if matches!(
      record.identifier,
      FileIdentifier::CurrentDirectory | FileIdentifier::ParentDirectory
    ) {
      continue;
    }

    let rock_ridge = if options.rock_ridge_enabled && !record.system_use.is_empty() {
      Some(parse_system_use(&record.system_use))
    } else {
      None
    };

    let name = best_name(&record, rock_ridge.as_ref(), options.joliet, options.strip_version_suffix);
    let full_path = if parent_path == "/" {
      format!("/{}", name)
    } else {
      format!("{}/{}", parent_path, name)
    };

    let is_directory = record.is_directory();
    let default_mode = if is_directory { DEFAULT_DIR_MODE } else { DEFAULT_FILE_MODE };
    let (mode, uid, gid) = match rock_ridge.as_ref().and_then(|rr| rr.posix.as_ref()) {
      Some(px) => (px.mode & 0x0FFF, Some(px.uid), Some(px.gid)),
      None => (default_mode, None, None),
    };
    let (creation_time, modification_time) = match rock_ridge.as_ref() {
      Some(rr) if rr.timestamps.creation.is_some() || rr.timestamps.modification.is_some() => {
        (rr.timestamps.creation, rr.timestamps.modification.or(record.recording_time))
      }
      _ => (record.recording_time, record.recording_time),
    };

    let entry = FilesystemEntry {
      name,
      full_path: full_path.clone(),
      is_directory,
      size: record.data_length as u64,
      extent_location: record.extent_location,
      uid,
      gid,
      mode,
      creation_time,
      modification_time,
      record: record.clone(),
      rock_ridge,
      source: source.clone(),
    };
    out.push(entry);

    if is_directory {
      walk_directory(
        source,
        record.extent_location,
        record.data_length,
        &full_path,
        options,
        visited,
        out,
      )?;
    }
  }
  Ok(())
}

/// Walk the tree rooted at `root_extent`/`root_size`, returning every entry
/// encountered (files and directories alike) in disc order.
pub fn walk<R: IsoRead>(
  source: Rc<RefCell<R>>,
  root_extent: u32,
  root_size: u32,
  options: &WalkOptions,
) -> Result<Vec<FilesystemEntry<R>>> {
  let mut out = Vec::new();
  let mut visited = HashSet::new();
  walk_directory(&source, root_extent, root_size, "/", options, &mut visited, &mut out)?;
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::directory_record::FileFlags;
  use std::io::Cursor;

  fn record_bytes(name: &[u8], is_dir: bool, extent: u32, len: u32) -> Vec<u8> {
    let record = DirectoryRecord {
      extended_attribute_length: 0,
      extent_location: extent,
      data_length: len,
      recording_time: None,
      file_flags: if is_dir { FileFlags::DIRECTORY } else { FileFlags::empty() },
      file_unit_size: 0,
      interleave_gap_size: 0,
      volume_sequence_number: 1,
      identifier: FileIdentifier::Name(name.to_vec()),
      system_use: Vec::new(),
    };
    record.encode().unwrap()
  }

  fn special_record(byte: u8, extent: u32, len: u32) -> Vec<u8> {
    let record = DirectoryRecord {
      extended_attribute_length: 0,
      extent_location: extent,
      data_length: len,
      recording_time: None,
      file_flags: FileFlags::DIRECTORY,
      file_unit_size: 0,
      interleave_gap_size: 0,
      volume_sequence_number: 1,
      identifier: if byte == 0 {
        FileIdentifier::CurrentDirectory
      } else {
        FileIdentifier::ParentDirectory
      },
      system_use: Vec::new(),
    };
    record.encode().unwrap()
  }

  fn build_image(root_extent: u32, sub_extent: u32) -> Cursor<Vec<u8>> {
    let mut data = vec![0u8; 2048 * 6];
    let mut root_sector = Vec::new();
    root_sector.extend(special_record(0, root_extent, 2048));
    root_sector.extend(special_record(1, root_extent, 2048));
    root_sector.extend(record_bytes(b"README.TXT;1", false, 4, 10));
    root_sector.extend(record_bytes(b"SUBDIR", true, sub_extent, 2048));
    data[(root_extent as usize) * 2048..(root_extent as usize) * 2048 + root_sector.len()]
      .copy_from_slice(&root_sector);

    let mut sub_sector = Vec::new();
    sub_sector.extend(special_record(0, sub_extent, 2048));
    sub_sector.extend(special_record(1, root_extent, 2048));
    sub_sector.extend(record_bytes(b"NESTED.TXT;1", false, 5, 4));
    data[(sub_extent as usize) * 2048..(sub_extent as usize) * 2048 + sub_sector.len()]
      .copy_from_slice(&sub_sector);

    Cursor::new(data)
  }

  #[test]
  fn walks_nested_directories_and_strips_version_suffix() {
    let image = build_image(2, 3);
    let source = Rc::new(RefCell::new(image));
    let options = WalkOptions {
      joliet: false,
      rock_ridge_enabled: false,
      strip_version_suffix: true,
    };
    let entries = walk(source, 2, 2048, &options).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"README.TXT"));
    assert!(names.contains(&"SUBDIR"));
    assert!(names.contains(&"NESTED.TXT"));

    let nested = entries.iter().find(|e| e.name == "NESTED.TXT").unwrap();
    assert_eq!(nested.full_path, "/SUBDIR/NESTED.TXT");
  }

  #[test]
  fn self_and_parent_records_are_not_enumerated() {
    let image = build_image(2, 3);
    let source = Rc::new(RefCell::new(image));
    let options = WalkOptions {
      joliet: false,
      rock_ridge_enabled: false,
      strip_version_suffix: false,
    };
    let entries = walk(source, 2, 2048, &options).unwrap();
    assert!(entries.iter().all(|e| e.name != "." && e.name != ".."));
  }

  #[test]
  fn cycle_back_to_root_is_not_infinite() {
    let mut data = vec![0u8; 2048 * 3];
    let mut root_sector = Vec::new();
    root_sector.extend(special_record(0, 2, 2048));
    root_sector.extend(special_record(1, 2, 2048));
    // A malicious/self-referential subdirectory pointing back at the root extent.
    root_sector.extend(record_bytes(b"LOOP", true, 2, 2048));
    data[2 * 2048..2 * 2048 + root_sector.len()].copy_from_slice(&root_sector);

    let source = Rc::new(RefCell::new(Cursor::new(data)));
    let options = WalkOptions {
      joliet: false,
      rock_ridge_enabled: false,
      strip_version_suffix: false,
    };
    let entries = walk(source, 2, 2048, &options).unwrap();
    assert_eq!(entries.len(), 1);
  }
}
