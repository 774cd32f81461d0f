//! Rock Ridge / SUSP: the POSIX metadata overlay carried in a Directory
//! Record's System Use area.

use crate::primitives::{decode_binary_datetime, decode_dual_u32, IsoDateTime};

/// POSIX file-type bits decoded from a PX entry's mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
  Fifo,
  CharacterDevice,
  Directory,
  BlockDevice,
  Regular,
  Symlink,
  Socket,
  /// The mode's type nibble did not match any of the seven known values.
  Unknown(u32),
}

const S_IFSOCK: u32 = 0xC000;
const S_IFLNK: u32 = 0xA000;
const S_IFREG: u32 = 0x8000;
const S_IFBLK: u32 = 0x6000;
const S_IFDIR: u32 = 0x4000;
const S_IFCHR: u32 = 0x2000;
const S_IFIFO: u32 = 0x1000;
const S_IFMT: u32 = 0xF000;

fn decode_file_type(mode: u32) -> FileType {
  match mode & S_IFMT {
    S_IFSOCK => FileType::Socket,
    S_IFLNK => FileType::Symlink,
    S_IFREG => FileType::Regular,
    S_IFBLK => FileType::BlockDevice,
    S_IFDIR => FileType::Directory,
    S_IFCHR => FileType::CharacterDevice,
    S_IFIFO => FileType::Fifo,
    other => FileType::Unknown(other),
  }
}

/// A decoded `PX` entry: POSIX file attributes.
#[derive(Debug, Clone, Copy)]
pub struct PosixAttributes {
  pub mode: u32,
  pub file_type: FileType,
  pub setuid: bool,
  pub setgid: bool,
  pub sticky: bool,
  pub permissions: u16,
  pub link_count: u32,
  pub uid: u32,
  pub gid: u32,
  pub file_serial_number: Option<u32>,
}

/// A decoded `TF` entry's selected timestamps. Only fields whose bit was set
/// in the presence mask are populated.
#[derive(Debug, Clone, Default)]
pub struct Timestamps {
  pub creation: Option<IsoDateTime>,
  pub modification: Option<IsoDateTime>,
  pub access: Option<IsoDateTime>,
  pub attributes: Option<IsoDateTime>,
  pub backup: Option<IsoDateTime>,
  pub expiration: Option<IsoDateTime>,
  pub effective: Option<IsoDateTime>,
}

/// The sparse bundle of everything this crate's SUSP parser recognized for
/// one directory record. Any field left `None`/`false`/empty means the
/// corresponding entry was absent, not that it failed to parse.
#[derive(Debug, Clone, Default)]
pub struct RockRidgeAttributes {
  pub posix: Option<PosixAttributes>,
  pub device_numbers: Option<(u32, u32)>,
  pub symlink_target: Option<String>,
  pub alternate_name: Option<String>,
  pub relocated_child: Option<u32>,
  pub relocated_parent: Option<u32>,
  pub is_relocated: bool,
  pub timestamps: Timestamps,
  pub is_sparse: bool,
}

impl RockRidgeAttributes {
  /// True iff at least one SUSP entry was successfully parsed into this
  /// bundle. An all-default bundle (empty System Use, or nothing
  /// recognized) is indistinguishable from "no Rock Ridge".
  pub fn has_rock_ridge(&self) -> bool {
    self.posix.is_some()
      || self.device_numbers.is_some()
      || self.symlink_target.is_some()
      || self.alternate_name.is_some()
      || self.relocated_child.is_some()
      || self.relocated_parent.is_some()
      || self.is_relocated
      || self.is_sparse
      || self.timestamps.creation.is_some()
      || self.timestamps.modification.is_some()
      || self.timestamps.access.is_some()
      || self.timestamps.attributes.is_some()
      || self.timestamps.backup.is_some()
      || self.timestamps.expiration.is_some()
      || self.timestamps.effective.is_some()
  }
}

const NM_CONTINUE: u8 = 1 << 0;
const NM_CURRENT: u8 = 1 << 1;
const NM_PARENT: u8 = 1 << 2;

struct SuspEntry<'a> {
  signature: [u8; 2],
  payload: &'a [u8],
}

/// Walk the raw System Use byte stream, yielding each entry's signature and
/// payload. Stops at the first malformed header (too short to hold a
/// signature/length/version, or a declared length that would overrun the
/// buffer) rather than erroring, matching the best-effort contract: a
/// truncated SUSP stream yields everything decoded so far.
fn iter_susp_entries(system_use: &[u8]) -> Vec<SuspEntry<'_>> {
  let mut out = Vec::new();
  let mut offset = 0usize;
  while offset + 4 <= system_use.len() {
    let signature = [system_use[offset], system_use[offset + 1]];
    let length = system_use[offset + 2] as usize;
    if length < 4 || offset + length > system_use.len() {
      break;
    }
    let payload = &system_use[offset + 4..offset + length];
    out.push(SuspEntry { signature, payload });
    offset += length;
  }
  out
}

fn decode_px(payload: &[u8]) -> Option<PosixAttributes> {
  if payload.len() < 32 {
    return None;
  }
  let mode = decode_dual_u32(&payload[0..8]).ok()?;
  let link_count = decode_dual_u32(&payload[8..16]).ok()?;
  let uid = decode_dual_u32(&payload[16..24]).ok()?;
  let gid = decode_dual_u32(&payload[24..32]).ok()?;
  let file_serial_number = if payload.len() >= 40 {
    decode_dual_u32(&payload[32..40]).ok()
  } else {
    None
  };
  Some(PosixAttributes {
    mode,
    file_type: decode_file_type(mode),
    setuid: mode & 0x0800 != 0,
    setgid: mode & 0x0400 != 0,
    sticky: mode & 0x0200 != 0,
    permissions: (mode & 0x01FF) as u16,
    link_count,
    uid,
    gid,
    file_serial_number,
  })
}

fn decode_pn(payload: &[u8]) -> Option<(u32, u32)> {
  if payload.len() < 16 {
    return None;
  }
  let major = decode_dual_u32(&payload[0..8]).ok()?;
  let minor = decode_dual_u32(&payload[8..16]).ok()?;
  Some((major, minor))
}

fn decode_sl(payload: &[u8]) -> Option<String> {
  if payload.is_empty() {
    return None;
  }
  let mut components = Vec::new();
  let mut offset = 1; // skip the entry-level flags byte.
  while offset + 2 <= payload.len() {
    let component_flags = payload[offset];
    let component_len = payload[offset + 1] as usize;
    if offset + 2 + component_len > payload.len() {
      break;
    }
    let text = String::from_utf8_lossy(&payload[offset + 2..offset + 2 + component_len]);
    if component_flags & 0x02 != 0 {
      components.push(".".to_string());
    } else if component_flags & 0x04 != 0 {
      components.push("..".to_string());
    } else {
      components.push(text.into_owned());
    }
    offset += 2 + component_len;
  }
  Some(components.join("/"))
}

fn decode_nm(payload: &[u8]) -> Option<(u8, String)> {
  if payload.is_empty() {
    return None;
  }
  let flags = payload[0];
  let name = String::from_utf8_lossy(&payload[1..]).into_owned();
  Some((flags, name))
}

fn decode_tf(payload: &[u8]) -> Timestamps {
  let mut timestamps = Timestamps::default();
  if payload.is_empty() {
    return timestamps;
  }
  let mask = payload[0];
  let order: [(u8, fn(&mut Timestamps) -> &mut Option<IsoDateTime>); 7] = [
    (1 << 0, |t| &mut t.creation),
    (1 << 1, |t| &mut t.modification),
    (1 << 2, |t| &mut t.access),
    (1 << 3, |t| &mut t.attributes),
    (1 << 4, |t| &mut t.backup),
    (1 << 5, |t| &mut t.expiration),
    (1 << 6, |t| &mut t.effective),
  ];
  let mut offset = 1usize;
  for (bit, field) in order {
    if mask & bit == 0 {
      continue;
    }
    if offset + 7 > payload.len() {
      break;
    }
    match decode_binary_datetime(&payload[offset..offset + 7]) {
      Ok(value) => *field(&mut timestamps) = value,
      Err(_) => break,
    }
    offset += 7;
  }
  timestamps
}

/// Parse a directory record's System Use tail into a `RockRidgeAttributes`
/// bundle. Never fails: malformed entries are skipped or truncate parsing,
/// per §4.6's best-effort contract.
pub fn parse_system_use(system_use: &[u8]) -> RockRidgeAttributes {
  let mut attrs = RockRidgeAttributes::default();
  let mut nm_continuing = false;
  for entry in iter_susp_entries(system_use) {
    match &entry.signature {
      b"PX" => attrs.posix = decode_px(entry.payload),
      b"PN" => attrs.device_numbers = decode_pn(entry.payload),
      b"SL" => {
        if let Some(target) = decode_sl(entry.payload) {
          attrs.symlink_target = Some(match attrs.symlink_target.take() {
            Some(existing) => existing + &target,
            None => target,
          });
        }
      }
      b"NM" => {
        if let Some((flags, name)) = decode_nm(entry.payload) {
          if flags & NM_CURRENT != 0 {
            attrs.alternate_name = Some(".".to_string());
          } else if flags & NM_PARENT != 0 {
            attrs.alternate_name = Some("..".to_string());
          } else {
            attrs.alternate_name = Some(match (nm_continuing, attrs.alternate_name.take()) {
              (true, Some(existing)) => existing + &name,
              _ => name,
            });
          }
          nm_continuing = flags & NM_CONTINUE != 0;
        }
      }
      b"CL" => attrs.relocated_child = decode_dual_u32(entry.payload).ok(),
      b"PL" => attrs.relocated_parent = decode_dual_u32(entry.payload).ok(),
      b"RE" => attrs.is_relocated = true,
      b"TF" => attrs.timestamps = decode_tf(entry.payload),
      b"SF" => attrs.is_sparse = true,
      other => {
        log::warn!(
          "unrecognized susp signature {:?}, skipping entry",
          String::from_utf8_lossy(other)
        );
      }
    }
  }
  attrs
}
