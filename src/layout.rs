//! The image layout report: a flat, ordered inventory of every recognized
//! on-disc object, for diagnostics and verification tooling.
//!
//! This is a read-side counterpart to the teacher's write-side LBA
//! allocator; nothing of that allocator survives here beyond the general
//! shape of "walk the decoded tree and record an offset/size per node".

/// The kind of object a `LayoutEntry` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
  SystemArea,
  VolumeDescriptor,
  PathTable,
  DirectoryRecord,
  FileExtent,
  BootCatalog,
}

/// One row of the layout report: what something is, where it lives, how big
/// it is, and a handful of descriptive key/value properties (descriptor
/// type, path, endianness, etc).
#[derive(Debug, Clone)]
pub struct LayoutEntry {
  pub kind: LayoutKind,
  pub name: String,
  pub offset: u64,
  pub size: u64,
  pub properties: Vec<(String, String)>,
}

impl LayoutEntry {
  pub fn new(kind: LayoutKind, name: impl Into<String>, offset: u64, size: u64) -> Self {
    Self {
      kind,
      name: name.into(),
      offset,
      size,
      properties: Vec::new(),
    }
  }

  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.properties.push((key.into(), value.into()));
    self
  }
}

/// The ordered sequence of every recognized image object. Construction order
/// matches disc order: system area, then each Volume Descriptor, then path
/// tables, directory records, file extents, and finally the boot catalog.
#[derive(Debug, Clone, Default)]
pub struct ImageLayout {
  entries: Vec<LayoutEntry>,
}

impl ImageLayout {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, entry: LayoutEntry) {
    self.entries.push(entry);
  }

  pub fn entries(&self) -> &[LayoutEntry] {
    &self.entries
  }

  pub fn total_size(&self) -> u64 {
    self.entries.iter().map(|e| e.size).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entries_preserve_push_order() {
    let mut layout = ImageLayout::new();
    layout.push(LayoutEntry::new(LayoutKind::SystemArea, "system area", 0, 16 * 2048));
    layout.push(
      LayoutEntry::new(LayoutKind::VolumeDescriptor, "primary", 16 * 2048, 2048)
        .with_property("type", "1"),
    );
    assert_eq!(layout.entries().len(), 2);
    assert_eq!(layout.entries()[1].properties[0], ("type".to_string(), "1".to_string()));
  }

  #[test]
  fn total_size_sums_entries() {
    let mut layout = ImageLayout::new();
    layout.push(LayoutEntry::new(LayoutKind::SystemArea, "system area", 0, 100));
    layout.push(LayoutEntry::new(LayoutKind::BootCatalog, "boot catalog", 100, 2048));
    assert_eq!(layout.total_size(), 2148);
  }
}
