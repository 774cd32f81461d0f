//! The positional byte source every decoder reads from: a sector-addressed
//! view over anything that is `Read + Seek`.

use crate::error::{Error, Result};

pub const SECTOR_SIZE: u64 = 2048;

/// A source of fixed-size sectors, addressed by sector number rather than
/// byte offset. Blanket-implemented for any `Read + Seek`, so a `File`, a
/// `Cursor<Vec<u8>>`, or anything else standard works without an adapter.
pub trait IsoRead {
  /// Read exactly one 2048-byte sector at `sector`, failing with `Error::Io`
  /// (an `UnexpectedEof`-kind `io::Error`) if fewer bytes are available.
  fn read_sector(&mut self, sector: u64, out: &mut [u8; 2048]) -> Result<()>;

  /// Read `len` bytes starting at `sector`'s first byte, spanning as many
  /// sectors as needed. Used for directory and file extents whose
  /// `data_length` need not be sector-aligned.
  fn read_extent(&mut self, sector: u64, len: u32) -> Result<Vec<u8>>;
}

impl<T> IsoRead for T
where
  T: std::io::Read + std::io::Seek,
{
  fn read_sector(&mut self, sector: u64, out: &mut [u8; 2048]) -> Result<()> {
    use std::io::SeekFrom;
    self.seek(SeekFrom::Start(sector * SECTOR_SIZE))?;
    self.read_exact(out)?;
    Ok(())
  }

  fn read_extent(&mut self, sector: u64, len: u32) -> Result<Vec<u8>> {
    use std::io::SeekFrom;
    self.seek(SeekFrom::Start(sector * SECTOR_SIZE))?;
    let mut buf = vec![0u8; len as usize];
    self.read_exact(&mut buf).map_err(Error::Io)?;
    Ok(buf)
  }
}
