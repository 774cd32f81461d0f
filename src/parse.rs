//! Shared `nom` plumbing. The dual little/big-endian integer combinators the
//! teacher crate kept here were dropped in favor of the verifying decoders in
//! `primitives`, which check rather than discard the redundant half.

use nom::bytes::complete::take;
use nom::combinator::{map, map_res};
use nom::IResult;
use nom::Parser as _;

/// Take `n` bytes and interpret them as a trailing-space-trimmed UTF-8
/// string, as every fixed-width identifier field in a Volume Descriptor
/// does.
pub(crate) fn take_string_n(i: &[u8], n: usize) -> IResult<&[u8], &str> {
  map(map_res(take(n), std::str::from_utf8), str::trim_end).parse(i)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trims_trailing_spaces() {
    let (rest, s) = take_string_n(b"ISOPOD VOLUME           TAIL", 24).unwrap();
    assert_eq!(s, "ISOPOD VOLUME");
    assert_eq!(rest, b"TAIL");
  }

  #[test]
  fn rejects_invalid_utf8() {
    assert!(take_string_n(&[0xFF, 0xFE], 2).is_err());
  }
}
