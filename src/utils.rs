//! Alignment helpers shared by the header and record codecs

use std::io::Write;

use crate::Result;

/// Every variable-length field group is padded to this many bytes
pub const ALIGNMENT: usize = 8;

const ZEROS: [u8; ALIGNMENT] = [0; ALIGNMENT];

/// Rounds `len` up to the next multiple of [`ALIGNMENT`]
#[must_use]
pub fn padded(len: usize) -> usize {
    len.next_multiple_of(ALIGNMENT)
}

/// Number of zero bytes required after `len` bytes to reach alignment
#[must_use]
pub fn padding(len: usize) -> usize {
    padded(len) - len
}

/// Writes the zero padding that follows a field group of `len` bytes
pub fn write_padding<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    writer.write_all(&ZEROS[..padding(len)])?;
    Ok(())
}
