//! Zero padding between segments.

use std::io::{self, Read, Write};

use crate::config::PageSize;

/// Write the zero bytes that bring an item of `item_len` bytes up to the next
/// page boundary. Returns the number of padding bytes written.
pub fn write_padding<W: Write + ?Sized>(
    out: &mut W,
    page_size: PageSize,
    item_len: usize,
) -> io::Result<usize> {
    let count = page_size.padding_for(item_len);
    if count == 0 {
        return Ok(0);
    }

    io::copy(&mut io::repeat(0).take(count as u64), out)?;
    Ok(count)
}
