//! Little-endian read helpers shared by the index and header parsers.

use std::io::{self, Read};

pub fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads and compares magic bytes. `Ok(false)` means the bytes were read but
/// did not match; `Err` means the reader ended early.
pub fn check_magic<R: Read>(r: &mut R, want: &[u8]) -> io::Result<bool> {
    let mut got = vec![0u8; want.len()];
    r.read_exact(&mut got)?;
    Ok(got == want)
}

/// Reads and discards exactly `n` bytes.
pub fn skip<R: Read>(r: &mut R, n: u64) -> io::Result<()> {
    let copied = io::copy(&mut r.by_ref().take(n), &mut io::sink())?;
    if copied < n {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}
