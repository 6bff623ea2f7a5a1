//! Dynamic-width integer codec (LEB128 varints and ZigZag signed values)
//!
//! Small values take one byte, which keeps tile arenas compact. The `try_*`
//! readers are used on untrusted streams; the plain readers are used on
//! arenas that were validated when loaded and panic on malformed bytes.

/// Why a varint could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarintError {
    #[error("varint truncated at offset {0}")]
    Truncated(usize),
    #[error("varint at offset {0} overflows")]
    Overflow(usize),
}

/// Appends `v` as an unsigned varint
pub fn write_u64(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn write_u32(out: &mut Vec<u8>, v: u32) {
    write_u64(out, u64::from(v));
}

/// Appends `v` ZigZag-encoded
pub fn write_i64(out: &mut Vec<u8>, v: i64) {
    write_u64(out, ((v << 1) ^ (v >> 63)) as u64);
}

/// Number of bytes `v` occupies when encoded
pub fn encoded_len(mut v: u64) -> usize {
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Decodes an unsigned varint at `*off`, advancing the offset
pub fn try_read_u64(src: &[u8], off: &mut usize) -> Result<u64, VarintError> {
    let start = *off;
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *src.get(*off).ok_or(VarintError::Truncated(start))?;
        *off += 1;
        let payload = u64::from(byte & 0x7f);
        if shift == 63 && payload > 1 {
            return Err(VarintError::Overflow(start));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 63 {
            return Err(VarintError::Overflow(start));
        }
    }
}

pub fn try_read_u32(src: &[u8], off: &mut usize) -> Result<u32, VarintError> {
    let start = *off;
    let v = try_read_u64(src, off)?;
    u32::try_from(v).map_err(|_| VarintError::Overflow(start))
}

pub fn try_read_i64(src: &[u8], off: &mut usize) -> Result<i64, VarintError> {
    let zigzag = try_read_u64(src, off)?;
    Ok(((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64))
}

/// Decodes an unsigned varint from a validated arena
///
/// # Panics
/// If the bytes at `*off` are not a valid varint.
pub fn read_u64(src: &[u8], off: &mut usize) -> u64 {
    match try_read_u64(src, off) {
        Ok(v) => v,
        Err(e) => panic!("arena corrupted: {e}"),
    }
}

/// # Panics
/// If the bytes at `*off` are not a valid `u32` varint.
pub fn read_u32(src: &[u8], off: &mut usize) -> u32 {
    match try_read_u32(src, off) {
        Ok(v) => v,
        Err(e) => panic!("arena corrupted: {e}"),
    }
}

/// # Panics
/// If the bytes at `*off` are not a valid varint.
pub fn read_i64(src: &[u8], off: &mut usize) -> i64 {
    match try_read_i64(src, off) {
        Ok(v) => v,
        Err(e) => panic!("arena corrupted: {e}"),
    }
}
