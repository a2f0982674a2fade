//! Snappy body expansion.

use super::error::DecompressError;

/// Largest body the decoder will expand (4 MiB).
pub const MAX_DECOMPRESSED_LEN: usize = 4 * 1024 * 1024;

/// Expand a raw Snappy block, refusing blocks that declare more than `max_len`
/// bytes of output.
///
/// # Errors
///
/// Returns [`DecompressError`] when the block is corrupt or too large.
pub fn decompress_snappy(body: &[u8], max_len: usize) -> Result<Vec<u8>, DecompressError> {
    let len = snap::raw::decompress_len(body)?;
    if len > max_len {
        return Err(DecompressError::TooLarge { len, max: max_len });
    }
    Ok(snap::raw::Decoder::new().decompress_vec(body)?)
}
