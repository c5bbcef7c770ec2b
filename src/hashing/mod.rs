mod blockhash;
mod distance;
mod pixels;

pub use blockhash::{hash, BlockHash, HashVariant};
pub use distance::distance;
pub use pixels::PixelBuffer;

/// Decodes an encoded still and hashes it in one step, the way every captured frame is processed.
pub fn hash_encoded(encoded: &[u8], bits: u32, variant: HashVariant) -> crate::error::Result<BlockHash> {
    let pixels = PixelBuffer::decode(encoded)?;
    Ok(hash(&pixels, bits, variant))
}
