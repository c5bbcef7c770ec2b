use super::blockhash::BlockHash;
use crate::error::{Result, ScrollshotError};

/// Number of differing bits between two hashes of the same length.
pub fn distance(a: &BlockHash, b: &BlockHash) -> Result<u32> {
    if a.len() != b.len() {
        return Err(ScrollshotError::HashLengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    Ok(a.as_str()
        .bytes()
        .zip(b.as_str().bytes())
        .map(|(x, y)| (nibble(x) ^ nibble(y)).count_ones())
        .sum())
}

fn nibble(hex: u8) -> u8 {
    match hex {
        b'0'..=b'9' => hex - b'0',
        b'a'..=b'f' => hex - b'a' + 10,
        b'A'..=b'F' => hex - b'A' + 10,
        _ => 0,
    }
}
