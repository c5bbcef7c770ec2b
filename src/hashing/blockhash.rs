//! Block-mean-value perceptual hash.
//!
//! The image is split into a `bits × bits` grid, each block's luminance is
//! summed, and every block becomes one bit by comparing it against the median
//! of its horizontal band. Visually similar frames end up a small hamming
//! distance apart, which is what the capture loop needs to tell a scrolled
//! frame from a repaint of the same content.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::pixels::PixelBuffer;
use crate::error::{Result, ScrollshotError};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// How pixels are assigned to blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HashVariant {
    /// Whole pixels per block; any remainder rows/columns are ignored.
    Even,
    /// Pixels straddling a block edge are shared between neighbours by overlap.
    /// Falls back to `Even` when both dimensions divide by `bits`.
    #[default]
    Interpolated,
}

impl HashVariant {
    /// Blockhash method codes: 1 = even, 2 = interpolated.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(HashVariant::Even),
            2 => Ok(HashVariant::Interpolated),
            other => Err(ScrollshotError::UnsupportedHashVariant(other.to_string())),
        }
    }
}

impl FromStr for HashVariant {
    type Err = ScrollshotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "even" | "1" => Ok(HashVariant::Even),
            "interpolated" | "2" => Ok(HashVariant::Interpolated),
            other => Err(ScrollshotError::UnsupportedHashVariant(other.to_string())),
        }
    }
}

/// Hex-encoded hash, one nibble per four blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockHash(String);

impl BlockHash {
    pub fn from_hex(hex: &str) -> Result<Self> {
        hex.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in hex characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bit_len(&self) -> usize {
        self.0.len() * 4
    }
}

impl FromStr for BlockHash {
    type Err = ScrollshotError;

    fn from_str(s: &str) -> Result<Self> {
        if s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(BlockHash(s.to_ascii_lowercase()))
        } else {
            Err(ScrollshotError::InvalidHash(s.to_string()))
        }
    }
}

impl TryFrom<String> for BlockHash {
    type Error = ScrollshotError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BlockHash> for String {
    fn from(hash: BlockHash) -> Self {
        hash.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes `image` into a `bits² / 4` character hex string.
///
/// `bits` must be a positive even number; hashes are only comparable when they
/// were produced with the same value.
pub fn hash(image: &PixelBuffer, bits: u32, variant: HashVariant) -> BlockHash {
    assert!(
        bits >= 2 && bits % 2 == 0,
        "hash bits must be a positive even number, got {bits}"
    );

    let evenly_divisible = image.width() % bits == 0 && image.height() % bits == 0;
    let grid = match variant {
        HashVariant::Even => BlockGrid::even(image, bits),
        HashVariant::Interpolated if evenly_divisible => BlockGrid::even(image, bits),
        HashVariant::Interpolated => BlockGrid::interpolated(image, bits),
    };

    bits_to_hex(&grid.into_bits())
}

/// Summed luminance per block, row-major.
struct BlockGrid {
    blocks: Vec<f64>,
    pixels_per_block: f64,
}

impl BlockGrid {
    fn even(image: &PixelBuffer, bits: u32) -> Self {
        let n = bits as usize;
        let block_w = image.width() as usize / n;
        let block_h = image.height() as usize / n;

        let mut blocks = Vec::with_capacity(n * n);
        for by in 0..n {
            for bx in 0..n {
                let mut total: u64 = 0;
                for iy in 0..block_h {
                    for ix in 0..block_w {
                        total += image.luminance_sum(bx * block_w + ix, by * block_h + iy) as u64;
                    }
                }
                blocks.push(total as f64);
            }
        }

        Self {
            blocks,
            pixels_per_block: (block_w * block_h) as f64,
        }
    }

    fn interpolated(image: &PixelBuffer, bits: u32) -> Self {
        let n = bits as usize;
        let width = image.width() as usize;
        let height = image.height() as usize;
        let block_w = width as f64 / n as f64;
        let block_h = height as f64 / n as f64;

        let columns: Vec<AxisSpan> = (0..width)
            .map(|x| AxisSpan::new(x, width, block_w, width % n == 0, n - 1))
            .collect();

        let mut blocks = vec![0.0f64; n * n];
        for y in 0..height {
            let row = AxisSpan::new(y, height, block_h, height % n == 0, n - 1);
            for (x, col) in columns.iter().enumerate() {
                let value = image.luminance_sum(x, y) as f64;
                blocks[row.near * n + col.near] += value * row.near_weight * col.near_weight;
                blocks[row.near * n + col.far] += value * row.near_weight * col.far_weight;
                blocks[row.far * n + col.near] += value * row.far_weight * col.near_weight;
                blocks[row.far * n + col.far] += value * row.far_weight * col.far_weight;
            }
        }

        Self {
            blocks,
            pixels_per_block: block_w * block_h,
        }
    }

    /// One bit per block against the median of its quarter of the grid.
    ///
    /// Blocks equal to the median become 1 only when the median sits in the
    /// bright half of the value range, so single-tone images do not collapse
    /// to all zeros.
    fn into_bits(self) -> Vec<bool> {
        let half_block_value = self.pixels_per_block * 256.0 * 3.0 / 2.0;
        let band_len = self.blocks.len() / 4;

        let mut bits = Vec::with_capacity(self.blocks.len());
        for band in self.blocks.chunks(band_len) {
            let m = median(band);
            bits.extend(
                band.iter()
                    .map(|&v| v > m || ((v - m).abs() < 1.0 && m > half_block_value)),
            );
        }
        bits
    }
}

/// Which block(s) a pixel row or column falls into along one axis.
#[derive(Debug, Clone, Copy)]
struct AxisSpan {
    near: usize,
    far: usize,
    near_weight: f64,
    far_weight: f64,
}

impl AxisSpan {
    fn new(i: usize, len: usize, block: f64, even: bool, last: usize) -> Self {
        let pos = i as f64 / block;
        if even {
            let b = (pos.floor() as usize).min(last);
            return Self {
                near: b,
                far: b,
                near_weight: 1.0,
                far_weight: 0.0,
            };
        }

        let m = (i + 1) as f64 % block;
        let frac = m - m.floor();
        let whole = m - frac;

        let near = (pos.floor() as usize).min(last);
        // whole is zero on block boundaries and on the last pixel
        let far = if whole > 0.0 || i + 1 == len {
            near
        } else {
            (pos.ceil() as usize).min(last)
        };

        Self {
            near,
            far,
            near_weight: 1.0 - frac,
            far_weight: frac,
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn bits_to_hex(bits: &[bool]) -> BlockHash {
    let hex = bits
        .chunks(4)
        .map(|nibble| {
            let value = nibble.iter().fold(0usize, |acc, &bit| (acc << 1) | bit as usize);
            HEX_DIGITS[value] as char
        })
        .collect();
    BlockHash(hex)
}
