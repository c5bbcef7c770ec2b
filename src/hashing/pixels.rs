use crate::error::{Result, ScrollshotError};

/// Decoded image as row-major RGBA, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ScrollshotError::InvalidPixelBuffer {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decodes any format `image` understands (captures arrive as JPEG).
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(encoded)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            data: rgba.into_raw(),
        })
    }

    /// Every pixel set to the same RGBA value.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// R+G+B of the pixel, or 765 (white) when it is fully transparent.
    #[inline]
    pub(crate) fn luminance_sum(&self, x: usize, y: usize) -> u32 {
        let i = (y * self.width as usize + x) * 4;
        let px = &self.data[i..i + 4];
        if px[3] == 0 {
            765
        } else {
            px[0] as u32 + px[1] as u32 + px[2] as u32
        }
    }
}
