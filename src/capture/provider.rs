use async_trait::async_trait;
use image::{codecs::jpeg::JpegEncoder, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{Result, ScrollshotError};
use crate::hashing::PixelBuffer;

const JPEG_QUALITY: u8 = 100;

/// Marked rectangle in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureArea {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.saturating_add(self.width) <= width
            && self.y.saturating_add(self.height) <= height
    }
}

/// Parses `x,y,width,height`.
impl FromStr for CaptureArea {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| format!("invalid capture area `{s}`: {err}"))?;
        match parts[..] {
            [x, y, width, height] => Ok(Self::new(x, y, width, height)),
            _ => Err(format!("capture area `{s}` must be x,y,width,height")),
        }
    }
}

impl fmt::Display for CaptureArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// The display the area was marked on: platform id plus its position in the display list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTarget {
    pub id: String,
    pub index: usize,
}

impl DisplayTarget {
    pub fn new(id: impl Into<String>, index: usize) -> Self {
        Self {
            id: id.into(),
            index,
        }
    }
}

/// Something a capture backend can grab stills from, tagged with the display it shows.
#[derive(Debug, Clone)]
pub struct DisplaySource<T> {
    pub display_id: String,
    pub name: String,
    pub content: T,
}

/// Picks the source showing `target`: by display id, then by index, else fails.
pub fn find_source_by_display<'a, T>(
    sources: &'a [DisplaySource<T>],
    target: &DisplayTarget,
) -> Result<&'a DisplaySource<T>> {
    sources
        .iter()
        .find(|source| source.display_id == target.id)
        .or_else(|| sources.get(target.index))
        .ok_or_else(|| {
            ScrollshotError::CaptureProvider(format!(
                "screen was not found (display {} at index {})",
                target.id, target.index
            ))
        })
}

/// Encoded still as returned by a capture backend.
#[derive(Debug, Clone)]
pub struct CapturedStill {
    pub bytes: Vec<u8>,
    pub source_label: String,
}

/// A still plus its decoded pixels, alive for one loop tick.
#[derive(Debug)]
pub struct CaptureFrame {
    pub bytes: Vec<u8>,
    pub source_label: String,
    pub pixels: PixelBuffer,
}

impl CaptureFrame {
    pub fn decode(still: CapturedStill) -> Result<Self> {
        let pixels = PixelBuffer::decode(&still.bytes)?;
        Ok(Self {
            bytes: still.bytes,
            source_label: still.source_label,
            pixels,
        })
    }

    pub fn size_kb(&self) -> usize {
        self.bytes.len() / 1024
    }
}

/// Host capability that grabs the marked area of a display.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn capture(&self, display: &DisplayTarget, area: &CaptureArea) -> Result<CapturedStill>;
}

/// Crops a full display still to `area` and encodes it as a maximum quality JPEG.
pub fn encode_area(full: &DynamicImage, area: &CaptureArea) -> Result<Vec<u8>> {
    let (width, height) = full.dimensions();
    if !area.fits_within(width, height) {
        return Err(ScrollshotError::CaptureProvider(format!(
            "capture area {area} lies outside the {width}x{height} display"
        )));
    }

    let cropped = full.crop_imm(area.x, area.y, area.width, area.height).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&cropped)?;
    Ok(bytes)
}
