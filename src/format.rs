// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Image format descriptions shared by tasks, canvases and the hardware interface.

use std::fmt;
use std::fmt::Display;

use enumn::N;

use crate::error::Error;
use crate::error::Result;

#[derive(PartialEq, Eq, PartialOrd, Ord, N, Clone, Copy, Debug, Hash)]
#[repr(u32)]
pub enum PixelFormat {
    /// 4:2:0 with a full-resolution Y plane followed by an interleaved UV plane.
    Nv12 = 1,
    /// 4:2:0 with three separate planes. Described but not processed by GE2D.
    I420 = 2,
    /// 32-bit RGBA, used for watermark images.
    Rgba8888 = 3,
}

impl PixelFormat {
    /// Formats the GE2D block can read and write.
    pub fn is_supported(self) -> bool {
        matches!(self, PixelFormat::Nv12 | PixelFormat::Rgba8888)
    }

    /// Bytes used by one pixel in the first plane.
    pub fn luma_bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Nv12 | PixelFormat::I420 => 1,
            PixelFormat::Rgba8888 => 4,
        }
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        PixelFormat::n(raw).ok_or(Error::InvalidArgs("unknown pixel format"))
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use PixelFormat::*;
        match self {
            Nv12 => write!(f, "NV12"),
            I420 => write!(f, "I420"),
            Rgba8888 => write!(f, "RGBA8888"),
        }
    }
}

/// Layout of one plane inside a buffer.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct PlaneLayout {
    pub offset: u64,
    /// Bytes per row.
    pub stride: u32,
    pub height: u32,
}

impl PlaneLayout {
    pub fn size(&self) -> u64 {
        self.stride as u64 * self.height as u64
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ImageFormat {
    pub pixel_format: PixelFormat,
    pub coded_width: u32,
    pub coded_height: u32,
    pub bytes_per_row: u32,
}

impl ImageFormat {
    /// Builds a format with the tightest row pitch for `pixel_format`.
    pub fn new(pixel_format: PixelFormat, coded_width: u32, coded_height: u32) -> Self {
        ImageFormat {
            pixel_format,
            coded_width,
            coded_height,
            bytes_per_row: coded_width * pixel_format.luma_bytes_per_pixel(),
        }
    }

    /// Checks that the format describes a non-empty image the hardware can address.
    pub fn validate(&self) -> Result<()> {
        if !self.pixel_format.is_supported() {
            return Err(Error::InvalidArgs("unsupported pixel format"));
        }
        if self.coded_width == 0 || self.coded_height == 0 {
            return Err(Error::InvalidArgs("image has no pixels"));
        }
        let min_row = self.coded_width as u64 * self.pixel_format.luma_bytes_per_pixel() as u64;
        if (self.bytes_per_row as u64) < min_row {
            return Err(Error::InvalidArgs("bytes per row smaller than the image width"));
        }
        Ok(())
    }

    /// Returns the plane layout of a buffer holding an image in this format.
    pub fn planes(&self) -> Vec<PlaneLayout> {
        let stride = self.bytes_per_row;
        let height = self.coded_height;
        // Chroma is subsampled vertically; odd heights get one extra chroma row.
        let half_height = (height + 1) / 2;
        let luma = PlaneLayout {
            offset: 0,
            stride,
            height,
        };
        match self.pixel_format {
            PixelFormat::Rgba8888 => vec![luma],
            PixelFormat::Nv12 => vec![
                luma,
                PlaneLayout {
                    offset: luma.size(),
                    stride,
                    height: half_height,
                },
            ],
            PixelFormat::I420 => {
                let chroma_stride = (stride + 1) / 2;
                let u = PlaneLayout {
                    offset: luma.size(),
                    stride: chroma_stride,
                    height: half_height,
                };
                let v = PlaneLayout {
                    offset: u.offset + u.size(),
                    ..u
                };
                vec![luma, u, v]
            }
        }
    }

    /// Minimum size in bytes of a buffer holding an image in this format.
    pub fn buffer_size(&self) -> u64 {
        self.planes()
            .last()
            .map(|p| p.offset + p.size())
            .unwrap_or(0)
    }

    /// The whole image as a rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.coded_width, self.coded_height)
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}x{} ({} bytes/row)",
            self.pixel_format, self.coded_width, self.coded_height, self.bytes_per_row
        )
    }
}

/// Checks a client-supplied format table and the index selected in it.
pub fn validate_format_table(table: &[ImageFormat], index: u32) -> Result<()> {
    if table.is_empty() {
        return Err(Error::InvalidArgs("empty image format table"));
    }
    if index as usize >= table.len() {
        return Err(Error::InvalidArgs("image format index out of range"));
    }
    table.iter().try_for_each(ImageFormat::validate)
}

/// Size of the largest buffer needed by any format in `table`.
pub fn max_buffer_size(table: &[ImageFormat]) -> u64 {
    table.iter().map(ImageFormat::buffer_size).max().unwrap_or(0)
}

/// A rectangle in pixels.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle is non-empty and lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && (self.x as u64 + self.width as u64) <= width as u64
            && (self.y as u64 + self.height as u64) <= height as u64
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Whether the rotation exchanges the image width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}
