// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pixel formats accepted by the encoder and how each one reaches the JPU.

use crate::error::Error;
use core::fmt;
use std::str::FromStr;

/// Four character code identifying a pixel layout (V4L2 naming).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for c in self.0 {
            if c.is_ascii_graphic() || c == b' ' {
                write!(f, "{}", c as char)?;
            } else {
                write!(f, "\\x{c:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| format!("fourcc must be exactly 4 characters: {s:?}"))?;
        Ok(FourCC(bytes))
    }
}

/// NV12 4:2:0 YUV semi-planar format
pub const NV12: FourCC = FourCC(*b"NV12");

/// NV16 4:2:2 YUV semi-planar format
pub const NV16: FourCC = FourCC(*b"NV16");

/// RGB 16-bit 5:6:5 packed format
pub const RGBP: FourCC = FourCC(*b"RGBP");

/// RGB 24-bit pixel format (8 bits per channel, no alpha)
pub const RGB3: FourCC = FourCC(*b"RGB3");

/// RGB 32-bit pixel format (8 bits per channel, unused alpha)
pub const RGB4: FourCC = FourCC(*b"RGB4");

/// Packed 24-bit Y/Cb/Cr 4:4:4, the layout of libjpeg scanlines
pub const YUV3: FourCC = FourCC(*b"YUV3");

/// Source formats the encoder can program.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Nv12,
    Nv16,
    Rgb16,
    Rgb24,
    Rgb32,
    YCbCr,
}

/// How a source format is fed to the JPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EncodePath {
    /// The JPU reads the caller's buffer directly.
    Frame,
    /// Strips are converted into the line buffers by the VEU.
    Veu,
    /// Strips are converted into the line buffers by the CPU.
    Software,
}

impl TryFrom<FourCC> for PixelFormat {
    type Error = Error;

    fn try_from(fourcc: FourCC) -> Result<Self, Self::Error> {
        match fourcc {
            NV12 => Ok(PixelFormat::Nv12),
            NV16 => Ok(PixelFormat::Nv16),
            RGBP => Ok(PixelFormat::Rgb16),
            RGB3 => Ok(PixelFormat::Rgb24),
            RGB4 => Ok(PixelFormat::Rgb32),
            YUV3 => Ok(PixelFormat::YCbCr),
            _ => Err(Error::UnsupportedFormat(fourcc)),
        }
    }
}

impl PixelFormat {
    pub fn fourcc(self) -> FourCC {
        match self {
            PixelFormat::Nv12 => NV12,
            PixelFormat::Nv16 => NV16,
            PixelFormat::Rgb16 => RGBP,
            PixelFormat::Rgb24 => RGB3,
            PixelFormat::Rgb32 => RGB4,
            PixelFormat::YCbCr => YUV3,
        }
    }

    /// Bytes per pixel of the first (or only) plane.
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Nv12 | PixelFormat::Nv16 => 1,
            PixelFormat::Rgb16 => 2,
            PixelFormat::Rgb24 | PixelFormat::YCbCr => 3,
            PixelFormat::Rgb32 => 4,
        }
    }

    /// Only NV12 is encoded with 4:2:0 subsampling, everything else as 4:2:2.
    pub const fn is_420(self) -> bool {
        matches!(self, PixelFormat::Nv12)
    }

    pub const fn path(self) -> EncodePath {
        match self {
            PixelFormat::Nv12 | PixelFormat::Nv16 => EncodePath::Frame,
            PixelFormat::YCbCr => EncodePath::Software,
            PixelFormat::Rgb16 | PixelFormat::Rgb24 | PixelFormat::Rgb32 => EncodePath::Veu,
        }
    }

    /// Size in bytes of a full frame with the given pitch, saturating at
    /// `usize::MAX` where the address space cannot hold it.
    pub fn frame_size(self, pitch: u32, height: u32) -> usize {
        let luma = pitch as u64 * height as u64;
        let size = match self {
            PixelFormat::Nv12 => luma.saturating_add(luma / 2),
            PixelFormat::Nv16 => luma.saturating_mul(2),
            _ => luma,
        };
        usize::try_from(size).unwrap_or(usize::MAX)
    }

    /// Pitch expressed in pixels, as the VEU expects it.
    pub const fn pitch_pixels(self, pitch: u32) -> u32 {
        pitch / self.bytes_per_pixel()
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}
