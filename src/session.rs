// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scanline sessions for software JPEG codecs.
//!
//! A codec built around the usual start / write scanlines / finish sequence
//! can hand a request to the JPU instead. [`Compress::start`] and
//! [`Decompress::start`] return `Ok(None)` when the hardware cannot serve
//! the request, the codec then continues with its own implementation.
//! Once a session exists there is no fallback, its errors are final.
//!
//! Sessions stage their frames in the handle's frame buffer.

use crate::{
    context::{Address, Handle},
    convert::nv_to_ycbcr444_row,
    decode::DecodedFrame,
    encode,
    error::{Error, Result},
    format::{EncodePath, FourCC, PixelFormat},
    stream::Sink,
};
use std::io;
use tracing::debug;

/// Turns errors meaning "the JPU cannot do this" into `None`.
fn fallback<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            e @ (Error::UnsupportedFormat(_)
            | Error::UnsupportedSampling(_)
            | Error::InvalidGeometry { .. }
            | Error::BufferTooSmall { .. }),
        ) => {
            debug!("no hardware support, falling back: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Compression of packed scanlines.
pub struct Compress<'h> {
    handle: &'h mut Handle,
    format: PixelFormat,
    width: u32,
    height: u32,
    next: u32,
}

impl<'h> Compress<'h> {
    /// Starts compressing a `width` x `height` image of packed `fourcc`
    /// scanlines.
    ///
    /// Only packed formats (RGB and Y/Cb/Cr 4:4:4) have scanlines. Planar
    /// formats, geometry the encoder cannot program and images larger than
    /// the frame buffer give `Ok(None)`.
    pub fn start(
        handle: &'h mut Handle,
        fourcc: FourCC,
        width: u32,
        height: u32,
    ) -> Result<Option<Self>> {
        let Some(format) = fallback(PixelFormat::try_from(fourcc))? else {
            return Ok(None);
        };
        if format.path() == EncodePath::Frame {
            debug!("{format} has no packed scanlines, falling back");
            return Ok(None);
        }

        let pitch = width.saturating_mul(format.bytes_per_pixel());
        let checked = encode::validate(format, width, height, pitch).and_then(|()| {
            let needed = format.frame_size(pitch, height);
            let available = handle.frame_buffer()?.size();
            if needed > available {
                return Err(Error::BufferTooSmall { needed, available });
            }
            Ok(())
        });
        if fallback(checked)?.is_none() {
            return Ok(None);
        }

        Ok(Some(Self {
            handle,
            format,
            width,
            height,
            next: 0,
        }))
    }

    fn pitch(&self) -> usize {
        (self.width * self.format.bytes_per_pixel()) as usize
    }

    /// Index of the next scanline to be written.
    pub fn next_scanline(&self) -> u32 {
        self.next
    }

    /// Copies `lines` into the frame. Returns how many were taken, lines
    /// beyond the image height are ignored.
    pub fn write_scanlines(&mut self, lines: &[&[u8]]) -> Result<u32> {
        let pitch = self.pitch();
        let take = lines.len().min((self.height - self.next) as usize);

        let mut fb = self.handle.frame_buffer()?;
        let frame = fb.as_slice_mut();
        for (i, line) in lines[..take].iter().enumerate() {
            if line.len() < pitch {
                return Err(Error::BufferTooSmall {
                    needed: pitch,
                    available: line.len(),
                });
            }
            let at = (self.next as usize + i) * pitch;
            frame[at..at + pitch].copy_from_slice(&line[..pitch]);
        }
        drop(fb);

        self.next += take as u32;
        Ok(take as u32)
    }

    /// Encodes the complete image into `sink`.
    pub fn finish(self, sink: &mut dyn Sink) -> Result<()> {
        if self.next < self.height {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} of {} scanlines written", self.next, self.height),
            )));
        }

        let pitch = self.pitch() as u32;
        self.handle.encode(
            self.format.fourcc(),
            Address::FrameBuffer,
            self.width,
            self.height,
            pitch,
            sink,
        )
    }
}

/// Decompression into packed Y/Cb/Cr 4:4:4 scanlines.
pub struct Decompress<'h> {
    handle: &'h mut Handle,
    frame: DecodedFrame,
    next: u32,
}

impl<'h> Decompress<'h> {
    /// Decodes `jpeg` into the frame buffer with rows `pitch` bytes apart.
    ///
    /// Streams the JPU cannot decode (chroma sampling, width beyond `pitch`
    /// or a frame larger than the frame buffer) give `Ok(None)`, `jpeg` is
    /// left to the caller to decode in software.
    pub fn start(handle: &'h mut Handle, jpeg: &[u8], pitch: u32) -> Result<Option<Self>> {
        let mut source = jpeg;
        let Some(frame) = fallback(handle.decode(Address::FrameBuffer, pitch, &mut source))?
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            handle,
            frame,
            next: 0,
        }))
    }

    /// Geometry and layout of the decoded frame.
    pub fn frame(&self) -> &DecodedFrame {
        &self.frame
    }

    pub fn next_scanline(&self) -> u32 {
        self.next
    }

    /// Fills `lines` with the next decoded rows, three bytes per pixel.
    /// Returns how many were filled, zero once the image is exhausted.
    pub fn read_scanlines(&mut self, lines: &mut [&mut [u8]]) -> Result<u32> {
        let width = self.frame.width as usize;
        let pitch = self.frame.pitch as usize;
        let height = self.frame.height as usize;
        let take = lines.len().min(height - self.next as usize);

        let fb = self.handle.frame_buffer()?;
        let frame = fb.as_slice();
        let chroma_plane = pitch * height;
        let chroma_len = width.next_multiple_of(2).min(pitch);

        for (i, line) in lines[..take].iter_mut().enumerate() {
            if line.len() < width * 3 {
                return Err(Error::BufferTooSmall {
                    needed: width * 3,
                    available: line.len(),
                });
            }
            let row = self.next as usize + i;
            let chroma_row = if self.frame.format.is_420() {
                row / 2
            } else {
                row
            };
            let luma = &frame[row * pitch..row * pitch + width];
            let at = chroma_plane + chroma_row * pitch;
            let chroma = &frame[at..at + chroma_len];
            nv_to_ycbcr444_row(luma, chroma, &mut line[..width * 3]);
        }

        self.next += take as u32;
        Ok(take as u32)
    }

    /// Ends the session, unread scanlines are dropped.
    pub fn finish(self) -> DecodedFrame {
        if self.next < self.frame.height {
            debug!(
                "finished with {} of {} scanlines read",
                self.next, self.frame.height
            );
        }
        self.frame
    }
}
