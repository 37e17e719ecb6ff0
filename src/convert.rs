// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Source conversion into the JPU line buffers.
//!
//! Formats the JPU cannot read directly are converted strip by strip into
//! NV16 line buffers, either by the VEU or, for packed YCbCr, by the CPU.

use crate::{
    context::Layout,
    error::{Error, Result},
    format::PixelFormat,
    mmio::{MmioRegion, RegisterFile},
    regs::{
        VDACR, VDAYR, VEDWR, VEIER, VEIER_END, VESSR, VESTR, VESTR_START, VESWR, VEVTR, VRFCR,
        VRFSR, VSACR, VSAYR, VSWPR, VSWPR_DEFAULT, VTRCR, VTRCR_DST_YCBCR422, VTRCR_RGB_TO_YCBCR,
        VTRCR_SRC_RGB565, VTRCR_SRC_RGB888, VTRCR_SRC_RGBX888, VTRCR_SRC_YCBCR420,
        VTRCR_SRC_YCBCR422,
    },
    uio::DeviceNode,
};
use std::time::Duration;
use tracing::{debug, trace};

/// A rectangle of pixels in physical memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows.
    pub pitch: u32,
    /// Physical address of the first (or only) plane.
    pub luma: u64,
    /// Physical address of the chroma plane, unused for packed formats.
    pub chroma: u64,
}

/// Converts one surface into another of the same size.
pub trait Converter {
    fn convert(&mut self, src: &Surface, dst: &Surface) -> Result<()>;
}

/// Transform control bits for a VEU source format.
pub fn veu_transform(format: PixelFormat) -> Result<u32> {
    let src = match format {
        PixelFormat::Nv12 => VTRCR_SRC_YCBCR420,
        PixelFormat::Nv16 => VTRCR_SRC_YCBCR422,
        PixelFormat::Rgb16 => VTRCR_SRC_RGB565 | VTRCR_RGB_TO_YCBCR,
        PixelFormat::Rgb24 => VTRCR_SRC_RGB888 | VTRCR_RGB_TO_YCBCR,
        PixelFormat::Rgb32 => VTRCR_SRC_RGBX888 | VTRCR_RGB_TO_YCBCR,
        PixelFormat::YCbCr => return Err(Error::UnsupportedFormat(format.fourcc())),
    };
    Ok(src | VTRCR_DST_YCBCR422)
}

/// Conversion through the VEU register interface.
pub struct VeuConverter<'a> {
    regs: &'a dyn RegisterFile,
    node: &'a dyn DeviceNode,
    timeout: Option<Duration>,
}

impl<'a> VeuConverter<'a> {
    pub fn new(
        regs: &'a dyn RegisterFile,
        node: &'a dyn DeviceNode,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            regs,
            node,
            timeout,
        }
    }
}

impl Converter for VeuConverter<'_> {
    fn convert(&mut self, src: &Surface, dst: &Surface) -> Result<()> {
        let transform = veu_transform(src.format)?;
        let size = (src.height << 16) | src.width;
        trace!(
            "VEU {}x{} {:08x} -> {:08x}",
            src.width,
            src.height,
            src.luma,
            dst.luma
        );

        self.regs.write32(VESWR, src.format.pitch_pixels(src.pitch));
        self.regs.write32(VESSR, size);
        self.regs.write32(VSAYR, src.luma as u32);
        self.regs.write32(VSACR, src.chroma as u32);
        self.regs.write32(VEDWR, dst.pitch);
        self.regs.write32(VDAYR, dst.luma as u32);
        self.regs.write32(VDACR, dst.chroma as u32);
        self.regs.write32(VTRCR, transform);
        self.regs.write32(VRFCR, 0);
        self.regs.write32(VRFSR, size);
        self.regs.write32(VSWPR, VSWPR_DEFAULT);
        self.regs.write32(VEIER, VEIER_END);

        self.node.enable_interrupt()?;
        self.regs.write32(VESTR, VESTR_START);
        self.node.wait_interrupt(self.timeout)?;
        self.regs.write32(VEVTR, 0);
        Ok(())
    }
}

/// Converts one row of packed Y/Cb/Cr 4:4:4 into NV16 luma and interleaved
/// chroma rows. Chroma of each horizontal pixel pair is averaged.
pub fn ycbcr444_to_nv16_row(src: &[u8], luma: &mut [u8], chroma: &mut [u8]) {
    let width = src.len() / 3;
    for (y, px) in luma.iter_mut().zip(src.chunks_exact(3)).take(width) {
        *y = px[0];
    }

    for (c, pair) in chroma.chunks_exact_mut(2).zip(src.chunks(6)) {
        if pair.len() == 6 {
            c[0] = ((pair[1] as u16 + pair[4] as u16 + 1) / 2) as u8;
            c[1] = ((pair[2] as u16 + pair[5] as u16 + 1) / 2) as u8;
        } else if pair.len() >= 3 {
            c[0] = pair[1];
            c[1] = pair[2];
        }
    }
}

/// Expands one row of semi-planar luma and interleaved chroma into packed
/// Y/Cb/Cr 4:4:4, repeating each chroma pair for both pixels it covers.
pub fn nv_to_ycbcr444_row(luma: &[u8], chroma: &[u8], dst: &mut [u8]) {
    for (x, (px, y)) in dst.chunks_exact_mut(3).zip(luma).enumerate() {
        let c = x / 2 * 2;
        px[0] = *y;
        // a short chroma row leaves the last odd pixel neutral
        px[1] = chroma.get(c).copied().unwrap_or(0x80);
        px[2] = chroma.get(c + 1).copied().unwrap_or(0x80);
    }
}

/// CPU conversion of packed YCbCr into the line buffers.
///
/// The destination must lie in the DMA window. The source may lie anywhere,
/// a source outside the window is mapped through `/dev/mem` for the lifetime
/// of the converter.
pub struct SoftConverter<'a> {
    dma: &'a MmioRegion,
    layout: &'a Layout,
    external: Option<(u64, MmioRegion)>,
    row: Vec<u8>,
    luma: Vec<u8>,
    chroma: Vec<u8>,
}

impl<'a> SoftConverter<'a> {
    /// Prepares conversion of the `len` bytes of source at `source`.
    pub fn new(dma: &'a MmioRegion, layout: &'a Layout, source: u64, len: usize) -> Result<Self> {
        let base = layout.base;
        let inside = source >= base && source + len as u64 <= base + dma.len() as u64;
        let external = if inside {
            None
        } else {
            debug!("mapping source {source:08x}+{len:x} through /dev/mem");
            let region = MmioRegion::map_physical(source, len).map_err(|source| Error::Mapping {
                what: "source frame",
                source,
            })?;
            Some((source, region))
        };

        Ok(Self {
            dma,
            layout,
            external,
            row: Vec::new(),
            luma: Vec::new(),
            chroma: Vec::new(),
        })
    }

    fn read(&self, phys: u64, buf: &mut [u8]) {
        match &self.external {
            Some((start, region)) => region.read_at((phys - start) as usize, buf),
            None => self.dma.read_at(self.layout.offset(phys), buf),
        }
    }
}

impl Converter for SoftConverter<'_> {
    fn convert(&mut self, src: &Surface, dst: &Surface) -> Result<()> {
        if src.format != PixelFormat::YCbCr {
            return Err(Error::UnsupportedFormat(src.format.fourcc()));
        }

        let width = src.width as usize;
        let mut row = std::mem::take(&mut self.row);
        row.resize(width * 3, 0);
        self.luma.resize(width, 0);
        self.chroma.resize(width.next_multiple_of(2), 0);

        for line in 0..src.height as u64 {
            self.read(src.luma + line * src.pitch as u64, &mut row);
            ycbcr444_to_nv16_row(&row, &mut self.luma, &mut self.chroma);

            let luma = self.layout.offset(dst.luma) + line as usize * dst.pitch as usize;
            let chroma = self.layout.offset(dst.chroma) + line as usize * dst.pitch as usize;
            self.dma.write_at(luma, &self.luma);
            self.dma.write_at(chroma, &self.chroma);
        }

        self.row = row;
        Ok(())
    }
}
