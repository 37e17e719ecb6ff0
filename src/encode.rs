// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hardware JPEG encoding.
//!
//! NV12 and NV16 frames are read by the JPU directly ("frame mode"). Other
//! formats are converted strip by strip into the two line buffers, the JPU
//! asks for the next strip with a LINEBUF interrupt whenever it has consumed
//! one. Coded data always leaves through the two reload segments.

use crate::{
    context::{
        Hardware, Layout, LINEBUFFER_HEIGHT, LINEBUFFER_PITCH, LINEBUFFER_SIZE_Y, RELOAD_SIZE,
    },
    convert::{Converter, SoftConverter, Surface, VeuConverter},
    error::{Error, Result},
    format::{EncodePath, PixelFormat},
    jpu::{Actions, Engine, Event, OpFlags, Operation, Segment, Strips},
    lock::{self, HardwareLock, Unit},
    mmio::RegisterFile,
    regs::{
        coded_data_amount, init_huffman_tables, init_quantization_tables, Interrupts, JCCMD,
        JCCMD_LCMD1, JCCMD_LCMD2, JCCMD_START, JCCMD_WRITE_RESTART, JCDRID, JCDRIU, JCHSZD,
        JCHSZU, JCHTN, JCMOD, JCMOD_DSP_ENCODE, JCMOD_INPUT_CTRL, JCMOD_SAMPLING_420,
        JCMOD_SAMPLING_422, JCQTN, JCVSZD, JCVSZU, JIFCNT, JIFCNT_VJSEL_JPU, JIFDCNT,
        JIFDCNT_SWAP_4321, JIFECNT, JIFECNT_420, JIFECNT_LINEBUF_MODE, JIFECNT_LINES_SHIFT,
        JIFECNT_RELOAD_ENABLE, JIFECNT_SWAP_4321, JIFEDA1, JIFEDA2, JIFEDRSZ, JIFESCA1,
        JIFESCA2, JIFESHSZ, JIFESMW, JIFESVSZ, JIFESYA1, JIFESYA2, JINTE,
    },
    stream::Sink,
};
use std::time::Duration;
use tracing::{debug, error, info};

/// Largest width or height the size registers hold.
pub const MAX_DIMENSION: u32 = 0xffff;

/// One frame to encode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Encode {
    pub format: PixelFormat,
    /// Physical address of the first line.
    pub phys: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per line of the first plane.
    pub pitch: u32,
}

/// Checks that the geometry can be programmed for `format`.
pub fn validate(format: PixelFormat, width: u32, height: u32, pitch: u32) -> Result<()> {
    let invalid = Error::InvalidGeometry {
        width,
        height,
        pitch,
    };

    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(invalid);
    }
    if (pitch as u64) < width as u64 * format.bytes_per_pixel() as u64 {
        return Err(invalid);
    }
    if format.path() != EncodePath::Frame && width > LINEBUFFER_PITCH {
        return Err(invalid);
    }
    Ok(())
}

/// Programs and runs one encode under the hardware lock.
pub fn run(
    hw: &Hardware,
    hw_lock: &dyn HardwareLock,
    timeout: Option<Duration>,
    verbose: bool,
    job: &Encode,
    sink: &mut dyn Sink,
) -> Result<()> {
    let units: &[Unit] = match job.format.path() {
        EncodePath::Veu => &[Unit::Jpu, Unit::Veu],
        EncodePath::Frame | EncodePath::Software => &[Unit::Jpu],
    };

    lock::with_units(hw_lock, units, || encode_locked(hw, timeout, verbose, job, sink))
}

/// Writes the mode, size, interface and interrupt registers for `job`.
pub fn program(regs: &dyn RegisterFile, layout: &Layout, job: &Encode) {
    let sampling = if job.format.is_420() {
        JCMOD_SAMPLING_420
    } else {
        JCMOD_SAMPLING_422
    };
    let mode420 = if job.format.is_420() { JIFECNT_420 } else { 0 };

    regs.write32(JCMOD, JCMOD_INPUT_CTRL | JCMOD_DSP_ENCODE | sampling);
    regs.write32(JCQTN, 0x14);
    regs.write32(JCHTN, 0x3c);
    regs.write32(JCDRIU, 0x02);
    regs.write32(JCDRID, 0x00);
    regs.write32(JCHSZU, job.width >> 8);
    regs.write32(JCHSZD, job.width & 0xff);
    regs.write32(JCVSZU, job.height >> 8);
    regs.write32(JCVSZD, job.height & 0xff);
    regs.write32(JIFCNT, JIFCNT_VJSEL_JPU);
    regs.write32(JIFDCNT, JIFDCNT_SWAP_4321);
    regs.write32(JIFEDA1, layout.reload[0] as u32);
    regs.write32(JIFEDA2, layout.reload[1] as u32);
    regs.write32(JIFEDRSZ, RELOAD_SIZE as u32);
    regs.write32(JIFESHSZ, job.width);
    regs.write32(JIFESVSZ, job.height);

    let done = Interrupts::TRANSFER_DONE | Interrupts::LOADED;
    if job.format.path() == EncodePath::Frame {
        regs.write32(JINTE, done.bits());
        regs.write32(
            JIFECNT,
            JIFECNT_SWAP_4321 | JIFECNT_RELOAD_ENABLE | mode420,
        );
        let chroma = job.phys + job.pitch as u64 * job.height as u64;
        regs.write32(JIFESYA1, job.phys as u32);
        regs.write32(JIFESCA1, chroma as u32);
        regs.write32(JIFESMW, job.pitch);
    } else {
        let lines = done | Interrupts::LINEBUF0 | Interrupts::LINEBUF1;
        regs.write32(JINTE, lines.bits());
        regs.write32(
            JIFECNT,
            JIFECNT_LINEBUF_MODE
                | (LINEBUFFER_HEIGHT << JIFECNT_LINES_SHIFT)
                | JIFECNT_SWAP_4321
                | JIFECNT_RELOAD_ENABLE
                | mode420,
        );
        let [lb1, lb2] = layout.line_buffers;
        regs.write32(JIFESYA1, lb1 as u32);
        regs.write32(JIFESCA1, (lb1 + LINEBUFFER_SIZE_Y as u64) as u32);
        regs.write32(JIFESYA2, lb2 as u32);
        regs.write32(JIFESCA2, (lb2 + LINEBUFFER_SIZE_Y as u64) as u32);
        regs.write32(JIFESMW, LINEBUFFER_PITCH);
    }
}

fn encode_locked(
    hw: &Hardware,
    timeout: Option<Duration>,
    verbose: bool,
    job: &Encode,
    sink: &mut dyn Sink,
) -> Result<()> {
    sink.init()?;

    let regs: &dyn RegisterFile = &hw.jpu_regs;
    let engine = Engine {
        regs,
        node: &*hw.jpu,
        timeout,
    };

    let mut flags = OpFlags::ENCODE | OpFlags::RELOAD;
    let mut converter: Option<Box<dyn Converter + '_>> = None;
    match job.format.path() {
        EncodePath::Frame => {}
        EncodePath::Veu => {
            flags |= OpFlags::LINE_BUFFER | OpFlags::CONVERT;
            converter = Some(Box::new(VeuConverter::new(
                &hw.veu_regs,
                &*hw.veu,
                timeout,
            )));
        }
        EncodePath::Software => {
            flags |= OpFlags::LINE_BUFFER | OpFlags::SOFT_CONVERT;
            let len = job.format.frame_size(job.pitch, job.height);
            converter = Some(Box::new(SoftConverter::new(
                &hw.dma,
                &hw.layout,
                job.phys,
                len,
            )?));
        }
    }
    let strips = flags
        .contains(OpFlags::LINE_BUFFER)
        .then(|| Strips::new(job.phys, job.pitch, job.height));

    engine.reset();
    program(regs, &hw.layout, job);
    init_quantization_tables(regs);
    init_huffman_tables(regs);

    debug!(
        "encoding {} {}x{} pitch {} from {:08x}",
        job.format, job.width, job.height, job.pitch, job.phys
    );

    let mut op = Operation::new(flags, strips);
    let mut event = Event::Begin;
    loop {
        let t = op.apply(&event);

        for segment in t.ready_segments() {
            if let Err(e) = deliver(hw, &mut op, segment, verbose, sink) {
                engine.abort();
                return Err(e);
            }
        }

        if op.is_done() {
            break;
        }

        let starting = t.actions.contains(Actions::START);
        for (action, index, cmd) in [
            (Actions::REFILL_LB0, 0, JCCMD_LCMD1),
            (Actions::REFILL_LB1, 1, JCCMD_LCMD2),
        ] {
            if !t.actions.contains(action) {
                continue;
            }
            let Some(converter) = converter.as_deref_mut() else {
                continue;
            };
            let refilled = match refill(&hw.layout, &mut op, converter, job, index) {
                Ok(refilled) => refilled,
                Err(e) => {
                    engine.abort();
                    return Err(e);
                }
            };
            if refilled && !starting {
                regs.write32(JCCMD, cmd);
            }
        }

        if t.actions.contains(Actions::RELOAD) {
            regs.write32(JCCMD, JCCMD_WRITE_RESTART);
        }
        if starting {
            regs.write32(JCCMD, JCCMD_START);
        }

        event = match engine.wait_event() {
            Ok(event) => event,
            Err(e) => {
                error!("waiting for the JPU failed: {e}");
                engine.abort();
                return Err(e);
            }
        };
    }

    let coded = coded_data_amount(regs);
    if verbose {
        info!("coded data amount: = {coded:5} (written: {})", op.transferred);
    } else {
        debug!("coded data amount: = {coded:5} (written: {})", op.transferred);
    }

    if op.error != 0 {
        error!("JPU error 0x{:x}", op.error);
        return Err(Error::Hardware(op.error));
    }
    Ok(())
}

/// Hands the new coded bytes of `segment` to the sink.
fn deliver(
    hw: &Hardware,
    op: &mut Operation,
    segment: Segment,
    verbose: bool,
    sink: &mut dyn Sink,
) -> Result<()> {
    let amount = coded_data_amount(&hw.jpu_regs)
        .saturating_sub(op.transferred)
        .min(RELOAD_SIZE);
    if verbose {
        info!("coded data amount: + {amount:5} (buffer {})", segment.mask());
    } else {
        debug!("coded data amount: + {amount:5} (buffer {})", segment.mask());
    }
    if amount == 0 {
        return Ok(());
    }

    let accepted = sink.write(hw.dma.slice(segment.offset(), amount))?;
    op.transferred += accepted.min(amount);
    Ok(())
}

/// Converts the next strip into line buffer `index`. Returns false once the
/// frame is exhausted.
fn refill(
    layout: &Layout,
    op: &mut Operation,
    converter: &mut dyn Converter,
    job: &Encode,
    index: usize,
) -> Result<bool> {
    let Some((addr, lines)) = op.strips.as_mut().and_then(Iterator::next) else {
        return Ok(false);
    };

    let chroma_offset = job.pitch as u64 * job.height as u64;
    let src = Surface {
        format: job.format,
        width: job.width,
        height: lines,
        pitch: job.pitch,
        luma: addr,
        chroma: addr + chroma_offset,
    };
    let lb = layout.line_buffers[index];
    let dst = Surface {
        format: PixelFormat::Nv16,
        width: job.width,
        height: lines,
        pitch: LINEBUFFER_PITCH,
        luma: lb,
        chroma: lb + LINEBUFFER_SIZE_Y as u64,
    };

    debug!("strip {addr:08x} ({lines} lines) -> line buffer {}", index + 1);
    converter.convert(&src, &dst)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry() {
        assert!(validate(PixelFormat::Nv12, 1920, 1080, 1920).is_ok());
        assert!(validate(PixelFormat::Nv12, 0, 1080, 1920).is_err());
        assert!(validate(PixelFormat::Nv12, 1920, 0x1_0000, 1920).is_err());
        assert!(validate(PixelFormat::Rgb24, 1920, 1080, 1920).is_err());
        assert!(validate(PixelFormat::Rgb24, 1920, 1080, 1920 * 3).is_ok());
        // frame mode is not bound by the line buffer width
        assert!(validate(PixelFormat::Nv16, 4096, 16, 4096).is_ok());
        assert!(validate(PixelFormat::Rgb32, 4096, 16, 4096 * 4).is_err());
    }
}
