// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hardware JPEG decoding.
//!
//! The decoder runs the encoder's reload scheme in reverse: both segments
//! are primed from the source before the start, and every RELOAD interrupt
//! hands a drained segment back for refilling. The output location is only
//! programmed once the JPU has parsed the frame header.

use crate::{
    context::{Hardware, RELOAD_SIZE},
    error::{Error, Result},
    format::PixelFormat,
    jpu::{Actions, Engine, Event, OpFlags, Operation, Segment},
    lock::{self, HardwareLock, Unit},
    mmio::RegisterFile,
    regs::{
        Interrupts, JCCMD, JCCMD_READ_RESTART, JCCMD_RESTART, JCCMD_START, JCHSZD, JCHSZU, JCMOD,
        JCMOD_DSP_DECODE, JCMOD_SAMPLING_420, JCMOD_SAMPLING_422, JCMOD_SAMPLING_MASK, JCVSZD,
        JCVSZU, JIFCNT, JIFCNT_VJSEL_JPU, JIFDCNT, JIFDCNT_RELOAD_ENABLE, JIFDCNT_SWAP_4321,
        JIFDDCA1, JIFDDHSZ, JIFDDMW, JIFDDRSZ, JIFDDVSZ, JIFDDYA1, JIFDSA1, JIFDSA2, JINTE,
    },
    stream::Source,
};
use std::{io, time::Duration};
use tracing::{debug, error, info};

/// Where and how a decoded frame was written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    /// [`PixelFormat::Nv12`] or [`PixelFormat::Nv16`].
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    /// Physical address of the luma plane, chroma follows at
    /// `pitch * height`.
    pub phys: u64,
    /// Bytes written, both planes.
    pub size: usize,
}

/// Output format for a JCMOD sampling mode.
pub fn output_format(mode: u32) -> Result<PixelFormat> {
    match mode & JCMOD_SAMPLING_MASK {
        JCMOD_SAMPLING_420 => Ok(PixelFormat::Nv12),
        JCMOD_SAMPLING_422 => Ok(PixelFormat::Nv16),
        other => Err(Error::UnsupportedSampling(other)),
    }
}

/// Programs and runs one decode under the hardware lock.
///
/// `capacity` bounds the output when decoding into the frame buffer.
#[allow(clippy::too_many_arguments)]
pub fn run(
    hw: &Hardware,
    hw_lock: &dyn HardwareLock,
    timeout: Option<Duration>,
    verbose: bool,
    phys: u64,
    capacity: Option<usize>,
    pitch: u32,
    source: &mut dyn Source,
) -> Result<DecodedFrame> {
    let output = Output {
        phys,
        capacity,
        pitch,
    };
    lock::with_units(hw_lock, &[Unit::Jpu], || {
        decode_locked(hw, timeout, verbose, &output, source)
    })
}

struct Output {
    phys: u64,
    capacity: Option<usize>,
    pitch: u32,
}

fn decode_locked(
    hw: &Hardware,
    timeout: Option<Duration>,
    verbose: bool,
    output: &Output,
    source: &mut dyn Source,
) -> Result<DecodedFrame> {
    source.init()?;

    let regs: &dyn RegisterFile = &hw.jpu_regs;
    let engine = Engine {
        regs,
        node: &*hw.jpu,
        timeout,
    };

    engine.reset();
    regs.write32(JCMOD, JCMOD_DSP_DECODE);
    regs.write32(JIFCNT, JIFCNT_VJSEL_JPU);
    regs.write32(JIFDCNT, JIFDCNT_SWAP_4321 | JIFDCNT_RELOAD_ENABLE);
    regs.write32(JIFDSA1, hw.layout.reload[0] as u32);
    regs.write32(JIFDSA2, hw.layout.reload[1] as u32);
    regs.write32(JIFDDRSZ, RELOAD_SIZE as u32);
    let ints = Interrupts::HEADER | Interrupts::ERROR | Interrupts::DONE | Interrupts::RELOAD;
    regs.write32(JINTE, ints.bits());

    let mut op = Operation::new(OpFlags::RELOAD, None);
    let mut frame = None;
    let mut chunk = vec![0u8; RELOAD_SIZE];
    let mut event = Event::Begin;
    loop {
        let t = op.apply(&event);

        if !op.is_done() {
            for segment in t.ready_segments() {
                if let Err(e) = fill(hw, &mut op, segment, &mut chunk, source) {
                    engine.abort();
                    return Err(e);
                }
            }
        }

        if op.is_done() {
            break;
        }

        if t.actions.contains(Actions::CONFIGURE_OUTPUT) {
            match configure(regs, output) {
                Ok(configured) => {
                    if verbose {
                        info!(
                            "decoding {}x{} {}",
                            configured.width, configured.height, configured.format
                        );
                    }
                    frame = Some(configured);
                    regs.write32(JCCMD, JCCMD_RESTART);
                }
                Err(e) => {
                    error!("cannot decode: {e}");
                    engine.abort();
                    return Err(e);
                }
            }
        }
        if t.actions.contains(Actions::RELOAD) {
            regs.write32(JCCMD, JCCMD_READ_RESTART);
        }
        if t.actions.contains(Actions::START) {
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

    debug!("consumed {} bytes of JPEG data", op.transferred);

    if op.error != 0 {
        error!("JPU error 0x{:x}", op.error);
        return Err(Error::Hardware(op.error));
    }

    frame.ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "stream finished without a frame header",
        ))
    })
}

/// Refills `segment` from the source, zero padding a short read.
fn fill(
    hw: &Hardware,
    op: &mut Operation,
    segment: Segment,
    chunk: &mut [u8],
    source: &mut dyn Source,
) -> Result<()> {
    let mut filled = 0;
    while filled < chunk.len() {
        let n = source.read(&mut chunk[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    chunk[filled..].fill(0);

    debug!("segment {} <- {filled} bytes", segment.mask());
    hw.dma.write_at(segment.offset(), chunk);
    op.transferred += filled;
    Ok(())
}

/// Programs the output planes from the parsed header.
fn configure(regs: &dyn RegisterFile, output: &Output) -> Result<DecodedFrame> {
    let width = ((regs.read32(JCHSZU) & 0xff) << 8) | (regs.read32(JCHSZD) & 0xff);
    let height = ((regs.read32(JCVSZU) & 0xff) << 8) | (regs.read32(JCVSZD) & 0xff);
    let format = output_format(regs.read32(JCMOD))?;

    let pitch = output.pitch;
    if width == 0 || height == 0 || pitch < width {
        return Err(Error::InvalidGeometry {
            width,
            height,
            pitch,
        });
    }

    let size = format.frame_size(pitch, height);
    if let Some(available) = output.capacity {
        if size > available {
            return Err(Error::BufferTooSmall {
                needed: size,
                available,
            });
        }
    }

    let chroma = output.phys + pitch as u64 * height as u64;
    regs.write32(JIFDDYA1, output.phys as u32);
    regs.write32(JIFDDCA1, chroma as u32);
    regs.write32(JIFDDMW, pitch);
    regs.write32(JIFDDHSZ, width);
    regs.write32(JIFDDVSZ, height);

    Ok(DecodedFrame {
        format,
        width,
        height,
        pitch,
        phys: output.phys,
        size,
    })
}
