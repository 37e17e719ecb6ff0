// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::{header, irq, pattern, Sim, DMA_PHYS, FRAME_BUFFER_SIZE};
use edgefirst_jpu::{
    context::{Address, JPU_SIZE, RELOAD_SIZE},
    error::Error,
    format::PixelFormat,
    mmio::RegisterFile,
    regs::*,
};
use std::error::Error as StdError;

#[test]
fn header_reload_done_consumes_source() -> Result<(), Box<dyn StdError>> {
    let sim = Sim::new();
    let mut handle = sim.driver.init(true)?;

    let jpeg = pattern(2 * RELOAD_SIZE + 500, 11);
    header(&sim, 320, 240, JCMOD_SAMPLING_420);
    irq(&sim, Interrupts::RELOAD, 0);
    irq(&sim, Interrupts::DONE, 0);

    let mut source: &[u8] = &jpeg;
    let frame = handle.decode(Address::FrameBuffer, 320, &mut source)?;

    assert!(source.is_empty());
    assert_eq!(frame.format, PixelFormat::Nv12);
    assert_eq!((frame.width, frame.height, frame.pitch), (320, 240, 320));
    assert_eq!(frame.size, 320 * 240 * 3 / 2);

    let data = DMA_PHYS + JPU_SIZE as u64;
    assert_eq!(frame.phys, data);

    let regs = sim.jpu.regs();
    assert_eq!(regs.read32(JIFDSA1), DMA_PHYS as u32);
    assert_eq!(regs.read32(JIFDSA2), (DMA_PHYS + RELOAD_SIZE as u64) as u32);
    assert_eq!(
        regs.read32(JIFDCNT),
        JIFDCNT_SWAP_4321 | JIFDCNT_RELOAD_ENABLE
    );
    assert_eq!(regs.read32(JIFDDYA1), data as u32);
    assert_eq!(regs.read32(JIFDDCA1), (data + 320 * 240) as u32);
    assert_eq!(regs.read32(JIFDDMW), 320);
    assert_eq!(regs.read32(JIFDDHSZ), 320);
    assert_eq!(regs.read32(JIFDDVSZ), 240);
    assert_eq!(
        regs.read32(JINTE),
        (Interrupts::HEADER | Interrupts::ERROR | Interrupts::DONE | Interrupts::RELOAD).bits()
    );

    // the drained first segment was refilled with the tail of the stream
    let dma = sim.dma();
    assert_eq!(dma.slice(0, 500), &jpeg[2 * RELOAD_SIZE..]);
    assert!(dma.slice(500, RELOAD_SIZE - 500).iter().all(|&b| b == 0));
    assert_eq!(dma.slice(RELOAD_SIZE, RELOAD_SIZE), &jpeg[RELOAD_SIZE..2 * RELOAD_SIZE]);

    assert_eq!(sim.lock.entries(), ["lock JPU", "unlock JPU"]);
    Ok(())
}

#[test]
fn decode_422_to_caller_address() -> Result<(), Box<dyn StdError>> {
    let sim = Sim::new();
    let mut handle = sim.driver.init(false)?;

    header(&sim, 64, 48, JCMOD_SAMPLING_422);
    irq(&sim, Interrupts::DONE, 0);

    let jpeg = pattern(1000, 0);
    let mut source: &[u8] = &jpeg;
    let frame = handle.decode(Address::Physical(0x6000_0000), 128, &mut source)?;

    assert_eq!(frame.format, PixelFormat::Nv16);
    assert_eq!(frame.size, 128 * 48 * 2);
    let regs = sim.jpu.regs();
    assert_eq!(regs.read32(JIFDDYA1), 0x6000_0000);
    assert_eq!(regs.read32(JIFDDCA1), 0x6000_0000 + 128 * 48);
    assert_eq!(regs.read32(JIFDDMW), 128);
    Ok(())
}

#[test]
fn unsupported_sampling_stops_engine() -> Result<(), Box<dyn StdError>> {
    let sim = Sim::new();
    let mut handle = sim.driver.init(false)?;
    header(&sim, 64, 48, 0);

    let jpeg = pattern(100, 0);
    let err = handle
        .decode(Address::FrameBuffer, 64, &mut &jpeg[..])
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedSampling(0)));
    assert_eq!(sim.jpu.regs().read32(JCCMD), JCCMD_END);
    assert_eq!(sim.lock.entries(), ["lock JPU", "unlock JPU"]);
    Ok(())
}

#[test]
fn frame_larger_than_buffer() -> Result<(), Box<dyn StdError>> {
    let sim = Sim::new();
    let mut handle = sim.driver.init(false)?;
    header(&sim, 4096, 4096, JCMOD_SAMPLING_422);

    let jpeg = pattern(100, 0);
    let err = handle
        .decode(Address::FrameBuffer, 4096, &mut &jpeg[..])
        .unwrap_err();
    match err {
        Error::BufferTooSmall { needed, available } => {
            assert_eq!(needed, 4096 * 4096 * 2);
            assert_eq!(available, FRAME_BUFFER_SIZE);
        }
        other => panic!("unexpected {other}"),
    }
    Ok(())
}

#[test]
fn decode_error_code() -> Result<(), Box<dyn StdError>> {
    let sim = Sim::new();
    let mut handle = sim.driver.init(false)?;
    header(&sim, 64, 48, JCMOD_SAMPLING_420);
    irq(&sim, Interrupts::ERROR, 0x21);

    let jpeg = pattern(100, 0);
    let err = handle
        .decode(Address::FrameBuffer, 64, &mut &jpeg[..])
        .unwrap_err();
    assert!(matches!(err, Error::Hardware(0x21)));
    Ok(())
}

#[test]
fn done_without_header() -> Result<(), Box<dyn StdError>> {
    let sim = Sim::new();
    let mut handle = sim.driver.init(false)?;
    irq(&sim, Interrupts::DONE, 0);

    let jpeg = pattern(100, 0);
    let err = handle
        .decode(Address::FrameBuffer, 64, &mut &jpeg[..])
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    Ok(())
}
