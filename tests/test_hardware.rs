// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Tests against the real JPU. They need the UIO devices and lock directory
//! of an SH-Mobile target and are ignored elsewhere.

use edgefirst_jpu::{
    config::Config,
    context::{Address, Driver},
    format::{NV12, RGB3},
};
use serial_test::serial;
use std::error::Error;

fn gradient(fb: &mut [u8], width: usize, height: usize, bpp: usize) {
    for y in 0..height {
        for x in 0..width * bpp {
            fb[y * width * bpp + x] = (x + y) as u8;
        }
    }
}

#[test]
#[serial]
#[ignore = "requires JPU hardware"]
fn encode_nv12_frame() -> Result<(), Box<dyn Error>> {
    let driver = Driver::new(Config::default())?;
    let mut handle = driver.init(true)?;

    let (width, height) = (640, 480);
    let mut fb = handle.frame_buffer()?;
    gradient(fb.as_slice_mut(), width, height * 3 / 2, 1);
    drop(fb);

    let mut jpeg = Vec::new();
    handle.encode(
        NV12,
        Address::FrameBuffer,
        width as u32,
        height as u32,
        width as u32,
        &mut jpeg,
    )?;

    assert_eq!(&jpeg[..2], [0xff, 0xd8]);
    assert_eq!(&jpeg[jpeg.len() - 2..], [0xff, 0xd9]);
    Ok(())
}

#[test]
#[serial]
#[ignore = "requires JPU and VEU hardware"]
fn encode_rgb_through_veu_then_decode() -> Result<(), Box<dyn Error>> {
    let driver = Driver::new(Config::default())?;
    let mut handle = driver.init(true)?;

    let (width, height) = (320, 240);
    let mut fb = handle.frame_buffer()?;
    gradient(fb.as_slice_mut(), width, height, 3);
    drop(fb);

    let mut jpeg = Vec::new();
    handle.encode(
        RGB3,
        Address::FrameBuffer,
        width as u32,
        height as u32,
        width as u32 * 3,
        &mut jpeg,
    )?;
    assert_eq!(&jpeg[..2], [0xff, 0xd8]);

    let frame = handle.decode(Address::FrameBuffer, width as u32, &mut &jpeg[..])?;
    assert_eq!((frame.width, frame.height), (width as u32, height as u32));
    Ok(())
}
