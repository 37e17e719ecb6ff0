// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst JPU Library
//!
//! Userspace driver for the SH-Mobile JPEG processing unit (JPU) and its
//! companion video engine unit (VEU). Both units are exposed by the kernel
//! through UIO; this library discovers and maps them, keeps one shared
//! hardware context per process and drives the JPU through its double
//! buffered reload scheme under a cross-process lock.
//!
//! ## Features
//!
//! - **Encoding**: NV12 and NV16 frames are read by the JPU directly. RGB
//!   frames are converted strip by strip by the VEU and packed YCbCr frames
//!   by the CPU.
//! - **Decoding**: 4:2:0 and 4:2:2 JPEG streams decode to NV12 and NV16.
//! - **Frame buffer**: spare DMA memory behind the JPU work area can hold the
//!   source or destination frame.
//! - **Scanline sessions**: [`session::Compress`] and [`session::Decompress`]
//!   plug into a software codec's scanline sequence and report when the
//!   request has to stay in software.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_jpu::{
//!     config::Config,
//!     context::{Address, Driver},
//!     format::NV12,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = Driver::new(Config::default())?;
//! let mut handle = driver.init(false)?;
//!
//! // Fill the frame buffer with a 640x480 NV12 frame
//! let mut fb = handle.frame_buffer()?;
//! fb.as_slice_mut()[..640 * 480 * 3 / 2].fill(0x80);
//! drop(fb);
//!
//! let mut jpeg = Vec::new();
//! handle.encode(NV12, Address::FrameBuffer, 640, 480, 640, &mut jpeg)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux** with the `JPU` and `VEU` UIO devices registered
//! - Read/write access to `/dev/uioN` and the lock directory
//!
//! ## Safety
//!
//! This library uses `unsafe` code to map device memory and to access
//! registers. All of it is contained in the [`mmio`] and [`uio`] modules and
//! the frame buffer accessors of [`context`].

pub mod config;
pub mod context;
pub mod convert;
pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod jpu;
pub mod lock;
pub mod mmio;
pub mod regs;
pub mod session;
pub mod stream;
pub mod uio;
