// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Process-wide hardware context.
//!
//! A [`Driver`] owns the mapped JPU/VEU state and hands out [`Handle`]s. The
//! first handle opens and maps the devices, the last one to go unmaps and
//! closes them. Between those two points the mappings never change, so a
//! running operation can treat them as read-only.

use crate::{
    config::Config,
    decode::{self, DecodedFrame},
    encode::{self, Encode},
    error::{Error, Result},
    format::{FourCC, PixelFormat},
    lock::{FlockLock, HardwareLock},
    mmio::MmioRegion,
    stream::{Sink, Source},
    uio::{DeviceNode, DeviceProvider, UioClass},
};
use std::{
    io,
    marker::PhantomData,
    ptr::NonNull,
    slice::{from_raw_parts, from_raw_parts_mut},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, error, info};

/// Size of one reload segment.
pub const RELOAD_SIZE: usize = 64 * 1024;

/// Line buffer row pitch, also the widest frame line buffer mode can encode.
pub const LINEBUFFER_PITCH: u32 = 2560;

/// Lines per line buffer strip.
pub const LINEBUFFER_HEIGHT: u32 = 16;

pub const LINEBUFFER_SIZE_Y: usize = (LINEBUFFER_PITCH * LINEBUFFER_HEIGHT) as usize;

/// One NV16 line buffer, luma followed by interleaved chroma.
pub const LINEBUFFER_SIZE: usize = LINEBUFFER_SIZE_Y * 2;

/// Start of the DMA window reserved for the JPU itself.
pub const JPU_SIZE: usize = RELOAD_SIZE * 2 + LINEBUFFER_SIZE * 2;

/// Physical layout of the DMA window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    pub base: u64,
    pub reload: [u64; 2],
    pub line_buffers: [u64; 2],
    /// General purpose area handed out as the frame buffer.
    pub data: u64,
}

impl Layout {
    pub fn new(base: u64) -> Self {
        let lb1 = base + RELOAD_SIZE as u64 * 2;
        let lb2 = lb1 + LINEBUFFER_SIZE as u64;
        Self {
            base,
            reload: [base, base + RELOAD_SIZE as u64],
            line_buffers: [lb1, lb2],
            data: lb2 + LINEBUFFER_SIZE as u64,
        }
    }

    /// Offset of a physical address inside the DMA window.
    pub fn offset(&self, phys: u64) -> usize {
        (phys - self.base) as usize
    }
}

/// Mapped state of the JPU and VEU.
///
/// Either every field is valid or the value does not exist, there is no
/// partially initialized state.
pub struct Hardware {
    // mappings are declared first so they are dropped before the nodes close
    pub(crate) jpu_regs: MmioRegion,
    pub(crate) veu_regs: MmioRegion,
    pub(crate) dma: MmioRegion,
    pub(crate) jpu: Box<dyn DeviceNode>,
    pub(crate) veu: Box<dyn DeviceNode>,
    pub(crate) jpu_phys: u64,
    pub(crate) veu_phys: u64,
    pub(crate) layout: Layout,
}

impl Hardware {
    /// Opens and maps both units. Whatever was set up before a failing step
    /// is dropped again, which unmaps and closes it.
    fn open(provider: &dyn DeviceProvider, config: &Config) -> Result<Self> {
        let jpu = provider.open(&config.jpu_name).inspect_err(|e| {
            error!("cannot find UIO for {}: {e}", config.jpu_name);
        })?;
        let veu = provider.open(&config.veu_name).inspect_err(|e| {
            error!("cannot find UIO for {}: {e}", config.veu_name);
        })?;

        let jpu_map = jpu.region(0)?;
        let dma_map = jpu.region(1)?;
        let veu_map = veu.region(0)?;

        info!(
            "uio#={}, jpu_phys={:08x}({:08x}), jpeg_phys={:08x}({:08x})",
            jpu.index(),
            jpu_map.addr,
            jpu_map.size,
            dma_map.addr,
            dma_map.size
        );
        info!(
            "uio#={}, veu_phys={:08x}({:08x})",
            veu.index(),
            veu_map.addr,
            veu_map.size
        );

        if dma_map.size <= JPU_SIZE {
            return Err(Error::Mapping {
                what: "JPU memory",
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{:#x} bytes, need more than {JPU_SIZE:#x}", dma_map.size),
                ),
            });
        }

        let jpu_regs = jpu
            .map(0, jpu_map.size)
            .map_err(|source| Error::Mapping {
                what: "JPU registers",
                source,
            })?;
        let dma = jpu
            .map(1, dma_map.size)
            .map_err(|source| Error::Mapping {
                what: "JPU memory",
                source,
            })?;
        let veu_regs = veu
            .map(0, veu_map.size)
            .map_err(|source| Error::Mapping {
                what: "VEU registers",
                source,
            })?;

        Ok(Self {
            jpu_regs,
            veu_regs,
            dma,
            jpu,
            veu,
            jpu_phys: jpu_map.addr,
            veu_phys: veu_map.addr,
            layout: Layout::new(dma_map.addr),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn jpu_phys(&self) -> u64 {
        self.jpu_phys
    }

    pub fn veu_phys(&self) -> u64 {
        self.veu_phys
    }

    /// Bytes of DMA memory behind the reserved area.
    pub fn frame_buffer_size(&self) -> usize {
        self.dma.len() - JPU_SIZE
    }
}

struct State {
    refs: usize,
    hw: Option<Hardware>,
}

struct Shared {
    provider: Box<dyn DeviceProvider>,
    lock: Box<dyn HardwareLock>,
    config: Config,
    state: Mutex<State>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self) {
        let mut state = self.state();
        if state.refs == 0 {
            error!("release without matching init");
            return;
        }

        state.refs -= 1;
        debug!("released handle, {} remaining", state.refs);
        if state.refs == 0 {
            state.hw = None;
            info!("hardware released");
        }
    }
}

/// Owner of the shared hardware context.
///
/// Cloning a `Driver` shares the same context.
#[derive(Clone)]
pub struct Driver {
    shared: Arc<Shared>,
}

impl Driver {
    /// Creates a driver backed by the UIO devices and lock files named in
    /// `config`. Nothing is opened until the first [`Driver::init`].
    pub fn new(config: Config) -> Result<Self> {
        let provider = UioClass::new(&config.class_root, &config.dev_root);
        let lock = FlockLock::new(&config.lock_dir).map_err(|source| Error::Lock {
            path: config.lock_dir.display().to_string(),
            source,
        })?;
        Ok(Self::with_provider(config, provider, lock))
    }

    pub fn with_provider(
        config: Config,
        provider: impl DeviceProvider + 'static,
        lock: impl HardwareLock + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider: Box::new(provider),
                lock: Box::new(lock),
                config,
                state: Mutex::new(State { refs: 0, hw: None }),
            }),
        }
    }

    /// Returns a new handle, mapping the hardware if this is the first one.
    pub fn init(&self, verbose: bool) -> Result<Handle> {
        let mut state = self.shared.state();

        if state.refs == 0 {
            let hw = Hardware::open(&*self.shared.provider, &self.shared.config)
                .inspect_err(|e| error!("UIO initialization failed: {e}"))?;
            state.hw = Some(hw);
        }
        state.refs += 1;
        debug!("new handle, {} active", state.refs);

        Ok(Handle {
            shared: self.shared.clone(),
            verbose,
            active: true,
        })
    }

    /// Number of live handles.
    pub fn references(&self) -> usize {
        self.shared.state().refs
    }

    pub fn is_mapped(&self) -> bool {
        self.shared.state().hw.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Runs `f` with the mapped hardware, if any.
    pub fn with_hardware<T>(&self, f: impl FnOnce(&Hardware) -> T) -> Option<T> {
        self.shared.state().hw.as_ref().map(f)
    }
}

/// Where the encoder reads its source, or the decoder writes its output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Address {
    /// The driver's own frame buffer, see [`Handle::frame_buffer`].
    FrameBuffer,
    /// A caller supplied physical address.
    Physical(u64),
}

/// The spare DMA memory behind the JPU reserved area.
///
/// Valid while the handle it was obtained from stays initialized.
pub struct FrameBuffer<'a> {
    phys: u64,
    ptr: NonNull<u8>,
    size: usize,
    _handle: PhantomData<&'a mut Handle>,
}

impl FrameBuffer<'_> {
    pub fn phys(&self) -> u64 {
        self.phys
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}

/// A caller's reference to the shared hardware context.
///
/// Operations on one handle must not overlap; the hardware lock only
/// serializes between processes.
pub struct Handle {
    shared: Arc<Shared>,
    verbose: bool,
    active: bool,
}

impl Handle {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Releases this handle's reference. The hardware is unmapped once no
    /// other handle holds one. Further calls fail with
    /// [`Error::NotInitialized`].
    pub fn shutdown(&mut self) {
        if self.active {
            self.active = false;
            self.shared.release();
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        if !self.active {
            error!("not initialized yet");
            return Err(Error::NotInitialized);
        }
        let state = self.shared.state();
        if state.hw.is_none() {
            error!("not initialized yet");
            return Err(Error::NotInitialized);
        }
        Ok(state)
    }

    /// Physical address, mapping and size of the frame buffer.
    pub fn frame_buffer(&mut self) -> Result<FrameBuffer<'_>> {
        let state = self.state()?;
        let hw = state.hw.as_ref().ok_or(Error::NotInitialized)?;
        let ptr = unsafe { NonNull::new_unchecked(hw.dma.as_ptr().add(JPU_SIZE)) };

        Ok(FrameBuffer {
            phys: hw.layout.data,
            ptr,
            size: hw.frame_buffer_size(),
            _handle: PhantomData,
        })
    }

    /// Encodes a `width` x `height` frame at `source` and streams the JPEG
    /// to `sink`.
    ///
    /// NV12 and NV16 sources are read directly by the JPU. RGB sources are
    /// converted strip by strip through the VEU and packed YCbCr sources by
    /// the CPU. On error the sink may already hold part of the stream.
    pub fn encode(
        &mut self,
        fourcc: FourCC,
        source: Address,
        width: u32,
        height: u32,
        pitch: u32,
        sink: &mut dyn Sink,
    ) -> Result<()> {
        let state = self.state()?;
        let format = PixelFormat::try_from(fourcc)?;
        encode::validate(format, width, height, pitch)?;

        let hw = state.hw.as_ref().ok_or(Error::NotInitialized)?;
        let phys = match source {
            Address::FrameBuffer => {
                let needed = format.frame_size(pitch, height);
                let available = hw.frame_buffer_size();
                if needed > available {
                    error!("{format} frame needs {needed} bytes, frame buffer holds {available}");
                    return Err(Error::BufferTooSmall { needed, available });
                }
                hw.layout.data
            }
            Address::Physical(phys) => phys,
        };

        let job = Encode {
            format,
            phys,
            width,
            height,
            pitch,
        };
        encode::run(
            hw,
            &*self.shared.lock,
            self.shared.config.interrupt_timeout,
            self.verbose,
            &job,
            sink,
        )
    }

    /// Decodes the JPEG read from `source` into `dest`, rows `pitch` bytes
    /// apart. Output is NV12 for 4:2:0 streams and NV16 for 4:2:2 streams.
    pub fn decode(
        &mut self,
        dest: Address,
        pitch: u32,
        source: &mut dyn Source,
    ) -> Result<DecodedFrame> {
        let state = self.state()?;
        let hw = state.hw.as_ref().ok_or(Error::NotInitialized)?;

        let (phys, capacity) = match dest {
            Address::FrameBuffer => (hw.layout.data, Some(hw.frame_buffer_size())),
            Address::Physical(phys) => (phys, None),
        };

        decode::run(
            hw,
            &*self.shared.lock,
            self.shared.config.interrupt_timeout,
            self.verbose,
            phys,
            capacity,
            pitch,
            source,
        )
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_sequential() {
        for base in [0u64, 0x4000_0000, 0x8123_4000] {
            let layout = Layout::new(base);
            assert_eq!(layout.reload[1], base + RELOAD_SIZE as u64);
            assert_eq!(layout.line_buffers[0], base + 2 * RELOAD_SIZE as u64);
            assert_eq!(
                layout.line_buffers[1],
                layout.line_buffers[0] + LINEBUFFER_SIZE as u64
            );
            assert_eq!(
                layout.data,
                layout.line_buffers[1] + LINEBUFFER_SIZE as u64
            );
            assert_eq!(layout.offset(layout.data), JPU_SIZE);
        }
    }
}
