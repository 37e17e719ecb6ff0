// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Simulated UIO devices backed by temporary files.
//!
//! Each window of a simulated unit is a sparse temporary file. The driver
//! maps it like a real device window while the test keeps its own mapping to
//! seed registers and inspect what the driver wrote. Interrupts are scripted:
//! every `wait_interrupt` pops the next closure and runs it against the
//! unit's windows.

#![allow(dead_code)]

use edgefirst_jpu::{
    config::Config,
    context::{Driver, JPU_SIZE},
    error::{Error, Result},
    lock::{HardwareLock, Unit},
    mmio::{MmioRegion, RegisterFile},
    regs::{
        Interrupts, JCDERR, JCDTCD, JCDTCM, JCDTCU, JCHSZD, JCHSZU, JCMOD, JCMOD_DSP_DECODE,
        JCVSZD, JCVSZU, JINTS, JPU_REGS_SIZE,
    },
    uio::{DeviceNode, DeviceProvider, Region},
};
use std::{
    collections::VecDeque,
    fs::File,
    io,
    os::fd::AsFd,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

pub const JPU_PHYS: u64 = 0xfea0_0000;
pub const DMA_PHYS: u64 = 0x4000_0000;
pub const VEU_PHYS: u64 = 0xfe92_0000;

/// Frame buffer size of the default simulation.
pub const FRAME_BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub type Irq = Box<dyn FnOnce(&[MmioRegion]) -> Result<()> + Send>;
pub type AutoIrq = Box<dyn FnMut(&[MmioRegion]) -> Result<()> + Send>;

struct UnitInner {
    name: String,
    index: u32,
    regions: Vec<Region>,
    files: Vec<File>,
    views: Vec<MmioRegion>,
    script: Mutex<VecDeque<Irq>>,
    auto: Mutex<Option<AutoIrq>>,
    fail_region: Mutex<Option<usize>>,
    fail_map: Mutex<Option<usize>>,
    enabled: AtomicUsize,
    interrupts: AtomicUsize,
    open: AtomicUsize,
}

/// One simulated hardware unit, cheap to clone.
#[derive(Clone)]
pub struct SimUnit(Arc<UnitInner>);

impl SimUnit {
    pub fn new(name: &str, index: u32, regions: &[Region]) -> Self {
        let mut files = Vec::new();
        let mut views = Vec::new();
        for region in regions {
            let file = tempfile::tempfile().unwrap();
            file.set_len(region.size as u64).unwrap();
            views.push(MmioRegion::map(file.as_fd(), 0, region.size).unwrap());
            files.push(file);
        }

        Self(Arc::new(UnitInner {
            name: name.to_owned(),
            index,
            regions: regions.to_vec(),
            files,
            views,
            script: Mutex::new(VecDeque::new()),
            auto: Mutex::new(None),
            fail_region: Mutex::new(None),
            fail_map: Mutex::new(None),
            enabled: AtomicUsize::new(0),
            interrupts: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
        }))
    }

    /// Test side view of window `map`.
    pub fn window(&self, map: usize) -> &MmioRegion {
        &self.0.views[map]
    }

    pub fn regs(&self) -> &MmioRegion {
        self.window(0)
    }

    pub fn snapshot(&self, map: usize) -> Vec<u8> {
        self.window(map).as_slice().to_vec()
    }

    /// Queues the next interrupt.
    pub fn push(&self, irq: impl FnOnce(&[MmioRegion]) -> Result<()> + Send + 'static) {
        self.0.script.lock().unwrap().push_back(Box::new(irq));
    }

    /// Handler for interrupts beyond the script.
    pub fn set_auto(&self, irq: impl FnMut(&[MmioRegion]) -> Result<()> + Send + 'static) {
        *self.0.auto.lock().unwrap() = Some(Box::new(irq));
    }

    pub fn fail_region(&self, map: usize) {
        *self.0.fail_region.lock().unwrap() = Some(map);
    }

    pub fn fail_map(&self, map: usize) {
        *self.0.fail_map.lock().unwrap() = Some(map);
    }

    /// Nodes of this unit currently open.
    pub fn open_nodes(&self) -> usize {
        self.0.open.load(Ordering::SeqCst)
    }

    pub fn interrupts(&self) -> usize {
        self.0.interrupts.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.0.script.lock().unwrap().len()
    }
}

struct SimNode {
    unit: SimUnit,
}

impl Drop for SimNode {
    fn drop(&mut self) {
        self.unit.0.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DeviceNode for SimNode {
    fn name(&self) -> &str {
        &self.unit.0.name
    }

    fn index(&self) -> u32 {
        self.unit.0.index
    }

    fn region(&self, map: usize) -> Result<Region> {
        if *self.unit.0.fail_region.lock().unwrap() == Some(map) {
            return Err(Error::Discovery {
                path: format!("uio{}/maps/map{map}", self.unit.0.index),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        self.unit.0.regions.get(map).copied().ok_or_else(|| Error::Discovery {
            path: format!("uio{}/maps/map{map}", self.unit.0.index),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
    }

    fn map(&self, map: usize, len: usize) -> io::Result<MmioRegion> {
        if *self.unit.0.fail_map.lock().unwrap() == Some(map) {
            return Err(io::Error::other("injected mmap failure"));
        }
        MmioRegion::map(self.unit.0.files[map].as_fd(), 0, len)
    }

    fn enable_interrupt(&self) -> io::Result<()> {
        self.unit.0.enabled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn wait_interrupt(&self, _timeout: Option<Duration>) -> Result<u32> {
        let next = self.unit.0.script.lock().unwrap().pop_front();
        match next {
            Some(irq) => irq(&self.unit.0.views)?,
            None => match self.unit.0.auto.lock().unwrap().as_mut() {
                Some(auto) => auto(&self.unit.0.views)?,
                None => return Err(Error::Timeout),
            },
        }
        let count = self.unit.0.interrupts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(count as u32)
    }
}

/// Provider over a fixed set of simulated units.
pub struct SimProvider {
    units: Vec<SimUnit>,
}

impl SimProvider {
    pub fn new(units: &[SimUnit]) -> Self {
        Self {
            units: units.to_vec(),
        }
    }
}

impl DeviceProvider for SimProvider {
    fn open(&self, name: &str) -> Result<Box<dyn DeviceNode>> {
        let unit = self
            .units
            .iter()
            .find(|u| u.0.name == name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        unit.0.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimNode { unit: unit.clone() }))
    }
}

/// Lock which records every call and fails on request.
#[derive(Clone, Default)]
pub struct SimLock {
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail_acquire: Arc<Mutex<bool>>,
    pub fail_release: Arc<Mutex<bool>>,
}

impl SimLock {
    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl HardwareLock for SimLock {
    fn acquire(&self, unit: Unit) -> io::Result<()> {
        if *self.fail_acquire.lock().unwrap() {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        self.log.lock().unwrap().push(format!("lock {unit}"));
        Ok(())
    }

    fn release(&self, unit: Unit) -> io::Result<()> {
        self.log.lock().unwrap().push(format!("unlock {unit}"));
        if *self.fail_release.lock().unwrap() {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        Ok(())
    }
}

/// A driver over simulated JPU and VEU units.
pub struct Sim {
    pub driver: Driver,
    pub jpu: SimUnit,
    pub veu: SimUnit,
    pub lock: SimLock,
}

impl Sim {
    pub fn new() -> Self {
        Self::with_dma_size(JPU_SIZE + FRAME_BUFFER_SIZE)
    }

    pub fn with_dma_size(dma_size: usize) -> Self {
        let jpu = SimUnit::new(
            "JPU",
            1,
            &[
                Region {
                    addr: JPU_PHYS,
                    size: JPU_REGS_SIZE,
                },
                Region {
                    addr: DMA_PHYS,
                    size: dma_size,
                },
            ],
        );
        let veu = SimUnit::new(
            "VEU",
            0,
            &[Region {
                addr: VEU_PHYS,
                size: 0x1000,
            }],
        );
        veu.set_auto(|_| Ok(()));

        let lock = SimLock::default();
        let driver = Driver::with_provider(
            Config::default().with_interrupt_timeout(Some(Duration::from_millis(100))),
            SimProvider::new(&[jpu.clone(), veu.clone()]),
            lock.clone(),
        );

        Self {
            driver,
            jpu,
            veu,
            lock,
        }
    }

    pub fn dma(&self) -> &MmioRegion {
        self.jpu.window(1)
    }
}

/// Sets the coded data counter.
pub fn set_coded(regs: &MmioRegion, amount: usize) {
    regs.write32(JCDTCU, (amount >> 16) as u32 & 0xff);
    regs.write32(JCDTCM, (amount >> 8) as u32 & 0xff);
    regs.write32(JCDTCD, amount as u32 & 0xff);
}

/// Raises `ints` with error code `error`.
pub fn raise(regs: &MmioRegion, ints: Interrupts, error: u32) {
    regs.write32(JCDERR, error);
    regs.write32(JINTS, ints.bits());
}

/// Queues a plain interrupt on the JPU.
pub fn irq(sim: &Sim, ints: Interrupts, error: u32) {
    sim.jpu.push(move |w| {
        raise(&w[0], ints, error);
        Ok(())
    });
}

/// Queues the decoder's header interrupt for a `width` x `height` stream.
pub fn header(sim: &Sim, width: u32, height: u32, sampling: u32) {
    sim.jpu.push(move |w| {
        let regs = &w[0];
        regs.write32(JCHSZU, width >> 8);
        regs.write32(JCHSZD, width & 0xff);
        regs.write32(JCVSZU, height >> 8);
        regs.write32(JCVSZD, height & 0xff);
        regs.write32(JCMOD, JCMOD_DSP_DECODE | sampling);
        raise(regs, Interrupts::HEADER, 0);
        Ok(())
    });
}

/// Byte pattern for coded data tests.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
