// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Cross-process exclusion for the accelerator units.

use crate::error::{Error, Result};
use std::{
    fmt,
    fs::{File, OpenOptions},
    io,
    os::fd::AsRawFd,
    path::{Path, PathBuf},
};
use tracing::{debug, error, warn};

/// Hardware blocks which can be locked independently.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Unit {
    Jpu,
    Veu,
}

impl Unit {
    fn index(self) -> usize {
        match self {
            Unit::Jpu => 0,
            Unit::Veu => 1,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Unit::Jpu => write!(f, "JPU"),
            Unit::Veu => write!(f, "VEU"),
        }
    }
}

/// Serializes use of a hardware unit between processes.
pub trait HardwareLock: Send + Sync {
    fn acquire(&self, unit: Unit) -> io::Result<()>;
    fn release(&self, unit: Unit) -> io::Result<()>;
}

/// `flock(2)` on one lock file per unit.
///
/// Acquire blocks while another process holds the unit.
#[derive(Debug)]
pub struct FlockLock {
    files: [File; 2],
}

impl FlockLock {
    /// Opens (creating if needed) `jpu.lock` and `veu.lock` in `dir`.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let open = |unit: Unit| -> io::Result<File> {
            let path: PathBuf = dir.join(format!("{}.lock", unit.to_string().to_lowercase()));
            debug!("lock file {}", path.display());
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
        };

        Ok(Self {
            files: [open(Unit::Jpu)?, open(Unit::Veu)?],
        })
    }

    fn flock(&self, unit: Unit, op: libc::c_int) -> io::Result<()> {
        let fd = self.files[unit.index()].as_raw_fd();
        loop {
            if unsafe { libc::flock(fd, op) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl HardwareLock for FlockLock {
    fn acquire(&self, unit: Unit) -> io::Result<()> {
        self.flock(unit, libc::LOCK_EX)
    }

    fn release(&self, unit: Unit) -> io::Result<()> {
        self.flock(unit, libc::LOCK_UN)
    }
}

/// Runs `f` while holding `units`.
///
/// Units are acquired in order and released in reverse. Failing to acquire
/// returns [`Error::Busy`] without calling `f`. Failing to release turns a
/// successful result into [`Error::Unlock`], an error from `f` takes
/// precedence.
pub fn with_units<T>(
    lock: &dyn HardwareLock,
    units: &[Unit],
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    for (i, unit) in units.iter().enumerate() {
        if let Err(e) = lock.acquire(*unit) {
            error!("could not lock {unit}: {e}");
            for held in units[..i].iter().rev() {
                if let Err(e) = lock.release(*held) {
                    warn!("could not unlock {held}: {e}");
                }
            }
            return Err(Error::Busy(e));
        }
        debug!("locked {unit}");
    }

    let result = f();

    let mut unlock = Ok(());
    for unit in units.iter().rev() {
        if let Err(e) = lock.release(*unit) {
            error!("could not unlock {unit}: {e}");
            if unlock.is_ok() {
                unlock = Err(e);
            }
        }
    }

    match (result, unlock) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(Error::Unlock(e)),
        (Err(e), _) => Err(e),
    }
}
