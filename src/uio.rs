// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! UIO device discovery.
//!
//! The kernel exposes each UIO device as `/sys/class/uio/uioN` with a `name`
//! attribute and one `maps/mapM/{addr,size}` pair per memory window. The
//! device node `/dev/uioN` maps window `M` at offset `M * page_size`, and
//! reading four bytes from it blocks until the next interrupt.

use crate::{
    error::{Error, Result},
    mmio::{page_size, MmioRegion},
};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    os::{
        fd::{AsFd, AsRawFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

/// Physical location of one memory window of a device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub addr: u64,
    pub size: usize,
}

/// An open hardware device: its memory windows and its interrupt line.
pub trait DeviceNode: Send {
    fn name(&self) -> &str;

    /// Kernel index of the device (the `N` of `uioN`).
    fn index(&self) -> u32;

    /// Physical address and size of window `map`.
    fn region(&self, map: usize) -> Result<Region>;

    /// Maps `len` bytes of window `map` read/write shared.
    fn map(&self, map: usize, len: usize) -> io::Result<MmioRegion>;

    /// Re-arms the interrupt, it is masked after each delivery.
    fn enable_interrupt(&self) -> io::Result<()>;

    /// Blocks until the next interrupt and returns the interrupt count.
    fn wait_interrupt(&self, timeout: Option<Duration>) -> Result<u32>;
}

/// Resolves a device class name to an open device.
pub trait DeviceProvider: Send + Sync {
    fn open(&self, name: &str) -> Result<Box<dyn DeviceNode>>;
}

fn read_attr(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Discovery {
        path: path.display().to_string(),
        source,
    })
}

/// Parses sysfs hexadecimal text such as `0xfea00000\n`.
pub fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

/// The UIO device class in sysfs.
#[derive(Clone, Debug)]
pub struct UioClass {
    class_root: PathBuf,
    dev_root: PathBuf,
}

impl Default for UioClass {
    fn default() -> Self {
        Self::new("/sys/class/uio", "/dev")
    }
}

impl UioClass {
    pub fn new(class_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            class_root: class_root.into(),
            dev_root: dev_root.into(),
        }
    }

    /// Returns the index of the device whose `name` attribute equals `name`.
    ///
    /// Entries are scanned in sorted order and the first match wins.
    pub fn find(&self, name: &str) -> Result<u32> {
        let entries = fs::read_dir(&self.class_root).map_err(|source| Error::Discovery {
            path: self.class_root.display().to_string(),
            source,
        })?;

        let mut entries = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect::<Vec<_>>();
        entries.sort();

        for entry in entries {
            let Some(index) = entry
                .strip_prefix("uio")
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let path = self.class_root.join(&entry).join("name");
            match read_attr(&path) {
                Ok(uio_name) if uio_name.trim_end_matches('\n') == name => {
                    debug!("found {name} at {entry}");
                    return Ok(index);
                }
                Ok(_) => {}
                Err(e) => debug!("skip {}: {e}", path.display()),
            }
        }

        Err(Error::NotFound(name.to_owned()))
    }

    /// Reads the physical address and size of window `map` of `uio{index}`.
    pub fn region(&self, index: u32, map: usize) -> Result<Region> {
        let dir = self
            .class_root
            .join(format!("uio{index}"))
            .join("maps")
            .join(format!("map{map}"));

        let mut values = [0u64; 2];
        for (value, attr) in values.iter_mut().zip(["addr", "size"]) {
            let path = dir.join(attr);
            let text = read_attr(&path)?;
            *value = parse_hex(&text).ok_or_else(|| Error::Discovery {
                path: path.display().to_string(),
                source: io::Error::new(io::ErrorKind::InvalidData, format!("{text:?}")),
            })?;
        }

        Ok(Region {
            addr: values[0],
            size: values[1] as usize,
        })
    }

    /// Finds the device called `name` and opens its node.
    pub fn open_device(&self, name: &str) -> Result<UioDevice> {
        let index = self.find(name)?;
        let path = self.dev_root.join(format!("uio{index}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&path)
            .map_err(|source| Error::Discovery {
                path: path.display().to_string(),
                source,
            })?;
        info!("opened {} for {name}", path.display());

        Ok(UioDevice {
            name: name.to_owned(),
            index,
            file,
            class: self.clone(),
        })
    }
}

impl DeviceProvider for UioClass {
    fn open(&self, name: &str) -> Result<Box<dyn DeviceNode>> {
        Ok(Box::new(self.open_device(name)?))
    }
}

/// An open `/dev/uioN` node. Closed when dropped.
#[derive(Debug)]
pub struct UioDevice {
    name: String,
    index: u32,
    file: File,
    class: UioClass,
}

impl DeviceNode for UioDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn region(&self, map: usize) -> Result<Region> {
        self.class.region(self.index, map)
    }

    fn map(&self, map: usize, len: usize) -> io::Result<MmioRegion> {
        MmioRegion::map(self.file.as_fd(), (map * page_size()) as u64, len)
    }

    fn enable_interrupt(&self) -> io::Result<()> {
        (&self.file).write_all(&1u32.to_ne_bytes())
    }

    fn wait_interrupt(&self, timeout: Option<Duration>) -> Result<u32> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = match timeout {
            Some(t) => t.as_millis().min(i32::MAX as u128) as i32,
            None => -1,
        };

        loop {
            let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::Io(err));
            }
            if ret == 0 {
                return Err(Error::Timeout);
            }
            break;
        }

        let mut count = [0u8; 4];
        (&self.file).read_exact(&mut count)?;
        Ok(u32::from_ne_bytes(count))
    }
}
