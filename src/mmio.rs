// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Memory mapped device windows.
//!
//! Register access goes through the narrow [`RegisterFile`] interface so the
//! state machine never touches raw pointers. DMA windows are exposed as byte
//! slices.

use libc::{mmap, munmap, off_t, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE};
use std::{
    ffi::c_void,
    fs::OpenOptions,
    io,
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd},
        unix::fs::OpenOptionsExt,
    },
    ptr::{copy_nonoverlapping, null_mut, read_volatile, write_volatile, NonNull},
    slice::{from_raw_parts, from_raw_parts_mut},
};
use tracing::{trace, warn};

/// 32-bit register access at byte offsets.
pub trait RegisterFile {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

/// A shared, read/write mapping of a device window.
///
/// The mapping is removed when the region is dropped.
#[derive(Debug)]
pub struct MmioRegion {
    ptr: NonNull<u8>,
    len: usize,
    // distance between the mapping start and `ptr`, non-zero for /dev/mem
    // mappings of unaligned physical addresses
    skew: usize,
}

// MmioRegion only hands out volatile accesses through &self and slices
// through the usual borrow rules.
unsafe impl Send for MmioRegion {}
unsafe impl Sync for MmioRegion {}

pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

impl MmioRegion {
    /// Maps `len` bytes of `fd` starting at `offset`.
    pub fn map(fd: BorrowedFd<'_>, offset: u64, len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty window",
            ));
        }

        let ptr = unsafe {
            mmap(
                null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                fd.as_raw_fd(),
                offset as off_t,
            )
        };
        if ptr == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        trace!("mapped {len:#x} bytes at offset {offset:#x} -> {ptr:?}");

        Ok(Self {
            ptr: NonNull::new(ptr as *mut u8)
                .ok_or_else(|| io::Error::other("mmap returned null"))?,
            len,
            skew: 0,
        })
    }

    /// Maps a physical address range through `/dev/mem`.
    pub fn map_physical(phys: u64, len: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")?;

        let page = page_size() as u64;
        let skew = (phys % page) as usize;
        let mut region = Self::map(file.as_fd(), phys - skew as u64, len + skew)?;
        region.ptr = unsafe { NonNull::new_unchecked(region.ptr.as_ptr().add(skew)) };
        region.len = len;
        region.skew = skew;
        Ok(region)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Bytes `offset..offset + len` of the window.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.as_slice()[offset..offset + len]
    }

    /// Copies `data` into the window at `offset`.
    ///
    /// Writes go through `&self` like register writes do, so no slice of the
    /// same bytes may be alive during the call.
    pub fn write_at(&self, offset: usize, data: &[u8]) {
        assert!(
            offset + data.len() <= self.len,
            "write {offset:#x}+{:#x} out of range",
            data.len()
        );
        unsafe { copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(offset), data.len()) }
    }

    /// Copies bytes at `offset` of the window into `buf`.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) {
        buf.copy_from_slice(self.slice(offset, buf.len()));
    }
}

impl RegisterFile for MmioRegion {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.len, "register {offset:#x} out of range");
        unsafe { read_volatile(self.ptr.as_ptr().add(offset) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.len, "register {offset:#x} out of range");
        unsafe { write_volatile(self.ptr.as_ptr().add(offset) as *mut u32, value) }
    }
}

impl Drop for MmioRegion {
    fn drop(&mut self) {
        let base = unsafe { self.ptr.as_ptr().sub(self.skew) };
        if unsafe { munmap(base.cast::<c_void>(), self.len + self.skew) } != 0 {
            warn!("unmap failed: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_backed_window() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0u8; 8192]).unwrap();

        let region = MmioRegion::map(file.as_fd(), 0, 8192).unwrap();
        region.write32(0x10, 0xdead_beef);
        assert_eq!(region.read32(0x10), 0xdead_beef);

        region.write_at(0x1000, b"jpeg");
        let mut buf = [0u8; 4];
        region.read_at(0x1000, &mut buf);
        assert_eq!(&buf, b"jpeg");

        // a second mapping of the same file sees the writes
        let other = MmioRegion::map(file.as_fd(), 0, 8192).unwrap();
        assert_eq!(other.read32(0x10), 0xdead_beef);
        assert_eq!(other.slice(0x1000, 4), b"jpeg");
    }

    #[test]
    fn empty_window_rejected() {
        let file = tempfile::tempfile().unwrap();
        assert!(MmioRegion::map(file.as_fd(), 0, 0).is_err());
    }
}
