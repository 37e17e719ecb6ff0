// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::format::FourCC;
use std::{fmt, io};

/// Errors reported by the JPU driver.
///
/// Every failure is returned to the immediate caller; nothing in the driver
/// retries on its own. An encode which fails with [`Error::Hardware`] may
/// already have delivered part of the coded stream to the sink, callers must
/// discard whatever was written in that case.
#[derive(Debug)]
pub enum Error {
    /// A UIO class entry or one of its attributes could not be read.
    Discovery { path: String, source: io::Error },
    /// No UIO device carries the requested name.
    NotFound(String),
    /// Opening or mapping a device window failed.
    Mapping { what: &'static str, source: io::Error },
    /// The handle was shut down, the hardware context is not available.
    NotInitialized,
    /// The pixel format is not one the accelerator path can program.
    UnsupportedFormat(FourCC),
    /// The JPEG stream uses a chroma sampling the decoder cannot output.
    UnsupportedSampling(u32),
    /// Width, height or pitch cannot be programmed.
    InvalidGeometry { width: u32, height: u32, pitch: u32 },
    /// A buffer is too small for the frame being processed.
    BufferTooSmall { needed: usize, available: usize },
    /// The lock files could not be opened.
    Lock { path: String, source: io::Error },
    /// The hardware lock could not be acquired.
    Busy(io::Error),
    /// The hardware lock could not be released.
    Unlock(io::Error),
    /// The accelerator finished with a non-zero error code.
    Hardware(u32),
    /// No interrupt arrived within the configured timeout.
    Timeout,
    /// Caller I/O (sink or source) failed.
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Discovery { path, source } => write!(f, "cannot read {path}: {source}"),
            Error::NotFound(name) => write!(f, "no UIO device named {name}"),
            Error::Mapping { what, source } => write!(f, "cannot map {what}: {source}"),
            Error::NotInitialized => write!(f, "not initialized"),
            Error::UnsupportedFormat(fourcc) => write!(f, "unsupported pixel format {fourcc}"),
            Error::UnsupportedSampling(mode) => write!(f, "unsupported chroma sampling {mode}"),
            Error::InvalidGeometry {
                width,
                height,
                pitch,
            } => write!(f, "invalid geometry {width}x{height} pitch {pitch}"),
            Error::BufferTooSmall { needed, available } => {
                write!(f, "buffer too small: need {needed} bytes, have {available}")
            }
            Error::Lock { path, source } => write!(f, "cannot open lock files in {path}: {source}"),
            Error::Busy(e) => write!(f, "could not lock JPEG engine: {e}"),
            Error::Unlock(e) => write!(f, "could not unlock JPEG engine: {e}"),
            Error::Hardware(code) => write!(f, "JPU error 0x{code:x}"),
            Error::Timeout => write!(f, "timed out waiting for the JPU"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Discovery { source, .. }
            | Error::Mapping { source, .. }
            | Error::Lock { source, .. } => Some(source),
            Error::Busy(e) | Error::Unlock(e) | Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
