// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::{path::PathBuf, time::Duration};

/// Driver configuration.
///
/// The defaults match a stock SH-Mobile kernel: the UIO devices are called
/// `JPU` and `VEU`, sysfs is mounted at `/sys` and lock files live in
/// `/var/lock`.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// UIO class directory scanned for devices.
    pub class_root: PathBuf,
    /// Directory holding the `uioN` device nodes.
    pub dev_root: PathBuf,
    /// Directory for the cross-process lock files.
    pub lock_dir: PathBuf,
    /// UIO name of the JPEG unit.
    pub jpu_name: String,
    /// UIO name of the conversion unit.
    pub veu_name: String,
    /// Longest wait for a single interrupt, `None` waits forever.
    pub interrupt_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            class_root: PathBuf::from("/sys/class/uio"),
            dev_root: PathBuf::from("/dev"),
            lock_dir: PathBuf::from("/var/lock"),
            jpu_name: "JPU".to_owned(),
            veu_name: "VEU".to_owned(),
            interrupt_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl Config {
    pub fn with_class_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.class_root = path.into();
        self
    }

    pub fn with_dev_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.dev_root = path.into();
        self
    }

    pub fn with_lock_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_dir = path.into();
        self
    }

    pub fn with_names(mut self, jpu: &str, veu: &str) -> Self {
        self.jpu_name = jpu.to_owned();
        self.veu_name = veu.to_owned();
        self
    }

    pub fn with_interrupt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.interrupt_timeout = timeout;
        self
    }
}
