// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use edgefirst_jpu::{config::Config, format::FourCC};
use std::{path::PathBuf, time::Duration};

/// Command-line arguments for the EdgeFirst JPU tool.
///
/// Device and lock locations can be given on the command line or through
/// environment variables.
///
/// # Example
///
/// ```bash
/// # Encode a raw NV12 frame
/// edgefirst-jpu encode --fourcc NV12 --size "1920 1080" frame.nv12 frame.jpg
///
/// # Decode it again, writing NV12 or NV16 depending on the stream
/// JPU_TIMEOUT=2000 edgefirst-jpu decode --pitch 1920 frame.jpg frame.yuv
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// UIO class directory
    #[arg(long, env = "UIO_CLASS", default_value = "/sys/class/uio")]
    pub class_root: PathBuf,

    /// Directory holding the uioN device nodes
    #[arg(long, env = "UIO_DEV", default_value = "/dev")]
    pub dev_root: PathBuf,

    /// Directory for the hardware lock files
    #[arg(long, env = "JPU_LOCK_DIR", default_value = "/var/lock")]
    pub lock_dir: PathBuf,

    /// UIO name of the JPEG unit
    #[arg(long, env = "JPU_NAME", default_value = "JPU")]
    pub jpu_name: String,

    /// UIO name of the VEU
    #[arg(long, env = "VEU_NAME", default_value = "VEU")]
    pub veu_name: String,

    /// Interrupt timeout in milliseconds, 0 waits forever
    #[arg(long, env = "JPU_TIMEOUT", default_value = "5000")]
    pub timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also log to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Encode a raw frame into a JPEG file
    Encode {
        /// Pixel format of the raw frame (NV12, NV16, RGBP, RGB3, RGB4, YUV3)
        #[arg(long, default_value = "NV12")]
        fourcc: FourCC,

        /// Frame size in pixels (width height)
        #[arg(long, default_value = "1920 1080", value_delimiter = ' ', num_args = 2)]
        size: Vec<u32>,

        /// Bytes per line, defaults to the packed pitch of the format
        #[arg(long)]
        pitch: Option<u32>,

        /// Raw input frame
        input: PathBuf,

        /// JPEG output
        output: PathBuf,
    },
    /// Decode a JPEG file into a raw NV12 or NV16 frame
    Decode {
        /// Bytes per output line
        #[arg(long, default_value = "1920")]
        pitch: u32,

        /// JPEG input
        input: PathBuf,

        /// Raw output frame
        output: PathBuf,
    },
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        let timeout = match args.timeout {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Config::default()
            .with_class_root(&args.class_root)
            .with_dev_root(&args.dev_root)
            .with_lock_dir(&args.lock_dir)
            .with_names(&args.jpu_name, &args.veu_name)
            .with_interrupt_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_args() {
        let args = Args::parse_from([
            "edgefirst-jpu",
            "--class-root",
            "/tmp/uio",
            "--timeout",
            "0",
            "decode",
            "in.jpg",
            "out.yuv",
        ]);
        let config = Config::from(&args);
        assert_eq!(config.class_root, PathBuf::from("/tmp/uio"));
        assert_eq!(config.interrupt_timeout, None);
        assert_eq!(config.jpu_name, "JPU");
    }

    #[test]
    fn encode_defaults() {
        let args = Args::parse_from(["edgefirst-jpu", "encode", "in.raw", "out.jpg"]);
        match args.command {
            Command::Encode {
                fourcc, size, pitch, ..
            } => {
                assert_eq!(fourcc.to_string(), "NV12");
                assert_eq!(size, [1920, 1080]);
                assert_eq!(pitch, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
