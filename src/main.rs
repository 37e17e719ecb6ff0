// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::{Args, Command};
use clap::Parser;
use edgefirst_jpu::{
    config::Config,
    context::{Address, Driver, Handle},
    error::Error as JpuError,
    format::{FourCC, PixelFormat},
    stream::{IoSink, IoSource},
};
use std::{
    error::Error,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
    time::Instant,
};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod args;

fn init_logging(args: &Args) {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    };

    let stdout = tracing_subscriber::fmt::layer()
        .compact()
        .with_filter(filter());

    let journald = if args.journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer.with_filter(filter())),
            Err(e) => {
                eprintln!("journald unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let registry = tracing_subscriber::registry().with(stdout).with(journald);

    #[cfg(feature = "tracy")]
    {
        if args.tracy {
            tracy_client::Client::start();
            registry.with(tracing_tracy::TracyLayer::default()).init();
            return;
        }
    }

    registry.init();
}

fn encode(
    handle: &mut Handle,
    fourcc: FourCC,
    size: &[u32],
    pitch: Option<u32>,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn Error>> {
    let (width, height) = (size[0], size[1]);
    let format = PixelFormat::try_from(fourcc)?;
    let pitch = pitch.unwrap_or(width * format.bytes_per_pixel());

    let raw = fs::read(input)?;
    let needed = format.frame_size(pitch, height);
    if raw.len() < needed {
        return Err(format!(
            "{} holds {} bytes, a {width}x{height} {format} frame needs {needed}",
            input.display(),
            raw.len()
        )
        .into());
    }

    let mut fb = handle.frame_buffer()?;
    if needed > fb.size() {
        return Err(JpuError::BufferTooSmall {
            needed,
            available: fb.size(),
        }
        .into());
    }
    fb.as_slice_mut()[..needed].copy_from_slice(&raw[..needed]);
    drop(fb);

    let mut sink = IoSink(BufWriter::new(File::create(output)?));
    let start = Instant::now();
    handle.encode(
        fourcc,
        Address::FrameBuffer,
        width,
        height,
        pitch,
        &mut sink,
    )?;
    sink.0.flush()?;

    info!(
        "encoded {} in {:.2?} to {}",
        input.display(),
        start.elapsed(),
        output.display()
    );
    Ok(())
}

fn decode(
    handle: &mut Handle,
    pitch: u32,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut source = IoSource(BufReader::new(File::open(input)?));
    let start = Instant::now();
    let frame = handle.decode(Address::FrameBuffer, pitch, &mut source)?;
    let elapsed = start.elapsed();

    let fb = handle.frame_buffer()?;
    fs::write(output, &fb.as_slice()[..frame.size])?;

    info!(
        "decoded {}x{} {} in {elapsed:.2?} to {}",
        frame.width,
        frame.height,
        frame.format,
        output.display()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args);

    let driver = Driver::new(Config::from(&args))?;
    let mut handle = driver.init(args.verbose)?;

    match &args.command {
        Command::Encode {
            fourcc,
            size,
            pitch,
            input,
            output,
        } => encode(&mut handle, *fourcc, size, *pitch, input, output)?,
        Command::Decode {
            pitch,
            input,
            output,
        } => decode(&mut handle, *pitch, input, output)?,
    }

    handle.shutdown();
    Ok(())
}
