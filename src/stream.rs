// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Caller supplied destinations for coded data and sources of JPEG streams.

use std::io::{self, Read, Write};

/// Receives the coded JPEG stream.
pub trait Sink {
    /// Called once before any data is written.
    fn init(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Writes a chunk of coded data and returns how many bytes were accepted.
    /// Accepting fewer bytes than offered is not an error, the remainder is
    /// dropped.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
}

impl Sink for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(data);
        Ok(data.len())
    }
}

/// Adapts any [`io::Write`] into a [`Sink`].
pub struct IoSink<W: Write>(pub W);

impl<W: Write> Sink for IoSink<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.write_all(data)?;
        Ok(data.len())
    }
}

/// Supplies a JPEG stream to the decoder.
pub trait Source {
    fn init(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Fills `buf` with as much of the stream as is available, returning 0
    /// at the end of the stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Source for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.len());
        let (head, tail) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = tail;
        Ok(n)
    }
}

/// Adapts any [`io::Read`] into a [`Source`].
pub struct IoSource<R: Read>(pub R);

impl<R: Read> Source for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // fill as much as possible, the decoder treats a short segment as
        // the end of the stream
        let mut filled = 0;
        while filled < buf.len() {
            match self.0.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_drains() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src: &[u8] = &data;
        let mut buf = [0u8; 3];
        assert_eq!(Source::read(&mut src, &mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(Source::read(&mut src, &mut buf).unwrap(), 2);
        assert_eq!(Source::read(&mut src, &mut buf).unwrap(), 0);
    }

    #[test]
    fn io_source_fills_across_short_reads() {
        let chained = io::Cursor::new(vec![1u8, 2]).chain(io::Cursor::new(vec![3u8, 4]));
        let mut src = IoSource(chained);
        let mut buf = [0u8; 4];
        assert_eq!(src.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn io_sink_writes_everything() {
        let mut sink = IoSink(Vec::new());
        assert_eq!(Sink::write(&mut sink, b"abc").unwrap(), 3);
        assert_eq!(sink.0, b"abc");
    }
}
