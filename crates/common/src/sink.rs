//! Output sink capability -- consumes produced bitstream units.
//!
//! The encode session calls [`OutputSink::write_unit`] once per output unit,
//! in strict production order. A sink is not required to buffer or reorder
//! anything; it only has to accept bytes. Write failures are propagated to
//! whichever session call triggered the write.

use std::io::{self, Write};

/// Consumer of encoded bitstream units.
pub trait OutputSink {
    /// Accept one output unit's bytes. Called in production order.
    fn write_unit(&mut self, payload: &[u8]) -> io::Result<()>;
}

/// A mutable borrow of a sink is itself a sink, so a session can write into
/// a sink the caller keeps.
impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write_unit(&mut self, payload: &[u8]) -> io::Result<()> {
        (**self).write_unit(payload)
    }
}

/// Collects the raw elementary stream in memory.
impl OutputSink for Vec<u8> {
    fn write_unit(&mut self, payload: &[u8]) -> io::Result<()> {
        self.extend_from_slice(payload);
        Ok(())
    }
}

/// Adapter that turns any [`io::Write`] (file, pipe, socket) into a sink.
#[derive(Debug)]
pub struct IoSink<W: Write> {
    writer: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> OutputSink for IoSink<W> {
    fn write_unit(&mut self, payload: &[u8]) -> io::Result<()> {
        self.writer.write_all(payload)
    }
}
