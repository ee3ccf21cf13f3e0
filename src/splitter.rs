//! Run splitter.

use std::io;
use std::io::prelude::*;

use crate::buffer::LimitedBuffer;
use crate::codec::RecordCodec;

/// Split phase statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Runs distributed over both destinations.
    pub runs: u64,
    /// Records written to the first destination.
    pub records_a: u64,
    /// Records written to the second destination.
    pub records_b: u64,
}

/// Run splitter.
/// Distributes the runs of a stream alternately over two destinations, starting with the first
/// one. A run is never divided between destinations.
pub struct RunSplitter<'a, C> {
    codec: &'a C,
    chunk_len: usize,
    run_len: u64,
}

impl<'a, C: RecordCodec> RunSplitter<'a, C> {
    /// Creates a new splitter.
    ///
    /// # Arguments
    /// * `codec` - Records codec
    /// * `chunk_len` - Maximum number of records held in memory at once, must be positive
    /// * `run_len` - Current run length, must be positive
    pub fn new(codec: &'a C, chunk_len: usize, run_len: u64) -> Self {
        RunSplitter {
            codec,
            chunk_len,
            run_len,
        }
    }

    /// Splits `input` runs into `a` and `b`.
    pub fn split<R, W>(&self, input: &mut R, a: &mut W, b: &mut W) -> io::Result<SplitStats>
    where
        R: BufRead,
        W: Write,
    {
        let mut stats = SplitStats::default();
        let mut buffer = LimitedBuffer::new(self.chunk_len);
        let mut to_a = true;
        let mut run_left = self.run_len;

        loop {
            let wanted = run_left.min(self.chunk_len as u64) as usize;
            let read = buffer.fill_from(self.codec, input, wanted)?;
            if read == 0 {
                break;
            }

            if run_left == self.run_len {
                stats.runs += 1;
            }

            if to_a {
                buffer.drain_to(self.codec, a)?;
                stats.records_a += read as u64;
            } else {
                buffer.drain_to(self.codec, b)?;
                stats.records_b += read as u64;
            }

            run_left -= read as u64;
            if run_left == 0 {
                to_a = !to_a;
                run_left = self.run_len;
            }
        }

        a.flush()?;
        b.flush()?;

        return Ok(stats);
    }
}
