//! Two-way run merger.

use std::cmp::Ordering;
use std::io;
use std::io::prelude::*;

use crate::buffer::LimitedBuffer;
use crate::codec::RecordCodec;

/// Merge phase statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Merged runs written to the output.
    pub runs: u64,
    /// Records written to the output.
    pub records: u64,
}

/// Sequential reader of the current run of a scratch stream.
/// Never reads past the end of the current run.
struct RunSource<'r, R> {
    reader: &'r mut R,
    run_left: u64,
}

impl<'r, R: BufRead> RunSource<'r, R> {
    fn new(reader: &'r mut R) -> Self {
        RunSource { reader, run_left: 0 }
    }

    fn start_run(&mut self, run_len: u64) {
        self.run_left = run_len;
    }

    /// Tops up an empty buffer from the current run. Returns the number of records read.
    fn refill<C: RecordCodec>(&mut self, codec: &C, buffer: &mut LimitedBuffer<C::Record>) -> io::Result<usize> {
        if !buffer.is_empty() || self.run_left == 0 {
            return Ok(0);
        }

        let wanted = self.run_left.min(buffer.spare() as u64) as usize;
        let read = buffer.fill_from(codec, &mut *self.reader, wanted)?;
        if read < wanted {
            // stream ended inside the run
            self.run_left = 0;
        } else {
            self.run_left -= read as u64;
        }

        return Ok(read);
    }
}

/// Two-way run merger.
/// Merges the *i*-th run of the first stream with the *i*-th run of the second one, producing runs
/// twice as long. When the records compare equal the first stream wins, so the merge is stable.
pub struct RunMerger<'a, C, F> {
    codec: &'a C,
    compare: F,
    chunk_len: usize,
    run_len: u64,
}

impl<'a, C, F> RunMerger<'a, C, F>
where
    C: RecordCodec,
    F: Fn(&C::Record, &C::Record) -> Ordering,
{
    /// Creates a new merger.
    ///
    /// # Arguments
    /// * `codec` - Records codec
    /// * `compare` - Records comparison function
    /// * `chunk_len` - Size of each of the three in-memory buffers, must be positive
    /// * `run_len` - Length of the input runs, must be positive
    pub fn new(codec: &'a C, compare: F, chunk_len: usize, run_len: u64) -> Self {
        RunMerger {
            codec,
            compare,
            chunk_len,
            run_len,
        }
    }

    /// Merges run pairs of `a` and `b` into `output` until both streams are exhausted.
    pub fn merge<R, W>(&self, a: &mut R, b: &mut R, output: &mut W) -> io::Result<MergeStats>
    where
        R: BufRead,
        W: Write,
    {
        let mut stats = MergeStats::default();
        let mut source_a = RunSource::new(a);
        let mut source_b = RunSource::new(b);
        let mut buf_a = LimitedBuffer::new(self.chunk_len);
        let mut buf_b = LimitedBuffer::new(self.chunk_len);
        let mut merged = LimitedBuffer::new(self.chunk_len);

        loop {
            source_a.start_run(self.run_len);
            source_b.start_run(self.run_len);

            let filled_a = source_a.refill(self.codec, &mut buf_a)?;
            let filled_b = source_b.refill(self.codec, &mut buf_b)?;
            if filled_a + filled_b == 0 {
                break;
            }
            stats.runs += 1;

            while !buf_a.is_empty() || !buf_b.is_empty() {
                let take_a = match (buf_a.front(), buf_b.front()) {
                    (Some(item_a), Some(item_b)) => (self.compare)(item_a, item_b) != Ordering::Greater,
                    (Some(_), None) => true,
                    _ => false,
                };

                let item = if take_a { buf_a.pop_front() } else { buf_b.pop_front() };
                if let Some(item) = item {
                    merged.push(item);
                }

                if merged.is_full() {
                    stats.records += merged.drain_to(self.codec, output)? as u64;
                }

                // each side runs out independently, both are always topped up
                source_a.refill(self.codec, &mut buf_a)?;
                source_b.refill(self.codec, &mut buf_b)?;
            }

            stats.records += merged.drain_to(self.codec, output)? as u64;
        }

        output.flush()?;

        return Ok(stats);
    }
}
