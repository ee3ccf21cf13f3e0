//! Initial run collection.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use log;

use crate::buffer::LimitedBuffer;
use crate::codec::{Decoded, RecordCodec};
use crate::sort::SortError;
use crate::sorter::InMemorySorter;

/// Collection phase statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Valid records written to the working file.
    pub records: u64,
    /// Sorted runs written to the working file.
    pub runs: u64,
    /// Malformed records dropped.
    pub skipped_records: u64,
    /// Input files that could not be opened.
    pub missing_inputs: usize,
}

/// Run collector.
/// Reads all inputs in order, cuts them into chunks of `run_len` records, sorts every chunk in
/// memory and writes it to the working file as one run. The last run may be shorter.
pub struct RunCollector<'a, C, S, F> {
    codec: &'a C,
    sorter: &'a S,
    compare: F,
    run_len: usize,
    rw_buf_size: usize,
}

impl<'a, C, S, F> RunCollector<'a, C, S, F>
where
    C: RecordCodec,
    S: InMemorySorter,
    F: Fn(&C::Record, &C::Record) -> Ordering + Copy,
{
    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `codec` - Codec used for both the inputs and the working file
    /// * `sorter` - In-memory chunk sorter
    /// * `compare` - Records comparison function
    /// * `run_len` - Number of records per run, must be positive
    /// * `rw_buf_size` - Input read buffer size
    pub fn new(codec: &'a C, sorter: &'a S, compare: F, run_len: usize, rw_buf_size: usize) -> Self {
        RunCollector {
            codec,
            sorter,
            compare,
            run_len,
            rw_buf_size,
        }
    }

    /// Collects sorted runs from `inputs` into `output`.
    ///
    /// Inputs that can't be opened are reported and skipped. A read failure in the middle of an
    /// input is fatal.
    pub fn collect<P, W>(&self, inputs: &[P], output: &mut W) -> Result<CollectStats, SortError>
    where
        P: AsRef<Path>,
        W: Write,
    {
        let mut stats = CollectStats::default();
        let mut buffer = LimitedBuffer::new(self.run_len);

        for path in inputs.iter().map(AsRef::as_ref) {
            let file = match open_input(path) {
                Ok(file) => file,
                Err(err) => {
                    log::warn!("couldn't open input file {}: {}", path.display(), err);
                    stats.missing_inputs += 1;
                    continue;
                }
            };

            log::debug!("collecting records from {}", path.display());
            let mut reader = io::BufReader::with_capacity(self.rw_buf_size, file);

            loop {
                let decoded = self
                    .codec
                    .read(&mut reader)
                    .map_err(|err| SortError::Input(path.to_path_buf(), err))?;

                match decoded {
                    Decoded::Record(item) => {
                        buffer.push(item);
                        if buffer.is_full() {
                            self.flush_run(&mut buffer, output, &mut stats)?;
                        }
                    }
                    Decoded::Skip => stats.skipped_records += 1,
                    Decoded::Eof => break,
                }
            }
        }

        if !buffer.is_empty() {
            self.flush_run(&mut buffer, output, &mut stats)?;
        }
        output.flush().map_err(SortError::IO)?;

        log::debug!(
            "collected {} records in {} runs ({} malformed records dropped)",
            stats.records,
            stats.runs,
            stats.skipped_records
        );

        return Ok(stats);
    }

    fn flush_run<W: Write>(
        &self,
        buffer: &mut LimitedBuffer<C::Record>,
        output: &mut W,
        stats: &mut CollectStats,
    ) -> Result<(), SortError> {
        self.sorter.sort_by(buffer.as_mut_slice(), self.compare);
        let written = buffer.drain_to(self.codec, output).map_err(SortError::IO)?;

        stats.records += written as u64;
        stats.runs += 1;

        return Ok(());
    }
}

fn open_input(path: &Path) -> io::Result<fs::File> {
    let file = fs::File::open(path)?;
    if file.metadata()?.is_dir() {
        return Err(io::Error::new(io::ErrorKind::Other, "is a directory"));
    }

    return Ok(file);
}
