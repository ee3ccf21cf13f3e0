//! External sorter.

use log;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::codec::{IntegerCodec, LineCodec, RecordCodec};
use crate::collector::{CollectStats, RunCollector};
use crate::config::{ConfigError, RecordFormat, SortConfig, SortSettings};
use crate::merger::{MergeStats, RunMerger};
use crate::sorter::SorterKind;
use crate::splitter::RunSplitter;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Invalid sorter configuration.
    Config(ConfigError),
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Working file creation or opening error.
    Output(PathBuf, io::Error),
    /// Input file read error.
    Input(PathBuf, io::Error),
    /// Common I/O error.
    IO(io::Error),
    /// A pass lost or duplicated records.
    RecordCountMismatch { expected: u64, actual: u64 },
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Config(err) => Some(err),
            SortError::TempDir(err) => Some(err),
            SortError::Output(_, err) => Some(err),
            SortError::Input(_, err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::RecordCountMismatch { .. } => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Config(err) => write!(f, "invalid configuration: {}", err),
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::Output(path, err) => write!(f, "output file {} not accessible: {}", path.display(), err),
            SortError::Input(path, err) => write!(f, "input file {} read error: {}", path.display(), err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::RecordCountMismatch { expected, actual } => write!(
                f,
                "records count mismatch: expected {}, got {}",
                expected, actual
            ),
        }
    }
}

impl From<ConfigError> for SortError {
    fn from(err: ConfigError) -> Self {
        SortError::Config(err)
    }
}

/// Sorting statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Valid records sorted.
    pub total_records: u64,
    /// Malformed records dropped.
    pub skipped_records: u64,
    /// Input files that could not be opened.
    pub missing_inputs: usize,
    /// Runs produced by the collection phase.
    pub initial_runs: u64,
    /// Split/merge passes performed.
    pub passes: u32,
}

/// Sort driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortState {
    Collecting,
    Looping { run_len: u64 },
    Done,
}

impl SortState {
    fn next_pass(run_len: u64, total_records: u64) -> Self {
        if run_len < total_records {
            SortState::Looping { run_len }
        } else {
            SortState::Done
        }
    }
}

/// External sorter.
///
/// Sorts records from a list of input files into an output file using a balanced two-way merge
/// sort. The output file is used as the working file: it first receives the sorted runs of
/// `base_run_len` records, and each pass splits its runs over two scratch files and merges them
/// back into it, doubling the run length until one run holds all the records.
pub struct ExternalSorter<C, F> {
    /// Records codec.
    codec: C,
    /// Records comparison function.
    compare: F,
    /// In-memory chunk sorter.
    sorter: SorterKind,
    /// Initial run length and in-memory buffers size.
    base_run_len: usize,
    /// File read/write buffer size.
    rw_buf_size: usize,
    /// Directory to be used to store scratch files.
    tmp_dir: tempfile::TempDir,
}

impl<C, F> ExternalSorter<C, F>
where
    C: RecordCodec,
    F: Fn(&C::Record, &C::Record) -> Ordering + Copy,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `codec` - Codec used for the inputs, the scratch files and the output
    /// * `compare` - Records comparison function
    /// * `settings` - Sort engine settings
    pub fn new(codec: C, compare: F, settings: &SortSettings) -> Result<Self, SortError> {
        if settings.base_run_len == 0 {
            return Err(SortError::Config(ConfigError::ZeroRunLength));
        }
        if settings.rw_buf_size == 0 {
            return Err(SortError::Config(ConfigError::ZeroBufferSize));
        }

        return Ok(ExternalSorter {
            codec,
            compare,
            sorter: settings.sorter,
            base_run_len: settings.base_run_len,
            rw_buf_size: settings.rw_buf_size,
            tmp_dir: Self::init_tmp_directory(settings.tmp_dir.as_deref())?,
        });
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts records of `inputs` into `output`.
    ///
    /// Inputs that can't be opened are skipped with a warning, malformed records are dropped.
    /// If no valid record is found the output is created empty.
    pub fn sort<P: AsRef<Path>>(&self, inputs: &[P], output: &Path) -> Result<SortStats, SortError> {
        let mut stats = SortStats::default();
        let mut state = SortState::Collecting;

        log::info!("sorting {} input files into {}", inputs.len(), output.display());

        loop {
            state = match state {
                SortState::Collecting => {
                    let collected = self.collect(inputs, output)?;
                    stats.total_records = collected.records;
                    stats.skipped_records = collected.skipped_records;
                    stats.missing_inputs = collected.missing_inputs;
                    stats.initial_runs = collected.runs;

                    SortState::next_pass(self.base_run_len as u64, stats.total_records)
                }
                SortState::Looping { run_len } => {
                    let merged = self.pass(output, run_len)?;
                    if merged.records != stats.total_records {
                        return Err(SortError::RecordCountMismatch {
                            expected: stats.total_records,
                            actual: merged.records,
                        });
                    }
                    stats.passes += 1;

                    SortState::next_pass(run_len.saturating_mul(2), stats.total_records)
                }
                SortState::Done => break,
            }
        }

        log::info!(
            "sorted {} records in {} passes ({} malformed records dropped, {} inputs skipped)",
            stats.total_records,
            stats.passes,
            stats.skipped_records,
            stats.missing_inputs
        );

        return Ok(stats);
    }

    /// Collection phase. (Re)creates `working` and fills it with sorted runs of `base_run_len`
    /// records read from `inputs`.
    pub fn collect<P: AsRef<Path>>(&self, inputs: &[P], working: &Path) -> Result<CollectStats, SortError> {
        let file = fs::File::create(working).map_err(|err| SortError::Output(working.to_path_buf(), err))?;
        let mut writer = io::BufWriter::with_capacity(self.rw_buf_size, file);

        let collector = RunCollector::new(
            &self.codec,
            &self.sorter,
            self.compare,
            self.base_run_len,
            self.rw_buf_size,
        );

        return collector.collect(inputs, &mut writer);
    }

    /// One split/merge pass. `working` must hold sorted runs of `run_len` records; after the pass
    /// it holds the same records as sorted runs of `2 * run_len` records.
    pub fn pass(&self, working: &Path, run_len: u64) -> Result<MergeStats, SortError> {
        log::debug!("pass started (run length: {})", run_len);

        let scratch_a = tempfile::tempfile_in(&self.tmp_dir).map_err(SortError::TempDir)?;
        let scratch_b = tempfile::tempfile_in(&self.tmp_dir).map_err(SortError::TempDir)?;

        let split_stats = {
            let file = fs::File::open(working).map_err(|err| SortError::Output(working.to_path_buf(), err))?;
            let mut reader = io::BufReader::with_capacity(self.rw_buf_size, file);
            let mut writer_a =
                io::BufWriter::with_capacity(self.rw_buf_size, scratch_a.try_clone().map_err(SortError::IO)?);
            let mut writer_b =
                io::BufWriter::with_capacity(self.rw_buf_size, scratch_b.try_clone().map_err(SortError::IO)?);

            RunSplitter::new(&self.codec, self.base_run_len, run_len)
                .split(&mut reader, &mut writer_a, &mut writer_b)
                .map_err(SortError::IO)?
        };
        log::debug!(
            "split {} runs ({} + {} records)",
            split_stats.runs,
            split_stats.records_a,
            split_stats.records_b
        );

        let mut reader_a = io::BufReader::with_capacity(self.rw_buf_size, scratch_a);
        let mut reader_b = io::BufReader::with_capacity(self.rw_buf_size, scratch_b);
        reader_a.rewind().map_err(SortError::IO)?;
        reader_b.rewind().map_err(SortError::IO)?;

        let file = fs::File::create(working).map_err(|err| SortError::Output(working.to_path_buf(), err))?;
        let mut writer = io::BufWriter::with_capacity(self.rw_buf_size, file);

        let merge_stats = RunMerger::new(&self.codec, self.compare, self.base_run_len, run_len)
            .merge(&mut reader_a, &mut reader_b, &mut writer)
            .map_err(SortError::IO)?;

        let split_records = split_stats.records_a + split_stats.records_b;
        if merge_stats.records != split_records {
            return Err(SortError::RecordCountMismatch {
                expected: split_records,
                actual: merge_stats.records,
            });
        }

        log::debug!("merged {} runs (run length: {})", merge_stats.runs, run_len.saturating_mul(2));

        return Ok(merge_stats);
    }
}

/// Sorts the files described by `config`.
///
/// The record codec and comparison function are chosen from the configured record format and
/// order, then a fresh [`ExternalSorter`] runs the whole sort.
pub fn sort_files(config: &SortConfig) -> Result<SortStats, SortError> {
    let order = config.order();
    let settings = config.settings();

    match config.format() {
        RecordFormat::Text => {
            let codec = LineCodec::new(config.charset());
            log::info!(
                "sorting text records ({}, {:?} order, {} sorter, run length {})",
                config.charset(),
                order,
                settings.sorter,
                settings.base_run_len
            );
            run_sorter(config, codec, order.comparator::<String>())
        }
        RecordFormat::Integer { radix } => {
            let codec = IntegerCodec::new(radix, config.charset())?;
            log::info!(
                "sorting integer records (radix {}, {}, {:?} order, {} sorter, run length {})",
                codec.radix(),
                config.charset(),
                order,
                settings.sorter,
                settings.base_run_len
            );
            run_sorter(config, codec, order.comparator::<i64>())
        }
    }
}

fn run_sorter<C, F>(config: &SortConfig, codec: C, compare: F) -> Result<SortStats, SortError>
where
    C: RecordCodec,
    F: Fn(&C::Record, &C::Record) -> Ordering + Copy,
{
    let sorter = ExternalSorter::new(codec, compare, config.settings())?;
    sorter.sort(config.inputs(), config.output())
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{sort_files, ExternalSorter, SortError, SortStats};
    use crate::codec::{IntegerCodec, LineCodec};
    use crate::config::{ConfigError, Order, RawConfig, RecordType, SortConfig, SortSettings};
    use crate::sorter::SorterKind;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    fn settings(tmp_dir: &tempfile::TempDir, base_run_len: usize) -> SortSettings {
        SortSettings {
            base_run_len,
            tmp_dir: Some(tmp_dir.path().to_path_buf()),
            ..SortSettings::default()
        }
    }

    fn write_input(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        return path;
    }

    fn read_numbers(path: &Path) -> Vec<i64> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| line.parse().unwrap())
            .collect()
    }

    fn lines(values: impl IntoIterator<Item = impl ToString>) -> String {
        values.into_iter().map(|v| v.to_string() + "\n").collect()
    }

    fn sort_config(dir: &tempfile::TempDir, order: Order, inputs: Vec<PathBuf>) -> SortConfig {
        SortConfig::resolve(RawConfig {
            record_type: Some(RecordType::Integer),
            order: Some(order),
            output: Some(dir.path().join("out.txt")),
            inputs,
            base_run_len: Some(4),
            tmp_dir: Some(dir.path().to_path_buf()),
            ..RawConfig::default()
        })
        .unwrap()
    }

    #[rstest]
    #[case(Order::Asc, vec![1, 2, 3, 5, 8, 9])]
    #[case(Order::Desc, vec![9, 8, 5, 3, 2, 1])]
    fn test_sort_files(tmp_dir: tempfile::TempDir, #[case] order: Order, #[case] expected: Vec<i64>) {
        let f1 = write_input(&tmp_dir, "f1.txt", "5\n3\n9\n1\n");
        let f2 = write_input(&tmp_dir, "f2.txt", "8\n2\n");
        let config = sort_config(&tmp_dir, order, vec![f1, f2]);

        let stats = sort_files(&config).unwrap();

        assert_eq!(read_numbers(config.output()), expected);
        assert_eq!(
            stats,
            SortStats {
                total_records: 6,
                skipped_records: 0,
                missing_inputs: 0,
                initial_runs: 2,
                passes: 1,
            }
        );
    }

    #[rstest]
    fn test_malformed_records_dropped(tmp_dir: tempfile::TempDir) {
        let f1 = write_input(&tmp_dir, "f1.txt", "7\nabc\n-3\n\n4\n");
        let config = sort_config(&tmp_dir, Order::Asc, vec![f1]);

        let stats = sort_files(&config).unwrap();

        assert_eq!(read_numbers(config.output()), vec![-3, 4, 7]);
        assert_eq!(stats.skipped_records, 2);
    }

    #[rstest]
    fn test_missing_input_skipped(tmp_dir: tempfile::TempDir) {
        let f1 = write_input(&tmp_dir, "f1.txt", &lines([6, 2, 4, 10, 8]));
        let missing = tmp_dir.path().join("missing.txt");
        let config = sort_config(&tmp_dir, Order::Asc, vec![missing, f1]);

        let stats = sort_files(&config).unwrap();

        assert_eq!(read_numbers(config.output()), vec![2, 4, 6, 8, 10]);
        assert_eq!(stats.missing_inputs, 1);
    }

    #[rstest]
    fn test_empty_inputs(tmp_dir: tempfile::TempDir) {
        let f1 = write_input(&tmp_dir, "f1.txt", "");
        let f2 = write_input(&tmp_dir, "f2.txt", "x\n\n");
        let config = sort_config(&tmp_dir, Order::Asc, vec![f1, f2]);

        let stats = sort_files(&config).unwrap();

        assert_eq!(fs::read(config.output()).unwrap(), b"");
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.passes, 0);
    }

    #[rstest]
    fn test_output_overwritten(tmp_dir: tempfile::TempDir) {
        let f1 = write_input(&tmp_dir, "f1.txt", "3\n1\n2\n");
        let config = sort_config(&tmp_dir, Order::Asc, vec![f1]);
        fs::write(config.output(), "stale\ncontent\n").unwrap();

        sort_files(&config).unwrap();

        assert_eq!(read_numbers(config.output()), vec![1, 2, 3]);
    }

    #[test]
    fn test_no_inputs_is_config_error() {
        let result = SortConfig::resolve(RawConfig {
            record_type: Some(RecordType::Integer),
            output: Some(PathBuf::from("out.txt")),
            ..RawConfig::default()
        });

        assert_eq!(result, Err(ConfigError::NoInputs));
    }

    #[rstest]
    #[case(0, 4, 0)]
    #[case(3, 4, 0)]
    #[case(4, 4, 0)]
    #[case(5, 4, 1)]
    #[case(8, 4, 1)]
    #[case(9, 4, 2)]
    #[case(17, 4, 3)]
    #[case(100, 4, 5)]
    #[case(100, 1, 7)]
    fn test_passes_count(
        tmp_dir: tempfile::TempDir,
        #[case] records: i64,
        #[case] base_run_len: usize,
        #[case] expected_passes: u32,
    ) {
        let input = write_input(&tmp_dir, "in.txt", &lines((0..records).rev()));
        let output = tmp_dir.path().join("out.txt");

        let sorter = ExternalSorter::new(
            IntegerCodec::decimal(),
            |a: &i64, b: &i64| a.cmp(b),
            &settings(&tmp_dir, base_run_len),
        )
        .unwrap();
        let stats = sorter.sort(&[input], &output).unwrap();

        assert_eq!(stats.passes, expected_passes);
        assert_eq!(read_numbers(&output), Vec::from_iter(0..records));
    }

    #[rstest]
    fn test_run_length_doubling(tmp_dir: tempfile::TempDir) {
        let mut values = Vec::from_iter(0..37i64);
        values.shuffle(&mut rand::thread_rng());
        let input = write_input(&tmp_dir, "in.txt", &lines(values));
        let working = tmp_dir.path().join("working.txt");

        let sorter = ExternalSorter::new(
            IntegerCodec::decimal(),
            |a: &i64, b: &i64| a.cmp(b),
            &settings(&tmp_dir, 4),
        )
        .unwrap();

        let collected = sorter.collect(&[input], &working).unwrap();
        assert_eq!(collected.records, 37);
        assert_eq!(collected.runs, 10);

        let mut run_len = 4u64;
        while run_len < 37 {
            let merged = sorter.pass(&working, run_len).unwrap();
            run_len *= 2;

            let records = read_numbers(&working);
            assert_eq!(records.len(), 37);
            assert_eq!(merged.runs, (37 + run_len - 1) / run_len);
            for run in records.chunks(run_len as usize) {
                assert!(run.windows(2).all(|pair| pair[0] <= pair[1]), "run not sorted: {:?}", run);
            }
        }
        assert_eq!(read_numbers(&working), Vec::from_iter(0..37));
    }

    #[rstest]
    #[case(false, SorterKind::Insertion)]
    #[case(true, SorterKind::Insertion)]
    #[case(false, SorterKind::Adaptive)]
    fn test_external_sorter(tmp_dir: tempfile::TempDir, #[case] reversed: bool, #[case] sorter_kind: SorterKind) {
        let input_sorted = 0..1000i64;

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());
        let inputs: Vec<PathBuf> = input_shuffled
            .chunks(300)
            .enumerate()
            .map(|(idx, chunk)| write_input(&tmp_dir, &format!("in{}.txt", idx), &lines(chunk)))
            .collect();
        let output = tmp_dir.path().join("out.txt");

        let compare = if reversed {
            |a: &i64, b: &i64| a.cmp(b).reverse()
        } else {
            |a: &i64, b: &i64| a.cmp(b)
        };

        let sorter = ExternalSorter::new(
            IntegerCodec::decimal(),
            compare,
            &SortSettings {
                sorter: sorter_kind,
                ..settings(&tmp_dir, 8)
            },
        )
        .unwrap();
        sorter.sort(&inputs, &output).unwrap();

        let expected_result = if reversed {
            Vec::from_iter(input_sorted.rev())
        } else {
            Vec::from_iter(input_sorted)
        };

        assert_eq!(read_numbers(&output), expected_result)
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_external_sorter_stability(tmp_dir: tempfile::TempDir, #[case] reversed: bool) {
        let input_sorted = (0..20).flat_map(|x| (0..5).map(move |y| (x, y)));

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());
        // sort input by the second field to check sorting stability
        input_shuffled.sort_by(|a: &(i32, i32), b: &(i32, i32)| {
            if reversed {
                a.1.cmp(&b.1).reverse()
            } else {
                a.1.cmp(&b.1)
            }
        });

        let input = write_input(
            &tmp_dir,
            "in.txt",
            &lines(input_shuffled.iter().map(|(x, y)| format!("{:02},{}", x, y))),
        );
        let output = tmp_dir.path().join("out.txt");

        let compare = if reversed {
            |a: &String, b: &String| a[..2].cmp(&b[..2]).reverse()
        } else {
            |a: &String, b: &String| a[..2].cmp(&b[..2])
        };

        let sorter = ExternalSorter::new(LineCodec::default(), compare, &settings(&tmp_dir, 8)).unwrap();
        sorter.sort(&[input], &output).unwrap();

        let expected_result: Vec<String> = if reversed {
            input_sorted.clone().rev().map(|(x, y)| format!("{:02},{}", x, y)).collect()
        } else {
            input_sorted.clone().map(|(x, y)| format!("{:02},{}", x, y)).collect()
        };
        let actual_result: Vec<String> = fs::read_to_string(&output)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();

        assert_eq!(actual_result, expected_result)
    }

    #[rstest]
    fn test_carriage_return_at_end_of_input(tmp_dir: tempfile::TempDir) {
        let input1 = write_input(&tmp_dir, "in1.txt", "abc\u{1}\nabc\r");
        let input2 = write_input(&tmp_dir, "in2.txt", "b\nc\n");
        let output = tmp_dir.path().join("out.txt");

        let sorter = ExternalSorter::new(
            LineCodec::default(),
            |a: &String, b: &String| a.cmp(b),
            &settings(&tmp_dir, 2),
        )
        .unwrap();
        let stats = sorter.sort(&[input1, input2], &output).unwrap();

        assert_eq!(stats.total_records, 4);
        assert_eq!(fs::read_to_string(&output).unwrap(), "abc\nabc\u{1}\nb\nc\n");
    }

    #[rstest]
    fn test_zero_run_length(tmp_dir: tempfile::TempDir) {
        let result = ExternalSorter::new(
            IntegerCodec::decimal(),
            |a: &i64, b: &i64| a.cmp(b),
            &settings(&tmp_dir, 0),
        );

        assert!(matches!(result, Err(SortError::Config(ConfigError::ZeroRunLength))));
    }
}
