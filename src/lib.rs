//! `natural-merge-sort` sorts text or integer records from one or more input files into an output
//! file while keeping memory usage bounded, whatever the input size.
//!
//! It implements a balanced two-way external merge sort. During the collection phase the inputs are
//! cut into chunks of a fixed number of records (the base run length), every chunk is sorted in
//! memory and written to the output file as a sorted run. Then each pass splits the runs of the
//! output file alternately over two scratch files and merges them back pairwise, doubling the run
//! length, until a single run spans the whole dataset. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Bounded memory:**
//!   every phase holds at most a small constant multiple of the base run length in memory.
//! * **Pluggable record codecs:**
//!   text lines and integers in any base from 2 to 36 are supported out of the box, other record
//!   types can be sorted by implementing [`RecordCodec`].
//! * **Fault tolerance:**
//!   malformed records are dropped and unreadable input files are skipped with a warning.
//! * **Stable:**
//!   records that compare equal keep their input order.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use natural_merge_sort::{sort_files, Order, RawConfig, RecordType, SortConfig};
//!
//! fn main() {
//!     let config = SortConfig::resolve(RawConfig {
//!         record_type: Some(RecordType::Integer),
//!         order: Some(Order::Desc),
//!         output: Some(PathBuf::from("output.txt")),
//!         inputs: vec![PathBuf::from("input1.txt"), PathBuf::from("input2.txt")],
//!         ..RawConfig::default()
//!     })
//!     .unwrap();
//!
//!     let stats = sort_files(&config).unwrap();
//!     println!("{} records sorted", stats.total_records);
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod collector;
pub mod config;
pub mod merger;
pub mod sort;
pub mod sorter;
pub mod splitter;

pub use buffer::LimitedBuffer;
pub use codec::{Charset, Decoded, IntegerCodec, LineCodec, RecordCodec};
pub use collector::{CollectStats, RunCollector};
pub use config::{ConfigError, Order, RawConfig, RecordFormat, RecordType, SortConfig, SortSettings};
pub use merger::{MergeStats, RunMerger};
pub use sort::{sort_files, ExternalSorter, SortError, SortStats};
pub use sorter::{InMemorySorter, SorterKind};
pub use splitter::{RunSplitter, SplitStats};
