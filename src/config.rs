//! Sort configuration.
//!
//! [`RawConfig`] is what a front-end (such as the command line) collects. It is turned into an
//! immutable [`SortConfig`] by [`SortConfig::resolve`], which fails if any required value is
//! missing or invalid, so a sort never starts from a partial configuration.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::codec::{Charset, MAX_RADIX, MIN_RADIX};
use crate::sorter::SorterKind;

/// Default number of records per initial run.
pub const DEFAULT_RUN_LEN: usize = 256;
/// Default numeric base of integer records.
pub const DEFAULT_RADIX: u32 = 10;
/// Default file read/write buffer size.
pub const DEFAULT_RW_BUF_SIZE: usize = 8 * 1024;

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Output file is not specified.
    MissingOutput,
    /// No input files are specified.
    NoInputs,
    /// Record type is not specified.
    MissingRecordType,
    /// Numeric base is out of the supported range.
    InvalidRadix(u32),
    /// Charset is not supported.
    UnsupportedCharset(String),
    /// Base run length is zero.
    ZeroRunLength,
    /// Read/write buffer size is zero.
    ZeroBufferSize,
}

impl Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConfigError::MissingOutput => write!(f, "output file is not specified"),
            ConfigError::NoInputs => write!(f, "no input files specified"),
            ConfigError::MissingRecordType => write!(f, "record type (strings or integers) is not specified"),
            ConfigError::InvalidRadix(radix) => write!(
                f,
                "invalid radix {}: must be in range {}..={}",
                radix, MIN_RADIX, MAX_RADIX
            ),
            ConfigError::UnsupportedCharset(name) => write!(f, "unsupported charset: {}", name),
            ConfigError::ZeroRunLength => write!(f, "run length must be positive"),
            ConfigError::ZeroBufferSize => write!(f, "read/write buffer size must be positive"),
        }
    }
}

/// Record type selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Text,
    Integer,
}

/// Resolved record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One text record per line.
    Text,
    /// One signed 64-bit integer per line, written in base `radix`.
    Integer { radix: u32 },
}

/// Sorting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// Returns the comparison function implementing this order over `T`.
    pub fn comparator<T: Ord>(self) -> fn(&T, &T) -> Ordering {
        match self {
            Order::Asc => |a, b| a.cmp(b),
            Order::Desc => |a, b| b.cmp(a),
        }
    }
}

impl Default for Order {
    fn default() -> Self {
        Order::Asc
    }
}

/// Sort engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSettings {
    /// Number of records sorted in memory per initial run. Also bounds every in-memory buffer.
    pub base_run_len: usize,
    /// In-memory sorting strategy.
    pub sorter: SorterKind,
    /// File read/write buffer size.
    pub rw_buf_size: usize,
    /// Directory to be used to store scratch files. If [`None`] the OS temporary directory is used.
    pub tmp_dir: Option<PathBuf>,
}

impl Default for SortSettings {
    fn default() -> Self {
        SortSettings {
            base_run_len: DEFAULT_RUN_LEN,
            sorter: SorterKind::default(),
            rw_buf_size: DEFAULT_RW_BUF_SIZE,
            tmp_dir: None,
        }
    }
}

/// Unvalidated configuration as collected by a front-end.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub record_type: Option<RecordType>,
    pub order: Option<Order>,
    pub charset: Option<String>,
    pub radix: Option<u32>,
    pub output: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub base_run_len: Option<usize>,
    pub sorter: Option<SorterKind>,
    pub rw_buf_size: Option<usize>,
    pub tmp_dir: Option<PathBuf>,
}

/// Validated sort configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    format: RecordFormat,
    order: Order,
    charset: Charset,
    output: PathBuf,
    inputs: Vec<PathBuf>,
    settings: SortSettings,
}

impl SortConfig {
    /// Validates `raw` and resolves defaults.
    pub fn resolve(raw: RawConfig) -> Result<Self, ConfigError> {
        let output = raw.output.ok_or(ConfigError::MissingOutput)?;
        if raw.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        let record_type = raw.record_type.ok_or(ConfigError::MissingRecordType)?;

        let radix = raw.radix.unwrap_or(DEFAULT_RADIX);
        if !(MIN_RADIX..=MAX_RADIX).contains(&radix) {
            return Err(ConfigError::InvalidRadix(radix));
        }

        let charset = match raw.charset {
            Some(name) => name.parse::<Charset>()?,
            None => Charset::default(),
        };

        let defaults = SortSettings::default();
        let base_run_len = raw.base_run_len.unwrap_or(defaults.base_run_len);
        if base_run_len == 0 {
            return Err(ConfigError::ZeroRunLength);
        }
        let rw_buf_size = raw.rw_buf_size.unwrap_or(defaults.rw_buf_size);
        if rw_buf_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }

        let format = match record_type {
            RecordType::Text => RecordFormat::Text,
            RecordType::Integer => RecordFormat::Integer { radix },
        };

        return Ok(SortConfig {
            format,
            order: raw.order.unwrap_or_default(),
            charset,
            output,
            inputs: raw.inputs,
            settings: SortSettings {
                base_run_len,
                sorter: raw.sorter.unwrap_or(defaults.sorter),
                rw_buf_size,
                tmp_dir: raw.tmp_dir,
            },
        });
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn settings(&self) -> &SortSettings {
        &self.settings
    }
}
