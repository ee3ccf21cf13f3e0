use std::path::PathBuf;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use natural_merge_sort::{sort_files, Order, RawConfig, RecordType, SortConfig, SorterKind};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    // flags overriding each other leave only the last one present
    let record_type = if arg_parser.is_present("integers") {
        Some(RecordType::Integer)
    } else if arg_parser.is_present("strings") {
        Some(RecordType::Text)
    } else {
        None
    };
    let order = if arg_parser.is_present("desc") {
        Order::Desc
    } else {
        Order::Asc
    };

    let rw_buf_size = match arg_parser.value_of("rw_buf_size").map(parse_buf_size).transpose() {
        Ok(size) => size,
        Err(err) => {
            log::error!("{}", err);
            process::exit(1);
        }
    };

    let raw_config = RawConfig {
        record_type,
        order: Some(order),
        charset: arg_parser.value_of("charset").map(String::from),
        radix: arg_parser
            .is_present("radix")
            .then(|| arg_parser.value_of_t_or_exit("radix")),
        output: arg_parser.value_of("output").map(PathBuf::from),
        inputs: arg_parser
            .values_of("inputs")
            .map(|values| values.map(PathBuf::from).collect())
            .unwrap_or_default(),
        base_run_len: arg_parser
            .is_present("run_length")
            .then(|| arg_parser.value_of_t_or_exit("run_length")),
        sorter: arg_parser
            .is_present("sorter")
            .then(|| arg_parser.value_of_t_or_exit::<SorterKind>("sorter")),
        rw_buf_size,
        tmp_dir: arg_parser.value_of("tmp_dir").map(PathBuf::from),
    };

    let config = match SortConfig::resolve(raw_config) {
        Ok(config) => config,
        Err(err) => {
            log::error!("configuration error: {}", err);
            process::exit(1);
        }
    };

    match sort_files(&config) {
        Ok(stats) => log::info!(
            "{} written: {} records, {} malformed records dropped, {} inputs skipped",
            config.output().display(),
            stats.total_records,
            stats.skipped_records,
            stats.missing_inputs
        ),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as ArgEnum>::from_str(s, true)
    }
}

/// Parses a human readable size such as `64KiB` into a buffer length addressable on this platform.
fn parse_buf_size(value: &str) -> Result<usize, String> {
    let size = value
        .parse::<ByteSize>()
        .map_err(|err| format!("Buffer size format incorrect: {}", err))?;

    return usize::try_from(size.as_u64()).map_err(|_| format!("Buffer size too large: {}", value));
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("natural-merge-sort")
        .about("sorts text or integer records of several files into one file using bounded memory")
        .setting(clap::AppSettings::AllArgsOverrideSelf)
        .arg(
            clap::Arg::new("output")
                .index(1)
                .help("result file")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("inputs")
                .index(2)
                .help("files to be sorted")
                .takes_value(true)
                .multiple_values(true),
        )
        .arg(
            clap::Arg::new("asc")
                .short('a')
                .long("asc")
                .help("ascending order (default)")
                .overrides_with("desc"),
        )
        .arg(
            clap::Arg::new("desc")
                .short('d')
                .long("desc")
                .help("descending order")
                .overrides_with("asc"),
        )
        .arg(
            clap::Arg::new("strings")
                .short('s')
                .long("strings")
                .help("records are text lines")
                .overrides_with("integers"),
        )
        .arg(
            clap::Arg::new("integers")
                .short('i')
                .long("integers")
                .help("records are integers")
                .overrides_with("strings"),
        )
        .arg(
            clap::Arg::new("charset")
                .long("charset")
                .alias("cs")
                .help("charset of all files (UTF-8, ISO-8859-1, US-ASCII)")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("radix")
                .short('n')
                .long("radix")
                .alias("ns")
                .help("numeric base of integer records")
                .takes_value(true)
                .validator(|v| match v.parse::<u32>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Invalid radix: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("run_length")
                .short('r')
                .long("run-length")
                .help("number of records sorted in memory at once")
                .takes_value(true)
                .validator(|v| match v.parse::<usize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Run length format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("sorter")
                .long("sorter")
                .help("in-memory sorting algorithm")
                .takes_value(true)
                .possible_values(["insertion", "adaptive"]),
        )
        .arg(
            clap::Arg::new("rw_buf_size")
                .long("rw-buf-size")
                .help("file read/write buffer size")
                .takes_value(true)
                .validator(parse_buf_size),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("warn")
                .possible_values(LogLevel::value_variants().iter().filter_map(|v| v.to_possible_value())),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(log_level.into())
        .format_timestamp_millis()
        .init();
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::{parse_buf_size, LogLevel};

    #[rstest]
    #[case("off", log::LevelFilter::Off)]
    #[case("warn", log::LevelFilter::Warn)]
    #[case("DEBUG", log::LevelFilter::Debug)]
    #[case("trace", log::LevelFilter::Trace)]
    fn test_log_level(#[case] name: &str, #[case] expected: log::LevelFilter) {
        let level: LogLevel = name.parse().unwrap();
        assert_eq!(log::LevelFilter::from(level), expected);
    }

    #[test]
    fn test_unknown_log_level() {
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[rstest]
    #[case("1024", 1024)]
    #[case("8KiB", 8 * 1024)]
    #[case("1 MiB", 1024 * 1024)]
    fn test_buf_size(#[case] value: &str, #[case] expected: usize) {
        assert_eq!(parse_buf_size(value), Ok(expected));
    }

    #[test]
    fn test_buf_size_invalid() {
        assert!(parse_buf_size("lots").is_err());
    }

    #[test]
    fn test_buf_size_beyond_address_space() {
        let result = parse_buf_size("8GiB");
        if usize::BITS < 64 {
            assert!(result.is_err());
        } else {
            assert_eq!(result.map(|size| size as u64), Ok(8 << 30));
        }
    }
}
