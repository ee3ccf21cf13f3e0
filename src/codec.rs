//! Record codecs.
//!
//! A codec converts between a record value and its textual line form. Every stream used by the
//! sorter (input files, scratch streams and the working file) is accessed through a codec, one
//! record per `\n`-terminated line.

use std::fmt;
use std::io;
use std::io::prelude::*;
use std::str::FromStr;

use crate::config::ConfigError;

const RADIX_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Smallest supported numeric base.
pub const MIN_RADIX: u32 = 2;
/// Largest supported numeric base.
pub const MAX_RADIX: u32 = 36;

/// Outcome of a single codec read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// A record was decoded.
    Record(T),
    /// The next token could not be decoded and was consumed; the caller may read again.
    Skip,
    /// The stream is exhausted.
    Eof,
}

/// Record codec interface. Reads and writes one record at a time from/to a buffered stream.
pub trait RecordCodec {
    /// Record type the codec produces.
    type Record;

    /// Reads the next record from the stream.
    ///
    /// Malformed tokens are reported as [`Decoded::Skip`], not as errors. Only I/O failures of the
    /// underlying stream are returned as `Err`.
    fn read<R: BufRead>(&self, reader: &mut R) -> io::Result<Decoded<Self::Record>>;

    /// Appends one encoded record followed by its delimiter.
    fn write<W: Write>(&self, writer: &mut W, record: &Self::Record) -> io::Result<()>;
}

/// Character set used for all file I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    /// ISO-8859-1.
    Latin1,
    /// US-ASCII.
    Ascii,
}

impl Charset {
    /// Decodes a line. Returns [`None`] if the bytes are not valid in this charset.
    pub fn decode(self, bytes: Vec<u8>) -> Option<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes).ok(),
            Charset::Latin1 => Some(bytes.into_iter().map(char::from).collect()),
            Charset::Ascii => {
                if bytes.is_ascii() {
                    String::from_utf8(bytes).ok()
                } else {
                    None
                }
            }
        }
    }

    /// Encodes `text` into `writer`. Characters the charset cannot represent are written as `?`.
    pub fn encode<W: Write>(self, writer: &mut W, text: &str) -> io::Result<()> {
        let max = match self {
            Charset::Utf8 => return writer.write_all(text.as_bytes()),
            Charset::Latin1 => 0xFF,
            Charset::Ascii => 0x7F,
        };

        let encoded: Vec<u8> = text
            .chars()
            .map(|c| if (c as u32) <= max { c as u32 as u8 } else { b'?' })
            .collect();

        return writer.write_all(&encoded);
    }
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Utf8
    }
}

impl FromStr for Charset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "UTF8" => Ok(Charset::Utf8),
            "ISO88591" | "LATIN1" | "L1" | "CP819" => Ok(Charset::Latin1),
            "USASCII" | "ASCII" => Ok(Charset::Ascii),
            _ => Err(ConfigError::UnsupportedCharset(s.to_string())),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Utf8 => write!(f, "UTF-8"),
            Charset::Latin1 => write!(f, "ISO-8859-1"),
            Charset::Ascii => write!(f, "US-ASCII"),
        }
    }
}

/// Reads one line into `buf` without its `\n` terminator and trailing `\r` bytes, so a line reads
/// the same whether or not it ends the stream and however many times it is rewritten.
/// Returns `false` if the stream is exhausted.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(false);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    while buf.last() == Some(&b'\r') {
        buf.pop();
    }

    return Ok(true);
}

/// Text line codec. Blank (whitespace-only) lines and lines not valid in the charset are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec {
    charset: Charset,
}

impl LineCodec {
    pub fn new(charset: Charset) -> Self {
        LineCodec { charset }
    }
}

impl RecordCodec for LineCodec {
    type Record = String;

    fn read<R: BufRead>(&self, reader: &mut R) -> io::Result<Decoded<String>> {
        let mut buf = Vec::new();
        if !read_line(reader, &mut buf)? {
            return Ok(Decoded::Eof);
        }

        return Ok(match self.charset.decode(buf) {
            Some(line) if !line.trim().is_empty() => Decoded::Record(line),
            _ => Decoded::Skip,
        });
    }

    fn write<W: Write>(&self, writer: &mut W, record: &String) -> io::Result<()> {
        self.charset.encode(writer, record)?;
        writer.write_all(b"\n")
    }
}

/// 64-bit signed integer codec with a configurable numeric base.
///
/// Surrounding whitespace is ignored on read. Lines that do not parse in the configured base are
/// skipped. Records are written in the same base using lowercase digits.
#[derive(Debug, Clone, Copy)]
pub struct IntegerCodec {
    radix: u32,
    charset: Charset,
}

impl IntegerCodec {
    /// Creates a codec for numbers in base `radix` (2..=36).
    pub fn new(radix: u32, charset: Charset) -> Result<Self, ConfigError> {
        if !(MIN_RADIX..=MAX_RADIX).contains(&radix) {
            return Err(ConfigError::InvalidRadix(radix));
        }

        return Ok(IntegerCodec { radix, charset });
    }

    /// Base 10, UTF-8 codec.
    pub fn decimal() -> Self {
        IntegerCodec {
            radix: 10,
            charset: Charset::Utf8,
        }
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    /// Formats `value` in the codec base.
    pub fn format(&self, value: i64) -> String {
        if self.radix == 10 {
            return value.to_string();
        }

        let radix = self.radix as u64;
        let mut magnitude = value.unsigned_abs();
        let mut digits = Vec::new();
        loop {
            digits.push(RADIX_DIGITS[(magnitude % radix) as usize]);
            magnitude /= radix;
            if magnitude == 0 {
                break;
            }
        }
        if value < 0 {
            digits.push(b'-');
        }
        digits.reverse();

        digits.into_iter().map(char::from).collect()
    }
}

impl RecordCodec for IntegerCodec {
    type Record = i64;

    fn read<R: BufRead>(&self, reader: &mut R) -> io::Result<Decoded<i64>> {
        let mut buf = Vec::new();
        if !read_line(reader, &mut buf)? {
            return Ok(Decoded::Eof);
        }

        let parsed = self
            .charset
            .decode(buf)
            .and_then(|line| i64::from_str_radix(line.trim(), self.radix).ok());

        return Ok(match parsed {
            Some(value) => Decoded::Record(value),
            None => Decoded::Skip,
        });
    }

    fn write<W: Write>(&self, writer: &mut W, record: &i64) -> io::Result<()> {
        writer.write_all(self.format(*record).as_bytes())?;
        writer.write_all(b"\n")
    }
}
