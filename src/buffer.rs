//! Record-count limited buffer.

use std::collections::VecDeque;
use std::io;
use std::io::prelude::*;

use crate::codec::{Decoded, RecordCodec};

/// Buffer limited by records count.
///
/// Every phase of the sort keeps its in-memory records in buffers of this type, so the resident
/// record count never exceeds a small multiple of the configured base run length.
pub struct LimitedBuffer<T> {
    limit: usize,
    inner: VecDeque<T>,
}

impl<T> LimitedBuffer<T> {
    /// Creates an empty buffer holding at most `limit` records.
    pub fn new(limit: usize) -> Self {
        LimitedBuffer {
            limit,
            inner: VecDeque::with_capacity(limit),
        }
    }

    /// Adds a new record to the back of the buffer.
    pub fn push(&mut self, item: T) {
        self.inner.push_back(item);
    }

    /// Removes the first record of the buffer.
    pub fn pop_front(&mut self) -> Option<T> {
        self.inner.pop_front()
    }

    /// Returns a reference to the first record of the buffer.
    pub fn front(&self) -> Option<&T> {
        self.inner.front()
    }

    /// Returns buffer length.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Number of records that can still be added before the buffer is full.
    pub fn spare(&self) -> usize {
        self.limit.saturating_sub(self.inner.len())
    }

    /// Returns buffer content as a contiguous mutable slice so it can be sorted in place.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.inner.make_contiguous()
    }

    /// Reads records from `reader` until the buffer is full, `max` records have been added or the
    /// stream is exhausted. Skip outcomes are consumed and do not count.
    ///
    /// Returns the number of records added.
    pub fn fill_from<C, R>(&mut self, codec: &C, reader: &mut R, max: usize) -> io::Result<usize>
    where
        C: RecordCodec<Record = T>,
        R: BufRead,
    {
        let wanted = max.min(self.spare());
        let mut read = 0;

        while read < wanted {
            match codec.read(reader)? {
                Decoded::Record(item) => {
                    self.push(item);
                    read += 1;
                }
                Decoded::Skip => continue,
                Decoded::Eof => break,
            }
        }

        return Ok(read);
    }

    /// Writes all buffered records to `writer` in order and clears the buffer.
    ///
    /// Returns the number of records written.
    pub fn drain_to<C, W>(&mut self, codec: &C, writer: &mut W) -> io::Result<usize>
    where
        C: RecordCodec<Record = T>,
        W: Write,
    {
        let written = self.inner.len();
        for item in self.inner.drain(..) {
            codec.write(writer, &item)?;
        }

        return Ok(written);
    }
}

impl<T> IntoIterator for LimitedBuffer<T> {
    type Item = T;
    type IntoIter = <VecDeque<T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::LimitedBuffer;
    use crate::codec::{IntegerCodec, LineCodec};

    #[test]
    fn test_limited_buffer() {
        let mut buffer = LimitedBuffer::new(2);

        buffer.push(0);
        assert_eq!(buffer.is_full(), false);
        assert_eq!(buffer.spare(), 1);
        buffer.push(1);
        assert_eq!(buffer.is_full(), true);
        assert_eq!(buffer.front(), Some(&0));

        let data = Vec::from_iter(buffer);
        assert_eq!(data, vec![0, 1]);
    }

    #[test]
    fn test_fill_skips_malformed_records() {
        let codec = IntegerCodec::decimal();
        let mut reader = io::Cursor::new("1\nabc\n2\n\n3\n4\n");
        let mut buffer = LimitedBuffer::new(3);

        let read = buffer.fill_from(&codec, &mut reader, usize::MAX).unwrap();
        assert_eq!(read, 3);
        assert_eq!(Vec::from_iter(buffer), vec![1, 2, 3]);
    }

    #[test]
    fn test_fill_respects_max_and_eof() {
        let codec = LineCodec::default();
        let mut reader = io::Cursor::new("a\nb\nc\n");
        let mut buffer = LimitedBuffer::new(8);

        assert_eq!(buffer.fill_from(&codec, &mut reader, 2).unwrap(), 2);
        assert_eq!(buffer.fill_from(&codec, &mut reader, 2).unwrap(), 1);
        assert_eq!(buffer.fill_from(&codec, &mut reader, 2).unwrap(), 0);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_drain_writes_and_clears() {
        let codec = LineCodec::default();
        let mut buffer = LimitedBuffer::new(2);
        buffer.push("x".to_string());
        buffer.push("y".to_string());

        let mut out = Vec::new();
        assert_eq!(buffer.drain_to(&codec, &mut out).unwrap(), 2);
        assert!(buffer.is_empty());
        assert_eq!(out, b"x\ny\n");
    }
}
