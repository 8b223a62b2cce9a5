//! A generic reader for one record stream.

use crate::error::{Error, Result};
use crate::framing::Deframer;
use std::io::Read;

/// A reader for streaming records out of a stream file.
///
/// This reader is generic over a `Deframer` strategy, which defines how
/// each record is parsed from the byte stream. It provides three APIs:
///
/// 1. **Processor API** (`process_all()`): closure-based processing of borrowed payloads
/// 2. **Expert API** (`messages()`): manual, borrowing iteration
/// 3. **Iterator**: owned payloads, which is what the lockstep join consumes
///
/// A reader may be limited to a number of records (`with_limit`), in which case
/// frames beyond the limit are never read. Containers use this to hide records
/// that were written after the last committed checkpoint.
pub struct StreamReader<R: Read, D: Deframer> {
    reader: R,
    deframer: D,
    // The reader owns its buffer, resizing as needed.
    buffer: Vec<u8>,
    limit: Option<u64>,
    consumed: u64,
    fused: bool,
}

impl<R: Read, D: Deframer> StreamReader<R, D> {
    /// Creates a new `StreamReader` with the given reader and deframing strategy.
    pub fn new(reader: R, deframer: D) -> Self {
        Self {
            reader,
            deframer,
            buffer: Vec::new(),
            limit: None,
            consumed: 0,
            fused: false,
        }
    }

    /// Stops after `limit` records even if more frames follow.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Records returned so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Reads the next record into the internal buffer.
    /// Returns Ok(Some(payload)) on success, Ok(None) on clean EOF or when the limit is reached.
    ///
    /// A limited reader that hits EOF before its limit returns
    /// `Error::UnexpectedEof`: the limit counts records that must exist.
    pub fn read_message(&mut self) -> Result<Option<&[u8]>> {
        if self.limit.is_some_and(|limit| self.consumed >= limit) {
            return Ok(None);
        }
        match self
            .deframer
            .read_and_deframe(&mut self.reader, &mut self.buffer)?
        {
            Some(_) => {
                self.consumed += 1;
                Ok(Some(&self.buffer))
            }
            None if self.limit.is_some() => Err(Error::UnexpectedEof),
            None => Ok(None),
        }
    }

    /// Processes all records in the stream using a closure.
    ///
    /// The closure receives each payload and should return `Ok(())` to continue
    /// or an error to stop.
    pub fn process_all<F>(&mut self, mut processor: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        while let Some(payload) = self.read_message()? {
            processor(payload)?;
        }
        Ok(())
    }

    /// Returns an iterator-like object for manual record processing.
    pub fn messages(&mut self) -> Messages<'_, R, D> {
        Messages { reader: self }
    }
}

/// Owned iteration. Each item copies the payload out of the internal buffer.
/// The iterator is fused after the first error.
impl<R: Read, D: Deframer> Iterator for StreamReader<R, D> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.read_message() {
            Ok(Some(payload)) => Some(Ok(payload.to_vec())),
            Ok(None) => {
                self.fused = true;
                None
            }
            Err(e) => {
                self.fused = true;
                Some(Err(e))
            }
        }
    }
}

/// An iterator-like object for manual record processing.
///
/// It borrows the `StreamReader` mutably, so each payload is valid until the
/// next call to `next()`.
pub struct Messages<'a, R: Read, D: Deframer> {
    reader: &'a mut StreamReader<R, D>,
}

impl<'a, R: Read, D: Deframer> Messages<'a, R, D> {
    /// Returns the next record in the stream.
    ///
    /// # Returns
    /// * `Ok(Some(payload))` - A record was successfully read
    /// * `Ok(None)` - End of stream reached
    /// * `Err(e)` - An error occurred during reading
    pub fn next(&mut self) -> Result<Option<&[u8]>> {
        self.reader.read_message()
    }
}
