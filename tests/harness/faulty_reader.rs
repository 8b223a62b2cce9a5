use std::io::{Read, Result};

/// Wraps a reader and misbehaves in a controlled way.
pub struct FaultyReader<R: Read> {
    inner: R,
    mode: FaultMode,
    calls: usize,
    position: usize,
}

pub enum FaultMode {
    /// Deliver at most one byte per read.
    OneByteChunks,
    /// Fail every n-th read with `Interrupted`.
    InterruptedEvery(usize),
    /// Report EOF once this many bytes were delivered.
    EofAfter(usize),
    /// Flip the lowest bit of the byte at this offset.
    FlipBitAt(usize),
}

impl<R: Read> FaultyReader<R> {
    pub fn new(inner: R, mode: FaultMode) -> Self {
        Self {
            inner,
            mode,
            calls: 0,
            position: 0,
        }
    }
}

impl<R: Read> Read for FaultyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.calls += 1;
        let n = match self.mode {
            FaultMode::OneByteChunks => {
                let len = buf.len().min(1);
                self.inner.read(&mut buf[..len])?
            }
            FaultMode::InterruptedEvery(every) if every != 0 && self.calls % every == 0 => {
                return Err(std::io::Error::from(std::io::ErrorKind::Interrupted));
            }
            FaultMode::EofAfter(limit) => {
                let room = limit.saturating_sub(self.position).min(buf.len());
                self.inner.read(&mut buf[..room])?
            }
            FaultMode::FlipBitAt(offset) => {
                let n = self.inner.read(buf)?;
                if (self.position..self.position + n).contains(&offset) {
                    buf[offset - self.position] ^= 0x01;
                }
                n
            }
            _ => self.inner.read(buf)?,
        };
        self.position += n;
        Ok(n)
    }
}
