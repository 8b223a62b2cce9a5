//! Defines the framing and deframing strategies for stream files.
//!
//! Every record in a stream file is one frame: `[4-byte length | checksum | payload]`.
//! The checksum width depends on the strategy (zero bytes for the default framer).

use crate::checksum::Checksum;
use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Upper bound on a single record frame accepted by container readers (64 MiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

//--- Framer Trait and Implementations ---

/// A trait that defines how a raw payload is framed and written to a stream.
pub trait Framer {
    fn frame_and_write<W: Write>(&self, writer: &mut W, payload: &[u8]) -> Result<()>;
}

/// The default framing strategy: `[4-byte length | payload]`
pub struct DefaultFramer;

impl Framer for DefaultFramer {
    fn frame_and_write<W: Write>(&self, writer: &mut W, payload: &[u8]) -> Result<()> {
        let payload_len = checked_len(payload)?;
        writer.write_all(&payload_len.to_le_bytes())?;
        writer.write_all(payload)?;
        Ok(())
    }
}

/// A framing strategy that includes a checksum: `[4-byte length | checksum | payload]`
///
/// The checksum occupies `Checksum::size()` bytes (0, 2, 4 or 8).
pub struct ChecksumFramer<C: Checksum> {
    checksum_alg: C,
}

impl<C: Checksum> ChecksumFramer<C> {
    pub fn new(checksum_alg: C) -> Self {
        Self { checksum_alg }
    }
}

impl<C: Checksum> Framer for ChecksumFramer<C> {
    fn frame_and_write<W: Write>(&self, writer: &mut W, payload: &[u8]) -> Result<()> {
        let payload_len = checked_len(payload)?;
        let checksum_size = self.checksum_alg.size();

        writer.write_all(&payload_len.to_le_bytes())?;
        match checksum_size {
            0 => {}
            2 => writer.write_all(&(self.checksum_alg.calculate(payload) as u16).to_le_bytes())?,
            4 => writer.write_all(&(self.checksum_alg.calculate(payload) as u32).to_le_bytes())?,
            _ => writer.write_all(&self.checksum_alg.calculate(payload).to_le_bytes())?,
        }
        writer.write_all(payload)?;
        Ok(())
    }
}

// Enforce 32-bit length header contract to avoid truncation on cast
fn checked_len(payload: &[u8]) -> Result<u32> {
    u32::try_from(payload.len()).map_err(|_| {
        Error::invalid_frame(format!(
            "payload length {} exceeds 32-bit header limit",
            payload.len()
        ))
    })
}

//--- Deframer Trait and Implementations ---

/// A trait that defines how a message is deframed and read from a stream.
pub trait Deframer {
    /// Returns Ok(Some(())) on success, Ok(None) on clean EOF.
    fn read_and_deframe<R: Read>(&self, reader: &mut R, buffer: &mut Vec<u8>)
        -> Result<Option<()>> {
        match read_len(reader)? {
            Some(payload_len) => self.read_after_length(reader, buffer, payload_len),
            None => Ok(None),
        }
    }

    /// Called when the 4-byte little-endian payload length has already been read.
    /// Implementations must read any additional header fields (e.g., checksum), then the payload.
    fn read_after_length<R: Read>(
        &self,
        reader: &mut R,
        buffer: &mut Vec<u8>,
        payload_len: usize,
    ) -> Result<Option<()>>;
}

/// Reads the length header. A clean EOF before the first byte is `Ok(None)`.
fn read_len<R: Read>(reader: &mut R) -> Result<Option<usize>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(_) => Ok(Some(u32::from_le_bytes(len_bytes) as usize)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_payload<R: Read>(reader: &mut R, buffer: &mut Vec<u8>, payload_len: usize) -> Result<()> {
    buffer.resize(payload_len, 0);
    reader.read_exact(buffer).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
        _ => e.into(),
    })
}

/// The default deframing strategy. Resizes and zeroes the buffer.
#[derive(Clone, Copy, Default)]
pub struct DefaultDeframer;

impl Deframer for DefaultDeframer {
    fn read_after_length<R: Read>(
        &self,
        reader: &mut R,
        buffer: &mut Vec<u8>,
        payload_len: usize,
    ) -> Result<Option<()>> {
        read_payload(reader, buffer, payload_len)?;
        Ok(Some(()))
    }
}

/// A deframing strategy that verifies a checksum written by a matching `ChecksumFramer<C>`.
#[derive(Clone, Copy)]
pub struct ChecksumDeframer<C: Checksum> {
    checksum_alg: C,
}

impl<C: Checksum> ChecksumDeframer<C> {
    pub fn new(checksum_alg: C) -> Self {
        Self { checksum_alg }
    }
}

impl<C: Checksum> Deframer for ChecksumDeframer<C> {
    fn read_after_length<R: Read>(
        &self,
        reader: &mut R,
        buffer: &mut Vec<u8>,
        payload_len: usize,
    ) -> Result<Option<()>> {
        let expected_checksum = match self.checksum_alg.size() {
            0 => 0,
            2 => {
                let mut checksum_bytes = [0u8; 2];
                reader
                    .read_exact(&mut checksum_bytes)
                    .map_err(|_| Error::UnexpectedEof)?;
                u16::from_le_bytes(checksum_bytes) as u64
            }
            4 => {
                let mut checksum_bytes = [0u8; 4];
                reader
                    .read_exact(&mut checksum_bytes)
                    .map_err(|_| Error::UnexpectedEof)?;
                u32::from_le_bytes(checksum_bytes) as u64
            }
            _ => {
                let mut checksum_bytes = [0u8; 8];
                reader
                    .read_exact(&mut checksum_bytes)
                    .map_err(|_| Error::UnexpectedEof)?;
                u64::from_le_bytes(checksum_bytes)
            }
        };

        read_payload(reader, buffer, payload_len)?;
        self.checksum_alg.verify(expected_checksum, buffer)?;
        Ok(Some(()))
    }
}

/// A composable adapter that enforces a maximum frame length for any deframer.
///
/// Failure semantics: returns `Error::InvalidFrame` before allocating when the
/// declared length exceeds the limit.
pub struct BoundedDeframer<D: Deframer> {
    inner: D,
    max: usize,
}

impl<D: Deframer> BoundedDeframer<D> {
    pub fn new(inner: D, max: usize) -> Self {
        Self { inner, max }
    }
}

impl<D: Deframer> Deframer for BoundedDeframer<D> {
    fn read_after_length<R: Read>(
        &self,
        reader: &mut R,
        buffer: &mut Vec<u8>,
        payload_len: usize,
    ) -> Result<Option<()>> {
        if payload_len > self.max {
            return Err(Error::invalid_frame(format!(
                "frame length {payload_len} exceeds configured limit {}",
                self.max
            )));
        }
        self.inner.read_after_length(reader, buffer, payload_len)
    }
}

/// Extension methods for deframers to enable fluent composition.
pub trait DeframerExt: Deframer + Sized {
    /// Enforce a maximum payload length.
    fn bounded(self, max: usize) -> BoundedDeframer<Self> {
        BoundedDeframer::new(self, max)
    }
}

impl<T: Deframer> DeframerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{ChecksumKind, NoChecksum};
    use std::io::Cursor;

    #[test]
    fn test_default_frame_layout() {
        let mut out = Vec::new();
        DefaultFramer.frame_and_write(&mut out, b"abc").unwrap();
        assert_eq!(&out[..4], &3u32.to_le_bytes());
        assert_eq!(&out[4..], b"abc");
    }

    #[test]
    fn test_no_checksum_framer_matches_default_layout() {
        let mut plain = Vec::new();
        let mut checked = Vec::new();
        DefaultFramer.frame_and_write(&mut plain, b"payload").unwrap();
        ChecksumFramer::new(NoChecksum)
            .frame_and_write(&mut checked, b"payload")
            .unwrap();
        assert_eq!(plain, checked);
    }

    #[cfg(feature = "crc32")]
    #[test]
    fn test_crc32_frame_roundtrip_and_corruption() {
        let mut out = Vec::new();
        let framer = ChecksumFramer::new(ChecksumKind::Crc32);
        framer.frame_and_write(&mut out, b"tracker hits").unwrap();
        assert_eq!(out.len(), 4 + 4 + b"tracker hits".len());

        let deframer = ChecksumDeframer::new(ChecksumKind::Crc32);
        let mut buf = Vec::new();
        deframer
            .read_and_deframe(&mut Cursor::new(&out), &mut buf)
            .unwrap()
            .unwrap();
        assert_eq!(buf, b"tracker hits");

        let last = out.len() - 1;
        out[last] ^= 0x01;
        let result = deframer.read_and_deframe(&mut Cursor::new(&out), &mut buf);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_clean_eof_is_none() {
        let mut buf = Vec::new();
        let result = DefaultDeframer
            .read_and_deframe(&mut Cursor::new(Vec::<u8>::new()), &mut buf)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_truncated_payload_is_unexpected_eof() {
        let mut out = Vec::new();
        DefaultFramer.frame_and_write(&mut out, b"abcdef").unwrap();
        out.truncate(out.len() - 2);
        let mut buf = Vec::new();
        let result = DefaultDeframer.read_and_deframe(&mut Cursor::new(&out), &mut buf);
        assert!(matches!(result, Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_bounded_deframer_rejects_oversized_frame() {
        let mut out = Vec::new();
        DefaultFramer.frame_and_write(&mut out, &[7u8; 32]).unwrap();
        let mut buf = Vec::new();
        let result = DefaultDeframer
            .bounded(16)
            .read_and_deframe(&mut Cursor::new(&out), &mut buf);
        assert!(matches!(result, Err(Error::InvalidFrame { .. })));
        assert!(buf.is_empty());
    }
}
