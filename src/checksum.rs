//! Defines the `Checksum` trait and concrete implementations.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trait for checksum algorithms.
pub trait Checksum {
    /// Calculates the checksum for the given payload.
    fn calculate(&self, payload: &[u8]) -> u64;

    /// Number of bytes the checksum occupies in a frame header.
    fn size(&self) -> usize;

    /// Verifies the checksum. Returns `Ok(())` if it matches.
    fn verify(&self, expected: u64, payload: &[u8]) -> Result<()> {
        let calculated = self.calculate(payload);
        if calculated == expected {
            Ok(())
        } else {
            Err(Error::checksum_mismatch(expected, calculated))
        }
    }
}

/// Provides an implementation of the XXH3 64-bit hash algorithm.
#[cfg(feature = "xxhash")]
#[derive(Default, Clone, Copy)]
pub struct XxHash64;

#[cfg(feature = "xxhash")]
impl XxHash64 {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "xxhash")]
impl Checksum for XxHash64 {
    fn calculate(&self, payload: &[u8]) -> u64 {
        xxhash_rust::xxh3::xxh3_64(payload)
    }

    fn size(&self) -> usize {
        8
    }
}

/// Provides an implementation of the CRC32 checksum algorithm.
#[cfg(feature = "crc32")]
#[derive(Default, Clone, Copy)]
pub struct Crc32;

#[cfg(feature = "crc32")]
impl Crc32 {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "crc32")]
impl Checksum for Crc32 {
    fn calculate(&self, payload: &[u8]) -> u64 {
        // crc32fast returns a u32, so we cast it to u64 for trait compatibility.
        crc32fast::hash(payload) as u64
    }

    fn size(&self) -> usize {
        4
    }
}

/// A no-op checksum implementation for when checksums are not needed.
#[derive(Default, Clone, Copy)]
pub struct NoChecksum;

impl NoChecksum {
    pub fn new() -> Self {
        Self
    }
}

impl Checksum for NoChecksum {
    fn calculate(&self, _payload: &[u8]) -> u64 {
        0
    }

    fn size(&self) -> usize {
        0
    }

    fn verify(&self, _expected: u64, _payload: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// The checksum a container declares in its manifest.
///
/// Every stream file of a container is framed with the same kind, so the
/// choice is made once when the container is created and dispatched at
/// runtime when it is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    None,
    Crc32,
    Xxhash64,
}

impl ChecksumKind {
    /// Fails with `UnsupportedChecksum` when the matching feature is not compiled in.
    pub fn ensure_supported(self) -> Result<Self> {
        match self {
            ChecksumKind::None => Ok(self),
            #[cfg(feature = "crc32")]
            ChecksumKind::Crc32 => Ok(self),
            #[cfg(feature = "xxhash")]
            ChecksumKind::Xxhash64 => Ok(self),
            #[allow(unreachable_patterns)]
            other => Err(Error::UnsupportedChecksum(format!(
                "{other} (enable the matching cargo feature)"
            ))),
        }
    }
}

impl Default for ChecksumKind {
    fn default() -> Self {
        if cfg!(feature = "crc32") {
            ChecksumKind::Crc32
        } else {
            ChecksumKind::None
        }
    }
}

impl Checksum for ChecksumKind {
    fn calculate(&self, payload: &[u8]) -> u64 {
        match self {
            ChecksumKind::None => 0,
            #[cfg(feature = "crc32")]
            ChecksumKind::Crc32 => Crc32.calculate(payload),
            #[cfg(feature = "xxhash")]
            ChecksumKind::Xxhash64 => XxHash64.calculate(payload),
            // Unsupported kinds are rejected by `ensure_supported` before any frame is touched.
            #[allow(unreachable_patterns)]
            _ => 0,
        }
    }

    fn size(&self) -> usize {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Crc32 => 4,
            ChecksumKind::Xxhash64 => 8,
        }
    }

    fn verify(&self, expected: u64, payload: &[u8]) -> Result<()> {
        if *self == ChecksumKind::None {
            return Ok(());
        }
        let calculated = self.calculate(payload);
        if calculated == expected {
            Ok(())
        } else {
            Err(Error::checksum_mismatch(expected, calculated))
        }
    }
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChecksumKind::None => "none",
            ChecksumKind::Crc32 => "crc32",
            ChecksumKind::Xxhash64 => "xxhash64",
        };
        f.write_str(name)
    }
}

impl FromStr for ChecksumKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(ChecksumKind::None),
            "crc32" => Ok(ChecksumKind::Crc32),
            "xxhash64" => Ok(ChecksumKind::Xxhash64),
            other => Err(Error::UnsupportedChecksum(other.to_string())),
        }
    }
}
