//! An append-only, checkpointing writer for one record stream.

use crate::error::Result;
use crate::framing::Framer;
use crate::policy::{CheckpointInfo, CheckpointReason, FlushPolicy, NoOpPolicy};
use std::io::Write;

/// A writer for appending framed records to a stream.
///
/// Appended records are framed into an in-memory pending buffer. The
/// `FlushPolicy` decides after each append whether the pending buffer is
/// checkpointed to the underlying sink; `checkpoint()` and `finish()` force
/// one. Only checkpointed records count as committed.
pub struct StreamWriter<W: Write, F: Framer, P: FlushPolicy = NoOpPolicy> {
    writer: W,
    framer: F,
    policy: P,
    pending: Vec<u8>,
    pending_entries: u64,
    committed_entries: u64,
}

impl<W: Write, F: Framer> StreamWriter<W, F, NoOpPolicy> {
    /// Creates a new `StreamWriter` that only checkpoints on request.
    pub fn new(writer: W, framer: F) -> Self {
        Self::builder(writer, framer).build()
    }

    /// Starts a builder for configuring the checkpoint policy and buffer capacity.
    pub fn builder(writer: W, framer: F) -> StreamWriterBuilder<W, F, NoOpPolicy> {
        StreamWriterBuilder {
            writer,
            framer,
            policy: NoOpPolicy,
            capacity: 0,
        }
    }
}

impl<W: Write, F: Framer, P: FlushPolicy> StreamWriter<W, F, P> {
    /// Frames `payload` into the pending buffer and consults the policy.
    ///
    /// Returns the checkpoint information when this append triggered one.
    pub fn append(&mut self, payload: &[u8]) -> Result<Option<CheckpointInfo>> {
        self.framer.frame_and_write(&mut self.pending, payload)?;
        self.pending_entries += 1;
        match self
            .policy
            .should_checkpoint(self.pending.len(), self.pending_entries)
        {
            Some(reason) => self.checkpoint_with(reason).map(Some),
            None => Ok(None),
        }
    }

    /// Writes all pending records to the sink and flushes it.
    pub fn checkpoint(&mut self) -> Result<CheckpointInfo> {
        self.checkpoint_with(CheckpointReason::Explicit)
    }

    fn checkpoint_with(&mut self, reason: CheckpointReason) -> Result<CheckpointInfo> {
        self.writer.write_all(&self.pending)?;
        self.writer.flush()?;
        let info = CheckpointInfo {
            reason,
            bytes_flushed: self.pending.len(),
            entries_flushed: self.pending_entries,
            committed_entries: self.committed_entries + self.pending_entries,
        };
        self.pending.clear();
        self.committed_entries = info.committed_entries;
        self.pending_entries = 0;
        self.policy.on_checkpoint(&info);
        Ok(info)
    }

    /// Records appended so far, committed or not.
    pub fn entries(&self) -> u64 {
        self.committed_entries + self.pending_entries
    }

    /// Records already written to the sink.
    pub fn committed_entries(&self) -> u64 {
        self.committed_entries
    }

    /// Framed bytes waiting for the next checkpoint.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Checkpoints unconditionally and returns the underlying writer.
    pub fn finish(mut self) -> Result<(W, CheckpointInfo)> {
        let info = self.checkpoint()?;
        Ok((self.writer, info))
    }
}

/// Builder for `StreamWriter`.
pub struct StreamWriterBuilder<W: Write, F: Framer, P: FlushPolicy> {
    writer: W,
    framer: F,
    policy: P,
    capacity: usize,
}

impl<W: Write, F: Framer, P: FlushPolicy> StreamWriterBuilder<W, F, P> {
    pub fn with_flush_policy<Q: FlushPolicy>(self, policy: Q) -> StreamWriterBuilder<W, F, Q> {
        StreamWriterBuilder {
            writer: self.writer,
            framer: self.framer,
            policy,
            capacity: self.capacity,
        }
    }

    /// Pre-allocates the pending buffer.
    pub fn with_default_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> StreamWriter<W, F, P> {
        StreamWriter {
            writer: self.writer,
            framer: self.framer,
            policy: self.policy,
            pending: Vec::with_capacity(self.capacity),
            pending_entries: 0,
            committed_entries: 0,
        }
    }
}
