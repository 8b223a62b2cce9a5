//! Checkpoint policies for `StreamWriter`.
//!
//! A writer accumulates framed records in memory and asks its policy after
//! every append whether the pending data should be checkpointed to the
//! underlying sink. Checkpoints bound memory growth and limit what an
//! abnormally terminated run can lose.

/// Default checkpoint threshold for output streams (~30 MB of framed record data).
pub const DEFAULT_CHECKPOINT_BYTES: usize = 30_000_000;

/// Reason for a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointReason {
    /// Pending bytes reached the configured size threshold.
    SizeThreshold,
    /// Pending record count reached the configured threshold.
    RecordCount,
    /// Requested explicitly, e.g. when a stream is finalized.
    Explicit,
}

/// Information about a checkpoint event.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointInfo {
    pub reason: CheckpointReason,
    /// Bytes moved from the pending buffer to the sink by this checkpoint.
    pub bytes_flushed: usize,
    /// Records made durable by this checkpoint.
    pub entries_flushed: u64,
    /// Total records committed to the sink after this checkpoint.
    pub committed_entries: u64,
}

/// A trait that defines a stateful policy for when to checkpoint pending records.
pub trait FlushPolicy {
    /// Called after each successful append.
    ///
    /// Arguments
    /// - `pending_bytes`: framed bytes accumulated since the last checkpoint.
    /// - `pending_entries`: records accumulated since the last checkpoint.
    ///
    /// Returns
    /// - `Some(CheckpointReason)` if the writer should checkpoint now, otherwise `None`.
    fn should_checkpoint(&mut self, pending_bytes: usize, pending_entries: u64)
        -> Option<CheckpointReason>;

    /// Optional hook called after a checkpoint occurs.
    #[inline(always)]
    fn on_checkpoint(&mut self, _info: &CheckpointInfo) {}
}

/// A policy that never checkpoints on its own; data reaches the sink only on
/// explicit checkpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPolicy;

impl FlushPolicy for NoOpPolicy {
    #[inline(always)]
    fn should_checkpoint(
        &mut self,
        _pending_bytes: usize,
        _pending_entries: u64,
    ) -> Option<CheckpointReason> {
        None
    }
}

/// Checkpoints once the pending bytes reach `threshold_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct SizeThresholdPolicy {
    pub threshold_bytes: usize,
}

impl SizeThresholdPolicy {
    pub fn new(threshold_bytes: usize) -> Self {
        Self { threshold_bytes }
    }
}

impl Default for SizeThresholdPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_BYTES)
    }
}

impl FlushPolicy for SizeThresholdPolicy {
    fn should_checkpoint(
        &mut self,
        pending_bytes: usize,
        _pending_entries: u64,
    ) -> Option<CheckpointReason> {
        (pending_bytes >= self.threshold_bytes).then_some(CheckpointReason::SizeThreshold)
    }
}

/// Checkpoints every `every` records. Zero disables the policy.
#[derive(Debug, Clone, Copy)]
pub struct RecordCountPolicy {
    pub every: u64,
}

impl RecordCountPolicy {
    pub fn new(every: u64) -> Self {
        Self { every }
    }
}

impl FlushPolicy for RecordCountPolicy {
    fn should_checkpoint(
        &mut self,
        _pending_bytes: usize,
        pending_entries: u64,
    ) -> Option<CheckpointReason> {
        (self.every != 0 && pending_entries >= self.every).then_some(CheckpointReason::RecordCount)
    }
}

impl<P: FlushPolicy + ?Sized> FlushPolicy for Box<P> {
    fn should_checkpoint(
        &mut self,
        pending_bytes: usize,
        pending_entries: u64,
    ) -> Option<CheckpointReason> {
        (**self).should_checkpoint(pending_bytes, pending_entries)
    }

    fn on_checkpoint(&mut self, info: &CheckpointInfo) {
        (**self).on_checkpoint(info)
    }
}
