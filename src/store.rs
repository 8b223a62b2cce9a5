//! The output store: the container a skim writes into, and the per-input
//! bindings that route joined records to its streams.

use crate::catalog::StreamKey;
use crate::container::{ContainerWriter, Manifest, StoreOptions};
use crate::error::{Error, Result};
use crate::observability::log_debug;
use crate::schema::{Binding, StreamSchema};
use crate::sync::Joined;
use std::path::Path;

/// Output streams, fixed once created.
pub struct OutputStore {
    writer: ContainerWriter,
    keys: Vec<StreamKey>,
    scratch: Vec<u8>,
}

/// Routes one input's streams onto the output streams.
///
/// Slot `i` describes output stream `i`: which input stream feeds it and how
/// its records are adapted. `None` means the input does not carry that stream
/// and the output stream gets no appends from this input.
#[derive(Debug, Clone)]
pub struct FileBinding {
    slots: Vec<Option<BoundStream>>,
}

#[derive(Debug, Clone)]
struct BoundStream {
    input: usize,
    binding: Binding,
    input_schema: StreamSchema,
}

impl FileBinding {
    /// Number of output streams fed by this input.
    pub fn bound(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_bound(&self, output: usize) -> bool {
        matches!(self.slots.get(output), Some(Some(_)))
    }

    /// Output streams whose records need re-encoding for this input.
    pub fn adapted(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| !s.binding.is_identity())
            .count()
    }
}

impl OutputStore {
    /// Creates the output container with one empty stream per entry, in order.
    ///
    /// Anything already at `path` is removed first.
    pub fn create(
        path: impl AsRef<Path>,
        streams: &[(StreamKey, StreamSchema)],
        options: StoreOptions,
    ) -> Result<Self> {
        let mut writer = ContainerWriter::create(path, options)?;
        let mut keys = Vec::with_capacity(streams.len());
        for (key, schema) in streams {
            writer.add_stream(key.clone(), schema.clone())?;
            keys.push(key.clone());
        }
        Ok(Self {
            writer,
            keys,
            scratch: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    pub fn keys(&self) -> &[StreamKey] {
        &self.keys
    }

    pub fn schema(&self, output: usize) -> &StreamSchema {
        self.writer.schema(output)
    }

    /// Records appended to output stream `output` so far.
    pub fn entries(&self, output: usize) -> u64 {
        self.writer.entries(output)
    }

    /// Binds an input's streams (indexed by position in `input`) to the output.
    ///
    /// Fails with `SchemaMismatch` if any shared stream cannot be adapted.
    pub fn bind(&self, input: &[(StreamKey, &StreamSchema)]) -> Result<FileBinding> {
        let mut slots = Vec::with_capacity(self.keys.len());
        for (output, key) in self.keys.iter().enumerate() {
            let Some(index) = input.iter().position(|(k, _)| k == key) else {
                slots.push(None);
                continue;
            };
            let input_schema = input[index].1;
            let binding = self
                .schema(output)
                .bind_from(input_schema)
                .map_err(|reason| Error::schema_mismatch(key, reason))?;
            if !binding.is_identity() {
                log_debug!(event = "stream_rebound", stream = %key);
            }
            slots.push(Some(BoundStream {
                input: index,
                binding,
                input_schema: input_schema.clone(),
            }));
        }
        Ok(FileBinding { slots })
    }

    /// Appends one selected joined record to every bound output stream, in
    /// output order.
    pub fn append(&mut self, binding: &FileBinding, joined: &Joined<usize, Vec<u8>>) -> Result<()> {
        for (output, slot) in binding.slots.iter().enumerate() {
            let Some(bound) = slot else {
                continue;
            };
            let payload = joined.get(&bound.input).ok_or_else(|| Error::UnknownStream {
                key: self.keys[output].to_string(),
            })?;
            if bound.binding.is_identity() {
                self.writer.append(output, payload)?;
            } else {
                bound.binding.adapt(
                    &bound.input_schema,
                    self.writer.schema(output),
                    payload,
                    &mut self.scratch,
                )?;
                self.writer.append(output, &self.scratch)?;
            }
        }
        Ok(())
    }

    /// Checkpoints every stream, marks the container finalized and closes it.
    pub fn finalize(self) -> Result<Manifest> {
        self.writer.finish()
    }
}
