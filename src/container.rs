//! Event containers: a directory holding one stream file per (group, name)
//! plus a JSON manifest.
//!
//! ```text
//! <container>/manifest.json
//! <container>/<group>/<name>.evs
//! ```
//!
//! A stream file is the 4-byte magic `EVS1` followed by checksum-framed
//! records. The manifest lists the streams in creation order with their
//! schema and committed entry count; readers never look past that count, so
//! a container whose writer died mid-run is still readable up to its last
//! checkpoint.

use crate::catalog::StreamKey;
use crate::checksum::ChecksumKind;
use crate::error::{Error, Result};
use crate::framing::{BoundedDeframer, ChecksumDeframer, ChecksumFramer, DeframerExt, MAX_FRAME_LEN};
use crate::observability::{log_debug, log_info};
use crate::policy::{SizeThresholdPolicy, DEFAULT_CHECKPOINT_BYTES};
use crate::reader::StreamReader;
use crate::schema::StreamSchema;
use crate::writer::StreamWriter;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const STREAM_MAGIC: [u8; 4] = *b"EVS1";
pub const FORMAT_VERSION: u32 = 1;
const STREAM_EXTENSION: &str = "evs";

/// Reader over one stream file of a container.
pub type ContainerStreamReader =
    StreamReader<BufReader<File>, BoundedDeframer<ChecksumDeframer<ChecksumKind>>>;

type ContainerStreamWriter = StreamWriter<File, ChecksumFramer<ChecksumKind>, SizeThresholdPolicy>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Still being written, or the writer terminated abnormally.
    Open,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    #[serde(flatten)]
    pub key: StreamKey,
    /// Path of the stream file relative to the container root.
    pub file: String,
    /// Committed record count.
    pub entries: u64,
    pub schema: StreamSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: u32,
    pub checksum: ChecksumKind,
    pub state: ContainerState,
    pub streams: Vec<StreamEntry>,
}

impl Manifest {
    pub fn stream(&self, key: &StreamKey) -> Option<&StreamEntry> {
        self.streams.iter().find(|s| &s.key == key)
    }
}

/// Options for newly created containers.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub checksum: ChecksumKind,
    /// Pending bytes per stream that trigger a checkpoint.
    pub flush_threshold_bytes: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            checksum: ChecksumKind::default(),
            flush_threshold_bytes: DEFAULT_CHECKPOINT_BYTES,
        }
    }
}

//--- Read side ---

/// An event container opened for reading.
#[derive(Debug)]
pub struct Container {
    root: PathBuf,
    manifest: Manifest,
}

impl Container {
    /// Opens the container at `path` and parses its manifest.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let file = File::open(root.join(MANIFEST_FILE))?;
        let manifest: Manifest = serde_json::from_reader(BufReader::new(file))?;
        if manifest.format != FORMAT_VERSION {
            return Err(Error::UnsupportedFormat {
                message: format!("manifest format {} (expected {FORMAT_VERSION})", manifest.format),
            });
        }
        manifest.checksum.ensure_supported()?;
        for entry in &manifest.streams {
            validate_stream_file(&entry.file)?;
        }
        log_debug!(
            event = "container_opened",
            path = %root.display(),
            streams = manifest.streams.len(),
            state = ?manifest.state,
        );
        Ok(Self { root, manifest })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.manifest.streams.iter().map(|s| &s.key)
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.manifest.stream(key).is_some()
    }

    pub fn schema(&self, key: &StreamKey) -> Option<&StreamSchema> {
        self.manifest.stream(key).map(|s| &s.schema)
    }

    /// Committed entries of `key`.
    pub fn entries(&self, key: &StreamKey) -> Option<u64> {
        self.manifest.stream(key).map(|s| s.entries)
    }

    /// Opens a reader over the committed records of `key`.
    pub fn open_stream(&self, key: &StreamKey) -> Result<ContainerStreamReader> {
        let entry = self
            .manifest
            .stream(key)
            .ok_or_else(|| Error::UnknownStream {
                key: key.to_string(),
            })?;
        let file = File::open(self.root.join(&entry.file))?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
            _ => e.into(),
        })?;
        if magic != STREAM_MAGIC {
            return Err(Error::UnsupportedFormat {
                message: format!("{} is not a stream file", entry.file),
            });
        }
        let deframer = ChecksumDeframer::new(self.manifest.checksum).bounded(MAX_FRAME_LEN);
        Ok(StreamReader::new(reader, deframer).with_limit(entry.entries))
    }
}

//--- Write side ---

struct StreamSink {
    writer: ContainerStreamWriter,
}

/// Creates a container and appends records to its streams.
pub struct ContainerWriter {
    root: PathBuf,
    options: StoreOptions,
    manifest: Manifest,
    sinks: Vec<StreamSink>,
}

impl ContainerWriter {
    /// Creates an empty container at `path`, replacing whatever is there.
    ///
    /// Fails with `StoreCreation` if the location cannot be cleared or created.
    pub fn create(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        options.checksum.ensure_supported()?;
        clear_and_create(&root).map_err(|source| Error::StoreCreation {
            path: root.clone(),
            source,
        })?;

        let writer = Self {
            root,
            options,
            manifest: Manifest {
                format: FORMAT_VERSION,
                checksum: options.checksum,
                state: ContainerState::Open,
                streams: Vec::new(),
            },
            sinks: Vec::new(),
        };
        writer.write_manifest().map_err(|e| store_error(&writer.root, e))?;
        log_info!(
            event = "container_created",
            path = %writer.root.display(),
            checksum = %options.checksum,
            flush_threshold_bytes = options.flush_threshold_bytes,
        );
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Declares a new, empty stream. Returns its index for `append`.
    pub fn add_stream(&mut self, key: StreamKey, schema: StreamSchema) -> Result<usize> {
        if self.manifest.stream(&key).is_some() {
            return Err(Error::DuplicateStream {
                key: key.to_string(),
            });
        }
        validate_component(&key.group)?;
        validate_component(&key.name)?;

        let relative = format!("{}/{}.{STREAM_EXTENSION}", key.group, key.name);
        let full = self.root.join(&relative);
        let file = create_stream_file(&self.root.join(&key.group), &full).map_err(|source| {
            Error::StoreCreation {
                path: full.clone(),
                source,
            }
        })?;

        let writer = StreamWriter::builder(file, ChecksumFramer::new(self.options.checksum))
            .with_flush_policy(SizeThresholdPolicy::new(self.options.flush_threshold_bytes))
            .build();
        self.sinks.push(StreamSink { writer });
        self.manifest.streams.push(StreamEntry {
            key,
            file: relative,
            entries: 0,
            schema,
        });
        self.write_manifest().map_err(|e| store_error(&self.root, e))?;
        Ok(self.sinks.len() - 1)
    }

    pub fn schema(&self, index: usize) -> &StreamSchema {
        &self.manifest.streams[index].schema
    }

    /// Records appended to stream `index`, committed or pending.
    pub fn entries(&self, index: usize) -> u64 {
        self.sinks[index].writer.entries()
    }

    /// Appends one record payload to stream `index`.
    ///
    /// When the append triggers a checkpoint, the manifest is rewritten with
    /// the new committed count.
    pub fn append(&mut self, index: usize, payload: &[u8]) -> Result<()> {
        let sink = self.sinks.get_mut(index).ok_or_else(|| Error::UnknownStream {
            key: format!("#{index}"),
        })?;
        if let Some(info) = sink.writer.append(payload)? {
            let entry = &mut self.manifest.streams[index];
            entry.entries = info.committed_entries;
            log_debug!(
                event = "stream_checkpoint",
                stream = %entry.key,
                bytes = info.bytes_flushed,
                committed = info.committed_entries,
            );
            self.write_manifest()?;
        }
        Ok(())
    }

    /// Checkpoints every stream regardless of its policy.
    pub fn checkpoint_all(&mut self) -> Result<()> {
        for (sink, entry) in self.sinks.iter_mut().zip(&mut self.manifest.streams) {
            let info = sink.writer.checkpoint()?;
            entry.entries = info.committed_entries;
        }
        self.write_manifest()
    }

    /// Checkpoints every stream, marks the container finalized and closes it.
    pub fn finish(mut self) -> Result<Manifest> {
        self.checkpoint_all()?;
        self.manifest.state = ContainerState::Finalized;
        self.write_manifest()?;
        for sink in self.sinks.drain(..) {
            sink.writer.get_ref().sync_all()?;
        }
        log_info!(
            event = "container_finalized",
            path = %self.root.display(),
            streams = self.manifest.streams.len(),
        );
        Ok(self.manifest)
    }

    /// Writes the manifest to a temporary file and renames it into place.
    fn write_manifest(&self) -> Result<()> {
        let tmp = self.root.join(format!("{MANIFEST_FILE}.tmp"));
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut out, &self.manifest)?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
        fs::rename(&tmp, self.root.join(MANIFEST_FILE))?;
        Ok(())
    }
}

fn clear_and_create(root: &Path) -> std::io::Result<()> {
    match fs::symlink_metadata(root) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(root)?,
        Ok(_) => fs::remove_file(root)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(root)
}

fn create_stream_file(group_dir: &Path, path: &Path) -> std::io::Result<File> {
    fs::create_dir_all(group_dir)?;
    let mut file = File::create(path)?;
    file.write_all(&STREAM_MAGIC)?;
    Ok(file)
}

fn validate_component(part: &str) -> Result<()> {
    if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
        return Err(Error::InvalidCatalog {
            message: format!("`{part}` cannot be used as a stream group or name"),
        });
    }
    Ok(())
}

/// Stream files must stay inside the container: relative, without `..`.
fn validate_stream_file(file: &str) -> Result<()> {
    let path = Path::new(file);
    let contained = path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !contained {
        return Err(Error::UnsupportedFormat {
            message: format!("stream file `{file}` is outside the container"),
        });
    }
    Ok(())
}

fn store_error(root: &Path, error: Error) -> Error {
    match error {
        Error::Io(source) => Error::StoreCreation {
            path: root.to_path_buf(),
            source,
        },
        other => other,
    }
}
