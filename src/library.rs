//! Cached schema libraries.
//!
//! A schema library records the stream schemas of a reference input. It is
//! generated once per cache key and reused afterwards:
//!
//! ```text
//! <cache_dir>/libReadEvents<suffix>/libReadEvents<suffix>.json
//! ```
//!
//! A skimmer given a library rejects inputs whose schemas disagree with it.

use crate::catalog::StreamKey;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::observability::log_info;
use crate::schema::StreamSchema;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const LIBRARY_PREFIX: &str = "libReadEvents";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LibraryStream {
    #[serde(flatten)]
    key: StreamKey,
    schema: StreamSchema,
}

/// Stream schemas captured from a reference input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaLibrary {
    name: String,
    streams: Vec<LibraryStream>,
}

impl SchemaLibrary {
    /// Captures every stream schema of `container`.
    pub fn from_container(name: impl Into<String>, container: &Container) -> Self {
        Self {
            name: name.into(),
            streams: container
                .manifest()
                .streams
                .iter()
                .map(|s| LibraryStream {
                    key: s.key.clone(),
                    schema: s.schema.clone(),
                })
                .collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.streams.iter().map(|s| &s.key)
    }

    pub fn schema(&self, key: &StreamKey) -> Option<&StreamSchema> {
        self.streams.iter().find(|s| &s.key == key).map(|s| &s.schema)
    }

    /// Checks `schema` against the library's schema for `key`.
    ///
    /// Streams the library does not know are accepted.
    pub fn check(&self, key: &StreamKey, schema: &StreamSchema) -> Result<()> {
        match self.schema(key) {
            Some(expected) if expected != schema => Err(Error::schema_mismatch(
                key,
                format!("schema differs from library {}", self.name),
            )),
            _ => Ok(()),
        }
    }
}

/// Generates and loads schema libraries under a cache directory.
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    cache_dir: PathBuf,
}

impl LibraryLoader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn library_name(suffix: &str) -> String {
        format!("{LIBRARY_PREFIX}{suffix}")
    }

    /// Where the library for `suffix` lives.
    pub fn library_path(&self, suffix: &str) -> PathBuf {
        let name = Self::library_name(suffix);
        self.cache_dir.join(&name).join(format!("{name}.json"))
    }

    /// Returns the library for `suffix`, generating it from `input` first if
    /// it does not exist yet.
    ///
    /// Generation failures, including an input that cannot be opened, are
    /// reported as `SchemaGeneration`.
    pub fn ensure(&self, input: impl AsRef<Path>, suffix: &str) -> Result<SchemaLibrary> {
        let input = input.as_ref();
        if suffix.contains(['/', '\\']) {
            return Err(Error::SchemaGeneration {
                input: input.to_path_buf(),
                source: Box::new(Error::InvalidCatalog {
                    message: format!("library suffix `{suffix}` contains a path separator"),
                }),
            });
        }
        let path = self.library_path(suffix);
        if !path.is_file() {
            self.generate(input, suffix, &path)
                .map_err(|source| Error::SchemaGeneration {
                    input: input.to_path_buf(),
                    source: Box::new(source),
                })?;
        }
        SchemaLibrary::load(&path)
    }

    fn generate(&self, input: &Path, suffix: &str, path: &Path) -> Result<()> {
        let container = Container::open(input).map_err(|e| Error::input_open(input, e))?;
        let library = SchemaLibrary::from_container(Self::library_name(suffix), &container);

        let dir = path.parent().unwrap_or(&self.cache_dir);
        fs::create_dir_all(dir)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut out, &library)?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
        fs::rename(&tmp, path)?;
        log_info!(
            event = "schema_library_generated",
            library = %library.name,
            input = %input.display(),
            streams = library.len(),
        );
        Ok(())
    }
}
