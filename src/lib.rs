//! # evskim
//!
//! Selection-driven skimming of multi-stream event containers.
//!
//! ## Overview
//!
//! An event container stores one record stream per detector subsystem
//! (`HeaderDir/BasicHeader`, `ReconDir/Tracker`, ...). Record `i` of every
//! stream describes event `i`. `evskim` reads a list of containers, joins their
//! streams in lockstep, hands each joined event to a caller-supplied
//! [`Selection`], and copies the accepted events into a new container with the
//! same group/stream layout.
//!
//! ## Key Features
//!
//! * **Lockstep join**: streams are advanced together and iteration stops at
//!   the shortest one, so a truncated stream never produces partial events
//! * **Optional streams**: streams such as `TruthDir/Vertices` may be absent
//!   from some inputs without disqualifying them
//! * **Schema binding**: later inputs whose branches are reordered are
//!   re-encoded into the output layout; incompatible inputs are skipped
//! * **Crash-readable output**: output streams checkpoint every ~30 MB and the
//!   manifest always describes what is safely on disk
//! * **Verified records**: payloads are FlatBuffers tables checked by the
//!   FlatBuffers verifier, framed with optional CRC32 or XXH3 checksums
//!
//! ## Quick Start
//!
//! ```rust
//! use evskim::*;
//!
//! fn main() -> Result<()> {
//!     let dir = tempfile::tempdir()?;
//!     let input = dir.path().join("run.evc");
//!
//!     // Write a tiny input container with one stream.
//!     let key = StreamKey::new("ReconDir", "Tracker");
//!     let schema = StreamSchema::builder().branch("NTracks", BranchKind::I32).build()?;
//!     let mut writer = ContainerWriter::create(&input, StoreOptions::default())?;
//!     let stream = writer.add_stream(key.clone(), schema.clone())?;
//!     for n in [1, 5, 2, 3] {
//!         let payload = RecordBuilder::new(&schema).set("NTracks", n)?.finish()?;
//!         writer.append(stream, &payload)?;
//!     }
//!     writer.finish()?;
//!
//!     // Keep events with at least three tracks.
//!     let catalog = StreamCatalog::builder().required("ReconDir", "Tracker").build()?;
//!     let selection = FieldThreshold::new(key.clone(), "NTracks", 3.0);
//!     let summary = Skimmer::builder(vec![&input], dir.path().join("skim.evc"), selection)
//!         .catalog(catalog)
//!         .report_progress(false)
//!         .build()
//!         .run()?;
//!
//!     assert_eq!(summary.events_read, 4);
//!     assert_eq!(summary.events_selected, 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! * **[`container`]**: the on-disk format, a JSON manifest plus one framed
//!   stream file per (group, name)
//! * **[`framing`], [`checksum`], [`reader`], [`writer`], [`policy`]**: the
//!   length-prefixed frame format, stream I/O, and checkpoint policies
//! * **[`schema`], [`record`]**: typed branch lists and FlatBuffers record payloads
//! * **[`sync`]**: the lockstep iterator
//! * **[`skim`], [`store`], [`selection`], [`event`]**: the skim driver
//! * **[`catalog`], [`library`], [`progress`]**: configuration and reporting
//!
//! The library logs through `tracing` under the `evskim` target and never
//! installs a subscriber itself.

pub mod catalog;
pub mod checksum;
pub mod container;
pub mod error;
pub mod event;
pub mod framing;
pub mod library;
mod observability;
pub mod policy;
pub mod progress;
pub mod reader;
pub mod record;
pub mod schema;
pub mod selection;
pub mod skim;
pub mod store;
pub mod sync;
pub mod writer;

// Re-export the main public API for user convenience.
pub use catalog::{Presence, StreamCatalog, StreamKey};
pub use checksum::{Checksum, ChecksumKind, NoChecksum};
pub use container::{Container, ContainerState, ContainerWriter, Manifest, StoreOptions};
pub use error::{Error, Result};
pub use event::Event;
pub use framing::{
    BoundedDeframer, ChecksumDeframer, ChecksumFramer, DefaultDeframer, DefaultFramer, Deframer,
    DeframerExt, Framer,
};
pub use library::{LibraryLoader, SchemaLibrary};
pub use policy::{CheckpointInfo, CheckpointReason, FlushPolicy, SizeThresholdPolicy};
pub use progress::Progress;
pub use reader::{Messages, StreamReader};
pub use record::{Record, RecordBuilder, Value};
pub use schema::{Binding, BranchKind, StreamSchema};
pub use selection::{AcceptAll, AllOf, Counting, FieldThreshold, Selection};
pub use skim::{SkimState, SkimSummary, Skimmer, SkippedInput};
pub use store::OutputStore;
pub use sync::{Joined, Lockstep};
pub use writer::StreamWriter;

#[cfg(feature = "xxhash")]
pub use checksum::XxHash64;

#[cfg(feature = "crc32")]
pub use checksum::Crc32;
