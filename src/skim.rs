//! The skim driver.
//!
//! A [`Skimmer`] walks its inputs in order. For each usable input it joins the
//! catalog streams in lockstep, asks the selection about every joined event,
//! and copies accepted events to the output container. The output's stream
//! set and schemas come from the first usable input; later inputs are bound
//! to it stream by stream.

use crate::catalog::{StreamCatalog, StreamKey};
use crate::checksum::ChecksumKind;
use crate::container::{Container, ContainerStreamReader, StoreOptions};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::library::SchemaLibrary;
use crate::observability::{log_debug, log_info, log_warn};
use crate::progress::Progress;
use crate::record::Record;
use crate::schema::StreamSchema;
use crate::selection::Selection;
use crate::store::{FileBinding, OutputStore};
use crate::sync::Lockstep;
use std::path::{Path, PathBuf};

/// Where a skimmer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkimState {
    /// No usable input seen yet; nothing has been written.
    NoOutputYet,
    /// The output container exists and receives selected events.
    OutputEstablished,
    /// The output has been finalized; `run` cannot be called again.
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: String,
}

/// Totals of a completed skim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkimSummary {
    pub inputs_total: usize,
    pub inputs_used: usize,
    pub skipped: Vec<SkippedInput>,
    pub events_read: u64,
    pub events_selected: u64,
    /// Entries per output stream, in output order.
    pub stream_entries: Vec<(StreamKey, u64)>,
}

/// Copies the events accepted by a selection from a list of input containers
/// into one output container.
///
/// # Example
///
/// ```no_run
/// use evskim::{Event, Skimmer};
///
/// let inputs = vec!["run1.evc", "run2.evc"];
/// let mut skimmer = Skimmer::new(inputs, "skim.evc", |event: &Event<'_>| {
///     event
///         .get("ReconDir", "Global")
///         .and_then(|r| r.get_i64("NTPCs"))
///         .is_some_and(|n| n >= 3)
/// });
/// let summary = skimmer.run()?;
/// println!("kept {} of {} events", summary.events_selected, summary.events_read);
/// # Ok::<(), evskim::Error>(())
/// ```
pub struct Skimmer<S> {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    selection: S,
    catalog: StreamCatalog,
    options: StoreOptions,
    library: Option<SchemaLibrary>,
    report_progress: bool,
    store: Option<OutputStore>,
    finalized: bool,
}

impl<S: Selection> Skimmer<S> {
    /// A skimmer over the standard catalog with default store options.
    pub fn new<P: Into<PathBuf>>(
        inputs: impl IntoIterator<Item = P>,
        output: impl Into<PathBuf>,
        selection: S,
    ) -> Self {
        Self::builder(inputs, output, selection).build()
    }

    pub fn builder<P: Into<PathBuf>>(
        inputs: impl IntoIterator<Item = P>,
        output: impl Into<PathBuf>,
        selection: S,
    ) -> SkimmerBuilder<S> {
        SkimmerBuilder {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: output.into(),
            selection,
            catalog: StreamCatalog::default(),
            options: StoreOptions::default(),
            library: None,
            report_progress: true,
        }
    }

    pub fn state(&self) -> SkimState {
        if self.finalized {
            SkimState::Finalized
        } else if self.store.is_some() {
            SkimState::OutputEstablished
        } else {
            SkimState::NoOutputYet
        }
    }

    pub fn selection(&self) -> &S {
        &self.selection
    }

    pub fn into_selection(self) -> S {
        self.selection
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Runs the skim over every input and finalizes the output.
    ///
    /// Fails with `NoUsableInput` if the first input cannot be opened or no
    /// input carries every required stream; nothing is written in that case.
    /// Later inputs that cannot be opened, lack a required stream, or whose
    /// schemas cannot be bound to the output are logged and skipped.
    pub fn run(&mut self) -> Result<SkimSummary> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        // A previous run that failed part-way is restarted from scratch.
        self.store = None;

        let total = self.inputs.len();
        let mut progress = Progress::new();
        let mut summary = SkimSummary {
            inputs_total: total,
            ..SkimSummary::default()
        };
        log_info!(
            event = "skim_started",
            inputs = total,
            output = %self.output.display(),
        );

        for index in 0..total {
            self.report(&mut progress, index, total);
            let path = self.inputs[index].clone();
            match self.process_input(&path, &mut summary) {
                Ok(()) => summary.inputs_used += 1,
                Err(e @ Error::InputOpen { .. }) if index == 0 => {
                    log_warn!(event = "first_input_unreadable", path = %path.display(), error = %e);
                    return Err(Error::NoUsableInput {
                        reason: e.to_string(),
                    });
                }
                Err(e) if e.is_input_recoverable() => {
                    log_warn!(event = "input_skipped", path = %path.display(), reason = %e);
                    summary.skipped.push(SkippedInput {
                        path,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let Some(store) = self.store.take() else {
            return Err(Error::NoUsableInput {
                reason: format!("none of the {total} inputs carries every required stream"),
            });
        };
        self.report(&mut progress, total, total);

        let manifest = store.finalize()?;
        self.finalized = true;
        summary.stream_entries = manifest
            .streams
            .into_iter()
            .map(|s| (s.key, s.entries))
            .collect();
        log_info!(
            event = "skim_finished",
            inputs_used = summary.inputs_used,
            inputs_skipped = summary.skipped.len(),
            events_read = summary.events_read,
            events_selected = summary.events_selected,
        );
        Ok(summary)
    }

    fn report(&self, progress: &mut Progress, index: usize, total: usize) {
        if let Some(percent) = progress.observe(index, total) {
            if self.report_progress {
                println!("skim {percent}% complete ({index}/{total})");
            }
            log_info!(event = "skim_progress", percent, index, total);
        }
    }

    fn process_input(&mut self, path: &Path, summary: &mut SkimSummary) -> Result<()> {
        let container = Container::open(path).map_err(|e| Error::input_open(path, e))?;

        for key in self.catalog.required() {
            if !container.contains(key) {
                return Err(Error::MissingRequiredStream {
                    key: key.to_string(),
                });
            }
        }

        // Catalog streams present in this input, in catalog order.
        let mut streams: Vec<(StreamKey, &StreamSchema)> = Vec::new();
        for entry in self.catalog.entries() {
            if let Some(schema) = container.schema(&entry.key) {
                if let Some(library) = &self.library {
                    library.check(&entry.key, schema)?;
                }
                streams.push((entry.key.clone(), schema));
            }
        }

        let mut readers: Vec<(usize, ContainerStreamReader)> = Vec::with_capacity(streams.len());
        for (index, (key, _)) in streams.iter().enumerate() {
            let reader = container
                .open_stream(key)
                .map_err(|e| Error::input_open(path, e))?;
            readers.push((index, reader));
        }

        if self.store.is_none() {
            let layout: Vec<(StreamKey, StreamSchema)> = streams
                .iter()
                .map(|(key, schema)| (key.clone(), (*schema).clone()))
                .collect();
            let store = OutputStore::create(&self.output, &layout, self.options)?;
            log_info!(
                event = "output_established",
                path = %self.output.display(),
                source = %path.display(),
                streams = layout.len(),
            );
            self.store = Some(store);
        }

        if let Some(store) = self.store.as_mut() {
            let binding = store.bind(&streams)?;
            if binding.bound() < store.keys().len() {
                log_debug!(
                    event = "output_streams_unbound",
                    path = %path.display(),
                    unbound = store.keys().len() - binding.bound(),
                );
            }
            let (read, selected) =
                replicate(&streams, readers, store, &binding, &mut self.selection)?;
            log_debug!(
                event = "input_processed",
                path = %path.display(),
                events_read = read,
                events_selected = selected,
            );
            summary.events_read += read;
            summary.events_selected += selected;
        }
        Ok(())
    }
}

/// Drives the lockstep join of one input and appends the accepted events.
fn replicate<S: Selection>(
    streams: &[(StreamKey, &StreamSchema)],
    readers: Vec<(usize, ContainerStreamReader)>,
    store: &mut OutputStore,
    binding: &FileBinding,
    selection: &mut S,
) -> Result<(u64, u64)> {
    let mut read = 0u64;
    let mut selected = 0u64;
    for joined in Lockstep::new(readers) {
        let joined = joined?;
        let records = joined
            .iter()
            .map(|(&index, payload)| {
                let (key, schema) = &streams[index];
                Ok((key, Record::parse(schema, payload)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let keep = selection.apply_selection(&Event::new(read, records));
        read += 1;
        if keep {
            store.append(binding, &joined)?;
            selected += 1;
        }
    }
    Ok((read, selected))
}

/// Configures a [`Skimmer`].
pub struct SkimmerBuilder<S> {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    selection: S,
    catalog: StreamCatalog,
    options: StoreOptions,
    library: Option<SchemaLibrary>,
    report_progress: bool,
}

impl<S: Selection> SkimmerBuilder<S> {
    pub fn catalog(mut self, catalog: StreamCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Pending bytes per output stream that trigger a checkpoint.
    pub fn flush_threshold(mut self, bytes: usize) -> Self {
        self.options.flush_threshold_bytes = bytes;
        self
    }

    pub fn checksum(mut self, checksum: ChecksumKind) -> Self {
        self.options.checksum = checksum;
        self
    }

    pub fn store_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Rejects inputs whose schemas disagree with `library`.
    pub fn schema_library(mut self, library: SchemaLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Print progress lines to stdout (on by default). Progress is logged either way.
    pub fn report_progress(mut self, enabled: bool) -> Self {
        self.report_progress = enabled;
        self
    }

    pub fn build(self) -> Skimmer<S> {
        Skimmer {
            inputs: self.inputs,
            output: self.output,
            selection: self.selection,
            catalog: self.catalog,
            options: self.options,
            library: self.library,
            report_progress: self.report_progress,
            store: None,
            finalized: false,
        }
    }
}
