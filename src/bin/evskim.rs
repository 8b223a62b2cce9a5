//! Command-line front end: skim containers, generate schema libraries and
//! inspect container manifests.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use evskim::{
    AllOf, ChecksumKind, Container, FieldThreshold, LibraryLoader, Skimmer, StreamCatalog,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Select events from multi-stream event containers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy the events passing every `--min` cut from INPUTS into one output container.
    Skim {
        /// Output container; replaced if it exists.
        #[arg(short, long)]
        output: PathBuf,
        /// JSON stream catalog (defaults to the oaAnalysis layout).
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Pending bytes per output stream before a checkpoint.
        #[arg(long, default_value_t = evskim::policy::DEFAULT_CHECKPOINT_BYTES)]
        flush_bytes: usize,
        /// Frame checksum for the output: none, crc32 or xxhash64.
        #[arg(long)]
        checksum: Option<ChecksumKind>,
        /// Keep events where GROUP/NAME:FIELD is at least VALUE. Repeatable.
        #[arg(long = "min", value_name = "GROUP/NAME:FIELD:VALUE")]
        cuts: Vec<FieldThreshold>,
        /// Validate input schemas against the library cached under this directory,
        /// generating it from the first input when missing.
        #[arg(long)]
        library_cache: Option<PathBuf>,
        /// Cache-key suffix of the schema library.
        #[arg(long, default_value = "")]
        library_name: String,
        /// Do not print progress lines to stdout.
        #[arg(short, long)]
        quiet: bool,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Generate (once) and load the schema library of an input container.
    Schema {
        #[arg(long)]
        input: PathBuf,
        /// Cache-key suffix appended to the library name.
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = ".")]
        cache_dir: PathBuf,
    },
    /// Print the manifest of a container.
    Inspect { container: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<evskim::Error>() {
        Some(evskim::Error::NoUsableInput { .. }) => 2,
        Some(evskim::Error::StoreCreation { .. }) => 3,
        Some(evskim::Error::SchemaGeneration { .. }) => 4,
        _ => 1,
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Skim {
            output,
            catalog,
            flush_bytes,
            checksum,
            cuts,
            library_cache,
            library_name,
            quiet,
            inputs,
        } => {
            let catalog = match catalog {
                Some(path) => StreamCatalog::from_json_file(&path)
                    .with_context(|| format!("loading catalog {}", path.display()))?,
                None => StreamCatalog::oa_analysis(),
            };
            let mut selection = AllOf::new();
            for cut in cuts {
                selection.push(cut);
            }

            let mut builder = Skimmer::builder(inputs.clone(), &output, selection)
                .catalog(catalog)
                .flush_threshold(flush_bytes)
                .report_progress(!quiet);
            if let Some(checksum) = checksum {
                builder = builder.checksum(checksum);
            }
            if let (Some(cache), Some(first)) = (library_cache, inputs.first()) {
                let library = LibraryLoader::new(cache).ensure(first, &library_name)?;
                builder = builder.schema_library(library);
            }

            let summary = builder.build().run()?;
            for skipped in &summary.skipped {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!(
                "selected {} of {} events from {}/{} inputs into {}",
                summary.events_selected,
                summary.events_read,
                summary.inputs_used,
                summary.inputs_total,
                output.display()
            );
        }
        Command::Schema {
            input,
            name,
            cache_dir,
        } => {
            let loader = LibraryLoader::new(cache_dir);
            let library = loader.ensure(&input, &name)?;
            println!(
                "{} ({} streams) at {}",
                library.name(),
                library.len(),
                loader.library_path(&name).display()
            );
        }
        Command::Inspect { container } => {
            let opened = Container::open(&container)
                .with_context(|| format!("opening {}", container.display()))?;
            let manifest = opened.manifest();
            println!(
                "{}: format {}, {:?}, checksum {}",
                container.display(),
                manifest.format,
                manifest.state,
                manifest.checksum
            );
            for stream in &manifest.streams {
                let branches: Vec<String> = stream
                    .schema
                    .branches()
                    .iter()
                    .map(|b| format!("{}:{}", b.name, b.kind))
                    .collect();
                println!(
                    "  {:<32} {:>10} entries  [{}]",
                    stream.key.to_string(),
                    stream.entries,
                    branches.join(", ")
                );
            }
        }
    }
    Ok(())
}
