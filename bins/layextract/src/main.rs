use anyhow::Context;
use clap::Parser as ClapParser;
use extract::{CellOutcome, ExtractOptions, Extractor, NoTrace, TraceSink, VecTrace};
use layir::Library;
use std::fs;
use std::path::{Path, PathBuf};
use tech::Technology;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    eprintln!("technology: {:?}", &args.tech);
    eprintln!("input library: {:?}", &args.library);
    eprintln!("root cell: {}", &args.cell);
    layextract(args)
}

/// Arguments to [`layextract`].
#[derive(ClapParser)]
#[command(
    version,
    about,
    long_about = "Extract connectivity from pure-layer layout geometry"
)]
pub struct Args {
    /// The path to the technology description (TOML or JSON).
    #[arg(short, long)]
    tech: PathBuf,
    /// The path to the input library (JSON).
    library: PathBuf,
    /// The name of the cell to extract.
    cell: String,
    /// The path to an extraction options file (TOML).
    ///
    /// If unspecified, default options are used.
    #[arg(short = 'c', long)]
    options: Option<PathBuf>,
    /// Extract every cell below the root as well.
    ///
    /// Overrides the `recursive` setting of the options file.
    #[arg(short, long)]
    recursive: bool,
    /// The path where the output library should be saved.
    ///
    /// If unspecified, the output will be written to stdout.
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// The path where a JSON record of every stage's shapes should be saved.
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn read_tech(path: &Path) -> anyhow::Result<Technology> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}.", path))?;
    let tech = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse technology {:?}.", path))?
    } else {
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse technology {:?}.", path))?
    };
    Ok(tech)
}

/// Extract the requested cell and write the resulting library.
pub fn layextract(args: Args) -> anyhow::Result<()> {
    let tech = read_tech(&args.tech)?;
    let contents = fs::read_to_string(&args.library)
        .with_context(|| format!("Failed to read {:?}.", &args.library))?;
    let library: Library = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse library {:?}.", &args.library))?;

    let mut options = match &args.options {
        Some(path) => ExtractOptions::from_file(path)
            .with_context(|| format!("Failed to load options from {:?}.", path))?,
        None => ExtractOptions::default(),
    };
    options.recursive |= args.recursive;
    let options = options
        .validate()
        .with_context(|| "Invalid extraction options.")?;

    let extractor = Extractor::new(&tech, options);
    let mut recorded = VecTrace::new();
    let mut untraced = NoTrace;
    let sink: &mut dyn TraceSink = if args.trace.is_some() {
        &mut recorded
    } else {
        &mut untraced
    };
    let output = extractor
        .run_named(&library, &args.cell, sink)
        .with_context(|| format!("Failed to extract {}.", &args.cell))?;

    for item in output.issues.iter() {
        eprintln!("{item}");
    }
    let mut failed = 0;
    for (source, outcome) in &output.outcomes {
        let name = output.library.cell(*source).name();
        match outcome {
            CellOutcome::Extracted { stats, .. } => eprintln!(
                "{name}: {} contacts, {} transistors, {} wires, {} pins, {} pure-layer nodes",
                stats.contacts, stats.transistors, stats.arcs, stats.pins, stats.pure_layer
            ),
            CellOutcome::Failed(err) => {
                failed += 1;
                eprintln!("{name}: failed: {err}");
            }
        }
    }

    if let Some(path) = &args.trace {
        let json = serde_json::to_string_pretty(recorded.events())
            .with_context(|| "Failed to serialize trace.")?;
        fs::write(path, json).with_context(|| format!("Failed to write trace to {:?}.", path))?;
    }

    let json = serde_json::to_string_pretty(&output.library)
        .with_context(|| "Failed to serialize output library.")?;
    if let Some(path) = &args.out {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}.", parent))?;
        }
        fs::write(path, json).with_context(|| format!("Failed to write {:?}.", path))?;
        eprintln!("Extraction complete.");
    } else {
        println!("{json}");
    }

    if failed > 0 {
        anyhow::bail!("{failed} cell(s) could not be extracted.");
    }
    Ok(())
}
