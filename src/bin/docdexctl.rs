use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docdex::config;
use docdex::pipeline::{PipelineService, adapt_blocks, read_blocks};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docdexctl",
    about = "Load segmented documents into the vector index and inspect the result"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one block-export file, or every `*.json` file under a directory.
    Load {
        /// Block-export file or directory to ingest.
        #[arg(long)]
        input: PathBuf,
        /// Source name override; defaults to each file's stem.
        #[arg(long)]
        source_name: Option<String>,
        /// Report what would be ingested without calling any service.
        #[arg(long)]
        dry_run: bool,
    },
    /// Report exact and estimated vector counts for the collection.
    Verify {
        /// Restrict the exact count to one source document.
        #[arg(long)]
        source: Option<String>,
        /// Query text used for the estimation sweep.
        #[arg(long, default_value = "overview")]
        probe: String,
        /// Number of results pulled in the estimation sweep.
        #[arg(long, default_value_t = 100)]
        sweep: usize,
    },
    /// Run a one-off similarity search.
    Search {
        /// Natural-language query text.
        query: String,
        /// Number of results to print.
        #[arg(long, default_value_t = 5)]
        k: usize,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Load {
            input,
            source_name,
            dry_run,
        } => load(&input, source_name, dry_run).await,
        Command::Verify {
            source,
            probe,
            sweep,
        } => verify(source.as_deref(), &probe, sweep).await,
        Command::Search { query, k } => search(&query, k).await,
    }
}

async fn load(input: &Path, source_name: Option<String>, dry_run: bool) -> Result<()> {
    let files = collect_block_files(input)?;
    if files.is_empty() {
        bail!("no block-export files found under {}", input.display());
    }
    if source_name.is_some() && files.len() > 1 {
        bail!("--source-name only applies when loading a single file");
    }

    let service = if dry_run {
        None
    } else {
        Some(build_service().await?)
    };

    for file in files {
        let blocks = read_blocks(&file)
            .with_context(|| format!("failed to load segmenter output from {}", file.display()))?;
        let source = source_name
            .clone()
            .unwrap_or_else(|| derive_source_name(&file));

        if let Some(service) = &service {
            let report = service.ingest(&source, blocks).await;
            println!(
                "{source}: {} indexed, {} failed, {} skipped",
                report.succeeded, report.failed, report.skipped
            );
            for failure in &report.failures {
                println!(
                    "  unit {} ({:?}): {}",
                    failure.sequence_index, failure.kind, failure.message
                );
            }
        } else {
            let units = adapt_blocks(blocks);
            let enrichable = units.iter().filter(|unit| unit.is_enrichable()).count();
            println!(
                "{source}: {} units, {} would be enriched (dry run)",
                units.len(),
                enrichable
            );
        }
    }

    Ok(())
}

async fn verify(source: Option<&str>, probe: &str, sweep: usize) -> Result<()> {
    let service = build_service().await?;

    let exact = service
        .indexed_count(source)
        .await
        .context("exact count request failed")?;
    match source {
        Some(source) => println!("{source}: {exact} vectors indexed (exact)"),
        None => println!("{exact} vectors indexed (exact)"),
    }

    // Estimate the way the sequence provenance allows: the highest sequence index
    // observed in a broad sweep, plus one since the sequence starts at zero.
    let results = service
        .search(probe, sweep)
        .await
        .context("estimation sweep failed")?;
    let max_sequence = results
        .iter()
        .filter_map(|result| result.metadata.get("sequence_index"))
        .filter_map(|value| value.as_u64())
        .max();
    match max_sequence {
        Some(max) => println!(
            "estimated at least {} units for the swept sources (max sequence index {max})",
            max + 1
        ),
        None => println!("estimation sweep returned no sequence provenance"),
    }

    Ok(())
}

async fn search(query: &str, k: usize) -> Result<()> {
    let service = build_service().await?;
    let results = service.search(query, k).await.context("search failed")?;

    if results.is_empty() {
        println!("no results");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        let score = result
            .score
            .map(|score| format!("{score:.3}"))
            .unwrap_or_else(|| "-".into());
        println!("{}. [{score}] {}", rank + 1, result.content);
        if let Some(source) = result.metadata.get("source_name").and_then(|v| v.as_str()) {
            let page = result
                .metadata
                .get("page_number")
                .and_then(|v| v.as_u64())
                .map(|page| format!(", page {page}"))
                .unwrap_or_default();
            println!("   {source}{page}");
        }
    }

    Ok(())
}

async fn build_service() -> Result<PipelineService> {
    config::init_config();
    PipelineService::new()
        .await
        .context("failed to initialize pipeline service")
}

fn collect_block_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("{} is neither a file nor a directory", input.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn derive_source_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
