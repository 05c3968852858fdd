//! kg-merge CLI: knowledge-graph identifier reconciliation and edge merge.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;

use kg_merge::config::MergeConfig;
use kg_merge::engine::{MergeSummary, SourceStatus};
use kg_merge::nodes::NodeSummary;
use kg_merge::pipeline::{Pipeline, PipelineOptions};

#[derive(Parser)]
#[command(
    name = "kg-merge",
    version,
    about = "Merge biomedical knowledge-graph sources into one deduplicated edge set"
)]
struct Cli {
    /// Merge config (TOML). Defaults to the bundled four-source config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Only run this source (repeatable; case-insensitive).
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Maximum records read per source.
    #[arg(long)]
    limit: Option<u64>,

    /// Sample run: read at most 100 records per source.
    #[arg(long)]
    test: bool,

    /// Keep going when a source fails instead of stopping the run.
    #[arg(long)]
    continue_on_error: bool,
}

impl Selection {
    fn options(self) -> PipelineOptions {
        PipelineOptions {
            sources: self.sources,
            limit: self.limit,
            test: self.test,
            continue_on_error: self.continue_on_error,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List configured edge and node sources.
    Sources,

    /// Run the node-merge pass only.
    Nodes {
        /// Output JSONL file.
        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        selection: Selection,
    },

    /// Merge edges from the selected sources.
    Edges {
        /// Output JSONL file.
        #[arg(long)]
        output: PathBuf,

        /// Summary file. Defaults to `<output stem>_stats.json`.
        #[arg(long)]
        summary: Option<PathBuf>,

        #[command(flatten)]
        selection: Selection,
    },

    /// Node pass and edge merge into one directory.
    Run {
        /// Directory for nodes.jsonl, edges.jsonl and edges_stats.json.
        #[arg(long)]
        output_dir: PathBuf,

        #[command(flatten)]
        selection: Selection,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::bundled()?,
    };

    let failed = match cli.command {
        Commands::Sources => {
            print_sources(&config);
            false
        }

        Commands::Nodes { output, selection } => {
            let pipeline = Pipeline::new(config, selection.options());
            let summary = pipeline.write_nodes(&output)?;
            print_nodes(&summary);
            println!("Nodes written to {}", output.display());
            summary.has_failures()
        }

        Commands::Edges {
            output,
            summary,
            selection,
        } => {
            let pipeline = Pipeline::new(config, selection.options());
            let stats = pipeline.write_edges(&output, summary.as_deref())?;
            print_edges(&stats);
            println!("Edges written to {}", output.display());
            stats.has_failures()
        }

        Commands::Run {
            output_dir,
            selection,
        } => {
            let pipeline = Pipeline::new(config, selection.options());
            let (nodes, edges) = pipeline.run(&output_dir)?;
            print_nodes(&nodes);
            print_edges(&edges);
            println!("Output written to {}", output_dir.display());
            nodes.has_failures() || edges.has_failures()
        }
    };

    if failed {
        miette::bail!("one or more sources failed; see the summary above");
    }
    Ok(())
}

fn print_sources(config: &MergeConfig) {
    println!("Edge sources ({}):", config.sources.len());
    for source in &config.sources {
        println!(
            "  {:<10} {:<10} {} file(s), {} mapping step(s)",
            source.name,
            source.knowledge_source(),
            source.paths.len(),
            source.mapping.len()
        );
        for path in &source.paths {
            println!("      {}", path.display());
        }
    }
    if !config.nodes.is_empty() {
        println!("Node sources ({}):", config.nodes.len());
        for node in &config.nodes {
            println!(
                "  {:<10} {:<10} {} file(s)",
                node.name,
                node.knowledge_source(),
                node.paths.len()
            );
        }
    }
}

fn print_nodes(summary: &NodeSummary) {
    println!("Node pass: {} nodes", summary.total_nodes);
    for s in &summary.sources {
        println!(
            "  {:<10} {:<9} read={} malformed={} added={} merged={}",
            s.source,
            status_label(&s.status),
            s.read,
            s.malformed,
            s.added,
            s.merged
        );
    }
}

fn print_edges(summary: &MergeSummary) {
    println!(
        "Edge merge: {} edges emitted (subset {}, {} mapping entries)",
        summary.total_emitted, summary.subset_size, summary.mapping_entries
    );
    for s in &summary.sources {
        println!(
            "  {:<10} {:<9} limit={} read={} malformed={} unmappable={} out_of_subset={} duplicate={} emitted={}",
            s.source,
            status_label(&s.status),
            s.limit.map_or_else(|| "none".to_string(), |l| l.to_string()),
            s.read,
            s.malformed,
            s.unmappable,
            s.out_of_subset,
            s.duplicate,
            s.emitted
        );
        if let SourceStatus::Failed { error } = &s.status {
            println!("      error: {error}");
        }
    }
    for node in summary.node_sources.iter().filter(|n| n.is_failed()) {
        if let SourceStatus::Failed { error } = &node.status {
            println!("  node source {} FAILED: {error}", node.source);
        }
    }
}

fn status_label(status: &SourceStatus) -> &'static str {
    match status {
        SourceStatus::Completed => "completed",
        SourceStatus::Failed { .. } => "FAILED",
        SourceStatus::Skipped => "skipped",
    }
}
