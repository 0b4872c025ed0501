//! kmap CLI tool
//!
//! Command-line interface for laying out and rendering knowledge maps headlessly.
//!
//! ## Commands
//!
//! - `layout <graph.json>`: Print the computed layout as JSON
//! - `svg <graph.json>`: Render the map to an SVG document
//!
//! Both commands accept `--config <file.toml>` for a `MapConfig` and any number of
//! `--plugin <name>` flags naming registered plugins.

use clap::{Parser, Subcommand};
use knowledge_map::{
    config::{MapConfig, MapDocument},
    map::KnowledgeMap,
    plugin::{PluginSpec, PLUGINS},
    scene::MemoryScene,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "kmap")]
#[command(author, version, about = "A tool for laying out and rendering knowledge maps", long_about = None)]
struct Cli {
    /// Configuration file path (TOML, or JSON by extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Registered plugin to enable (repeatable)
    #[arg(short, long = "plugin", global = true)]
    plugins: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layout of a graph document as JSON
    Layout {
        /// Path to a `{"concepts": [...]}` document
        graph: PathBuf,
    },

    /// Render a graph document to SVG
    Svg {
        /// Path to a `{"concepts": [...]}` document
        graph: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the registered plugins
    Plugins,
}

fn build_map(
    cli_config: Option<&Path>,
    plugins: &[String],
    graph: &Path,
) -> Result<(KnowledgeMap, MemoryScene), Box<dyn std::error::Error>> {
    let mut config = match cli_config {
        Some(path) => MapConfig::from_path(path)?,
        None => MapConfig::default(),
    };
    // A snapshot is rendered exactly once and has nothing to animate.
    config.held = false;
    config.transition_duration = None;
    config.resources = None;
    config.graph = Some(MapDocument::from_path(graph)?);
    config
        .plugins
        .extend(plugins.iter().cloned().map(PluginSpec::ByName));

    let scene = MemoryScene::new();
    let map = KnowledgeMap::create(config, Box::new(scene.clone()))?;
    tracing::debug!(
        "Rendered {} nodes and {} edges",
        map.graph().node_count(),
        map.graph().edge_count()
    );
    Ok((map, scene))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Layout { graph } => {
            let (map, _) = build_map(cli.config.as_deref(), &cli.plugins, graph)?;
            println!("{}", serde_json::to_string_pretty(map.layout())?);
        }
        Commands::Svg { graph, output } => {
            let (_, scene) = build_map(cli.config.as_deref(), &cli.plugins, graph)?;
            let svg = scene.to_svg();
            match output {
                Some(path) => {
                    std::fs::write(path, svg)?;
                    tracing::info!("Wrote {:?}", path);
                }
                None => print!("{svg}"),
            }
        }
        Commands::Plugins => {
            for name in PLUGINS.list() {
                println!("{name}");
            }
        }
    }

    Ok(())
}
