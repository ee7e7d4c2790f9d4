mod app;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use party_graph::build::{BuildOrchestrator, BuildOutput, BuildPoll, BuildStats};
use party_graph::graph::RenderedGraph;
use party_graph::layout::PositionEntry;
use party_graph::{Event, Settings, filter_graph, load_events};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON file holding the event list.
    events: PathBuf,

    /// Neighbors per event; overrides the config file.
    #[arg(long)]
    k: Option<usize>,

    /// Extra TOML config layered over party-graph.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Build once and write graph, positions and stats as JSON instead of
    /// opening the viewer. Use `-` for stdout.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Search query applied to the exported graph.
    #[arg(long, requires = "export")]
    query: Option<String>,
}

#[derive(Serialize)]
struct Export<'a> {
    graph: &'a RenderedGraph,
    positions: Vec<PositionEntry<'a>>,
    stats: BuildStats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("party_graph=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(k) = args.k {
        settings.neighbors.k = k.max(1);
    }

    let events = load_events(&args.events)?;

    match &args.export {
        Some(path) => export(events, settings, path, args.query.as_deref()),
        None => run_viewer(events, settings),
    }
}

fn export(events: Vec<Event>, settings: Settings, path: &Path, query: Option<&str>) -> Result<()> {
    let k = settings.neighbors.k;
    let mut orchestrator = BuildOrchestrator::new(settings);
    orchestrator.start(Arc::new(events), k);

    let output = match orchestrator.wait() {
        BuildPoll::Ready(output) => *output,
        BuildPoll::Failed { message, .. } => bail!(message),
        BuildPoll::Idle | BuildPoll::Pending { .. } => bail!("graph build produced no result"),
    };
    let BuildOutput {
        graph,
        positions,
        stats,
        ..
    } = output;

    let (graph, positions) = match query {
        Some(query) => {
            let filtered = filter_graph(&graph, query);
            let projected = positions.project(&filtered);
            (filtered, projected)
        }
        None => (graph, positions),
    };

    let document = Export {
        graph: &graph,
        positions: positions.entries(&graph),
        stats,
    };
    let json = serde_json::to_string_pretty(&document).context("failed to serialize graph")?;

    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
    } else {
        fs::write(path, json)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        info!(path = %path.display(), nodes = graph.nodes.len(), "exported graph");
    }
    Ok(())
}

fn run_viewer(events: Vec<Event>, settings: Settings) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([settings.viewer.width, settings.viewer.height]),
        ..Default::default()
    };

    eframe::run_native(
        "Party Graph",
        options,
        Box::new(move |cc| Ok(Box::new(app::PartyGraphApp::new(cc, events, settings)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
