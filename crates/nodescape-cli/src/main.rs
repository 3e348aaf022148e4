use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use nodescape_base::{Guid, RenderConfig};
use nodescape_geometry::HostUnits;
use nodescape_view::{
    CoordinatorRegistry, EdgeAnalyzer, FrameCollector, GraphDocument, GraphViewProvider, GraphicsConfiguration,
    GraphicsData, PickRequest, Renderer, RendererKind, StaticGraph, Viewport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::info;

#[derive(Parser)]
#[command(name = "nodescape")]
#[command(about = "Headless driver for the nodescape 3D graph renderer")]
struct Cli {
    /// JSON render configuration; defaults apply to missing keys.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the edge render records of a graph as JSON.
    Analyze(AnalyzeArgs),
    /// Fit the main camera to a graph and pick at a window position.
    Pick(PickArgs),
    /// Run main and bird's-eye renderers side by side for a few frames.
    Run(RunArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    #[arg(long)]
    graph: PathBuf,
}

#[derive(Args)]
struct PickArgs {
    #[arg(long)]
    graph: PathBuf,
    #[arg(long)]
    x: f64,
    #[arg(long)]
    y: f64,
    /// Box width for a drag pick; defaults to the single-pick box.
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
    /// Report every hit instead of the closest one.
    #[arg(long)]
    all: bool,
    #[arg(long, default_value = "800x600")]
    viewport: String,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    graph: PathBuf,
    #[arg(long, default_value_t = 30)]
    frames: u32,
    /// View id shared by both renderers; a fresh one when omitted.
    #[arg(long)]
    view: Option<Guid>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Analyze(args) => analyze(&config, args),
        Command::Pick(args) => pick(config, args),
        Command::Run(args) => run(config, args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RenderConfig> {
    let config = match path {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RenderConfig::default(),
    };
    config.validate().context("invalid render configuration")?;
    Ok(config)
}

fn load_graph(path: &PathBuf) -> Result<StaticGraph> {
    let document = GraphDocument::load(path)
        .with_context(|| format!("failed to load graph {}", path.display()))?;
    info!(
        path = %path.display(),
        nodes = document.nodes.len(),
        edges = document.edges.len(),
        "graph loaded"
    );
    Ok(StaticGraph::new(document))
}

fn analyze(config: &RenderConfig, args: AnalyzeArgs) -> Result<()> {
    let graph = load_graph(&args.graph)?;
    let snapshot = graph.snapshot();
    let mut analyzer = EdgeAnalyzer::new(config.edges.clone());
    let records = analyzer.analyze(&snapshot, HostUnits::new(config.distance_scale));
    println!(
        "{}",
        serde_json::to_string_pretty(records).context("failed to encode edge records")?
    );
    Ok(())
}

fn pick(config: RenderConfig, args: PickArgs) -> Result<()> {
    let (width, height) = parse_viewport(&args.viewport)?;
    let graph: Arc<dyn GraphViewProvider> = Arc::new(load_graph(&args.graph)?);
    let registry = Arc::new(CoordinatorRegistry::new());

    let request = match (args.width, args.height) {
        (Some(w), Some(h)) => {
            let mut request = PickRequest::rect(args.x - w * 0.5, args.y - h * 0.5, args.x + w * 0.5, args.y + h * 0.5);
            request.select_all = args.all;
            request
        }
        (None, None) => {
            let mut request = PickRequest::point(args.x, args.y, config.picking.single_pick_box);
            request.select_all = args.all;
            request
        }
        _ => bail!("--width and --height must be given together"),
    };

    let mut data = GraphicsData::new(RendererKind::Main, Guid::new(), config, graph, registry);
    data.viewport = Viewport::new(width, height);
    let mut configuration = GraphicsConfiguration::main();
    configuration.initialize(&mut data);
    data.pending_pick = Some(request);
    configuration.execute(&mut data);
    let state = data.output.pick.clone().unwrap_or_default();
    configuration.dispose(&mut data);

    if state.degraded {
        info!("pick buffer overflowed, no confident hits");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&state).context("failed to encode picking state")?
    );
    Ok(())
}

fn run(config: RenderConfig, args: RunArgs) -> Result<()> {
    let graph: Arc<dyn GraphViewProvider> = Arc::new(load_graph(&args.graph)?);
    let registry = Arc::new(CoordinatorRegistry::new());
    let view = args.view.unwrap_or_default();
    let frame_interval = config.scheduler.frame_interval();

    let main_frames = FrameCollector::default();
    let birds_eye_frames = FrameCollector::default();
    let main = Renderer::new(
        RendererKind::Main,
        view,
        config.clone(),
        Arc::clone(&graph),
        Arc::clone(&registry),
        Box::new(main_frames.clone()),
    )
    .spawn();
    let birds_eye = Renderer::new(
        RendererKind::BirdsEye,
        view,
        config,
        graph,
        Arc::clone(&registry),
        Box::new(birds_eye_frames.clone()),
    )
    .spawn();

    thread::sleep(frame_interval * args.frames);

    if let Some(coordinator) = registry.get(view) {
        let state = coordinator.snapshot();
        info!(
            %view,
            bounds_matched = state.initial_bounds_matched,
            main_initialized = state.initial_main_camera_initialized,
            "coordinator state"
        );
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("failed to encode coordinator state")?
        );
    }

    let main_stopped = main.shutdown();
    let birds_eye_stopped = birds_eye.shutdown();
    info!(
        main_frames = main_frames.len(),
        birds_eye_frames = birds_eye_frames.len(),
        main_stopped,
        birds_eye_stopped,
        registry_entries = registry.len(),
        "renderers stopped"
    );
    Ok(())
}

fn parse_viewport(text: &str) -> Result<(f64, f64)> {
    let Some((width, height)) = text.split_once(['x', 'X']) else {
        bail!("--viewport expects WIDTHxHEIGHT, e.g. 800x600");
    };
    let width: f64 = width.trim().parse().context("invalid viewport width")?;
    let height: f64 = height.trim().parse().context("invalid viewport height")?;
    if width <= 0.0 || height <= 0.0 {
        bail!("viewport dimensions must be positive");
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_parses_both_separators() -> Result<()> {
        assert_eq!(parse_viewport("800x600")?, (800.0, 600.0));
        assert_eq!(parse_viewport("1024X768")?, (1024.0, 768.0));
        assert!(parse_viewport("800").is_err());
        assert!(parse_viewport("0x10").is_err());
        Ok(())
    }

    #[test]
    fn run_accepts_a_view_id() -> Result<()> {
        let view = Guid::new();
        let cli = Cli::try_parse_from(["nodescape", "run", "--graph", "g.json", "--view", &view.to_string()])?;
        let Command::Run(args) = cli.command else {
            bail!("expected the run subcommand");
        };
        assert_eq!(args.view, Some(view));
        assert!(Cli::try_parse_from(["nodescape", "run", "--graph", "g.json", "--view", "nope"]).is_err());
        Ok(())
    }
}
