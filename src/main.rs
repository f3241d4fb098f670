use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use kg_layout::{
    ForceKind, ForceParameter, GraphSnapshot, InteractionController, LayoutConfig, SearchMode,
    SimulationEngine, TypeFilter, build_frame,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph snapshot JSON, or `-` for stdin.
    snapshot: String,

    /// Layout config JSON. Command-line overrides win over it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    link_distance: Option<f32>,

    #[arg(long)]
    charge_strength: Option<f32>,

    #[arg(long)]
    collision_margin: Option<f32>,

    /// Barnes-Hut opening angle. 0 computes exact repulsion.
    #[arg(long)]
    theta: Option<f32>,

    #[arg(long)]
    width: Option<f32>,

    #[arg(long)]
    height: Option<f32>,

    /// Force to switch off: link, charge, center or collision.
    #[arg(long = "disable", value_name = "FORCE")]
    disabled: Vec<ForceKind>,

    #[arg(long, default_value_t = 1000)]
    max_ticks: usize,

    #[arg(long)]
    search: Option<String>,

    /// Match the search fuzzily instead of by substring.
    #[arg(long)]
    fuzzy: bool,

    #[arg(long, default_value = "all")]
    type_filter: TypeFilter,

    /// Print snapshot statistics instead of running the layout.
    #[arg(long)]
    stats: bool,

    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let snapshot = read_snapshot(&args.snapshot)?;

    let json = if args.stats {
        to_json(&snapshot.stats(), args.pretty)?
    } else {
        let config = layout_config(&args)?;
        let mut engine = SimulationEngine::new(&config);
        apply_overrides(&mut engine, &args)?;
        engine.load(snapshot).context("failed to load graph snapshot")?;

        let ticks = engine.run_until_settled(args.max_ticks);
        info!(ticks, alpha = engine.alpha(), phase = ?engine.phase(), "layout finished");

        let mut controller = InteractionController::new(&config);
        if let Some(search) = &args.search {
            controller.set_search(search.as_str());
        }
        if args.fuzzy {
            controller.set_search_mode(SearchMode::Fuzzy);
        }
        controller.set_type_filter(args.type_filter.clone());

        to_json(&build_frame(&engine, &controller), args.pretty)?
    };

    match &args.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}").context("failed to write to stdout")?;
        }
    }
    Ok(())
}

fn read_snapshot(source: &str) -> Result<GraphSnapshot> {
    let raw = if source == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read snapshot from stdin")?;
        raw
    } else {
        fs::read_to_string(source).with_context(|| format!("failed to read snapshot {source}"))?
    };
    GraphSnapshot::from_json(&raw).context("invalid graph snapshot JSON")
}

fn layout_config(args: &Args) -> Result<LayoutConfig> {
    let mut config = match &args.config {
        Some(path) => LayoutConfig::load(path)?,
        None => LayoutConfig::default(),
    };

    if args.width.is_some() || args.height.is_some() {
        let width = args.width.unwrap_or(config.width);
        let height = args.height.unwrap_or(config.height);
        if !(width > 0.0 && height > 0.0) {
            bail!("viewport must be positive, got {width}x{height}");
        }
        let resized = LayoutConfig::with_viewport(width, height);
        config.width = width;
        config.height = height;
        config.forces.center = resized.forces.center;
    }
    for kind in &args.disabled {
        config.enabled.set(*kind, false);
    }
    Ok(config)
}

fn apply_overrides(engine: &mut SimulationEngine, args: &Args) -> Result<()> {
    let overrides = [
        (ForceParameter::LinkDistance, args.link_distance),
        (ForceParameter::ChargeStrength, args.charge_strength),
        (ForceParameter::CollisionMargin, args.collision_margin),
        (ForceParameter::BarnesHutTheta, args.theta),
    ];
    for (parameter, value) in overrides {
        if let Some(value) = value {
            engine
                .set_force_parameter(parameter, value)
                .with_context(|| format!("invalid {parameter} override"))?;
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("failed to serialize output")
}
