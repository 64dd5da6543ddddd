//! # Floorplan Command Line
//!
//! Generates a floor plan for a seed and prints a summary or the full plan
//! as JSON.

use clap::{Parser, ValueEnum};
use floorplan::{
    FloorPlan, FloorPlanGenerator, FloorplanError, FloorplanResult, GenerationSettings, Region,
};
use log::{error, info};

/// Output format for the generated plan.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable statistics and room list
    Summary,
    /// Complete plan as pretty-printed JSON
    Json,
}

/// Command line arguments for the floor plan generator.
#[derive(Parser, Debug)]
#[command(name = "floorplan")]
#[command(about = "Seeded office floor plan generator")]
#[command(version)]
struct Args {
    /// Random seed for generation
    #[arg(short, long, default_value_t = 12345)]
    seed: u64,

    /// Map width, overriding the configuration file
    #[arg(long)]
    width: Option<u32>,

    /// Map height, overriding the configuration file
    #[arg(long)]
    height: Option<u32>,

    /// JSON settings file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    initialize_logging(&args.log_level);

    if let Err(e) = run(&args) {
        error!("{}", e);
        eprintln!("floorplan: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> FloorplanResult<()> {
    info!("Starting floorplan v{}", floorplan::VERSION);
    let settings = load_settings(args)?;

    let plan = FloorPlanGenerator::new().generate_from_seed(&settings, args.seed)?;
    let report = plan.validate(&settings);
    if !report.is_valid() {
        return Err(FloorplanError::GenerationFailed(format!(
            "generated plan failed validation: {report}"
        )));
    }

    match args.format {
        OutputFormat::Json => println!("{}", plan.to_json()?),
        OutputFormat::Summary => print_summary(&plan, &report.warnings),
    }
    Ok(())
}

/// Builds settings from the optional config file and size flags.
fn load_settings(args: &Args) -> FloorplanResult<GenerationSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            GenerationSettings::from_json_file(path)?
        }
        None => GenerationSettings::default(),
    };

    if args.width.is_some() || args.height.is_some() {
        let bounds = settings.bounds;
        settings.bounds = Region::try_new(
            bounds.x,
            bounds.y,
            args.width.unwrap_or(bounds.width),
            args.height.unwrap_or(bounds.height),
        )?;
        settings.validate()?;
    }
    Ok(settings)
}

fn print_summary(plan: &FloorPlan, warnings: &[String]) {
    let stats = &plan.stats;
    println!(
        "Seed {} on {}x{}",
        plan.seed, plan.bounds.width, plan.bounds.height
    );
    println!(
        "Partition: {} nodes, {} leaves, depth {} ({} vertical, {} horizontal splits)",
        stats.node_count,
        stats.leaf_count,
        stats.max_depth,
        stats.vertical_splits,
        stats.horizontal_splits
    );
    println!(
        "Rooms: {} ({} cells), corridors: {} ({:.1} cells long)",
        stats.room_count, stats.total_room_area, stats.corridor_count, stats.total_corridor_length
    );
    if stats.failed_rooms + stats.failed_corridors > 0 {
        println!(
            "Failures: {} leaves, {} corridors",
            stats.failed_rooms, stats.failed_corridors
        );
    }

    println!();
    for room in &plan.rooms {
        let connections: Vec<String> = room.connections.iter().map(u32::to_string).collect();
        println!(
            "  #{:<3} {:<15} {:>3}x{:<3} at ({:>3},{:>3})  -> {}",
            room.id,
            room.classification.name(),
            room.width(),
            room.height(),
            room.bounds.x,
            room.bounds.y,
            connections.join(", ")
        );
    }

    for warning in warnings {
        println!("warning: {warning}");
    }
}

/// Initializes the logging system based on the specified log level.
fn initialize_logging(log_level: &str) {
    #[cfg(feature = "dev-tools")]
    {
        use tracing::Level;

        let level = match log_level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .init();
    }

    #[cfg(not(feature = "dev-tools"))]
    {
        env_logger::Builder::new()
            .parse_filters(log_level)
            .format_timestamp(None)
            .init();
    }
}
