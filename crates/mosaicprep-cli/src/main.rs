mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mosaicprep", about = "Survey-frame calibration for mosaic building")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or save a default configuration file
    Config(commands::config::ConfigArgs),
    /// List the (AOR, channel) job units and exposure groups
    Joblist(commands::joblist::JoblistArgs),
    /// Solve the per-exposure-group astrometric offsets
    SolveAstrometry(commands::solve::SolveArgs),
    /// Build repeat-group background templates
    MakeBackgrounds(commands::backgrounds::BackgroundsArgs),
    /// Subtract backgrounds and rescale noise maps
    Subtract(commands::subtract::SubtractArgs),
    /// Run the full calibration pipeline
    Run(commands::run::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Joblist(args) => commands::joblist::run(args),
        Commands::SolveAstrometry(args) => commands::solve::run(args),
        Commands::MakeBackgrounds(args) => commands::backgrounds::run(args),
        Commands::Subtract(args) => commands::subtract::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
