//! Rudder CLI - render multi-chart Kubernetes configurations

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "rudder")]
#[command(author = "Rudder Contributors")]
#[command(version)]
#[command(about = "Render multi-chart Kubernetes configurations into manifests", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render config files (or directories of them) into manifests
    Template {
        /// Config files or directories
        #[arg(required = true)]
        configs: Vec<PathBuf>,

        /// Directory manifests are written under
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

/// `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Template {
            configs,
            output_dir,
        } => commands::template::run(&configs, &output_dir),
    }
}
