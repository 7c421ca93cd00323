use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fishbowl::cli::commands::{self, RunStart};
use fishbowl::config::ecosystem::EcosystemParams;
use fishbowl::config::simulation::SimulationConfig;
use fishbowl::persistence;

#[derive(Parser)]
#[command(name = "fishbowl")]
#[command(about = "Fish and sharks on a wrap-around grid: a Wa-Tor predator-prey simulation")]
#[command(version)]
struct Cli {
    /// Path to the runner configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation until the sharks die out
    Run {
        /// Ecosystem rules for a new simulation
        #[arg(short, long, default_value = "ecosystem.toml")]
        ecosystem: String,

        /// Continue from this snapshot file instead of starting fresh
        #[arg(short, long, conflicts_with = "latest")]
        resume: Option<String>,

        /// Continue from the newest valid snapshot in the snapshot directory
        #[arg(long)]
        latest: bool,
    },

    /// Show population and grid of the latest snapshot
    Inspect,

    /// Manage simulation snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List available snapshots
    List {
        /// Snapshot directory
        #[arg(short, long, default_value = "snapshots")]
        dir: String,
    },

    /// Load and display a simulation from a snapshot file
    Restore {
        /// Path to the snapshot file
        file: String,
    },
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// A missing config file falls back to defaults; an invalid one is fatal.
fn load_config(path: &str) -> SimulationConfig {
    let path = Path::new(path);
    if !path.exists() {
        return SimulationConfig::default();
    }
    match SimulationConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli.config);
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Run {
            ecosystem,
            resume,
            latest,
        } => {
            let start = match (resume, latest) {
                (Some(path), _) => RunStart::Snapshot(PathBuf::from(path)),
                (None, true) => RunStart::Latest,
                (None, false) => match EcosystemParams::from_file(Path::new(&ecosystem)) {
                    Ok(params) => RunStart::New(params),
                    Err(e) => {
                        eprintln!("Error loading ecosystem: {}", e);
                        std::process::exit(1);
                    }
                },
            };

            if let Err(e) = commands::run_simulation(&config, start).await {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }

        Commands::Inspect => {
            if let Err(e) = commands::inspect(&config) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Snapshots { action } => match action {
            SnapshotAction::List { dir } => {
                let snapshot_dir = Path::new(&dir);
                match persistence::list_snapshots(snapshot_dir) {
                    Ok(snapshots) if snapshots.is_empty() => {
                        println!("No snapshots found in {}", snapshot_dir.display());
                    }
                    Ok(snapshots) => {
                        println!("{:<44} {:>8} {:>12}", "File", "Turn", "Size");
                        println!("{}", "-".repeat(66));
                        for s in &snapshots {
                            let name = s
                                .path
                                .file_name()
                                .and_then(|n| n.to_str())
                                .unwrap_or("?");
                            println!("{:<44} {:>8} {:>9} KB", name, s.turn, s.file_size / 1024);
                        }
                        println!(
                            "\n{} snapshot(s) in {}",
                            snapshots.len(),
                            snapshot_dir.display()
                        );
                    }
                    Err(e) => {
                        eprintln!("Error listing snapshots: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            SnapshotAction::Restore { file } => {
                let path = Path::new(&file);
                match persistence::load_snapshot(path) {
                    Ok(snapshot) => {
                        println!("Restored simulation from {}", path.display());
                        commands::print_snapshot_summary(&snapshot);
                    }
                    Err(e) => {
                        eprintln!("Error restoring snapshot: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        },
    }
}
