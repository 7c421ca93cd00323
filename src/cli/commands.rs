use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::ecosystem::EcosystemParams;
use crate::config::simulation::SimulationConfig;
use crate::persistence::{self, AnimalFilter, AnimalStore, MemoryStore, SimulationSnapshot, SnapshotError};
use crate::simulation::statistics::PopulationCounts;
use crate::simulation::Simulation;
use crate::world::{Animal, Turn};

pub const CSV_HEADER: &str = "Turn, Fish, Sharks";

/// Where a run gets its initial state from.
#[derive(Debug, Clone)]
pub enum RunStart {
    /// Fresh simulation with these rules.
    New(EcosystemParams),
    /// Continue from a specific snapshot file.
    Snapshot(PathBuf),
    /// Continue from the newest valid snapshot in the snapshot directory.
    Latest,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SharksExtinct,
    TurnLimit,
    Interrupted,
}

/// Seed 0 in the config means "pick one"; the chosen seed is logged so the run
/// can be replayed.
fn resolve_seed(configured: u64) -> u64 {
    if configured != 0 {
        return configured;
    }
    let seed = rand::random::<u64>().max(1);
    info!(seed, "No seed configured, picked a random one");
    seed
}

fn build_simulation(
    config: &SimulationConfig,
    start: RunStart,
    rng: ChaCha8Rng,
) -> Result<Simulation<MemoryStore>, String> {
    let snapshot_dir = Path::new(&config.snapshot_directory);
    let snapshot = match start {
        RunStart::New(params) => {
            return Simulation::new(MemoryStore::new(), params, rng)
                .map_err(|e| format!("Failed to create simulation: {}", e));
        }
        RunStart::Snapshot(path) => {
            info!(path = %path.display(), "Loading snapshot");
            persistence::load_snapshot(&path)
        }
        RunStart::Latest => {
            info!(dir = %snapshot_dir.display(), "Loading latest snapshot");
            persistence::load_latest_valid_snapshot(snapshot_dir)
        }
    }
    .map_err(|e| format!("Failed to load snapshot: {}", e))?;

    Simulation::from_snapshot(snapshot, rng).map_err(|e| format!("Failed to restore simulation: {}", e))
}

fn save_current<S: AnimalStore>(sim: &Simulation<S>, snapshot_dir: &Path) -> Result<PathBuf, SnapshotError> {
    let snapshot = sim.snapshot()?;
    persistence::save_snapshot(&snapshot, snapshot_dir)
}

/// Run the simulation until the sharks die out, the turn limit is reached, or
/// Ctrl-C is pressed. A final snapshot is written in every case.
pub async fn run_simulation(config: &SimulationConfig, start: RunStart) -> Result<StopReason, String> {
    config.validate()?;

    // 1. Build or restore the simulation
    let seed = resolve_seed(config.seed);
    let mut sim = build_simulation(config, start, ChaCha8Rng::seed_from_u64(seed))?;
    let snapshot_dir = Path::new(&config.snapshot_directory);
    let csv_path = config.population_csv.as_deref().map(Path::new);

    let population = sim.population_counts().map_err(|e| e.to_string())?;
    info!(
        simulation = %sim.id(),
        turn = sim.turn(),
        seed,
        fish = population.fish,
        sharks = population.sharks,
        "Simulation running (turn rate: {}Hz, snapshot every {} turns)",
        config.turn_rate_hz,
        config.snapshot_interval
    );
    record_population(csv_path, sim.turn(), population);
    let mut last_recorded_turn = sim.turn();
    if config.display_grid {
        print_grid(&sim)?;
    }

    // 2. Set up shutdown signal and pacing
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let turn_interval = config.turn_interval();
    let mut turns_played: u64 = 0;
    let mut turns_since_snapshot: u32 = 0;

    // 3. Run turns
    let reason = loop {
        if config.max_turns > 0 && turns_played >= config.max_turns {
            break StopReason::TurnLimit;
        }
        let turn_start = Instant::now();

        match sim.play_turn() {
            Ok(result) => {
                let stats = &result.statistics;
                turns_played += 1;
                debug!(
                    turn = stats.turn,
                    fish = stats.population.fish,
                    sharks = stats.population.sharks,
                    births = stats.births(),
                    deaths = stats.deaths(),
                    moved = stats.moved,
                    "Turn complete"
                );
                record_population(csv_path, stats.turn, stats.population);
                last_recorded_turn = stats.turn;
                if config.display_grid {
                    print_grid(&sim)?;
                }
                if stats.turn % 100 == 0 {
                    info!(turn = stats.turn, population = %stats.population, "Progress");
                }
            }
            Err(e) if e.is_end_of_simulation() => {
                info!(turn = sim.turn(), "{}", e);
                // A turn that completed before the sharks died out still gets its row
                if sim.turn() > last_recorded_turn {
                    let population = sim.population_counts().map_err(|e| e.to_string())?;
                    record_population(csv_path, sim.turn(), population);
                }
                break StopReason::SharksExtinct;
            }
            Err(e) => return Err(format!("Simulation error: {}", e)),
        }

        // Periodic auto-save
        turns_since_snapshot += 1;
        if turns_since_snapshot >= config.snapshot_interval {
            turns_since_snapshot = 0;
            match save_current(&sim, snapshot_dir) {
                Ok(path) => {
                    info!(path = %path.display(), "Snapshot saved");
                    if let Err(e) =
                        persistence::prune_snapshots(snapshot_dir, config.max_snapshots as usize)
                    {
                        warn!(error = %e, "Snapshot pruning failed");
                    }
                }
                Err(e) => warn!(error = %e, "Snapshot save failed"),
            }
        }

        // Rate limiting: sleep what is left of the turn interval
        let remaining = turn_interval
            .map(|interval| interval.saturating_sub(turn_start.elapsed()))
            .unwrap_or_default();
        if remaining > Duration::ZERO {
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break StopReason::Interrupted;
                }
            }
        } else {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break StopReason::Interrupted;
                }
                _ = tokio::task::yield_now() => {}
            }
        }
    };

    // 4. Graceful shutdown: save final snapshot
    match save_current(&sim, snapshot_dir) {
        Ok(path) => info!(path = %path.display(), "Final snapshot saved"),
        Err(e) => warn!(error = %e, "Final snapshot save failed"),
    }
    info!(turn = sim.turn(), ?reason, "Simulation stopped");
    Ok(reason)
}

/// Append one population row, logging instead of failing the run.
fn record_population(csv_path: Option<&Path>, turn: Turn, population: PopulationCounts) {
    if let Some(path) = csv_path {
        if let Err(e) = append_population_row(path, turn, population) {
            warn!(path = %path.display(), error = %e, "Cannot write population row");
        }
    }
}

/// Append `turn, fish, sharks` to a CSV file, writing the header first when
/// the file is new or empty.
pub fn append_population_row(path: &Path, turn: Turn, population: PopulationCounts) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{}", CSV_HEADER)?;
    }
    writeln!(file, "{}, {}, {}", turn, population.fish, population.sharks)
}

/// Text picture of the grid: one row per `y`, `F` fish, `S` shark, `.` empty.
/// Dead animals are not drawn.
pub fn render_grid<'a>(grid_size: u32, animals: impl IntoIterator<Item = &'a Animal>) -> String {
    let size = grid_size as usize;
    let mut cells = vec![vec!['.'; size]; size];
    for animal in animals.into_iter().filter(|a| a.alive) {
        if animal.position.in_bounds(grid_size) {
            cells[animal.position.y as usize][animal.position.x as usize] = animal.species.glyph();
        }
    }
    cells
        .into_iter()
        .map(|row| row.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_grid<S: AnimalStore>(sim: &Simulation<S>) -> Result<(), String> {
    let animals = sim.animals(AnimalFilter::living()).map_err(|e| e.to_string())?;
    let grid_size = sim.params().grid_size;
    println!(
        "Turn {} ({} of {} cells occupied)",
        sim.turn(),
        sim.occupancy().len(),
        grid_size * grid_size
    );
    println!("{}\n", render_grid(grid_size, &animals));
    Ok(())
}

/// Print what a snapshot holds: identity, rules, population and grid.
pub fn print_snapshot_summary(snapshot: &SimulationSnapshot) {
    let params = &snapshot.params;
    let population = PopulationCounts::from_animals(&snapshot.animals);
    let dead = snapshot.animals.iter().filter(|a| !a.alive).count();

    println!("=== Simulation {} ===", snapshot.id);
    println!("Turn: {}", snapshot.turn);
    println!(
        "Grid: {}x{} ({:?} neighborhood)",
        params.grid_size, params.grid_size, params.neighborhood
    );
    println!();
    println!("--- Rules ---");
    println!(
        "  Fish:   maturity {}, breed probability {}%",
        params.fish_breed_maturity, params.fish_breed_probability
    );
    println!(
        "  Sharks: maturity {}, breed probability {}%, starve after {} turns",
        params.shark_breed_maturity, params.shark_breed_probability, params.shark_starving
    );
    println!();
    println!("--- Population ---");
    println!("  Living: {}", population);
    println!("  Dead records: {}", dead);
    println!();
    println!("{}", render_grid(params.grid_size, &snapshot.animals));
}

/// Show the latest valid snapshot in the configured directory.
pub fn inspect(config: &SimulationConfig) -> Result<(), String> {
    let snapshot_dir = Path::new(&config.snapshot_directory);
    let snapshot = persistence::load_latest_valid_snapshot(snapshot_dir)
        .map_err(|e| format!("Failed to load snapshot: {}", e))?;
    print_snapshot_summary(&snapshot);
    Ok(())
}
