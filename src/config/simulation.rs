use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings for running a simulation from the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// RNG seed; 0 picks a random seed.
    #[serde(default)]
    pub seed: u64,
    /// Stop after this many turns; 0 runs until the sharks are extinct.
    #[serde(default)]
    pub max_turns: u64,
    /// Turns per second; 0 runs as fast as possible.
    #[serde(default)]
    pub turn_rate_hz: f32,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u32,
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: u32,
    #[serde(default = "default_snapshot_directory")]
    pub snapshot_directory: String,
    #[serde(default)]
    pub population_csv: Option<String>,
    #[serde(default)]
    pub display_grid: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_snapshot_interval() -> u32 {
    100
}
fn default_max_snapshots() -> u32 {
    10
}
fn default_snapshot_directory() -> String {
    "./snapshots".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 0,
            max_turns: 0,
            turn_rate_hz: 0.0,
            snapshot_interval: default_snapshot_interval(),
            max_snapshots: default_max_snapshots(),
            snapshot_directory: default_snapshot_directory(),
            population_csv: None,
            display_grid: false,
            log_level: default_log_level(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Time between turn starts; `None` when running unpaced or when the rate
    /// is too small for the interval to be represented.
    pub fn turn_interval(&self) -> Option<Duration> {
        if self.turn_rate_hz > 0.0 {
            Duration::try_from_secs_f32(1.0 / self.turn_rate_hz).ok()
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.turn_rate_hz < 0.0 || !self.turn_rate_hz.is_finite() {
            errors.push(format!(
                "turn_rate_hz must be >= 0.0, got {}. Example: turn_rate_hz = 2.0",
                self.turn_rate_hz
            ));
        } else if self.turn_rate_hz > 0.0 && self.turn_interval().is_none() {
            errors.push(format!(
                "turn_rate_hz is too small to pace turns, got {}. Example: turn_rate_hz = 0.01",
                self.turn_rate_hz
            ));
        }

        if self.snapshot_interval == 0 {
            errors.push(format!(
                "snapshot_interval must be > 0, got {}. Example: snapshot_interval = 100",
                self.snapshot_interval
            ));
        }

        if self.max_snapshots == 0 {
            errors.push(format!(
                "max_snapshots must be > 0, got {}. Example: max_snapshots = 10",
                self.max_snapshots
            ));
        }

        if self.population_csv.as_deref().is_some_and(str::is_empty) {
            errors.push(
                "population_csv must not be empty when set. Example: population_csv = \"population.csv\""
                    .to_string(),
            );
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-config.toml")
    }

    #[test]
    fn valid_config_loads_all_fields() {
        let toml = r#"
            seed = 7
            max_turns = 250
            turn_rate_hz = 2.0
            snapshot_interval = 50
            max_snapshots = 5
            snapshot_directory = "./data/snapshots"
            population_csv = "population.csv"
            display_grid = true
            log_level = "debug"
        "#;
        let config = SimulationConfig::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_turns, 250);
        assert_eq!(config.turn_rate_hz, 2.0);
        assert_eq!(config.snapshot_interval, 50);
        assert_eq!(config.max_snapshots, 5);
        assert_eq!(config.snapshot_directory, "./data/snapshots");
        assert_eq!(config.population_csv.as_deref(), Some("population.csv"));
        assert!(config.display_grid);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn defaults_applied_for_empty_config() {
        let config = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        assert_eq!(config.seed, 0);
        assert_eq!(config.max_turns, 0);
        assert_eq!(config.turn_rate_hz, 0.0);
        assert_eq!(config.snapshot_interval, 100);
        assert_eq!(config.max_snapshots, 10);
        assert_eq!(config.snapshot_directory, "./snapshots");
        assert!(config.population_csv.is_none());
        assert!(!config.display_grid);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn default_impl_matches_empty_toml() {
        let parsed = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        let default = SimulationConfig::default();
        assert_eq!(parsed.snapshot_directory, default.snapshot_directory);
        assert_eq!(parsed.snapshot_interval, default.snapshot_interval);
        assert_eq!(parsed.log_level, default.log_level);
    }

    #[test]
    fn negative_turn_rate_rejected() {
        let err = SimulationConfig::from_toml_str("turn_rate_hz = -1.0", &test_path()).unwrap_err();
        assert!(err.contains("turn_rate_hz"));
        assert!(err.contains(">= 0.0"));
    }

    #[test]
    fn vanishing_turn_rate_rejected() {
        let err = SimulationConfig::from_toml_str("turn_rate_hz = 1e-39", &test_path()).unwrap_err();
        assert!(err.contains("turn_rate_hz is too small"));
    }

    #[test]
    fn turn_interval_follows_rate() {
        let paced = SimulationConfig::from_toml_str("turn_rate_hz = 4.0", &test_path()).unwrap();
        assert_eq!(paced.turn_interval(), Some(Duration::from_millis(250)));
        assert_eq!(SimulationConfig::default().turn_interval(), None);
    }

    #[test]
    fn invalid_snapshot_interval_rejected() {
        let err =
            SimulationConfig::from_toml_str("snapshot_interval = 0", &test_path()).unwrap_err();
        assert!(err.contains("snapshot_interval"));
    }

    #[test]
    fn empty_csv_path_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"population_csv = """#, &test_path()).unwrap_err();
        assert!(err.contains("population_csv"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"log_level = "verbose""#, &test_path()).unwrap_err();
        assert!(err.contains("log_level"));
    }

    #[test]
    fn multiple_errors_reported_together() {
        let toml = "turn_rate_hz = -2.0\nsnapshot_interval = 0\nmax_snapshots = 0";
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("turn_rate_hz"));
        assert!(err.contains("snapshot_interval"));
        assert!(err.contains("max_snapshots"));
    }

    #[test]
    fn malformed_toml_includes_source_path() {
        let err =
            SimulationConfig::from_toml_str("max_turns = [invalid", &test_path()).unwrap_err();
        assert!(err.contains("test-config.toml"));
    }

    #[test]
    fn from_file_loads_valid_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(tmp, "max_turns = 12").unwrap();
        let config = SimulationConfig::from_file(tmp.path()).unwrap();
        assert_eq!(config.max_turns, 12);
    }

    #[test]
    fn from_file_missing_file_error() {
        let err = SimulationConfig::from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }
}
