use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::world::{Neighborhood, Species, Turn};

/// Rule parameters of an ecosystem. Immutable for the lifetime of a simulation
/// and stored with it for reproducibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemParams {
    pub grid_size: u32,
    pub init_nb_fish: u32,
    pub fish_breed_maturity: u32,
    /// Percent chance, 0-100.
    pub fish_breed_probability: u32,
    /// Reserved: animals move one cell per turn.
    #[serde(default = "default_speed")]
    pub fish_speed: u32,
    pub init_nb_shark: u32,
    pub shark_breed_maturity: u32,
    /// Percent chance, 0-100.
    pub shark_breed_probability: u32,
    /// Reserved: animals move one cell per turn.
    #[serde(default = "default_speed")]
    pub shark_speed: u32,
    /// Turns a shark may go without eating; it dies once this is exceeded.
    pub shark_starving: u32,
    #[serde(default)]
    pub neighborhood: Neighborhood,
}

fn default_speed() -> u32 {
    1
}

impl EcosystemParams {
    /// A 10x10 grid with no initial animals, every animal mature at 3 turns
    /// and always breeding.
    pub fn empty() -> Self {
        EcosystemParams {
            grid_size: 10,
            init_nb_fish: 0,
            fish_breed_maturity: 3,
            fish_breed_probability: 100,
            fish_speed: 2,
            init_nb_shark: 0,
            shark_breed_maturity: 3,
            shark_breed_probability: 100,
            shark_speed: 4,
            shark_starving: 4,
            neighborhood: Neighborhood::VonNeumann,
        }
    }

    /// Load ecosystem parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let params: Self = toml::from_str(content)
            .map_err(|e| format!("Invalid TOML in {}: {}", source_path.display(), e))?;
        params.validate()?;
        Ok(params)
    }

    /// Validate parameter ranges. All failures are reported together.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.grid_size == 0 {
            errors.push("grid_size must be >= 1, got 0. Example: grid_size = 10".to_string());
        }

        for (name, value) in [
            ("fish_breed_probability", self.fish_breed_probability),
            ("shark_breed_probability", self.shark_breed_probability),
        ] {
            if value > 100 {
                errors.push(format!(
                    "{} must be 0-100, got {}. Example: {} = 80",
                    name, value, name
                ));
            }
        }

        for (name, value) in [("fish_speed", self.fish_speed), ("shark_speed", self.shark_speed)] {
            if value == 0 {
                errors.push(format!("{} must be >= 1, got 0. Example: {} = 1", name, name));
            }
        }

        let cells = self.grid_size as u64 * self.grid_size as u64;
        let population = self.init_nb_fish as u64 + self.init_nb_shark as u64;
        if population > cells {
            errors.push(format!(
                "init_nb_fish + init_nb_shark must fit on the grid ({} cells), got {}",
                cells, population
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    pub fn initial_count(&self, species: Species) -> u32 {
        match species {
            Species::Fish => self.init_nb_fish,
            Species::Shark => self.init_nb_shark,
        }
    }

    pub fn breed_maturity(&self, species: Species) -> Turn {
        match species {
            Species::Fish => self.fish_breed_maturity as Turn,
            Species::Shark => self.shark_breed_maturity as Turn,
        }
    }

    pub fn breed_probability(&self, species: Species) -> u32 {
        match species {
            Species::Fish => self.fish_breed_probability,
            Species::Shark => self.shark_breed_probability,
        }
    }

    pub fn shark_starving(&self) -> Turn {
        self.shark_starving as Turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-ecosystem.toml")
    }

    const VALID: &str = r#"
        grid_size = 10
        init_nb_fish = 50
        fish_breed_maturity = 3
        fish_breed_probability = 80
        fish_speed = 2
        init_nb_shark = 5
        shark_breed_maturity = 5
        shark_breed_probability = 100
        shark_speed = 4
        shark_starving = 4
    "#;

    #[test]
    fn valid_params_load_all_fields() {
        let params = EcosystemParams::from_toml_str(VALID, &test_path()).unwrap();
        assert_eq!(params.grid_size, 10);
        assert_eq!(params.init_nb_fish, 50);
        assert_eq!(params.fish_breed_maturity, 3);
        assert_eq!(params.fish_breed_probability, 80);
        assert_eq!(params.fish_speed, 2);
        assert_eq!(params.init_nb_shark, 5);
        assert_eq!(params.shark_breed_maturity, 5);
        assert_eq!(params.shark_breed_probability, 100);
        assert_eq!(params.shark_speed, 4);
        assert_eq!(params.shark_starving, 4);
        assert_eq!(params.neighborhood, Neighborhood::VonNeumann);
    }

    #[test]
    fn neighborhood_parses_snake_case() {
        let toml = format!("{}\nneighborhood = \"moore\"", VALID);
        let params = EcosystemParams::from_toml_str(&toml, &test_path()).unwrap();
        assert_eq!(params.neighborhood, Neighborhood::Moore);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = EcosystemParams::from_toml_str("grid_size = 10", &test_path()).unwrap_err();
        assert!(err.contains("test-ecosystem.toml"));
    }

    #[test]
    fn probability_above_hundred_rejected() {
        let params = EcosystemParams {
            fish_breed_probability: 101,
            ..EcosystemParams::empty()
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("fish_breed_probability"));
        assert!(err.contains("0-100"));
    }

    #[test]
    fn overcrowded_grid_rejected() {
        let params = EcosystemParams {
            grid_size: 2,
            init_nb_fish: 3,
            init_nb_shark: 2,
            ..EcosystemParams::empty()
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("4 cells"));
    }

    #[test]
    fn multiple_errors_reported_together() {
        let params = EcosystemParams {
            grid_size: 0,
            shark_breed_probability: 200,
            shark_speed: 0,
            ..EcosystemParams::empty()
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("grid_size"));
        assert!(err.contains("shark_breed_probability"));
        assert!(err.contains("shark_speed"));
    }

    #[test]
    fn per_species_accessors() {
        let params = EcosystemParams::from_toml_str(VALID, &test_path()).unwrap();
        assert_eq!(params.breed_maturity(Species::Fish), 3);
        assert_eq!(params.breed_maturity(Species::Shark), 5);
        assert_eq!(params.breed_probability(Species::Fish), 80);
        assert_eq!(params.initial_count(Species::Shark), 5);
        assert_eq!(params.shark_starving(), 4);
    }

    #[test]
    fn from_file_loads_valid_params() {
        let mut tmp = NamedTempFile::new().unwrap();
        use std::io::Write;
        write!(tmp, "{}", VALID).unwrap();
        let params = EcosystemParams::from_file(tmp.path()).unwrap();
        assert_eq!(params.init_nb_fish, 50);
    }

    #[test]
    fn from_file_missing_file_error() {
        let err = EcosystemParams::from_file(Path::new("/nonexistent/ecosystem.toml")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }
}
