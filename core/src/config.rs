//! Process configuration: every tunable named in the configuration table,
//! loaded from (or saved to) TOML. Passed by value/reference into sampler
//! and driver construction; there is no process-wide mutable global.

use crate::error::{MorphError, Result};
use serde::{Deserialize, Serialize};

/// `modsel.*`: outer soft-EM + rule-selection loop tunables.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ModselSection {
    pub iterations: u32,
    pub warmup_iterations: u64,
    pub sampling_iterations: u64,
}

impl Default for ModselSection {
    fn default() -> Self {
        ModselSection {
            iterations: 10,
            warmup_iterations: 1_000_000,
            sampling_iterations: 10_000_000,
        }
    }
}

/// `sample.stat_*`: which statistics the sampler collects.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct SampleSection {
    pub stat_acceptance_rate: bool,
    pub stat_expected_cost: bool,
    pub stat_edge_frequency: bool,
    pub stat_rule_frequency: bool,
    pub stat_undirected_edge_frequency: bool,
    pub stat_rule_expected_contribution: bool,
    pub iter_stat_interval: u64,
}

impl Default for SampleSection {
    fn default() -> Self {
        SampleSection {
            stat_acceptance_rate: true,
            stat_expected_cost: true,
            stat_edge_frequency: true,
            stat_rule_frequency: true,
            stat_undirected_edge_frequency: false,
            stat_rule_expected_contribution: true,
            iter_stat_interval: 10_000,
        }
    }
}

impl SampleSection {
    pub fn to_stat_config(self) -> crate::stats::StatConfig {
        crate::stats::StatConfig {
            acceptance_rate: self.stat_acceptance_rate,
            expected_cost: self.stat_expected_cost,
            edge_frequency: self.stat_edge_frequency,
            rule_frequency: self.stat_rule_frequency,
            undirected_edge_frequency: self.stat_undirected_edge_frequency,
            rule_expected_contribution: self.stat_rule_expected_contribution,
        }
    }
}

/// `General.*`: top-level run mode.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralSection {
    pub supervised: bool,
    pub semi_supervised: bool,
    pub seed: u64,
    pub random_init: bool,
}

impl Default for GeneralSection {
    fn default() -> Self {
        GeneralSection {
            supervised: false,
            semi_supervised: false,
            seed: 0,
            random_init: true,
        }
    }
}

/// Bernoulli rule-application prior hyperparameters and the Gaussian
/// edge-frequency variance floor.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSection {
    pub bernoulli_alpha: f64,
    pub bernoulli_beta: f64,
    pub gaussian_variance_floor: f64,
}

impl Default for ModelSection {
    fn default() -> Self {
        ModelSection {
            bernoulli_alpha: 1.1,
            bernoulli_beta: 1.1,
            gaussian_variance_floor: 0.001,
        }
    }
}

/// The full process configuration: every key in the core's configuration
/// table (sec. 6), loaded from or saved to a single TOML file.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "General")]
    pub general: GeneralSection,
    pub modsel: ModselSection,
    pub sample: SampleSection,
    pub model: ModelSection,
}

impl Config {
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(MorphError::from)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(MorphError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let s = config.to_toml_string().unwrap();
        let reloaded = Config::from_toml_str(&s).unwrap();
        assert_eq!(reloaded.modsel.iterations, config.modsel.iterations);
        assert_eq!(reloaded.general.seed, config.general.seed);
    }

    #[test]
    fn unspecified_keys_fall_back_to_defaults() {
        let config = Config::from_toml_str("[modsel]\niterations = 3\n").unwrap();
        assert_eq!(config.modsel.iterations, 3);
        assert_eq!(config.modsel.warmup_iterations, ModselSection::default().warmup_iterations);
        assert!(config.general.random_init);
    }

    #[test]
    fn load_and_save_toml_round_trip_through_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.modsel.iterations = 7;
        config.save_toml(&path).unwrap();
        let reloaded = Config::load_toml(&path).unwrap();
        assert_eq!(reloaded.modsel.iterations, 7);
    }
}
