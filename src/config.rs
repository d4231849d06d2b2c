use std::fmt::Display;
use std::str::FromStr;

use crate::hshg::constants::grid::{
    INITIAL_GRID_LENGTH, MAX_OBJECT_CELL_DENSITY, MIN_ROW_COLUMN_COUNT,
};
use crate::hshg::constants::hierarchy::HIERARCHY_FACTOR;

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_object_cell_density must be finite and > 0, got {0}")]
    InvalidDensity(f32),
    #[error("initial_grid_length must be a power of 4 of at least 16, got {0}")]
    InvalidGridLength(usize),
    #[error("hierarchy_factor must be finite and > 1, got {0}")]
    InvalidHierarchyFactor(f32),
    #[error("simulation {field} is out of range: {reason}")]
    InvalidSimulation {
        field: &'static str,
        reason: String,
    },
}

/// Index configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HshgConfig {
    /// Objects per cell above which a tier grows its cell count 4x
    pub max_object_cell_density: f32,
    /// Cell count of newly created tiers
    pub initial_grid_length: usize,
    /// Ratio between consecutive tier cell sizes
    pub hierarchy_factor: f32,
    /// Move objects whose size drifted out of their tier during `update`
    pub retier_on_update: bool,
}

impl Default for HshgConfig {
    fn default() -> Self {
        Self {
            max_object_cell_density: MAX_OBJECT_CELL_DENSITY,
            initial_grid_length: INITIAL_GRID_LENGTH,
            hierarchy_factor: HIERARCHY_FACTOR,
            retier_on_update: false,
        }
    }
}

impl HshgConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load config through `lookup`, keeping defaults for missing or bad values
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(density) = parse_var::<f32>(&lookup, "HSHG_MAX_OBJECT_CELL_DENSITY") {
            if density.is_finite() && density > 0.0 {
                config.max_object_cell_density = density;
            } else {
                tracing::warn!("HSHG_MAX_OBJECT_CELL_DENSITY must be > 0, using default");
            }
        }

        if let Some(length) = parse_var::<usize>(&lookup, "HSHG_INITIAL_GRID_LENGTH") {
            if grid_length_is_valid(length) {
                config.initial_grid_length = length;
            } else {
                tracing::warn!(
                    "HSHG_INITIAL_GRID_LENGTH must be a power of 4 >= {}, using default",
                    MIN_ROW_COLUMN_COUNT * MIN_ROW_COLUMN_COUNT
                );
            }
        }

        if let Some(factor) = parse_var::<f32>(&lookup, "HSHG_HIERARCHY_FACTOR") {
            if factor.is_finite() && factor > 1.0 {
                config.hierarchy_factor = factor;
            } else {
                tracing::warn!("HSHG_HIERARCHY_FACTOR must be > 1, using default");
            }
        }

        if let Some(retier) = parse_var::<bool>(&lookup, "HSHG_RETIER_ON_UPDATE") {
            config.retier_on_update = retier;
        }

        config
    }

    /// Validate configuration before building an index
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_object_cell_density.is_finite() && self.max_object_cell_density > 0.0) {
            return Err(ConfigError::InvalidDensity(self.max_object_cell_density));
        }
        if !grid_length_is_valid(self.initial_grid_length) {
            return Err(ConfigError::InvalidGridLength(self.initial_grid_length));
        }
        if !(self.hierarchy_factor.is_finite() && self.hierarchy_factor > 1.0) {
            return Err(ConfigError::InvalidHierarchyFactor(self.hierarchy_factor));
        }
        Ok(())
    }
}

/// Square grid, power-of-two side, at least `MIN_ROW_COLUMN_COUNT` per side
fn grid_length_is_valid(length: usize) -> bool {
    length.is_power_of_two()
        && length.trailing_zeros() % 2 == 0
        && length >= MIN_ROW_COLUMN_COUNT * MIN_ROW_COLUMN_COUNT
}

/// Settings for the `hshg-sim` driver
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub object_count: usize,
    pub ticks: u32,
    /// Objects spawn in `[-world_size / 2, world_size / 2]` on both axes
    pub world_size: f32,
    pub min_object_size: f32,
    pub max_object_size: f32,
    /// Share of objects that never move
    pub static_fraction: f32,
    /// Per-tick displacement bound for moving objects
    pub max_speed: f32,
    pub seed: u64,
    /// Log `HshgStats` every N ticks (0 disables)
    pub stats_interval: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            object_count: 2000,
            ticks: 600,
            world_size: 4000.0,
            min_object_size: 2.0,
            max_object_size: 64.0,
            static_fraction: 0.1,
            max_speed: 4.0,
            seed: 0x5eed,
            stats_interval: 120,
        }
    }
}

impl SimulationConfig {
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(count) = parse_var(&lookup, "SIM_OBJECTS") {
            config.object_count = count;
        }
        if let Some(ticks) = parse_var(&lookup, "SIM_TICKS") {
            config.ticks = ticks;
        }
        if let Some(size) = parse_var(&lookup, "SIM_WORLD_SIZE") {
            config.world_size = size;
        }
        if let Some(size) = parse_var(&lookup, "SIM_MIN_SIZE") {
            config.min_object_size = size;
        }
        if let Some(size) = parse_var(&lookup, "SIM_MAX_SIZE") {
            config.max_object_size = size;
        }
        if let Some(fraction) = parse_var::<f32>(&lookup, "SIM_STATIC_FRACTION") {
            if (0.0..=1.0).contains(&fraction) {
                config.static_fraction = fraction;
            } else {
                tracing::warn!("SIM_STATIC_FRACTION must be 0-1, using default");
            }
        }
        if let Some(speed) = parse_var(&lookup, "SIM_MAX_SPEED") {
            config.max_speed = speed;
        }
        if let Some(seed) = parse_var(&lookup, "SIM_SEED") {
            config.seed = seed;
        }
        if let Some(interval) = parse_var(&lookup, "SIM_STATS_INTERVAL") {
            config.stats_interval = interval;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| {
            Err(ConfigError::InvalidSimulation { field, reason })
        };

        if !(self.world_size.is_finite() && self.world_size > 0.0) {
            return invalid("world_size", format!("{} is not > 0", self.world_size));
        }
        if !(self.min_object_size.is_finite() && self.min_object_size >= 0.0) {
            return invalid("min_object_size", format!("{} is negative", self.min_object_size));
        }
        if !(self.max_object_size.is_finite() && self.max_object_size > self.min_object_size) {
            return invalid(
                "max_object_size",
                format!("{} is not above min_object_size", self.max_object_size),
            );
        }
        if self.max_object_size >= self.world_size {
            return invalid(
                "max_object_size",
                format!("{} does not fit in the world", self.max_object_size),
            );
        }
        if !(0.0..=1.0).contains(&self.static_fraction) {
            return invalid("static_fraction", format!("{} is not in 0-1", self.static_fraction));
        }
        if !(self.max_speed.is_finite() && self.max_speed >= 0.0) {
            return invalid("max_speed", format!("{} is negative", self.max_speed));
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Invalid {} '{}' ({}), using default", key, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_default_config() {
        let config = HshgConfig::default();
        assert_eq!(config.max_object_cell_density, 0.125);
        assert_eq!(config.initial_grid_length, 256);
        assert_eq!(config.hierarchy_factor, 2.0);
        assert!(!config.retier_on_update);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = HshgConfig::load_or_default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_vars() {
        let config = HshgConfig::load_from(vars(&[
            ("HSHG_MAX_OBJECT_CELL_DENSITY", "0.5"),
            ("HSHG_INITIAL_GRID_LENGTH", "1024"),
            ("HSHG_HIERARCHY_FACTOR", "3"),
            ("HSHG_RETIER_ON_UPDATE", "true"),
        ]));
        assert_eq!(config.max_object_cell_density, 0.5);
        assert_eq!(config.initial_grid_length, 1024);
        assert_eq!(config.hierarchy_factor, 3.0);
        assert!(config.retier_on_update);
    }

    #[test]
    fn test_bad_vars_keep_defaults() {
        let config = HshgConfig::load_from(vars(&[
            ("HSHG_MAX_OBJECT_CELL_DENSITY", "-1"),
            ("HSHG_INITIAL_GRID_LENGTH", "512"),
            ("HSHG_HIERARCHY_FACTOR", "abc"),
            ("HSHG_RETIER_ON_UPDATE", "maybe"),
        ]));
        assert_eq!(config, HshgConfig::default());
    }

    #[test]
    fn test_grid_length_validation() {
        for length in [16, 64, 256, 1024, 4096] {
            assert!(grid_length_is_valid(length), "{length}");
        }
        // Not powers of 4, or fewer than 4 rows
        for length in [0, 1, 4, 8, 32, 100, 128, 512] {
            assert!(!grid_length_is_valid(length), "{length}");
        }
    }

    #[test]
    fn test_validate_rejects() {
        let base = HshgConfig::default();

        let config = HshgConfig { max_object_cell_density: 0.0, ..base.clone() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidDensity(0.0)));

        let config = HshgConfig { initial_grid_length: 4, ..base.clone() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidGridLength(4)));

        let config = HshgConfig { hierarchy_factor: 1.0, ..base.clone() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidHierarchyFactor(1.0)));

        let config = HshgConfig { hierarchy_factor: f32::NAN, ..base };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulation_config() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());

        let config = SimulationConfig::load_from(vars(&[
            ("SIM_OBJECTS", "500"),
            ("SIM_SEED", "9"),
            ("SIM_STATIC_FRACTION", "2.0"),
        ]));
        assert_eq!(config.object_count, 500);
        assert_eq!(config.seed, 9);
        assert_eq!(config.static_fraction, 0.1);

        let config = SimulationConfig {
            max_object_size: 1.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSimulation { field: "max_object_size", .. })
        ));
    }
}
