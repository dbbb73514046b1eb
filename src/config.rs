use serde::{Deserialize, Serialize};

pub const DEFAULT_BENCH_CAPACITY: usize = 5;
pub const DEFAULT_PRIZE_COUNT: usize = 6;

/// Table-level settings shared by the resolver and the session service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Number of bench slots created for each player.
    pub bench_capacity: usize,
    /// Prize cards dealt by a set-prizes action that names no count.
    pub default_prize_count: usize,
    /// Seed for the session RNG; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bench_capacity: DEFAULT_BENCH_CAPACITY,
            default_prize_count: DEFAULT_PRIZE_COUNT,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"benchCapacity": 8}"#).unwrap();
        assert_eq!(config.bench_capacity, 8);
        assert_eq!(config.default_prize_count, DEFAULT_PRIZE_COUNT);
        assert_eq!(config.rng_seed, None);
    }
}
