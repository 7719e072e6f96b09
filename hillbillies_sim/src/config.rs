// Data-driven simulation configuration.
//
// Every tunable constant of the simulation lives in `SimConfig`: capacity
// limits, movement speeds, combat odds, rest rates, and interpreter fuel.
// The sim never uses magic numbers; it reads from the config owned by its
// `World`. `Default` reproduces the standard game balance, and a config can
// be loaded from a JSON string for experiments (missing keys fall back to
// their defaults).
//
// See also: `world.rs` which owns the `SimConfig`, `unit.rs` for the speed
// and hitpoint formulas that read it, `physics.rs` for action durations.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. Identical configs and seeds give identical runs.

use serde::{Deserialize, Serialize};

/// Top-level simulation configuration. Never mutated after world creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Maximum number of units a world may hold.
    pub max_units: usize,
    /// Maximum number of simultaneously non-empty factions.
    pub max_active_factions: usize,
    /// Maximum number of members per faction.
    pub max_faction_size: usize,

    /// Probability that a collapsing cube leaves a boulder or log behind.
    pub collapse_drop_chance: f64,

    /// `base_speed = factor * (strength + agility) / (200 * weight / 100)`.
    pub base_speed_factor: f64,
    pub upward_speed_multiplier: f64,
    pub downward_speed_multiplier: f64,
    pub sprint_multiplier: f64,
    /// Seconds of sprinting that cost one stamina point.
    pub sprint_stamina_interval: f64,

    /// Falling speed in cubes per second.
    pub fall_speed: f64,
    /// Hitpoints lost per cube level fallen.
    pub fall_damage_per_level: i32,

    /// Work duration in seconds is `work_time_factor / strength`.
    pub work_time_factor: f64,

    /// Seconds an attack keeps the attacker busy.
    pub attack_duration: f64,
    pub dodge_factor: f64,
    pub block_factor: f64,
    /// Damage dealt is `attacker strength / damage_divisor`.
    pub damage_divisor: i32,

    /// Seconds per regeneration step while resting.
    pub rest_interval: f64,
    /// Idle units with default behaviour rest at least this often (seconds).
    pub auto_rest_interval: f64,

    /// Experience points needed for each attribute gain.
    pub experience_per_level: u32,
    pub experience_per_move: u32,
    pub experience_per_work: u32,
    pub experience_per_combat: u32,

    /// Inclusive weight range of boulders and logs.
    pub item_weight_range: (u32, u32),

    /// Inclusive range of spawned attribute values.
    pub spawn_attribute_range: (u32, u32),
    /// Random placement rolls before falling back to a full scan.
    pub spawn_attempts: u32,

    /// Statements a task may evaluate per unit per tick before yielding.
    pub max_statements_per_tick: u32,
    /// Priority lost by a task each time it fails.
    pub failed_task_priority_penalty: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_units: 100,
            max_active_factions: 5,
            max_faction_size: 50,
            collapse_drop_chance: 0.25,
            base_speed_factor: 1.5,
            upward_speed_multiplier: 1.2,
            downward_speed_multiplier: 0.5,
            sprint_multiplier: 2.0,
            sprint_stamina_interval: 0.1,
            fall_speed: 3.0,
            fall_damage_per_level: 10,
            work_time_factor: 500.0,
            attack_duration: 1.0,
            dodge_factor: 0.20,
            block_factor: 0.25,
            damage_divisor: 10,
            rest_interval: 0.2,
            auto_rest_interval: 180.0,
            experience_per_level: 10,
            experience_per_move: 1,
            experience_per_work: 10,
            experience_per_combat: 20,
            item_weight_range: (10, 50),
            spawn_attribute_range: (25, 100),
            spawn_attempts: 1000,
            max_statements_per_tick: 1000,
            failed_task_priority_penalty: 1,
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON. Keys not present keep their default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = SimConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn config_loads_from_json_string() {
        let json = r#"{
            "max_units": 20,
            "collapse_drop_chance": 1.0,
            "item_weight_range": [15, 30]
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.max_units, 20);
        assert_eq!(config.collapse_drop_chance, 1.0);
        assert_eq!(config.item_weight_range, (15, 30));
        // Unspecified keys keep their defaults.
        assert_eq!(config.max_faction_size, 50);
        assert_eq!(config.fall_speed, 3.0);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(SimConfig::from_json("{\"max_units\": \"many\"}").is_err());
    }
}
