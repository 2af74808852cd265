//! Game Settings
//!
//! Every setting has a default so a host can run with no settings file.
//! A JSON file may override any subset:
//!
//! ```json
//! { "match": { "total_rounds": 5 }, "game_state": { "winning_coin_count": 300 } }
//! ```

use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::core::math::Vec3;
use crate::error::ConfigError;
use crate::game::gems::GemSettings;
use crate::weapons::types::{
    GatherParams, GatherShape, HitEffect, WeaponParams, WeaponType, MAX_WEAPONS_PER_COMPONENT,
};

/// Top-level settings for an arena session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Round and rest timing for the authoritative match controller
    #[serde(rename = "match")]
    pub match_settings: MatchSettings,
    /// Game state machine timing
    pub game_state: GameStateSettings,
    /// Weapon simulation
    pub weapons: WeaponSettings,
    /// Player tuning
    pub players: PlayerSettings,
    /// Gem types, spawn tables and spawn points
    pub gems: GemSettings,
}

/// Round and rest timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Seconds per round
    pub round_duration_sec: f32,
    /// Rounds per match
    pub total_rounds: u16,
    /// Seconds of rest between rounds (0 starts the next round immediately)
    pub rest_duration_sec: f32,
    /// Percentage of coins lost when a player's armor is depleted
    pub respawn_penalty_percent: u8,
    /// Period of the round and rest countdown ticks
    pub countdown_tick_ms: u64,
    /// Gem tag dropped where a player's armor was depleted
    pub respawn_gem_tag: String,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            round_duration_sec: 60.0,
            total_rounds: 3,
            rest_duration_sec: 10.0,
            respawn_penalty_percent: 50,
            countdown_tick_ms: 1000,
            respawn_gem_tag: "common".into(),
        }
    }
}

/// Game state machine timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStateSettings {
    /// Countdown before a match starts
    pub preparing_countdown_ms: u64,
    /// Rest after a match ends before preparing the next one
    pub match_ended_rest_ms: u64,
    /// Coins that end the match early
    pub winning_coin_count: u16,
}

impl Default for GameStateSettings {
    fn default() -> Self {
        Self {
            preparing_countdown_ms: 3000,
            match_ended_rest_ms: 3000,
            winning_coin_count: 500,
        }
    }
}

/// Weapon simulation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponSettings {
    /// Sub-segments swept per tick by travelling shots
    pub multitrace_segments: u32,
    /// Weapons given to every player, by slot
    pub loadout: Vec<WeaponParams>,
}

impl Default for WeaponSettings {
    fn default() -> Self {
        let laser_pistol = WeaponParams {
            weapon_type: WeaponType::Trace,
            cooldown_time_ms: 250.0,
            activate_fx: "laser_pistol_muzzle_flash".into(),
            impact_fx: "laser_pistol_impact".into(),
            gather_params: GatherParams {
                cast_distance: 50.0,
                bullet_drop: false,
                ..GatherParams::default()
            },
            damage_effect: HitEffect {
                hit_magnitude: 20.0,
                hit_falloff: 1.0,
                hit_exponent: 0.0,
            },
            ..WeaponParams::default()
        };
        let bubble_gun = WeaponParams {
            weapon_type: WeaponType::Projectile,
            cooldown_time_ms: 1000.0,
            activate_fx: "bubble_gun_muzzle_flash".into(),
            impact_fx: "bubble_gun_impact".into(),
            projectile_asset: "prefabs/bubble.spawnable".into(),
            gather_params: GatherParams {
                shape: GatherShape::Sphere,
                cast_distance: 40.0,
                cast_radius: 0.25,
                travel_speed: 20.0,
                ..GatherParams::default()
            },
            damage_effect: HitEffect {
                hit_magnitude: 40.0,
                hit_falloff: 0.1,
                hit_exponent: 1.0,
            },
            ..WeaponParams::default()
        };

        Self {
            multitrace_segments: 3,
            loadout: vec![laser_pistol, bubble_gun],
        }
    }
}

/// Player tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Armor restored on respawn
    pub max_armor: u16,
    /// Longest single knockback step
    pub knockback_step: f32,
    /// Distance within which a player picks up a gem
    pub gem_pickup_radius: f32,
    /// Where players spawn and respawn, used in turn
    pub spawn_points: Vec<Vec3>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_armor: 100,
            knockback_step: 0.25,
            gem_pickup_radius: 1.0,
            spawn_points: vec![
                Vec3::new(-10.0, -10.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
                Vec3::new(-10.0, 10.0, 0.0),
                Vec3::new(10.0, -10.0, 0.0),
            ],
        }
    }
}

impl GameConfig {
    /// Parse settings from JSON and validate them.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a JSON file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check every setting is within range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.match_settings;
        if !(m.round_duration_sec.is_finite() && m.round_duration_sec > 0.0) {
            return Err(invalid("match.round_duration_sec", format!("{} must be positive", m.round_duration_sec)));
        }
        if m.total_rounds == 0 {
            return Err(invalid("match.total_rounds", "at least one round is required".into()));
        }
        if !(m.rest_duration_sec.is_finite() && m.rest_duration_sec >= 0.0) {
            return Err(invalid("match.rest_duration_sec", format!("{} must be non-negative", m.rest_duration_sec)));
        }
        if m.respawn_penalty_percent > 100 {
            return Err(invalid("match.respawn_penalty_percent", format!("{} exceeds 100", m.respawn_penalty_percent)));
        }
        if m.countdown_tick_ms == 0 {
            return Err(invalid("match.countdown_tick_ms", "must be positive".into()));
        }
        if self.weapons.multitrace_segments == 0 {
            return Err(invalid("weapons.multitrace_segments", "at least one segment is required".into()));
        }
        if self.weapons.loadout.len() > MAX_WEAPONS_PER_COMPONENT {
            return Err(invalid(
                "weapons.loadout",
                format!("{} weapons, at most {MAX_WEAPONS_PER_COMPONENT} supported", self.weapons.loadout.len()),
            ));
        }
        for weapon in self.weapons.loadout.iter().filter(|w| w.weapon_type != WeaponType::None) {
            weapon.validate()?;
        }

        let p = &self.players;
        if p.max_armor == 0 {
            return Err(invalid("players.max_armor", "must be positive".into()));
        }
        if !(p.knockback_step.is_finite() && p.knockback_step > 0.0) {
            return Err(invalid("players.knockback_step", format!("{} must be positive", p.knockback_step)));
        }
        if !(p.gem_pickup_radius.is_finite() && p.gem_pickup_radius >= 0.0) {
            return Err(invalid("players.gem_pickup_radius", format!("{} must be non-negative", p.gem_pickup_radius)));
        }

        for table in &self.gems.spawn_tables_per_round {
            if let Some(chance) = table.gem_weights.iter().find(|c| !(c.weight.is_finite() && c.weight >= 0.0)) {
                return Err(invalid("gems.spawn_tables_per_round", format!("weight {} of {} must be non-negative", chance.weight, chance.tag)));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidValue { field, reason }
}
