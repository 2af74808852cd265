//! Gems
//!
//! Gems appear at tagged spawn points at the start of every round. Each
//! point lists the gem tags it accepts; the round's spawn table weights
//! those tags and one is picked at random. A player within the pickup radius
//! of a gem collects it and gains its score value.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::entity::NetEntityId;
use crate::core::math::Vec3;
use crate::core::rng::DeterministicRng;

/// First entity id handed to spawned gems.
pub const GEM_ID_BASE: u64 = 1 << 61;

/// A gem type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GemSpawnable {
    /// Tag naming this gem type
    pub tag: String,
    /// Prefab to spawn
    pub asset: String,
    /// Coins awarded on pickup
    pub score_value: u16,
}

/// Relative chance of a gem type within one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GemWeightChance {
    /// Gem tag
    pub tag: String,
    /// Weight
    pub weight: f32,
}

/// Gem chances for one round.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundSpawnTable {
    /// Weighted gem tags
    pub gem_weights: Vec<GemWeightChance>,
}

/// A place gems can appear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GemSpawnPoint {
    /// World position
    pub position: Vec3,
    /// Gem tags accepted here
    pub tags: BTreeSet<String>,
}

/// Gem spawning settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemSettings {
    /// Known gem types
    pub spawnables: Vec<GemSpawnable>,
    /// Spawn table per round, indexed by round number; later rounds use the last
    pub spawn_tables_per_round: Vec<RoundSpawnTable>,
    /// Spawn points
    pub spawn_points: Vec<GemSpawnPoint>,
}

impl Default for GemSettings {
    fn default() -> Self {
        let spawnable = |tag: &str, score_value| GemSpawnable {
            tag: tag.into(),
            asset: format!("prefabs/gem_{tag}.spawnable"),
            score_value,
        };
        let weight = |tag: &str, weight| GemWeightChance { tag: tag.into(), weight };
        let table = RoundSpawnTable {
            gem_weights: vec![weight("common", 8.0), weight("rare", 2.0)],
        };

        let tags: BTreeSet<String> = ["common", "rare"].into_iter().map(String::from).collect();
        let spawn_points = [(-6.0, -6.0), (6.0, -6.0), (-6.0, 6.0), (6.0, 6.0), (0.0, 0.0)]
            .into_iter()
            .map(|(x, y)| GemSpawnPoint {
                position: Vec3::new(x, y, 0.0),
                tags: tags.clone(),
            })
            .collect();

        Self {
            spawnables: vec![spawnable("common", 10), spawnable("rare", 50)],
            spawn_tables_per_round: vec![table],
            spawn_points,
        }
    }
}

/// A gem in the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gem {
    /// Entity id
    pub id: NetEntityId,
    /// Gem type tag
    pub tag: String,
    /// World position
    pub position: Vec3,
    /// Coins awarded on pickup
    pub score_value: u16,
}

/// Authority-side gem spawner.
#[derive(Clone, Debug)]
pub struct GemSpawner {
    settings: GemSettings,
    gems: BTreeMap<NetEntityId, Gem>,
    next_gem: u64,
}

impl GemSpawner {
    /// Create a spawner with no gems out.
    pub fn new(settings: GemSettings) -> Self {
        Self {
            settings,
            gems: BTreeMap::new(),
            next_gem: 0,
        }
    }

    /// Gems currently in the world.
    pub fn gems(&self) -> impl Iterator<Item = &Gem> {
        self.gems.values()
    }

    /// Number of gems in the world.
    pub fn len(&self) -> usize {
        self.gems.len()
    }

    /// Whether no gems are out.
    pub fn is_empty(&self) -> bool {
        self.gems.is_empty()
    }

    /// Replace all gems with a fresh set for `round`. Returns the number spawned.
    pub fn spawn_gems(&mut self, round: u16, rng: &mut DeterministicRng) -> usize {
        self.remove_gems();

        let points = self.settings.spawn_points.clone();
        let mut spawned = 0;
        for point in &points {
            let Some(tag) = self.choose_gem_type(&point.tags, round, rng) else {
                continue;
            };
            if self.spawn_gem(point.position, &tag).is_some() {
                spawned += 1;
            }
        }
        debug!(round, spawned, "gems spawned");
        spawned
    }

    /// Spawn one gem of type `tag`. Unknown tags spawn nothing.
    pub fn spawn_gem(&mut self, position: Vec3, tag: &str) -> Option<NetEntityId> {
        let spawnable = self.settings.spawnables.iter().rev().find(|gem| gem.tag == tag)?;
        let gem = Gem {
            id: NetEntityId::new(GEM_ID_BASE + self.next_gem),
            tag: spawnable.tag.clone(),
            position,
            score_value: spawnable.score_value,
        };
        self.next_gem += 1;

        let id = gem.id;
        self.gems.insert(id, gem);
        Some(id)
    }

    /// Spawn a gem of type `tag` worth `score_value` (armor-depletion drops).
    pub fn spawn_gem_with_value(&mut self, position: Vec3, tag: &str, score_value: u16) -> NetEntityId {
        let gem = Gem {
            id: NetEntityId::new(GEM_ID_BASE + self.next_gem),
            tag: tag.into(),
            position,
            score_value,
        };
        self.next_gem += 1;

        let id = gem.id;
        self.gems.insert(id, gem);
        id
    }

    /// Remove every gem. Returns the number removed.
    pub fn remove_gems(&mut self) -> usize {
        let removed = self.gems.len();
        self.gems.clear();
        removed
    }

    /// Pick the gem type for a spawn point accepting `tags`.
    ///
    /// Uses the table for `round` (or the last table). Falls back to the
    /// table's first tag when none of the point's tags has weight.
    pub fn choose_gem_type(&self, tags: &BTreeSet<String>, round: u16, rng: &mut DeterministicRng) -> Option<String> {
        let tables = &self.settings.spawn_tables_per_round;
        let table = tables.get(round as usize).or_else(|| tables.last())?;
        let first = table.gem_weights.first()?;

        let weights: Vec<f32> = table
            .gem_weights
            .iter()
            .map(|chance| if tags.contains(&chance.tag) { chance.weight } else { 0.0 })
            .collect();

        let chosen = rng
            .choose_weighted(&weights)
            .and_then(|index| table.gem_weights.get(index))
            .unwrap_or(first);
        Some(chosen.tag.clone())
    }

    /// Collect the first gem within `radius` of `position`.
    pub fn try_collect(&mut self, position: Vec3, radius: f32) -> Option<Gem> {
        let radius_sq = radius * radius;
        let id = self
            .gems
            .values()
            .find(|gem| gem.position.distance_squared(position) <= radius_sq)
            .map(|gem| gem.id)?;
        self.gems.remove(&id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|tag| tag.to_string()).collect()
    }

    #[test]
    fn test_spawn_replaces_previous_gems() {
        let mut spawner = GemSpawner::new(GemSettings::default());
        let mut rng = DeterministicRng::new(7);

        assert_eq!(spawner.spawn_gems(1, &mut rng), 5);
        let first: Vec<NetEntityId> = spawner.gems().map(|gem| gem.id).collect();
        assert_eq!(spawner.spawn_gems(2, &mut rng), 5);
        assert!(spawner.gems().all(|gem| !first.contains(&gem.id)));
        assert_eq!(spawner.remove_gems(), 5);
        assert!(spawner.is_empty());
    }

    #[test]
    fn test_choice_respects_point_tags() {
        let spawner = GemSpawner::new(GemSettings::default());
        let mut rng = DeterministicRng::new(11);
        for _ in 0..50 {
            assert_eq!(spawner.choose_gem_type(&tags(&["rare"]), 1, &mut rng).as_deref(), Some("rare"));
        }
        // No acceptable tag: the table's first entry
        assert_eq!(spawner.choose_gem_type(&tags(&["gold"]), 1, &mut rng).as_deref(), Some("common"));
    }

    #[test]
    fn test_later_rounds_use_last_table() {
        let mut settings = GemSettings::default();
        settings.spawn_tables_per_round.push(RoundSpawnTable {
            gem_weights: vec![GemWeightChance { tag: "rare".into(), weight: 1.0 }],
        });
        let spawner = GemSpawner::new(settings);
        let mut rng = DeterministicRng::new(3);
        assert_eq!(spawner.choose_gem_type(&tags(&["common", "rare"]), 9, &mut rng).as_deref(), Some("rare"));
    }

    #[test]
    fn test_collect_within_radius() {
        let mut spawner = GemSpawner::new(GemSettings::default());
        let id = spawner.spawn_gem(Vec3::new(2.0, 0.0, 0.0), "rare").unwrap();
        assert!(spawner.spawn_gem(Vec3::ZERO, "unknown").is_none());

        assert!(spawner.try_collect(Vec3::ZERO, 1.0).is_none());
        let gem = spawner.try_collect(Vec3::new(1.5, 0.0, 0.0), 1.0).unwrap();
        assert_eq!(gem.id, id);
        assert_eq!(gem.score_value, 50);
        assert!(spawner.is_empty());
    }

    #[test]
    fn test_dropped_gem_value() {
        let mut spawner = GemSpawner::new(GemSettings::default());
        spawner.spawn_gem_with_value(Vec3::ZERO, "common", 17);
        assert_eq!(spawner.try_collect(Vec3::ZERO, 0.5).map(|gem| gem.score_value), Some(17));
    }
}
