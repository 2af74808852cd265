//! Arena Session
//!
//! One authoritative arena: players and their weapons, projectiles, gems,
//! the match controller and the game state machine, all driven from a single
//! host tick.
//!
//! ## Tick order
//!
//! 1. Record dynamic body poses for the new host frame
//! 2. Run due timers (round, rest and state countdowns)
//! 3. Fire weapons from this tick's input, then advance projectiles
//! 4. Apply hits and gem pickups
//! 5. Deliver change notifications: host observers first, then the
//!    read-only match view, then the game state machine

use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GameConfig, PlayerSettings};
use crate::core::entity::{HostFrameId, NetEntityId};
use crate::core::math::{Transform, Vec3};
use crate::core::rng::DeterministicRng;
use crate::error::{ConfigError, WeaponConfigError};
use crate::game::effects::{EffectSink, RecordingEffects, SoundEffect};
use crate::game::events::GameEvent;
use crate::game::game_state::{GameStateContext, GameStateId, GameStateMachine};
use crate::game::gems::GemSpawner;
use crate::game::match_controller::{ArenaTimer, ArenaWorld, MatchContext, MatchController, PlayerSnapshot};
use crate::game::match_view::{AllowedPlayerActions, MatchView};
use crate::game::player::{ArenaPlayer, PlayerResetOptions};
use crate::runtime::bus::{NotificationBus, NotificationOrder, SubscriptionId};
use crate::runtime::timer::Scheduler;
use crate::weapons::base::{ActivationFlags, WeaponContext, WeaponEventLog};
use crate::weapons::controller::{WeaponInput, WeaponsController};
use crate::weapons::gather::{GatherContext, NetEntityIdSet, NetworkTime};
use crate::weapons::projectile::ProjectileSet;
use crate::weapons::types::{WeaponHitInfo, WeaponType};
use crate::weapons::world::{SimpleWorld, POSE_HISTORY_FRAMES};

/// Map name mixed into the session seed.
pub const ARENA_MAP_NAME: &str = "arena";

/// Collision radius of a player body.
pub const PLAYER_RADIUS: f32 = 0.5;

// =============================================================================
// ENTITIES
// =============================================================================

/// Entity-side change that the match layer must hear about.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityChange {
    /// Collected coins changed
    Coins {
        /// Player entity
        player_id: NetEntityId,
        /// New total
        coins: u16,
    },
    /// Armor changed
    Armor {
        /// Player entity
        player_id: NetEntityId,
        /// New armor
        armor: u16,
    },
    /// Armor reached zero
    Depleted(NetEntityId),
    /// Player moved to a spawn point
    Respawned {
        /// Player entity
        player_id: NetEntityId,
        /// Spawn position
        position: Vec3,
    },
    /// Gem picked up
    GemCollected {
        /// Collector
        player_id: NetEntityId,
        /// Gem entity
        gem_id: NetEntityId,
        /// Coins awarded
        value: u16,
    },
}

/// Players, physics bodies and gems of one arena.
#[derive(Debug)]
pub struct ArenaEntities {
    settings: PlayerSettings,
    physics: SimpleWorld,
    players: BTreeMap<NetEntityId, ArenaPlayer>,
    next_spawn_point: usize,
    gems: GemSpawner,
    gem_rng: DeterministicRng,
    cues: RecordingEffects,
    changes: Vec<EntityChange>,
}

impl ArenaEntities {
    fn new(settings: PlayerSettings, gems: GemSpawner, gem_rng: DeterministicRng) -> Self {
        Self {
            settings,
            physics: SimpleWorld::new(),
            players: BTreeMap::new(),
            next_spawn_point: 0,
            gems,
            gem_rng,
            cues: RecordingEffects::default(),
            changes: Vec::new(),
        }
    }

    /// Physics backend.
    pub fn physics(&self) -> &SimpleWorld {
        &self.physics
    }

    /// Gems in the world.
    pub fn gems(&self) -> &GemSpawner {
        &self.gems
    }

    /// A player entity.
    pub fn player(&self, player_id: NetEntityId) -> Option<&ArenaPlayer> {
        self.players.get(&player_id)
    }

    /// Every player entity, by id.
    pub fn players(&self) -> impl Iterator<Item = &ArenaPlayer> {
        self.players.values()
    }

    /// Next spawn point in turn, or the origin when none are configured.
    fn next_spawn_position(&mut self) -> Vec3 {
        let points = &self.settings.spawn_points;
        if points.is_empty() {
            warn!("no spawn points configured, using the world origin");
            return Vec3::ZERO;
        }
        let position = points[self.next_spawn_point % points.len()];
        self.next_spawn_point = (self.next_spawn_point + 1) % points.len();
        position
    }

    fn spawn_player(&mut self, player_id: NetEntityId) -> Vec3 {
        let position = self.next_spawn_position();
        self.players
            .insert(player_id, ArenaPlayer::new(player_id, "", position, self.settings.max_armor));
        self.physics.add_dynamic_sphere(player_id, position, PLAYER_RADIUS);
        position
    }

    fn despawn_player(&mut self, player_id: NetEntityId) -> bool {
        self.physics.remove_body(player_id);
        self.players.remove(&player_id).is_some()
    }

    fn move_player(&mut self, player_id: NetEntityId, position: Vec3) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        player.set_position(position);
        self.physics.set_position(player_id, position);
        true
    }

    fn knockback(&mut self, player_id: NetEntityId, offset: Vec3) -> Option<u32> {
        let player = self.players.get_mut(&player_id)?;
        let steps = player.knockback(offset, self.settings.knockback_step);
        self.physics.set_position(player_id, player.position());
        Some(steps)
    }

    /// Apply a hit batch as damage to every player it touched.
    fn apply_hit(&mut self, info: &WeaponHitInfo) {
        let shooter = info.hit_event.shooter_id;
        for hit in &info.hit_event.hit_entities {
            let target = hit.hit_net_entity_id;
            if target == shooter {
                continue;
            }
            let Some(player) = self.players.get_mut(&target) else {
                continue;
            };

            let distance = (hit.hit_position - info.gather_origin).length();
            let amount = info.damage_effect.magnitude_at(distance);
            let change = player.apply_damage(amount, &mut self.cues);
            debug!(shooter = %shooter, target = %target, amount, armor = change.current, "hit");

            if change.changed() {
                self.changes.push(EntityChange::Armor {
                    player_id: target,
                    armor: change.current,
                });
            }
            if change.depleted() {
                self.cues.on_positional_effect(SoundEffect::ShutDown, player.position());
                self.changes.push(EntityChange::Depleted(target));
            }
        }
    }

    /// Players pick up every gem within reach.
    fn collect_gems(&mut self) {
        let radius = self.settings.gem_pickup_radius;
        for player in self.players.values_mut() {
            while let Some(gem) = self.gems.try_collect(player.position(), radius) {
                let coins = player.add_coins(gem.score_value);
                self.cues.on_positional_effect(SoundEffect::GemPickup, gem.position);
                self.changes.push(EntityChange::GemCollected {
                    player_id: player.id(),
                    gem_id: gem.id,
                    value: gem.score_value,
                });
                self.changes.push(EntityChange::Coins {
                    player_id: player.id(),
                    coins,
                });
            }
        }
    }
}

impl ArenaWorld for ArenaEntities {
    fn player_snapshot(&self, player_id: NetEntityId) -> Option<PlayerSnapshot> {
        self.players.get(&player_id).map(|player| PlayerSnapshot {
            name: player.name().to_string(),
            armor: player.armor(),
            position: player.position(),
        })
    }

    fn assign_player_name(&mut self, player_id: NetEntityId, name: &str) -> bool {
        match self.players.get_mut(&player_id) {
            Some(player) => {
                player.set_name(name);
                true
            }
            None => false,
        }
    }

    fn respawn_player(&mut self, player_id: NetEntityId, options: PlayerResetOptions) -> bool {
        if !self.players.contains_key(&player_id) {
            warn!(player = %player_id, "attempted respawn of an unknown player");
            return false;
        }
        let position = self.next_spawn_position();
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };

        let armor_before = player.armor();
        let deducted = player.reset(options, &mut self.cues);
        player.set_position(position);
        self.physics.set_position(player_id, position);

        if player.armor() != armor_before {
            self.changes.push(EntityChange::Armor {
                player_id,
                armor: player.armor(),
            });
        }
        if deducted > 0 {
            self.changes.push(EntityChange::Coins {
                player_id,
                coins: player.coins(),
            });
        }
        self.changes.push(EntityChange::Respawned { player_id, position });
        true
    }

    fn spawn_gems(&mut self, round: u16) {
        self.gems.spawn_gems(round, &mut self.gem_rng);
    }

    fn remove_gems(&mut self) {
        self.gems.remove_gems();
    }

    fn drop_gem(&mut self, position: Vec3, tag: &str, value: Option<u16>) {
        match value {
            Some(value) => {
                self.gems.spawn_gem_with_value(position, tag, value);
            }
            None => {
                if self.gems.spawn_gem(position, tag).is_none() {
                    debug!(tag, "unknown gem tag, nothing dropped");
                }
            }
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Input waiting for the next tick.
#[derive(Clone, Debug, Default)]
struct PendingInput {
    input: WeaponInput,
    client_frame: Option<HostFrameId>,
    reported_hits: NetEntityIdSet,
}

/// Network time to gather a player's shots at.
///
/// Input from an earlier frame rewinds to it, clamped to the oldest recorded
/// pose. Unstamped or future frames gather live.
fn gather_time(current: HostFrameId, client_frame: Option<HostFrameId>) -> NetworkTime {
    let Some(frame) = client_frame else {
        return NetworkTime::live(current);
    };
    let age = current.0.wrapping_sub(frame.0);
    if age == 0 || age > u32::MAX / 2 {
        return NetworkTime::live(current);
    }
    let oldest = POSE_HISTORY_FRAMES as u32 - 1;
    if age > oldest {
        debug!(client_frame = frame.0, current = current.0, "client frame older than pose history");
        return NetworkTime::rewound_to(HostFrameId(current.0.wrapping_sub(oldest)));
    }
    NetworkTime::rewound_to(frame)
}

/// An authoritative arena session.
pub struct ArenaSession {
    session_id: Uuid,
    config: GameConfig,
    frame: HostFrameId,
    entities: ArenaEntities,
    weapons: BTreeMap<NetEntityId, WeaponsController>,
    pending_inputs: BTreeMap<NetEntityId, PendingInput>,
    projectiles: ProjectileSet,
    controller: MatchController,
    game_state: GameStateMachine,
    view: MatchView,
    timers: Scheduler<ArenaTimer>,
    bus: NotificationBus<GameEvent>,
    effects: Box<dyn EffectSink>,
}

impl std::fmt::Debug for ArenaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaSession")
            .field("session_id", &self.session_id)
            .field("frame", &self.frame)
            .field("state", &self.game_state.state())
            .field("players", &self.entities.players.len())
            .field("projectiles", &self.projectiles.len())
            .finish()
    }
}

impl ArenaSession {
    /// New session with a random id.
    pub fn new(config: GameConfig, effects: Box<dyn EffectSink>) -> Result<Self, ConfigError> {
        Self::with_session_id(config, Uuid::new_v4(), effects)
    }

    /// New session with a fixed id. The id seeds every random choice.
    pub fn with_session_id(config: GameConfig, session_id: Uuid, effects: Box<dyn EffectSink>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = DeterministicRng::for_session(session_id.as_bytes(), ARENA_MAP_NAME);
        let controller_rng = DeterministicRng::new(rng.next_u64());
        let gem_rng = DeterministicRng::new(rng.next_u64());

        let entities = ArenaEntities::new(
            config.players.clone(),
            GemSpawner::new(config.gems.clone()),
            gem_rng,
        );
        let controller = MatchController::new(config.match_settings.clone(), controller_rng);
        let view = MatchView::new(config.match_settings.total_rounds, config.match_settings.round_duration_sec);

        info!(session = %session_id, rounds = config.match_settings.total_rounds, "arena session created");
        Ok(Self {
            session_id,
            game_state: GameStateMachine::new(config.game_state.clone()),
            config,
            frame: HostFrameId::default(),
            entities,
            weapons: BTreeMap::new(),
            pending_inputs: BTreeMap::new(),
            projectiles: ProjectileSet::new(),
            controller,
            view,
            timers: Scheduler::new(),
            bus: NotificationBus::new(),
            effects,
        })
    }

    // ----- Accessors -----

    /// Session id.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Settings in use.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current host frame.
    pub fn frame(&self) -> HostFrameId {
        self.frame
    }

    /// Host time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    /// Current game state.
    pub fn state(&self) -> GameStateId {
        self.game_state.state()
    }

    /// Authoritative match data.
    pub fn controller(&self) -> &MatchController {
        &self.controller
    }

    /// Replicated view of the match.
    pub fn view(&self) -> &MatchView {
        &self.view
    }

    /// Players, bodies and gems.
    pub fn entities(&self) -> &ArenaEntities {
        &self.entities
    }

    /// Projectiles in flight.
    pub fn projectiles(&self) -> &ProjectileSet {
        &self.projectiles
    }

    /// Weapons of a player.
    pub fn weapons(&self, player_id: NetEntityId) -> Option<&WeaponsController> {
        self.weapons.get(&player_id)
    }

    /// Observe every change notification. Observers run before the game
    /// state machine.
    pub fn subscribe<F>(&mut self, order: NotificationOrder, callback: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        self.bus.subscribe(order, callback)
    }

    /// Stop observing.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ----- Player lifecycle -----

    /// Spawn a player entity with the configured loadout.
    pub fn add_player(&mut self, player_id: NetEntityId) -> Result<(), WeaponConfigError> {
        let weapons = WeaponsController::new(player_id, &self.config.weapons.loadout)?;
        self.weapons.insert(player_id, weapons);
        let position = self.entities.spawn_player(player_id);
        debug!(player = %player_id, ?position, "player spawned");

        let mut cx = MatchContext {
            timers: &mut self.timers,
            world: &mut self.entities,
        };
        self.controller.on_player_activated(&mut cx, player_id);
        self.controller.on_player_collector_activated(player_id);
        self.pump_events();
        Ok(())
    }

    /// Remove a player entity.
    pub fn remove_player(&mut self, player_id: NetEntityId) {
        self.weapons.remove(&player_id);
        self.pending_inputs.remove(&player_id);
        self.entities.despawn_player(player_id);

        let now = self.timers.now_ms();
        self.controller.on_player_collector_deactivated(player_id);
        self.controller.on_player_deactivated(now, player_id);
        self.pump_events();
    }

    /// Weapon input for the next tick, gathered against live poses.
    /// Replaces earlier input for the tick.
    pub fn submit_input(&mut self, player_id: NetEntityId, input: WeaponInput) {
        self.pending_inputs.insert(player_id, PendingInput { input, ..Default::default() });
    }

    /// Weapon input a client produced at `client_frame`.
    ///
    /// Shots are gathered against the poses recorded for that frame, so a
    /// target the client saw is hit even if it has moved since. A non-empty
    /// `reported_hits` limits the confirmed hits to what the client saw.
    pub fn submit_input_at(
        &mut self,
        player_id: NetEntityId,
        input: WeaponInput,
        client_frame: HostFrameId,
        reported_hits: NetEntityIdSet,
    ) {
        self.pending_inputs.insert(
            player_id,
            PendingInput {
                input,
                client_frame: Some(client_frame),
                reported_hits,
            },
        );
    }

    /// Move a player (movement is simulated elsewhere).
    pub fn move_player(&mut self, player_id: NetEntityId, position: Vec3) -> bool {
        self.entities.move_player(player_id, position)
    }

    /// Push a player by `offset` in bounded steps.
    pub fn knockback(&mut self, player_id: NetEntityId, offset: Vec3) -> Option<u32> {
        self.entities.knockback(player_id, offset)
    }

    // ----- Tick -----

    /// Advance the session by `delta_ms`.
    pub fn tick(&mut self, delta_ms: u64) {
        self.frame = self.frame.next();
        self.entities.physics.record_frame(self.frame);

        self.run_timers(delta_ms);
        self.simulate_weapons(delta_ms as f32 * 0.001);
        self.entities.collect_gems();
        self.pump_events();
    }

    /// Stop the match loop. No timer fires afterwards.
    pub fn shutdown(&mut self) {
        let mut cx = GameStateContext {
            controller: &mut self.controller,
            timers: &mut self.timers,
            world: &mut self.entities,
            effects: &mut *self.effects,
        };
        self.game_state.shutdown(&mut cx);
        self.pump_events();
        info!(session = %self.session_id, "arena session shut down");
    }

    fn run_timers(&mut self, delta_ms: u64) {
        self.timers.advance(delta_ms);
        while let Some(fired) = self.timers.next_due() {
            let mut mcx = MatchContext {
                timers: &mut self.timers,
                world: &mut self.entities,
            };
            self.controller.handle_timer(&mut mcx, fired.key);

            let mut cx = GameStateContext {
                controller: &mut self.controller,
                timers: &mut self.timers,
                world: &mut self.entities,
                effects: &mut *self.effects,
            };
            self.game_state.handle_timer(&mut cx, fired.key);
            self.pump_events();
        }
    }

    fn simulate_weapons(&mut self, delta_time: f32) {
        let now = self.timers.now_ms();
        let actions = self.view.player_actions_allowed(now);
        let mut log = WeaponEventLog::default();

        let segments = self.config.weapons.multitrace_segments;
        for (player_id, weapons) in self.weapons.iter_mut() {
            let Some(player) = self.entities.players.get(player_id) else {
                continue;
            };
            let PendingInput { mut input, client_frame, reported_hits } =
                self.pending_inputs.remove(player_id).unwrap_or_default();
            if actions != AllowedPlayerActions::All && input.any_firing() {
                debug!(player = %player_id, ?actions, "fire input ignored");
                input.firing = Default::default();
            }

            let time = gather_time(self.frame, client_frame);
            let mut cx = WeaponContext {
                gather: GatherContext::new(&self.entities.physics, time, segments),
                listener: &mut log,
            };
            let muzzle = Transform::from_translation(player.position());
            if reported_hits.is_empty() {
                weapons.process_input(&mut cx, &muzzle, &input, delta_time, ActivationFlags::FRESH);
            } else {
                weapons.set_client_hit_filter(&reported_hits);
                weapons.process_input(&mut cx, &muzzle, &input, delta_time, ActivationFlags::FRESH);
                weapons.set_client_hit_filter(&NetEntityIdSet::new());
            }
        }

        let gather = GatherContext::new(&self.entities.physics, NetworkTime::live(self.frame), segments);
        for (id, status) in self.projectiles.tick(&gather, &mut log, delta_time) {
            debug!(projectile = %id, ?status, "projectile finished");
        }

        self.apply_weapon_events(log);
    }

    fn apply_weapon_events(&mut self, log: WeaponEventLog) {
        for info in &log.activations {
            let event = &info.activate_event;
            let weapon_type = self
                .weapons
                .get(&event.shooter_id)
                .and_then(|weapons| weapons.weapon(info.weapon_index))
                .map(|weapon| weapon.params().weapon_type);
            let cue = match weapon_type {
                Some(WeaponType::Projectile) => SoundEffect::BubbleGunMuzzleFlash,
                _ => SoundEffect::LaserPistolMuzzleFlash,
            };
            self.effects.on_positional_effect(cue, event.initial_transform.translation);
        }

        for launch in log.launches {
            self.effects
                .on_positional_effect(SoundEffect::BubbleGunProjectile, launch.initial_transform.translation);
            self.projectiles.spawn(launch, false);
        }

        for info in log.predicted_hits.iter().chain(&log.confirmed_hits) {
            if info.hit_event.hit_entities.is_empty() {
                continue;
            }
            let cue = if info.hit_event.projectile_id.is_valid() {
                SoundEffect::BubbleGunImpact
            } else {
                SoundEffect::LaserPistolImpact
            };
            self.effects.on_positional_effect(cue, info.hit_event.hit_transform.translation);
            self.entities.apply_hit(info);
        }
    }

    // ----- Notifications -----

    fn flush_entity_changes(&mut self) {
        let now = self.timers.now_ms();
        for change in std::mem::take(&mut self.entities.changes) {
            match change {
                EntityChange::Coins { player_id, coins } => {
                    self.controller.on_player_collected_coin_count_changed(now, player_id, coins);
                }
                EntityChange::Armor { player_id, armor } => {
                    self.controller.push_event(GameEvent::armor_changed(now, player_id, armor));
                }
                EntityChange::Depleted(player_id) => {
                    let mut cx = MatchContext {
                        timers: &mut self.timers,
                        world: &mut self.entities,
                    };
                    self.controller.on_player_armor_zero(&mut cx, player_id);
                }
                EntityChange::Respawned { player_id, position } => {
                    self.controller.push_event(GameEvent::player_respawned(now, player_id, position));
                }
                EntityChange::GemCollected { player_id, gem_id, value } => {
                    self.controller.push_event(GameEvent::gem_collected(now, player_id, gem_id, value));
                }
            }
        }

        for cue in self.entities.cues.played.drain(..) {
            match cue.position {
                Some(position) => self.effects.on_positional_effect(cue.effect, position),
                None => self.effects.on_effect(cue.effect),
            }
        }
    }

    /// Deliver queued notifications until the match layer settles.
    fn pump_events(&mut self) {
        loop {
            self.flush_entity_changes();
            let mut events = self.controller.take_events();
            if events.is_empty() {
                break;
            }
            events.sort();

            for event in &events {
                self.bus.publish(event);
                self.view.apply(event, &mut *self.effects);

                let mut cx = GameStateContext {
                    controller: &mut self.controller,
                    timers: &mut self.timers,
                    world: &mut self.entities,
                    effects: &mut *self.effects,
                };
                self.game_state.on_event(&mut cx, event);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchSettings;
    use crate::game::events::GameEventData;
    use crate::game::gems::GemSpawnPoint;
    use crate::runtime::bus::DEFAULT_NOTIFICATION_ORDER;
    use crate::weapons::types::WeaponIndex;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedEffects(Rc<RefCell<RecordingEffects>>);

    impl EffectSink for SharedEffects {
        fn on_effect(&mut self, effect: SoundEffect) {
            self.0.borrow_mut().on_effect(effect);
        }

        fn on_positional_effect(&mut self, effect: SoundEffect, position: Vec3) {
            self.0.borrow_mut().on_positional_effect(effect, position);
        }
    }

    fn config() -> GameConfig {
        let mut config = GameConfig {
            match_settings: MatchSettings {
                round_duration_sec: 5.0,
                rest_duration_sec: 0.0,
                total_rounds: 2,
                ..MatchSettings::default()
            },
            ..GameConfig::default()
        };
        config.players.spawn_points = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 10.0, 0.0)];
        config.gems.spawn_points = vec![GemSpawnPoint {
            position: Vec3::new(50.0, 50.0, 0.0),
            tags: ["common".to_string()].into_iter().collect(),
        }];
        // Flat bubbles so point-blank shots stay on the aim line
        config.weapons.loadout[1].gather_params.bullet_drop = false;
        config
    }

    fn session() -> (ArenaSession, SharedEffects) {
        let effects = SharedEffects::default();
        let session = ArenaSession::with_session_id(config(), Uuid::from_u128(7), Box::new(effects.clone())).unwrap();
        (session, effects)
    }

    fn run(session: &mut ArenaSession, ms: u64) {
        for _ in 0..ms / 100 {
            session.tick(100);
        }
    }

    #[test]
    fn test_first_player_starts_match() {
        let (mut session, effects) = session();
        session.add_player(NetEntityId::new(1)).unwrap();
        assert_eq!(session.state(), GameStateId::PreparingMatch);
        assert_eq!(effects.0.borrow().count(SoundEffect::CountDown), 1);

        run(&mut session, 3000);
        assert_eq!(session.state(), GameStateId::MatchInProgress);
        assert_eq!(session.controller().round_number(), 1);
        assert_eq!(session.entities().gems().len(), 1);
        assert_eq!(session.view().round_number(), 1);
    }

    #[test]
    fn test_trace_hit_damages_target() {
        let (mut session, effects) = session();
        let (shooter, target) = (NetEntityId::new(1), NetEntityId::new(2));
        session.add_player(shooter).unwrap();
        session.add_player(target).unwrap();
        run(&mut session, 3000);

        session.submit_input(shooter, WeaponInput::fire(WeaponIndex::PRIMARY, Vec3::new(10.0, 0.0, 0.0)));
        session.tick(100);

        assert_eq!(session.entities().player(target).map(|p| p.armor()), Some(80));
        assert_eq!(session.entities().player(shooter).map(|p| p.armor()), Some(100));
        let effects = effects.0.borrow();
        assert_eq!(effects.count(SoundEffect::LaserPistolMuzzleFlash), 1);
        assert_eq!(effects.count(SoundEffect::LaserPistolImpact), 1);
        assert_eq!(effects.count(SoundEffect::PlayerOuch), 1);
    }

    #[test]
    fn test_stamped_input_hits_where_client_saw_target() {
        let (mut session, _effects) = session();
        let (shooter, target) = (NetEntityId::new(1), NetEntityId::new(2));
        session.add_player(shooter).unwrap();
        session.add_player(target).unwrap();
        run(&mut session, 3000);

        // The client fires at the pose of `seen`; the target has since moved
        let seen = session.frame();
        let aim = Vec3::new(10.0, 0.0, 0.0);
        session.move_player(target, Vec3::new(10.0, 5.0, 0.0));
        session.tick(100);

        session.submit_input_at(shooter, WeaponInput::fire(WeaponIndex::PRIMARY, aim), seen, NetEntityIdSet::new());
        session.tick(100);
        assert_eq!(session.entities().player(target).map(|p| p.armor()), Some(80));

        // The same shot gathered live misses
        run(&mut session, 300);
        session.submit_input(shooter, WeaponInput::fire(WeaponIndex::PRIMARY, aim));
        session.tick(100);
        assert_eq!(session.entities().player(target).map(|p| p.armor()), Some(80));
    }

    #[test]
    fn test_stamped_input_confirms_only_reported_hits() {
        let (mut session, _effects) = session();
        let (shooter, target) = (NetEntityId::new(1), NetEntityId::new(2));
        session.add_player(shooter).unwrap();
        session.add_player(target).unwrap();
        run(&mut session, 3000);

        let aim = Vec3::new(10.0, 0.0, 0.0);
        let frame = session.frame();
        let elsewhere: NetEntityIdSet = [NetEntityId::new(3)].into_iter().collect();
        session.submit_input_at(shooter, WeaponInput::fire(WeaponIndex::PRIMARY, aim), frame, elsewhere);
        session.tick(100);
        assert_eq!(session.entities().player(target).map(|p| p.armor()), Some(100));

        // The restriction lasts one input
        run(&mut session, 300);
        session.submit_input(shooter, WeaponInput::fire(WeaponIndex::PRIMARY, aim));
        session.tick(100);
        assert_eq!(session.entities().player(target).map(|p| p.armor()), Some(80));
    }

    #[test]
    fn test_gather_time_rewinds_within_history() {
        let now = HostFrameId(200);
        assert_eq!(gather_time(now, None), NetworkTime::live(now));
        assert_eq!(gather_time(now, Some(now)), NetworkTime::live(now));
        assert_eq!(gather_time(now, Some(HostFrameId(201))), NetworkTime::live(now));
        assert_eq!(gather_time(now, Some(HostFrameId(190))), NetworkTime::rewound_to(HostFrameId(190)));

        let oldest = HostFrameId(200 - (POSE_HISTORY_FRAMES as u32 - 1));
        assert_eq!(gather_time(now, Some(HostFrameId(3))), NetworkTime::rewound_to(oldest));
        assert_eq!(
            gather_time(HostFrameId(2), Some(HostFrameId(u32::MAX))),
            NetworkTime::rewound_to(HostFrameId(u32::MAX))
        );
    }

    #[test]
    fn test_fire_ignored_before_match_start() {
        let (mut session, _effects) = session();
        let (shooter, target) = (NetEntityId::new(1), NetEntityId::new(2));
        session.add_player(shooter).unwrap();
        session.add_player(target).unwrap();

        session.submit_input(shooter, WeaponInput::fire(WeaponIndex::PRIMARY, Vec3::new(10.0, 0.0, 0.0)));
        session.tick(100);
        assert_eq!(session.entities().player(target).map(|p| p.armor()), Some(100));
    }

    #[test]
    fn test_projectile_flies_then_hits() {
        let (mut session, _effects) = session();
        let (shooter, target) = (NetEntityId::new(1), NetEntityId::new(2));
        session.add_player(shooter).unwrap();
        session.add_player(target).unwrap();
        run(&mut session, 3000);

        session.submit_input(shooter, WeaponInput::fire(WeaponIndex::SECONDARY, Vec3::new(10.0, 0.0, 0.0)));
        session.tick(100);
        assert_eq!(session.projectiles().len(), 1);

        // 20 m/s covers the 9.5 m gap in under half a second
        run(&mut session, 500);
        assert!(session.projectiles().is_empty());
        let armor = session.entities().player(target).map(|p| p.armor()).unwrap();
        assert!(armor < 100, "armor {armor}");
    }

    #[test]
    fn test_gem_pickup_awards_coins() {
        let (mut session, _effects) = session();
        let player = NetEntityId::new(1);
        session.add_player(player).unwrap();
        run(&mut session, 3000);

        session.move_player(player, Vec3::new(50.0, 50.5, 0.0));
        session.tick(100);

        assert_eq!(session.entities().player(player).map(|p| p.coins()), Some(10));
        assert_eq!(session.controller().coins().coins_of(player), Some(10));
        assert!(session.entities().gems().is_empty());
    }

    #[test]
    fn test_match_ends_once_and_observers_see_results() {
        let (mut session, _effects) = session();
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = results.clone();
        session.subscribe(DEFAULT_NOTIFICATION_ORDER, move |event: &GameEvent| {
            if let GameEventData::MatchResults(summary) = &event.data {
                sink.borrow_mut().push(summary.clone());
            }
        });

        session.add_player(NetEntityId::new(1)).unwrap();
        run(&mut session, 3000);
        run(&mut session, 10_000);

        assert_eq!(session.state(), GameStateId::MatchEnded);
        assert_eq!(results.borrow().len(), 1);
        assert_eq!(session.view().last_results(), results.borrow().first());

        run(&mut session, 3000);
        assert_eq!(session.state(), GameStateId::PreparingMatch);
        assert_eq!(results.borrow().len(), 1);
    }

    #[test]
    fn test_depleted_armor_respawns_and_drops_gem() {
        let (mut session, _effects) = session();
        let (shooter, target) = (NetEntityId::new(1), NetEntityId::new(2));
        session.add_player(shooter).unwrap();
        session.add_player(target).unwrap();
        run(&mut session, 3000);
        let gems_before = session.entities().gems().len();

        // Five laser hits of 20, spaced past the 250 ms cooldown
        for _ in 0..5 {
            let aim = session.entities().player(target).map(|p| p.position()).unwrap();
            session.submit_input(shooter, WeaponInput::fire(WeaponIndex::PRIMARY, aim));
            run(&mut session, 400);
        }

        let target_state = session.entities().player(target).unwrap();
        assert_eq!(target_state.armor(), 100);
        assert_eq!(session.entities().gems().len(), gems_before + 1);
    }

    #[test]
    fn test_shutdown_stops_timers() {
        let (mut session, _effects) = session();
        session.add_player(NetEntityId::new(1)).unwrap();
        session.shutdown();
        run(&mut session, 10_000);
        assert_eq!(session.state(), GameStateId::PreparingMatch);
        assert_eq!(session.controller().round_number(), 0);
    }

    #[test]
    fn test_remove_player_frees_slot() {
        let (mut session, _effects) = session();
        let player = NetEntityId::new(4);
        session.add_player(player).unwrap();
        assert!(session.controller().coins().coins_of(player).is_some());

        session.remove_player(player);
        assert_eq!(session.controller().player_count(), 0);
        assert!(session.controller().coins().coins_of(player).is_none());
        assert!(session.entities().player(player).is_none());
    }
}
