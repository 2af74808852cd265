//! Match Controller
//!
//! Authority-only round data model: round number, round and rest countdowns,
//! the player roster and end-of-match results.
//!
//! The controller never drives the game state machine. Every change it makes
//! lands in its event outbox; the state machine (and anything else that
//! cares) observes `RoundNumberChanged` and `CoinsChanged` and decides when
//! the match is over.
//!
//! ## Round flow
//!
//! ```text
//! start_match ─► round 1 ─(round tick × N)─► end_round
//!                   ▲                          │
//!                   │      rest tick × M       ▼
//!               start_round ◄──────────── rest period
//!
//! final end_round ─► round_number = total + 1 ─► (observer) ─► end_match
//! ```

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::config::MatchSettings;
use crate::core::entity::NetEntityId;
use crate::core::hash::{StateDigest, StateHasher};
use crate::core::math::Vec3;
use crate::core::rng::DeterministicRng;
use crate::error::EncodeError;
use crate::game::coins::MatchPlayerCoins;
use crate::game::events::GameEvent;
use crate::game::player::{coin_penalty_deduction, PlayerResetOptions};
use crate::runtime::timer::{Scheduler, TimerHandle};

/// Winner name reported when nobody took part.
pub const NO_PLAYERS_WINNER: &str = "No players in the match";

/// Name prefixes handed to joining players.
pub const PLAYER_NAME_PREFIXES: [&str; 8] = [
    "Brave", "Swift", "Quiet", "Lucky", "Rusty", "Shiny", "Grumpy", "Sneaky",
];

/// Name postfixes handed to joining players.
pub const PLAYER_NAME_POSTFIXES: [&str; 8] = [
    "Otter", "Falcon", "Badger", "Comet", "Golem", "Wombat", "Rocket", "Lynx",
];

// =============================================================================
// TIMERS AND WORLD ACCESS
// =============================================================================

/// Scheduler keys used by the match layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArenaTimer {
    /// Round countdown tick
    RoundTick,
    /// Rest countdown tick
    RestTick,
    /// Preparing-match countdown finished
    PreparingMatch,
    /// Match-ended rest finished
    MatchEnded,
}

/// What the controller needs to know about a player entity.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSnapshot {
    /// Display name
    pub name: String,
    /// Remaining armor
    pub armor: u16,
    /// World position
    pub position: Vec3,
}

/// Entity access the controller is given by its host.
pub trait ArenaWorld {
    /// Current state of a player entity, `None` if it no longer exists.
    fn player_snapshot(&self, player_id: NetEntityId) -> Option<PlayerSnapshot>;

    /// Give a player its display name. Returns false if the entity is gone.
    fn assign_player_name(&mut self, player_id: NetEntityId, name: &str) -> bool;

    /// Reset a player and move it to the next spawn point.
    fn respawn_player(&mut self, player_id: NetEntityId, options: PlayerResetOptions) -> bool;

    /// Spawn the gems for `round`.
    fn spawn_gems(&mut self, round: u16);

    /// Remove every gem.
    fn remove_gems(&mut self);

    /// Drop one gem of type `tag`, optionally overriding its value.
    fn drop_gem(&mut self, position: Vec3, tag: &str, value: Option<u16>);
}

/// Collaborators for one controller call.
pub struct MatchContext<'a> {
    /// Session timers
    pub timers: &'a mut Scheduler<ArenaTimer>,
    /// Player and gem entities
    pub world: &'a mut dyn ArenaWorld,
}

// =============================================================================
// RESULTS
// =============================================================================

/// One row of the results table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    /// Display name
    pub name: String,
    /// Coins at the end of the match
    pub score: u16,
    /// Armor at the end of the match
    pub remaining_armor: u16,
}

/// Results broadcast once at the end of a match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResultsSummary {
    /// Winner's display name
    pub winning_player_name: String,
    /// Players sorted by score, then armor
    pub player_states: Vec<PlayerResult>,
}

impl MatchResultsSummary {
    /// Encode for broadcast.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a broadcast payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, EncodeError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Digest of the results, for logs.
    pub fn fingerprint(&self) -> StateDigest {
        let mut hasher = StateHasher::for_match_results();
        hasher.update_str(&self.winning_player_name);
        hasher.update_u32(self.player_states.len() as u32);
        for player in &self.player_states {
            hasher.update_str(&player.name);
            hasher.update_u16(player.score);
            hasher.update_u16(player.remaining_armor);
        }
        hasher.finalize()
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Authoritative round timing, roster and results.
#[derive(Debug)]
pub struct MatchController {
    settings: MatchSettings,
    round_number: u16,
    round_time: f32,
    rest_time: f32,
    match_start_host_time_ms: u64,
    players: Vec<NetEntityId>,
    coins: MatchPlayerCoins,
    round_tick: Option<TimerHandle>,
    rest_tick: Option<TimerHandle>,
    match_ended: bool,
    name_prefix_index: usize,
    name_postfix_index: usize,
    next_player_id: usize,
    rng: DeterministicRng,
    events: Vec<GameEvent>,
}

impl MatchController {
    /// Create a controller. `rng` seeds the name offsets and tie breaks.
    pub fn new(settings: MatchSettings, mut rng: DeterministicRng) -> Self {
        let name_prefix_index = rng.next_index(PLAYER_NAME_PREFIXES.len());
        let name_postfix_index = rng.next_index(PLAYER_NAME_POSTFIXES.len());
        Self {
            settings,
            round_number: 0,
            round_time: 0.0,
            rest_time: 0.0,
            match_start_host_time_ms: 0,
            players: Vec::new(),
            coins: MatchPlayerCoins::new(),
            round_tick: None,
            rest_tick: None,
            match_ended: false,
            name_prefix_index,
            name_postfix_index,
            next_player_id: 0,
            rng,
            events: Vec::new(),
        }
    }

    // ----- Replicated fields -----

    /// Current round, past `total_rounds` once the final round ended.
    pub fn round_number(&self) -> u16 {
        self.round_number
    }

    /// Seconds left in the round.
    pub fn round_time(&self) -> f32 {
        self.round_time
    }

    /// Seconds left in the rest period.
    pub fn rest_time(&self) -> f32 {
        self.rest_time
    }

    /// Rounds per match.
    pub fn total_rounds(&self) -> u16 {
        self.settings.total_rounds
    }

    /// Seconds per round.
    pub fn round_duration(&self) -> f32 {
        self.settings.round_duration_sec
    }

    /// Host time at which the upcoming match starts.
    pub fn match_start_host_time_ms(&self) -> u64 {
        self.match_start_host_time_ms
    }

    /// Players in the match, in join order.
    pub fn players(&self) -> &[NetEntityId] {
        &self.players
    }

    /// Number of players in the match.
    pub fn player_count(&self) -> u16 {
        self.players.len() as u16
    }

    /// Coin table.
    pub fn coins(&self) -> &MatchPlayerCoins {
        &self.coins
    }

    /// Whether results were broadcast for the current match.
    pub fn is_match_ended(&self) -> bool {
        self.match_ended
    }

    /// Settings in use.
    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    // ----- Events -----

    /// Drain pending change notifications.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queue a change notification.
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    fn set_round_number(&mut self, now_ms: u64, round_number: u16) {
        self.round_number = round_number;
        self.push_event(GameEvent::round_number_changed(now_ms, round_number));
    }

    fn set_round_time(&mut self, now_ms: u64, round_time: f32) {
        self.round_time = round_time;
        self.push_event(GameEvent::round_time_changed(now_ms, round_time));
    }

    fn set_rest_time(&mut self, now_ms: u64, rest_time: f32) {
        self.rest_time = rest_time;
        self.push_event(GameEvent::rest_time_changed(now_ms, rest_time));
    }

    /// Publish when the next match starts.
    pub fn set_match_start_host_time(&mut self, now_ms: u64, start_time_ms: u64) {
        self.match_start_host_time_ms = start_time_ms;
        self.push_event(GameEvent::match_start_time_changed(now_ms, start_time_ms));
    }

    // ----- Match and rounds -----

    /// Start round one of a new match.
    pub fn start_match(&mut self, cx: &mut MatchContext<'_>) {
        let now = cx.timers.now_ms();
        self.match_ended = false;
        cx.timers.cancel_slot(&mut self.rest_tick);
        self.set_rest_time(now, 0.0);
        self.set_round_time(now, self.settings.round_duration_sec);
        self.set_round_number(now, 1);
        cx.world.spawn_gems(1);

        cx.timers.cancel_slot(&mut self.round_tick);
        self.round_tick = Some(cx.timers.schedule_periodic(self.settings.countdown_tick_ms, ArenaTimer::RoundTick));
        info!(players = self.players.len(), rounds = self.settings.total_rounds, "match started");
    }

    /// Run a due round or rest tick. Other timers are ignored.
    pub fn handle_timer(&mut self, cx: &mut MatchContext<'_>, timer: ArenaTimer) {
        match timer {
            ArenaTimer::RoundTick => self.round_tick_once(cx),
            ArenaTimer::RestTick => self.rest_tick_once(cx),
            ArenaTimer::PreparingMatch | ArenaTimer::MatchEnded => {}
        }
    }

    fn round_tick_once(&mut self, cx: &mut MatchContext<'_>) {
        let now = cx.timers.now_ms();
        self.set_round_time(now, self.round_time - 1.0);
        if self.round_time <= 0.0 {
            self.end_round(cx);
        }
    }

    fn rest_tick_once(&mut self, cx: &mut MatchContext<'_>) {
        let now = cx.timers.now_ms();
        self.set_rest_time(now, self.rest_time - 1.0);
        if self.rest_time <= 0.0 {
            self.start_round(cx);
        }
    }

    /// Finish the current round: rest before the next one, or run the
    /// round counter past the total after the final round.
    pub fn end_round(&mut self, cx: &mut MatchContext<'_>) {
        let now = cx.timers.now_ms();
        cx.world.remove_gems();
        cx.timers.cancel_slot(&mut self.round_tick);

        if self.round_number >= self.settings.total_rounds {
            debug!(round = self.round_number, "final round over");
            self.set_round_number(now, self.round_number.saturating_add(1));
            return;
        }

        debug!(round = self.round_number, rest_sec = self.settings.rest_duration_sec, "round over");
        let reset = PlayerResetOptions {
            reset_armor: true,
            coin_penalty: 0,
        };
        for &player in &self.players {
            cx.world.respawn_player(player, reset);
        }

        self.set_rest_time(now, self.settings.rest_duration_sec);
        if self.rest_time <= 0.0 {
            self.start_round(cx);
        } else {
            cx.timers.cancel_slot(&mut self.rest_tick);
            self.rest_tick = Some(cx.timers.schedule_periodic(self.settings.countdown_tick_ms, ArenaTimer::RestTick));
        }
    }

    /// Advance to the next round. Past the final round only the counter moves.
    pub fn start_round(&mut self, cx: &mut MatchContext<'_>) {
        let now = cx.timers.now_ms();
        let round = self.round_number.saturating_add(1);
        self.set_round_number(now, round);
        if round > self.settings.total_rounds {
            return;
        }

        cx.timers.cancel_slot(&mut self.rest_tick);
        self.set_round_time(now, self.settings.round_duration_sec);
        cx.timers.cancel_slot(&mut self.round_tick);
        self.round_tick = Some(cx.timers.schedule_periodic(self.settings.countdown_tick_ms, ArenaTimer::RoundTick));
        cx.world.spawn_gems(round);
        debug!(round, "round started");
    }

    /// Stop the match, broadcast the results and clear the coin table.
    ///
    /// Runs once per match; later calls return `None`.
    pub fn end_match(&mut self, cx: &mut MatchContext<'_>) -> Option<MatchResultsSummary> {
        if self.match_ended {
            debug!("match already ended");
            return None;
        }
        self.match_ended = true;
        self.cancel_timers(cx.timers);

        let mut player_states = Vec::with_capacity(self.players.len());
        let mut contenders: Vec<PlayerResult> = Vec::new();
        let mut highest = None;

        for &player in &self.players {
            let Some(snapshot) = cx.world.player_snapshot(player) else {
                continue;
            };
            cx.world.respawn_player(
                player,
                PlayerResetOptions {
                    reset_armor: true,
                    coin_penalty: 100,
                },
            );

            let coins = self.coins.coins_of(player);
            let state = PlayerResult {
                name: snapshot.name,
                score: coins.unwrap_or(0),
                remaining_armor: snapshot.armor,
            };
            if let Some(score) = coins {
                match highest {
                    Some(best) if score < best => {}
                    Some(best) if score == best => contenders.push(state.clone()),
                    _ => {
                        highest = Some(score);
                        contenders.clear();
                        contenders.push(state.clone());
                    }
                }
            }
            player_states.push(state);
        }

        player_states.sort_by(|a, b| b.score.cmp(&a.score).then(b.remaining_armor.cmp(&a.remaining_armor)));

        let mut table = format!("Match Results ({} players)", player_states.len());
        for state in &player_states {
            table.push_str(&format!("\n\tPlayer {} score {}, armor {}.", state.name, state.score, state.remaining_armor));
        }
        info!("{table}");

        let results = MatchResultsSummary {
            winning_player_name: self.find_winner(&contenders),
            player_states,
        };
        info!(
            winner = %results.winning_player_name,
            fingerprint = %hex::encode(&results.fingerprint()[..8]),
            "match ended"
        );

        let now = cx.timers.now_ms();
        self.push_event(GameEvent::match_results(now, results.clone()));
        self.coins.reset_all_coins();
        Some(results)
    }

    /// Pick the winner among players tied on the top score: most armor,
    /// then a seeded random pick.
    fn find_winner(&mut self, contenders: &[PlayerResult]) -> String {
        let Some(best_armor) = contenders.iter().map(|c| c.remaining_armor).max() else {
            return NO_PLAYERS_WINNER.to_string();
        };
        let tied: Vec<&PlayerResult> = contenders.iter().filter(|c| c.remaining_armor == best_armor).collect();
        let pick = if tied.len() > 1 {
            (self.rng.next_u64() % tied.len() as u64) as usize
        } else {
            0
        };
        tied[pick].name.clone()
    }

    /// Cancel the round and rest ticks.
    pub fn cancel_timers(&mut self, timers: &mut Scheduler<ArenaTimer>) {
        timers.cancel_slot(&mut self.round_tick);
        timers.cancel_slot(&mut self.rest_tick);
    }

    // ----- Roster -----

    /// A player entity became active.
    pub fn on_player_activated(&mut self, cx: &mut MatchContext<'_>, player_id: NetEntityId) {
        let now = cx.timers.now_ms();
        if !self.players.contains(&player_id) {
            self.players.push(player_id);
            let name = self.generate_player_name();
            if !cx.world.assign_player_name(player_id, &name) {
                warn!(player = %player_id, "player entity missing, name not assigned");
            }
            self.next_player_id += 1;
            info!(player = %player_id, %name, "player joined match");
            self.push_event(GameEvent::player_joined(now, player_id, name));
        }
        self.push_event(GameEvent::player_count_changed(now, self.player_count()));
    }

    /// A player entity went away.
    pub fn on_player_deactivated(&mut self, now_ms: u64, player_id: NetEntityId) {
        match self.players.iter().position(|&p| p == player_id) {
            Some(index) => {
                self.players.remove(index);
                info!(player = %player_id, "player left match");
                self.push_event(GameEvent::player_left(now_ms, player_id));
            }
            None => warn!(player = %player_id, "an unknown player deactivated"),
        }
        self.push_event(GameEvent::player_count_changed(now_ms, self.player_count()));
    }

    /// Next generated display name.
    ///
    /// The prefix shifts once every full pass over the prefixes so every
    /// combination is used before a name repeats.
    pub fn generate_player_name(&mut self) -> String {
        let prefixes = PLAYER_NAME_PREFIXES.len();
        let postfixes = PLAYER_NAME_POSTFIXES.len();
        let prefix_offset = self.next_player_id / prefixes;

        self.name_prefix_index = (self.name_prefix_index + 1) % prefixes;
        self.name_postfix_index = (self.name_postfix_index + 1) % postfixes;
        let prefix = PLAYER_NAME_PREFIXES[(self.name_prefix_index + prefix_offset) % prefixes];
        let postfix = PLAYER_NAME_POSTFIXES[self.name_postfix_index];
        format!("{prefix}{postfix}")
    }

    // ----- Coins and armor -----

    /// A player's coin collector became active.
    pub fn on_player_collector_activated(&mut self, player_id: NetEntityId) -> Option<usize> {
        self.coins.on_player_collector_activated(player_id)
    }

    /// A player's coin collector went away.
    pub fn on_player_collector_deactivated(&mut self, player_id: NetEntityId) {
        self.coins.on_player_collector_deactivated(player_id);
    }

    /// A player's collected coin count changed.
    pub fn on_player_collected_coin_count_changed(&mut self, now_ms: u64, player_id: NetEntityId, coins: u16) {
        self.coins.on_player_collected_coin_count_changed(player_id, coins);
        self.push_event(GameEvent::coins_changed(now_ms, player_id, coins));
    }

    /// A player's armor ran out: respawn it with the penalty and drop the
    /// lost coins as a gem where it fell.
    pub fn on_player_armor_zero(&mut self, cx: &mut MatchContext<'_>, player_id: NetEntityId) {
        if !self.players.contains(&player_id) {
            warn!(player = %player_id, "an unknown player reported depleted armor");
            return;
        }

        let now = cx.timers.now_ms();
        self.push_event(GameEvent::armor_depleted(now, player_id));

        let snapshot = cx.world.player_snapshot(player_id);
        let penalty = self.settings.respawn_penalty_percent;
        let dropped = self.coins.coins_of(player_id).map(|coins| coin_penalty_deduction(coins, penalty));
        cx.world.respawn_player(
            player_id,
            PlayerResetOptions {
                reset_armor: true,
                coin_penalty: penalty,
            },
        );

        if let Some(snapshot) = snapshot {
            debug!(player = %player_id, ?dropped, "armor depleted, dropping gem");
            cx.world.drop_gem(snapshot.position, &self.settings.respawn_gem_tag, dropped);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::events::GameEventData;
    use std::collections::BTreeMap;

    /// World double recording every call.
    #[derive(Default)]
    pub(crate) struct FakeWorld {
        pub players: BTreeMap<NetEntityId, PlayerSnapshot>,
        pub respawns: Vec<(NetEntityId, PlayerResetOptions)>,
        pub gem_spawns: Vec<u16>,
        pub gem_removals: usize,
        pub drops: Vec<(Vec3, Option<u16>)>,
    }

    impl FakeWorld {
        pub fn with_players(ids: &[u64]) -> Self {
            let mut world = Self::default();
            for &id in ids {
                world.players.insert(
                    NetEntityId::new(id),
                    PlayerSnapshot {
                        name: String::new(),
                        armor: 100,
                        position: Vec3::new(id as f32, 0.0, 0.0),
                    },
                );
            }
            world
        }
    }

    impl ArenaWorld for FakeWorld {
        fn player_snapshot(&self, player_id: NetEntityId) -> Option<PlayerSnapshot> {
            self.players.get(&player_id).cloned()
        }

        fn assign_player_name(&mut self, player_id: NetEntityId, name: &str) -> bool {
            match self.players.get_mut(&player_id) {
                Some(player) => {
                    player.name = name.to_string();
                    true
                }
                None => false,
            }
        }

        fn respawn_player(&mut self, player_id: NetEntityId, options: PlayerResetOptions) -> bool {
            self.respawns.push((player_id, options));
            self.players.contains_key(&player_id)
        }

        fn spawn_gems(&mut self, round: u16) {
            self.gem_spawns.push(round);
        }

        fn remove_gems(&mut self) {
            self.gem_removals += 1;
        }

        fn drop_gem(&mut self, position: Vec3, _tag: &str, value: Option<u16>) {
            self.drops.push((position, value));
        }
    }

    fn settings(round_sec: f32, rest_sec: f32) -> MatchSettings {
        MatchSettings {
            round_duration_sec: round_sec,
            rest_duration_sec: rest_sec,
            ..MatchSettings::default()
        }
    }

    fn run_ticks(controller: &mut MatchController, timers: &mut Scheduler<ArenaTimer>, world: &mut FakeWorld, ms: u64) {
        timers.advance(ms);
        while let Some(fired) = timers.next_due() {
            let mut cx = MatchContext { timers: &mut *timers, world: &mut *world };
            controller.handle_timer(&mut cx, fired.key);
        }
    }

    fn join(controller: &mut MatchController, timers: &mut Scheduler<ArenaTimer>, world: &mut FakeWorld, id: u64) {
        let mut cx = MatchContext { timers, world };
        controller.on_player_activated(&mut cx, NetEntityId::new(id));
        controller.on_player_collector_activated(NetEntityId::new(id));
    }

    #[test]
    fn test_round_progression_without_rest() {
        let mut controller = MatchController::new(settings(5.0, 0.0), DeterministicRng::new(1));
        let mut timers = Scheduler::new();
        let mut world = FakeWorld::default();
        controller.start_match(&mut MatchContext { timers: &mut timers, world: &mut world });
        assert_eq!((controller.round_number(), controller.round_time()), (1, 5.0));

        run_ticks(&mut controller, &mut timers, &mut world, 4000);
        assert_eq!((controller.round_number(), controller.round_time()), (1, 1.0));

        run_ticks(&mut controller, &mut timers, &mut world, 1000);
        assert_eq!((controller.round_number(), controller.round_time()), (2, 5.0));

        run_ticks(&mut controller, &mut timers, &mut world, 10_000);
        assert_eq!(controller.round_number(), 4);
        assert_eq!(world.gem_spawns, vec![1, 2, 3]);
        assert_eq!(world.gem_removals, 3);
        // Round tick stopped once the final round ended
        assert_eq!(timers.pending_count(), 0);

        let rounds: Vec<u16> = controller
            .take_events()
            .into_iter()
            .filter_map(|e| match e.data {
                GameEventData::RoundNumberChanged { round_number } => Some(round_number),
                _ => None,
            })
            .collect();
        assert_eq!(rounds, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rest_period_between_rounds() {
        let mut controller = MatchController::new(settings(2.0, 3.0), DeterministicRng::new(1));
        let mut timers = Scheduler::new();
        let mut world = FakeWorld::with_players(&[10]);
        join(&mut controller, &mut timers, &mut world, 10);
        controller.start_match(&mut MatchContext { timers: &mut timers, world: &mut world });

        run_ticks(&mut controller, &mut timers, &mut world, 2000);
        assert_eq!(controller.round_number(), 1);
        assert_eq!(controller.rest_time(), 3.0);
        assert_eq!(
            world.respawns,
            vec![(NetEntityId::new(10), PlayerResetOptions { reset_armor: true, coin_penalty: 0 })]
        );

        run_ticks(&mut controller, &mut timers, &mut world, 2000);
        assert_eq!(controller.round_number(), 1);
        assert_eq!(controller.rest_time(), 1.0);

        run_ticks(&mut controller, &mut timers, &mut world, 1000);
        assert_eq!(controller.round_number(), 2);
        assert_eq!(controller.round_time(), 2.0);
        assert_eq!(timers.pending_count(), 1);
    }

    #[test]
    fn test_end_match_picks_top_score_once() {
        let mut controller = MatchController::new(settings(60.0, 0.0), DeterministicRng::new(4));
        let mut timers = Scheduler::new();
        let mut world = FakeWorld::with_players(&[1, 2, 3]);
        for id in [1, 2, 3] {
            join(&mut controller, &mut timers, &mut world, id);
        }
        controller.on_player_collected_coin_count_changed(0, NetEntityId::new(1), 30);
        controller.on_player_collected_coin_count_changed(0, NetEntityId::new(2), 80);
        controller.on_player_collected_coin_count_changed(0, NetEntityId::new(3), 50);

        let mut cx = MatchContext { timers: &mut timers, world: &mut world };
        controller.start_match(&mut cx);
        let results = controller.end_match(&mut cx).unwrap();

        let winner = world.players[&NetEntityId::new(2)].name.clone();
        assert_eq!(results.winning_player_name, winner);
        let scores: Vec<u16> = results.player_states.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![80, 50, 30]);
        assert_eq!(controller.coins().coins_of(NetEntityId::new(2)), Some(0));
        assert_eq!(timers.pending_count(), 0);

        let mut cx = MatchContext { timers: &mut timers, world: &mut world };
        assert!(controller.end_match(&mut cx).is_none());
        let broadcasts = controller
            .take_events()
            .iter()
            .filter(|e| matches!(e.data, GameEventData::MatchResults(_)))
            .count();
        assert_eq!(broadcasts, 1);
    }

    #[test]
    fn test_score_tie_broken_by_armor() {
        let mut controller = MatchController::new(settings(60.0, 0.0), DeterministicRng::new(4));
        let mut timers = Scheduler::new();
        let mut world = FakeWorld::with_players(&[1, 2]);
        for id in [1, 2] {
            join(&mut controller, &mut timers, &mut world, id);
            controller.on_player_collected_coin_count_changed(0, NetEntityId::new(id), 40);
        }
        world.players.get_mut(&NetEntityId::new(1)).unwrap().armor = 20;

        let results = controller
            .end_match(&mut MatchContext { timers: &mut timers, world: &mut world })
            .unwrap();
        assert_eq!(results.winning_player_name, world.players[&NetEntityId::new(2)].name);
        assert_eq!(results.player_states[0].remaining_armor, 100);
    }

    #[test]
    fn test_full_tie_is_seeded() {
        let run = |seed| {
            let mut controller = MatchController::new(settings(60.0, 0.0), DeterministicRng::new(seed));
            let mut timers = Scheduler::new();
            let mut world = FakeWorld::with_players(&[1, 2, 3]);
            for id in [1, 2, 3] {
                join(&mut controller, &mut timers, &mut world, id);
            }
            controller
                .end_match(&mut MatchContext { timers: &mut timers, world: &mut world })
                .unwrap()
                .winning_player_name
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_empty_match_has_no_winner() {
        let mut controller = MatchController::new(MatchSettings::default(), DeterministicRng::new(1));
        let mut timers = Scheduler::new();
        let mut world = FakeWorld::default();
        let results = controller
            .end_match(&mut MatchContext { timers: &mut timers, world: &mut world })
            .unwrap();
        assert_eq!(results.winning_player_name, NO_PLAYERS_WINNER);
        assert!(results.player_states.is_empty());
    }

    #[test]
    fn test_roster_and_unknown_deactivation() {
        let mut controller = MatchController::new(MatchSettings::default(), DeterministicRng::new(1));
        let mut timers = Scheduler::new();
        let mut world = FakeWorld::with_players(&[1]);
        join(&mut controller, &mut timers, &mut world, 1);
        join(&mut controller, &mut timers, &mut world, 1);
        assert_eq!(controller.player_count(), 1);
        assert!(!world.players[&NetEntityId::new(1)].name.is_empty());

        controller.on_player_deactivated(0, NetEntityId::new(5));
        assert_eq!(controller.player_count(), 1);
        controller.on_player_deactivated(0, NetEntityId::new(1));
        assert_eq!(controller.player_count(), 0);
    }

    #[test]
    fn test_names_exhaust_combinations() {
        let mut controller = MatchController::new(MatchSettings::default(), DeterministicRng::new(12));
        let total = PLAYER_NAME_PREFIXES.len() * PLAYER_NAME_POSTFIXES.len();
        let mut names = std::collections::BTreeSet::new();
        for _ in 0..total {
            names.insert(controller.generate_player_name());
            controller.next_player_id += 1;
        }
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_armor_zero_drops_penalty_gem() {
        let mut controller = MatchController::new(MatchSettings::default(), DeterministicRng::new(1));
        let mut timers = Scheduler::new();
        let mut world = FakeWorld::with_players(&[3]);
        join(&mut controller, &mut timers, &mut world, 3);
        controller.on_player_collected_coin_count_changed(0, NetEntityId::new(3), 41);

        let mut cx = MatchContext { timers: &mut timers, world: &mut world };
        controller.on_player_armor_zero(&mut cx, NetEntityId::new(3));
        controller.on_player_armor_zero(&mut cx, NetEntityId::new(99));

        assert_eq!(world.drops, vec![(Vec3::new(3.0, 0.0, 0.0), Some(20))]);
        assert_eq!(
            world.respawns,
            vec![(NetEntityId::new(3), PlayerResetOptions { reset_armor: true, coin_penalty: 50 })]
        );
    }

    #[test]
    fn test_results_payload() {
        let results = MatchResultsSummary {
            winning_player_name: "BraveOtter".into(),
            player_states: vec![PlayerResult {
                name: "BraveOtter".into(),
                score: 12,
                remaining_armor: 40,
            }],
        };
        let bytes = results.encode().unwrap();
        assert_eq!(MatchResultsSummary::decode(&bytes).unwrap(), results);
        assert_ne!(results.fingerprint(), MatchResultsSummary::default().fingerprint());
    }
}
