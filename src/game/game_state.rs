//! Game State Machine
//!
//! ```text
//! WaitingForPlayers ──first player──► PreparingMatch ──countdown──► MatchInProgress
//!                                          ▲                              │
//!                                          │               round > total or winning coins
//!                                          │                              ▼
//!                                          └────────── rest ─────── MatchEnded
//! ```
//!
//! The machine sits above the match controller and only learns about the
//! match through [`GameEvent`]s. Coin notifications must reach it after
//! every other observer so player totals are final when the winning count
//! is checked; the session delivers events to the machine last.

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::GameStateSettings;
use crate::game::effects::{EffectSink, SoundEffect};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::match_controller::{ArenaTimer, ArenaWorld, MatchContext, MatchController};
use crate::runtime::timer::{Scheduler, TimerHandle};

/// Game states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStateId {
    /// No player has joined yet
    #[default]
    WaitingForPlayers,
    /// Countdown before the match
    PreparingMatch,
    /// Rounds are being played
    MatchInProgress,
    /// Results are showing
    MatchEnded,
}

/// Collaborators for one state machine call.
pub struct GameStateContext<'a> {
    /// Authoritative match data
    pub controller: &'a mut MatchController,
    /// Session timers
    pub timers: &'a mut Scheduler<ArenaTimer>,
    /// Player and gem entities
    pub world: &'a mut dyn ArenaWorld,
    /// Global effect cues
    pub effects: &'a mut dyn EffectSink,
}

/// The top-level match loop.
#[derive(Debug)]
pub struct GameStateMachine {
    settings: GameStateSettings,
    state: GameStateId,
    state_timer: Option<TimerHandle>,
    active: bool,
}

impl GameStateMachine {
    /// Machine waiting for its first player.
    pub fn new(settings: GameStateSettings) -> Self {
        Self {
            settings,
            state: GameStateId::WaitingForPlayers,
            state_timer: None,
            active: true,
        }
    }

    /// Current state.
    pub fn state(&self) -> GameStateId {
        self.state
    }

    /// False once shut down.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// React to a match notification.
    pub fn on_event(&mut self, cx: &mut GameStateContext<'_>, event: &GameEvent) {
        match (self.state, &event.data) {
            // No minimum player count: the first arrival starts the countdown
            (GameStateId::WaitingForPlayers, GameEventData::PlayerJoined { .. }) => {
                self.transition(cx, GameStateId::PreparingMatch);
            }
            (GameStateId::MatchInProgress, GameEventData::RoundNumberChanged { round_number })
                if *round_number > cx.controller.total_rounds() =>
            {
                self.transition(cx, GameStateId::MatchEnded);
            }
            (GameStateId::MatchInProgress, GameEventData::CoinsChanged { player_id, coins })
                if *coins >= self.settings.winning_coin_count =>
            {
                info!(player = %player_id, coins, "winning coin count reached");
                self.transition(cx, GameStateId::MatchEnded);
            }
            _ => {}
        }
    }

    /// Run a due state timer. Round and rest ticks are ignored.
    pub fn handle_timer(&mut self, cx: &mut GameStateContext<'_>, timer: ArenaTimer) {
        match (self.state, timer) {
            (GameStateId::PreparingMatch, ArenaTimer::PreparingMatch) => {
                self.state_timer = None;
                self.transition(cx, GameStateId::MatchInProgress);
            }
            (GameStateId::MatchEnded, ArenaTimer::MatchEnded) => {
                self.state_timer = None;
                self.transition(cx, GameStateId::PreparingMatch);
            }
            _ => {}
        }
    }

    /// Replace the active state.
    pub fn transition(&mut self, cx: &mut GameStateContext<'_>, next: GameStateId) {
        if !self.active {
            debug!(?next, "state machine shut down, transition ignored");
            return;
        }

        // Exit
        cx.timers.cancel_slot(&mut self.state_timer);

        let previous = std::mem::replace(&mut self.state, next);
        let now = cx.timers.now_ms();
        info!(from = ?previous, to = ?next, "game state changed");
        cx.controller.push_event(GameEvent::game_state_changed(now, previous, next));

        // Enter
        match next {
            GameStateId::WaitingForPlayers => {}
            GameStateId::PreparingMatch => {
                let countdown = self.settings.preparing_countdown_ms;
                cx.controller.set_match_start_host_time(now, now.saturating_add(countdown));
                self.state_timer = Some(cx.timers.schedule_once(countdown, ArenaTimer::PreparingMatch));
                cx.effects.on_effect(SoundEffect::CountDown);
            }
            GameStateId::MatchInProgress => {
                let mut mcx = MatchContext {
                    timers: &mut *cx.timers,
                    world: &mut *cx.world,
                };
                cx.controller.start_match(&mut mcx);
            }
            GameStateId::MatchEnded => {
                cx.effects.on_effect(SoundEffect::GameEnd);
                let mut mcx = MatchContext {
                    timers: &mut *cx.timers,
                    world: &mut *cx.world,
                };
                cx.controller.end_match(&mut mcx);
                self.state_timer = Some(cx.timers.schedule_once(self.settings.match_ended_rest_ms, ArenaTimer::MatchEnded));
            }
        }
    }

    /// Stop the machine and every match timer. Nothing fires afterwards.
    pub fn shutdown(&mut self, cx: &mut GameStateContext<'_>) {
        cx.timers.cancel_slot(&mut self.state_timer);
        cx.controller.cancel_timers(cx.timers);
        self.active = false;
        info!(state = ?self.state, "game state machine shut down");
    }
}

// =============================================================================
// TESTS
// =============================================================================
