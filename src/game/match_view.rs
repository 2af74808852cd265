//! Match View
//!
//! Client-side mirror of the replicated match fields. It only ever applies
//! change notifications from the authority; nothing here writes back.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::effects::{EffectSink, SoundEffect};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::match_controller::MatchResultsSummary;

/// What the local player may do right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowedPlayerActions {
    /// No input (a UI cursor is up)
    None,
    /// Look around only
    RotationOnly,
    /// Move, jump and fire
    All,
}

/// Read-only mirror of the match state.
#[derive(Clone, Debug, Default)]
pub struct MatchView {
    round_number: u16,
    round_time: f32,
    rest_time: f32,
    total_rounds: u16,
    round_duration: f32,
    player_count: u16,
    match_start_host_time_ms: u64,
    cursor_visible: bool,
    local_player_name: Option<String>,
    last_results: Option<MatchResultsSummary>,
}

impl MatchView {
    /// Mirror for a match of `total_rounds` rounds of `round_duration` seconds.
    pub fn new(total_rounds: u16, round_duration: f32) -> Self {
        Self {
            total_rounds,
            round_duration,
            ..Self::default()
        }
    }

    /// Current round.
    pub fn round_number(&self) -> u16 {
        self.round_number
    }

    /// Seconds left in the round.
    pub fn round_time_remaining_sec(&self) -> f32 {
        self.round_time
    }

    /// Seconds per round.
    pub fn total_round_time_sec(&self) -> f32 {
        self.round_duration
    }

    /// Seconds left in the rest period.
    pub fn rest_time_remaining_sec(&self) -> f32 {
        self.rest_time
    }

    /// Rounds per match.
    pub fn total_round_count(&self) -> u16 {
        self.total_rounds
    }

    /// Players in the match.
    pub fn total_player_count(&self) -> u16 {
        self.player_count
    }

    /// Host time at which the match starts.
    pub fn match_start_host_time_ms(&self) -> u64 {
        self.match_start_host_time_ms
    }

    /// Results of the last finished match.
    pub fn last_results(&self) -> Option<&MatchResultsSummary> {
        self.last_results.as_ref()
    }

    /// Name of the player this client controls.
    pub fn set_local_player_name(&mut self, name: impl Into<String>) {
        self.local_player_name = Some(name.into());
    }

    /// Whether a UI or system cursor is showing.
    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    /// Actions the local player may take at host time `now_ms`.
    pub fn player_actions_allowed(&self, now_ms: u64) -> AllowedPlayerActions {
        if self.cursor_visible {
            return AllowedPlayerActions::None;
        }
        // Between rounds
        if self.round_time <= 0.0 && self.rest_time > 0.0 {
            return AllowedPlayerActions::RotationOnly;
        }
        // Match not started yet
        if now_ms < self.match_start_host_time_ms {
            return AllowedPlayerActions::RotationOnly;
        }
        AllowedPlayerActions::All
    }

    /// Apply one change notification from the authority.
    pub fn apply(&mut self, event: &GameEvent, effects: &mut dyn EffectSink) {
        match &event.data {
            GameEventData::RoundNumberChanged { round_number } => self.round_number = *round_number,
            GameEventData::RoundTimeChanged { round_time } => self.round_time = *round_time,
            GameEventData::RestTimeChanged { rest_time } => self.rest_time = *rest_time,
            GameEventData::PlayerCountChanged { player_count } => self.player_count = *player_count,
            GameEventData::MatchStartTimeChanged { start_time_ms } => self.match_start_host_time_ms = *start_time_ms,
            GameEventData::MatchResults(results) => {
                self.on_match_results(results, effects);
            }
            _ => {}
        }
    }

    /// Show the results and play the local fanfare.
    ///
    /// Without a known local player no fanfare plays.
    pub fn on_match_results(&mut self, results: &MatchResultsSummary, effects: &mut dyn EffectSink) -> Option<SoundEffect> {
        self.last_results = Some(results.clone());

        let local = self.local_player_name.as_deref()?;
        let fanfare = if results.winning_player_name == local {
            SoundEffect::VictoryFanfare
        } else {
            SoundEffect::LosingFanfare
        };
        debug!(winner = %results.winning_player_name, local, ?fanfare, "match results received");
        effects.on_effect(fanfare);
        Some(fanfare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::RecordingEffects;

    fn results(winner: &str) -> MatchResultsSummary {
        MatchResultsSummary {
            winning_player_name: winner.into(),
            player_states: Vec::new(),
        }
    }

    #[test]
    fn test_actions_gated_during_rest_and_before_start() {
        let mut view = MatchView::new(3, 60.0);
        let mut effects = RecordingEffects::default();

        view.apply(&GameEvent::match_start_time_changed(0, 3000), &mut effects);
        assert_eq!(view.player_actions_allowed(2999), AllowedPlayerActions::RotationOnly);
        assert_eq!(view.player_actions_allowed(3000), AllowedPlayerActions::All);

        view.apply(&GameEvent::round_time_changed(10, 0.0), &mut effects);
        view.apply(&GameEvent::rest_time_changed(10, 5.0), &mut effects);
        assert_eq!(view.player_actions_allowed(5000), AllowedPlayerActions::RotationOnly);

        view.apply(&GameEvent::round_time_changed(20, 60.0), &mut effects);
        assert_eq!(view.player_actions_allowed(5000), AllowedPlayerActions::All);

        view.set_cursor_visible(true);
        assert_eq!(view.player_actions_allowed(5000), AllowedPlayerActions::None);
    }

    #[test]
    fn test_fanfare_by_local_name() {
        let mut effects = RecordingEffects::default();
        let mut view = MatchView::new(3, 60.0);
        assert_eq!(view.on_match_results(&results("LuckyComet"), &mut effects), None);
        assert!(effects.played.is_empty());

        view.set_local_player_name("LuckyComet");
        view.apply(&GameEvent::match_results(0, results("LuckyComet")), &mut effects);
        view.apply(&GameEvent::match_results(0, results("QuietLynx")), &mut effects);

        assert_eq!(effects.effects(), vec![SoundEffect::VictoryFanfare, SoundEffect::LosingFanfare]);
        assert_eq!(view.last_results().map(|r| r.winning_player_name.as_str()), Some("QuietLynx"));
    }

    #[test]
    fn test_mirrors_counters() {
        let mut effects = RecordingEffects::default();
        let mut view = MatchView::new(3, 60.0);
        view.apply(&GameEvent::round_number_changed(0, 2), &mut effects);
        view.apply(&GameEvent::player_count_changed(0, 4), &mut effects);
        assert_eq!(view.round_number(), 2);
        assert_eq!(view.total_player_count(), 4);
        assert_eq!(view.total_round_count(), 3);
    }
}
