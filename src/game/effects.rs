//! Gameplay Effects
//!
//! Fire-and-forget audio/particle cues. The match layer calls into an
//! [`EffectSink`] and never waits on or inspects the result.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::math::Vec3;

/// Every cue the game can play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SoundEffect {
    // Player
    /// Footsteps
    PlayerFootSteps,
    /// Jump/landing exertion
    PlayerExertion,
    /// Knocked down
    PlayerKnockedDown,
    /// Armor dropped below half
    ArmorBreaking,
    /// Armor restored
    ArmorMend,
    /// Took damage
    PlayerOuch,
    /// Climbing a ladder
    LadderClimb,
    /// Armor depleted
    ShutDown,

    // Game events
    /// Countdown before a match
    CountDown,
    /// Gem picked up
    GemPickup,
    /// Local player won
    VictoryFanfare,
    /// Local player lost
    LosingFanfare,
    /// Round started
    RoundStart,
    /// Round ended
    RoundEnd,
    /// Match ended
    GameEnd,

    // Laser pistol
    /// Laser muzzle flash
    LaserPistolMuzzleFlash,
    /// Laser impact
    LaserPistolImpact,

    // Bubble gun
    /// Bubble gun charging
    BubbleGunBuildup,
    /// Bubble gun muzzle flash
    BubbleGunMuzzleFlash,
    /// Bubble in flight
    BubbleGunProjectile,
    /// Bubble impact
    BubbleGunImpact,

    // Jump pad
    /// Jump pad launch
    JumpPadLaunch,

    // Energy ball trap
    /// Trap rising out of the ground
    EnergyBallTrapRisingOutOfTheGround,
    /// Trap charging
    EnergyBallTrapBuildup,
    /// Energy ball in flight
    EnergyBallTrapProjectile,
    /// Energy ball impact
    EnergyBallTrapImpact,
    /// Trap triggered while cooling down
    EnergyBallTrapOnCooldown,
}

/// Receives gameplay cues.
pub trait EffectSink {
    /// Non-positional cue, played at the local camera.
    fn on_effect(&mut self, effect: SoundEffect);

    /// Cue played at a world position.
    fn on_positional_effect(&mut self, effect: SoundEffect, position: Vec3);
}

/// One cue received by [`RecordingEffects`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayedEffect {
    /// Which cue
    pub effect: SoundEffect,
    /// Where, for positional cues
    pub position: Option<Vec3>,
}

/// Sink that keeps every cue in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingEffects {
    /// Cues received so far
    pub played: Vec<PlayedEffect>,
}

impl RecordingEffects {
    /// Number of times `effect` was played.
    pub fn count(&self, effect: SoundEffect) -> usize {
        self.played.iter().filter(|played| played.effect == effect).count()
    }

    /// Cues received so far, without positions.
    pub fn effects(&self) -> Vec<SoundEffect> {
        self.played.iter().map(|played| played.effect).collect()
    }
}

impl EffectSink for RecordingEffects {
    fn on_effect(&mut self, effect: SoundEffect) {
        self.played.push(PlayedEffect { effect, position: None });
    }

    fn on_positional_effect(&mut self, effect: SoundEffect, position: Vec3) {
        self.played.push(PlayedEffect {
            effect,
            position: Some(position),
        });
    }
}

/// Sound trigger names per cue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectTriggers {
    names: BTreeMap<SoundEffect, String>,
}

impl EffectTriggers {
    /// Create an empty trigger table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: assign a trigger to a cue.
    pub fn with(mut self, effect: SoundEffect, trigger: impl Into<String>) -> Self {
        self.names.insert(effect, trigger.into());
        self
    }

    /// Trigger for a cue; empty names count as missing.
    pub fn trigger_for(&self, effect: SoundEffect) -> Option<&str> {
        self.names.get(&effect).map(String::as_str).filter(|name| !name.is_empty())
    }
}

/// Sink that logs each cue with its trigger name.
#[derive(Clone, Debug, Default)]
pub struct TracingEffects {
    triggers: EffectTriggers,
    warn_missing: bool,
}

impl TracingEffects {
    /// Log cues through `triggers`. With `warn_missing`, cues without a
    /// trigger are reported at `warn!`.
    pub fn new(triggers: EffectTriggers, warn_missing: bool) -> Self {
        Self { triggers, warn_missing }
    }

    fn play(&self, effect: SoundEffect, position: Option<Vec3>) {
        match self.triggers.trigger_for(effect) {
            Some(trigger) => debug!(?effect, trigger, ?position, "effect"),
            None if self.warn_missing => warn!(?effect, "no sound trigger for effect"),
            None => debug!(?effect, ?position, "effect without trigger"),
        }
    }
}

impl EffectSink for TracingEffects {
    fn on_effect(&mut self, effect: SoundEffect) {
        self.play(effect, None);
    }

    fn on_positional_effect(&mut self, effect: SoundEffect, position: Vec3) {
        self.play(effect, Some(position));
    }
}
