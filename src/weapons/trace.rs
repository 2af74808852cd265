//! Trace Weapon
//!
//! Hit-scan when `travel_speed` is zero, otherwise a travelling trace that
//! sweeps a few segments per tick until it hits, runs out of range or
//! outlives [`MAX_SHOT_LIFETIME_SEC`](crate::weapons::types::MAX_SHOT_LIFETIME_SEC).
//! A travelling trace reports its hits once, when it terminates.

use crate::weapons::base::{ActivationFlags, BaseWeapon, Weapon, WeaponContext};
use crate::weapons::gather::ShotResult;
use crate::weapons::types::{ActivateEvent, ActiveShot, WeaponState};

/// Trace weapon.
#[derive(Clone, Debug)]
pub struct TraceWeapon {
    base: BaseWeapon,
}

impl TraceWeapon {
    /// Wrap shared weapon data.
    pub fn new(base: BaseWeapon) -> Self {
        Self { base }
    }

    fn dispatch_shot(&self, cx: &mut WeaponContext<'_>, shot: &ActiveShot) {
        self.base.dispatch_hit_events(
            cx.listener,
            &shot.gathered,
            &shot.initial_transform,
            shot.target_position,
            self.base.owner_id(),
        );
    }
}

impl Weapon for TraceWeapon {
    fn base(&self) -> &BaseWeapon {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseWeapon {
        &mut self.base
    }

    fn activate(
        &mut self,
        cx: &mut WeaponContext<'_>,
        delta_time: f32,
        state: &mut WeaponState,
        event: &ActivateEvent,
        flags: ActivationFlags,
    ) {
        if !self.base.activate_internal(state, flags.dispatch_hit_events) {
            return;
        }

        if flags.dispatch_activate_events {
            self.base.dispatch_activate_event(cx.listener, event);
        }

        if self.base.params().gather_params.is_multi_segment() {
            // Replays enqueue and advance the shot too, so the replayed state
            // matches the fresh one; only the hit dispatch is skipped
            let mut shot = ActiveShot::new(event.initial_transform, event.target_position);
            match self.base.gather_entities_multisegment(&cx.gather, delta_time, &mut shot) {
                ShotResult::ShouldTerminate => {
                    if flags.dispatch_hit_events {
                        self.dispatch_shot(cx, &shot);
                    }
                }
                ShotResult::DoNotTerminate => state.active_shots.push(shot),
            }
        } else if flags.dispatch_hit_events && !flags.force_skip_gather {
            let results = self.base.gather_entities(&cx.gather, event);
            self.base.dispatch_hit_events(
                cx.listener,
                &results,
                &event.initial_transform,
                event.target_position,
                event.shooter_id,
            );
        }
    }

    fn tick_active_shots(
        &mut self,
        cx: &mut WeaponContext<'_>,
        state: &mut WeaponState,
        delta_time: f32,
        flags: ActivationFlags,
    ) {
        // Swap-and-pop: the shot moved into slot `i` is ticked next
        let mut i = 0;
        while i < state.active_shots.len() {
            let result = self
                .base
                .gather_entities_multisegment(&cx.gather, delta_time, &mut state.active_shots[i]);

            if result == ShotResult::ShouldTerminate {
                let shot = state.active_shots.swap_remove(i);
                if flags.dispatch_hit_events {
                    self.dispatch_shot(cx, &shot);
                }
            } else {
                i += 1;
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
