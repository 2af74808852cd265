//! Arena Gem Demo Host
//!
//! Runs a headless arena match with scripted players, then checks that a
//! replay of the same session and a reconciled client prediction both land
//! on the authority's state.

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use arena_gem::{
    ArenaSession, GameConfig, GameStateId, MatchResultsSummary, NetEntityId, Transform, Vec3, TICK_MS,
    TICK_RATE, VERSION,
    core::entity::HostFrameId,
    game::effects::{EffectTriggers, SoundEffect, TracingEffects},
    game::events::GameEventData,
    runtime::bus::DEFAULT_NOTIFICATION_ORDER,
    weapons::{
        ActivationFlags, GatherContext, NetworkTime, PredictedInput, PredictedWeapons, SimpleWorld, WeaponContext,
        WeaponEventLog, WeaponIndex, WeaponInput, WeaponStates, WeaponsController,
        predicted::InputId,
    },
};

/// Scripted players in the demo match.
const DEMO_PLAYERS: u64 = 4;

/// Upper bound on demo ticks (ten simulated minutes).
const MAX_DEMO_TICKS: u32 = TICK_RATE * 600;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Arena Gem v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::load(&path).with_context(|| format!("loading settings from {path}"))?,
        None => GameConfig::default(),
    };

    let session_id = Uuid::new_v4();
    let results = demo_match(&config, session_id)?;

    info!("=== Verifying Determinism ===");
    let replay = demo_match(&config, session_id)?;
    let (hash, replay_hash) = (results.fingerprint(), replay.fingerprint());
    info!("Results Hash: {}", hex::encode(hash));
    info!("Replay Hash:  {}", hex::encode(replay_hash));
    if hash != replay_hash {
        bail!("determinism failure: results differ between identical sessions");
    }
    info!("DETERMINISM VERIFIED: Hashes match!");

    verify_prediction(&config)?;
    Ok(())
}

/// Play one match with scripted players. Returns the broadcast results.
fn demo_match(config: &GameConfig, session_id: Uuid) -> Result<MatchResultsSummary> {
    info!(session = %session_id, "=== Starting Demo Match ===");

    let triggers = EffectTriggers::new()
        .with(SoundEffect::CountDown, "countdown")
        .with(SoundEffect::GameEnd, "game_end")
        .with(SoundEffect::LaserPistolMuzzleFlash, "laser_pistol_muzzle_flash")
        .with(SoundEffect::BubbleGunMuzzleFlash, "bubble_gun_muzzle_flash");
    let effects = Box::new(TracingEffects::new(triggers, false));
    let mut session = ArenaSession::with_session_id(config.clone(), session_id, effects)?;

    session.subscribe(DEFAULT_NOTIFICATION_ORDER, |event| match &event.data {
        GameEventData::PlayerJoined { player_id, name } => info!(player = %player_id, name, "joined"),
        GameEventData::RoundNumberChanged { round_number } => info!(round_number, "round"),
        GameEventData::ArmorDepleted { player_id } => info!(player = %player_id, "armor depleted"),
        _ => {}
    });

    let players: Vec<NetEntityId> = (1..=DEMO_PLAYERS).map(NetEntityId::new).collect();
    for &player in &players {
        session.add_player(player)?;
    }

    let mut tick = 0u32;
    while session.state() != GameStateId::MatchEnded {
        if tick >= MAX_DEMO_TICKS {
            bail!("match did not finish within {MAX_DEMO_TICKS} ticks");
        }

        // Each player circles the arena and shoots at the next one
        for (i, &player) in players.iter().enumerate() {
            let angle = (tick as f32 * 0.01) + i as f32 * std::f32::consts::FRAC_PI_2;
            session.move_player(player, Vec3::new(angle.cos() * 6.0, angle.sin() * 6.0, 0.0));

            let target = players[(i + 1) % players.len()];
            let Some(aim) = session.entities().player(target).map(|p| p.position()) else {
                continue;
            };
            let weapon = if (tick / TICK_RATE) % 4 == i as u32 { WeaponIndex::SECONDARY } else { WeaponIndex::PRIMARY };
            session.submit_input(player, WeaponInput::fire(weapon, aim));
        }

        session.tick(TICK_MS);
        tick += 1;
    }

    let results = session
        .view()
        .last_results()
        .cloned()
        .context("match ended without a results broadcast")?;
    let payload = results.encode()?;
    info!(
        ticks = tick,
        winner = %results.winning_player_name,
        payload_bytes = payload.len(),
        "match finished"
    );

    session.shutdown();
    Ok(results)
}

/// Reconcile a predicting client with the authority and compare state digests.
fn verify_prediction(config: &GameConfig) -> Result<()> {
    info!("=== Verifying Prediction Replay ===");

    let owner = NetEntityId::new(1);
    let mut world = SimpleWorld::new();
    world.add_static_sphere(NetEntityId::new(100), Vec3::new(0.0, 8.0, 0.0), 1.0, "metal");
    world.record_frame(HostFrameId(0));

    let inputs: Vec<PredictedInput> = (1..=12)
        .map(|i| PredictedInput {
            input_id: InputId(i),
            muzzle: Transform::IDENTITY,
            input: if i % 3 == 0 {
                WeaponInput::default()
            } else {
                WeaponInput::fire(WeaponIndex((i % 2) as u8), Vec3::new(0.0, 8.0, 0.0))
            },
            delta_time: TICK_MS as f32 * 0.001,
        })
        .collect();
    let acked = inputs.len() / 2;

    // Authority
    let mut authority = WeaponsController::new(owner, &config.weapons.loadout)?;
    let mut authority_log = WeaponEventLog::default();
    let mut acked_states: Option<WeaponStates> = None;
    for (n, input) in inputs.iter().enumerate() {
        let mut cx = WeaponContext {
            gather: GatherContext::new(&world, NetworkTime::live(HostFrameId(0)), config.weapons.multitrace_segments),
            listener: &mut authority_log,
        };
        authority.process_input(&mut cx, &input.muzzle, &input.input, input.delta_time, ActivationFlags::FRESH);
        if n + 1 == acked {
            acked_states = Some(authority.states().clone());
        }
    }
    let acked_states = acked_states.context("no authoritative state to reconcile with")?;

    // Client: predict everything, then replay what the authority has not acknowledged
    let mut client = PredictedWeapons::new(WeaponsController::new(owner, &config.weapons.loadout)?);
    let mut client_log = WeaponEventLog::default();
    let mut cx = WeaponContext {
        gather: GatherContext::new(&world, NetworkTime::live(HostFrameId(0)), config.weapons.multitrace_segments),
        listener: &mut client_log,
    };
    for input in inputs.iter().cloned() {
        client.process_local_input(&mut cx, input);
    }
    let predicted_effects = client_log.len();

    let mut replay_log = WeaponEventLog::default();
    let mut cx = WeaponContext {
        gather: GatherContext::new(&world, NetworkTime::live(HostFrameId(0)), config.weapons.multitrace_segments),
        listener: &mut replay_log,
    };
    let replayed = client.on_authoritative_state(&mut cx, InputId(acked as u32), acked_states);

    let mut matched = true;
    for (slot, (server, local)) in authority.states().iter().zip(client.controller().states()).enumerate() {
        let (server_digest, local_digest) = (server.digest(), local.digest());
        info!(slot, server = %hex::encode(server_digest), client = %hex::encode(local_digest), "weapon state digest");
        matched &= server_digest == local_digest;
    }

    info!(replayed, predicted_effects, replay_effects = replay_log.len(), "reconciled");
    if !replay_log.is_empty() {
        warn!(events = replay_log.len(), "replay produced side effects");
    }
    if !matched {
        bail!("prediction failure: replayed weapon state differs from the authority");
    }
    info!("PREDICTION VERIFIED: Digests match!");
    Ok(())
}
