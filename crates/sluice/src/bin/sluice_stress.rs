//! # Sluice Stress Driver
//!
//! Headless load test for the request pipeline:
//! - 60 FPS frame loop, 30 Hz batch ticks (configurable)
//! - ~60% of entity slots alive, every live entity chasing a moving target
//! - Random damage bursts from a fixed-seed generator
//!
//! Usage: `sluice_stress [config.toml] [seconds]`
//!
//! Set `RUST_LOG=sluice=debug` to see per-request rejections.

use std::time::{Duration, Instant};

use sluice::{DamageTag, EntityId, Simulation, SimulationConfig, Vec2};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Fixed-seed linear congruential generator. Deterministic across runs.
struct Lcg(u64);

impl Lcg {
    #[allow(clippy::cast_possible_truncation)]
    fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    #[allow(clippy::cast_precision_loss)]
    fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }
}

const FRAME: Duration = Duration::from_micros(16_667);
const ARENA: f32 = 200.0;

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sluice=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match SimulationConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                error!(%path, %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(10);

    let mut sim = match Simulation::new(config.clone()) {
        Ok(sim) => sim,
        Err(err) => {
            error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let mut rng = Lcg(0x5EED);
    let mut ids: Vec<EntityId> = Vec::with_capacity(config.entity_slots);
    let target_population = config.entity_slots * 3 / 5;
    for _ in 0..target_population {
        let position = Vec2::new(rng.next_f32() * ARENA, rng.next_f32() * ARENA);
        if let Some((id, _)) = sim.spawn(position, 100.0) {
            ids.push(id);
        }
    }

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    SLUICE PIPELINE STRESS                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!("  Slots:      {} ({} alive)", config.entity_slots, ids.len());
    println!("  Queue:      {} / pool {}", config.pipeline.capacity, config.pipeline.pool_size);
    println!("  Tick rate:  {} Hz", config.pipeline.tick_hz);
    println!("  Exhaustion: {:?}", config.pipeline.exhaustion);
    println!("  Duration:   {seconds} s simulated");
    println!();

    let summaries = sim.pipeline_mut().summary_channel(256);
    let frames = seconds * 1_000_000 / FRAME.as_micros() as u64;
    let start = Instant::now();
    let mut ticks = 0_u64;
    let mut slot_updates = 0_u64;

    for frame in 0..frames {
        let angle = frame as f32 * 0.01;
        let target = Vec2::new(
            ARENA * 0.5 + angle.cos() * ARENA * 0.25,
            ARENA * 0.5 + angle.sin() * ARENA * 0.25,
        );

        // Burst of damage requests from random attackers
        let burst = rng.next_u32() % 64;
        for _ in 0..burst {
            if ids.is_empty() {
                break;
            }
            let source = ids[rng.next_u32() as usize % ids.len()];
            let victim = ids[rng.next_u32() as usize % ids.len()];
            let tag = DamageTag((rng.next_u32() % 8) as u8);
            sim.pipeline_mut()
                .apply_damage(source, victim, rng.next_f32() * 5.0, &[tag]);
        }

        let report = sim.advance(FRAME, target);
        ticks += u64::from(report.ticks);
        slot_updates += report.slots_updated;

        // Respawn the fallen to keep the load steady
        if frame % 60 == 0 {
            ids.retain(|id| sim.pipeline().registry().is_alive(*id));
            while ids.len() < target_population {
                let position = Vec2::new(rng.next_f32() * ARENA, rng.next_f32() * ARENA);
                match sim.spawn(position, 100.0) {
                    Some((id, _)) => ids.push(id),
                    None => break,
                }
            }
        }
    }

    let elapsed = start.elapsed();
    let received = summaries.try_iter().count();
    let stats = sim.pipeline().get_stats();
    let totals = sim.updater().totals();

    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        ticks,
        slot_updates,
        summaries = received,
        "stress run finished"
    );

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                          RESULTS                                 ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!("  Wall time:            {elapsed:?}");
    println!("  Ticks:                {ticks}");
    println!(
        "  Ticks dropped:        {} ({} late frames)",
        stats.ticks_dropped, stats.late_frames
    );
    println!("  Enqueued:             {}", stats.enqueued);
    println!("  Processed:            {}", stats.processed);
    println!("  Dropped (overflow):   {}", stats.dropped_overflow);
    println!("  Rejected (pool):      {}", stats.rejected);
    println!("  Fallback allocations: {}", stats.fallback_allocations);
    println!("  Invalid references:   {}", stats.invalid_references);
    println!("  Malformed:            {}", stats.malformed);
    println!("  Kills:                {}", stats.kills);
    println!("  Batches emitted:      {}", stats.batches_emitted);
    println!("  Summaries received:   {received} ({} dropped)", stats.summaries_dropped);
    println!("  Slot updates:         {} ({} syncs)", totals.live_updates, totals.syncs_emitted);
    println!("  Slots reaped:         {}", totals.reaped);
    println!("  Pool available:       {}/{}", stats.pool_available, stats.capacity);

    if !sim.pipeline().check_invariants() {
        error!("pool/queue bookkeeping is inconsistent");
        std::process::exit(2);
    }
}
