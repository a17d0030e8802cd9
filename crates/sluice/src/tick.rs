//! # Tick Clock
//!
//! Fixed-timestep accumulator for the batch cadence.
//!
//! ## Design
//!
//! The clock must:
//! - Never block or sleep (the surrounding frame loop owns suspension)
//! - Report how many ticks are due for a frame
//! - Cap catch-up so one long frame cannot trigger a tick storm

use std::time::Duration;

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks handed out.
    pub ticks_run: u64,
    /// Ticks discarded by the catch-up cap.
    pub ticks_dropped: u64,
    /// Frames that owed more ticks than the cap.
    pub late_frames: u64,
}

/// Fixed-cadence tick scheduler.
///
/// Feed it frame deltas; it answers how many ticks to run.
pub struct TickClock {
    /// Target tick duration.
    tick_duration: Duration,
    /// Time owed but not yet ticked.
    accumulator: Duration,
    /// Most ticks returned for a single frame.
    max_catch_up: u32,
    /// Total ticks handed out.
    tick_count: u64,
    /// Timing statistics.
    stats: TickStats,
}

impl TickClock {
    /// Creates a clock ticking `tick_hz` times per second.
    ///
    /// # Panics
    ///
    /// Panics if `tick_hz` is zero.
    #[must_use]
    pub fn new(tick_hz: u32, max_catch_up: u32) -> Self {
        assert!(tick_hz > 0, "Tick rate must be greater than zero");

        Self {
            tick_duration: Duration::from_nanos(1_000_000_000 / u64::from(tick_hz)),
            accumulator: Duration::ZERO,
            max_catch_up: max_catch_up.max(1),
            tick_count: 0,
            stats: TickStats::default(),
        }
    }

    /// Changes the cadence. Owed time and statistics carry over.
    ///
    /// # Panics
    ///
    /// Panics if `tick_hz` is zero.
    pub fn retime(&mut self, tick_hz: u32, max_catch_up: u32) {
        assert!(tick_hz > 0, "Tick rate must be greater than zero");

        self.tick_duration = Duration::from_nanos(1_000_000_000 / u64::from(tick_hz));
        self.max_catch_up = max_catch_up.max(1);
    }

    /// Adds a frame's elapsed time and returns the number of ticks now due.
    pub fn advance(&mut self, frame_dt: Duration) -> u32 {
        self.accumulator += frame_dt;

        let mut due = 0;
        while self.accumulator >= self.tick_duration && due < self.max_catch_up {
            self.accumulator -= self.tick_duration;
            due += 1;
        }

        if self.accumulator >= self.tick_duration {
            // Too far behind - drop the backlog instead of spiraling
            let backlog = self.accumulator.as_nanos() / self.tick_duration.as_nanos();
            self.stats.ticks_dropped += u64::try_from(backlog).unwrap_or(u64::MAX);
            self.stats.late_frames += 1;
            self.accumulator = Duration::from_nanos(
                u64::try_from(self.accumulator.as_nanos() % self.tick_duration.as_nanos())
                    .unwrap_or(0),
            );
        }

        self.tick_count += u64::from(due);
        self.stats.ticks_run += u64::from(due);
        due
    }

    /// Returns the target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Returns the tick duration in seconds.
    #[must_use]
    pub fn tick_seconds(&self) -> f32 {
        self.tick_duration.as_secs_f32()
    }

    /// Returns the current tick count.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns tick statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Discards owed time and statistics.
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
        self.tick_count = 0;
        self.stats = TickStats::default();
    }
}
