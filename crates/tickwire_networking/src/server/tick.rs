//! # Fixed-Rate Loop Timing
//!
//! Accumulator-based pacing shared by the server tick loop and the client
//! frame loop.
//!
//! ## Design
//!
//! - Elapsed wall time is accumulated; one tick is owed per tick duration
//! - A slow tick is caught up on the next wake, up to a bounded backlog
//! - Sleep for most of the wait, spin only for the last fraction

use std::time::{Duration, Instant};

/// Most ticks run back to back before older debt is written off.
pub const MAX_CATCH_UP_TICKS: u32 = 5;

/// Fixed-timestep loop controller.
#[derive(Debug)]
pub struct TickLoop {
    /// Target tick duration.
    tick_duration: Duration,
    /// Time of last accumulation.
    last_tick: Instant,
    /// Time owed but not yet ticked.
    accumulator: Duration,
    /// Total ticks executed.
    tick_count: u64,
    /// Timing statistics.
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Ticks that took longer than their budget.
    pub late_ticks: u64,
    /// Ticks written off because the loop fell too far behind.
    pub skipped_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn fresh(tick_duration: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: micros(tick_duration),
            late_ticks: 0,
            skipped_ticks: 0,
            total_ticks: 0,
        }
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl TickLoop {
    /// Creates a loop running `tick_rate` times per second (at least once).
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_tick: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(tick_duration),
        }
    }

    /// Returns true if a tick is owed.
    ///
    /// Call this in a loop until it returns false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_tick);
        self.last_tick = now;

        self.accumulator >= self.tick_duration
    }

    /// Marks the start of a tick and pays one tick of debt.
    ///
    /// Returns the start time for [`TickLoop::end_tick`].
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Marks the end of a tick and records its duration.
    pub fn end_tick(&mut self, start: Instant) {
        let duration = start.elapsed();
        let duration_us = micros(duration);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + duration_us) / 16;

        if duration > self.tick_duration {
            self.stats.late_ticks += 1;
        }
    }

    /// Drops all owed time, counting the whole ticks lost.
    pub fn discard_backlog(&mut self) {
        let owed = self.accumulator.as_nanos() / self.tick_duration.as_nanos().max(1);
        self.stats.skipped_ticks += u64::try_from(owed).unwrap_or(u64::MAX);
        self.accumulator = Duration::ZERO;
    }

    /// Waits until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.last_tick.elapsed() + self.accumulator;
        if elapsed >= self.tick_duration {
            return;
        }
        let remaining = self.tick_duration - elapsed;

        if remaining > Duration::from_micros(1000) {
            std::thread::sleep(remaining - Duration::from_micros(500));
        }
        let deadline = Instant::now() + remaining.min(Duration::from_micros(500));
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }

    /// Returns the number of ticks begun.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns tick statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Returns the target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.tick_duration);
    }
}
