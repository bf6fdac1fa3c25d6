//! Optional per-phase block timing, structurally parallel to the
//! `SystemTimings`/`EventMetrics` pair this crate's block stepper is
//! modeled on, retargeted at the ten-step block loop instead of an
//! event queue.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct PhaseTiming {
    pub total_duration: Duration,
    pub call_count: u64,
}

impl PhaseTiming {
    pub fn record(&mut self, duration: Duration) {
        self.total_duration += duration;
        self.call_count += 1;
    }

    pub fn avg_duration(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.call_count as u32
        }
    }
}

/// Wall-clock time spent in each named phase of `next_block`, summed
/// across the whole run. Never populated unless the caller opts in via
/// `Simulation::with_profiling`; the stepper pays nothing for it
/// otherwise.
#[derive(Debug, Default)]
pub struct BlockTimings {
    timings: HashMap<&'static str, PhaseTiming>,
}

impl BlockTimings {
    pub fn record(&mut self, phase: &'static str, duration: Duration) {
        self.timings.entry(phase).or_default().record(duration);
    }

    pub fn get(&self, phase: &str) -> Option<&PhaseTiming> {
        self.timings.get(phase)
    }

    pub fn print_summary(&self) {
        println!("\n=== Block Phase Timing Summary ===");
        let mut entries: Vec<_> = self.timings.iter().collect();
        entries.sort_by(|a, b| b.1.total_duration.cmp(&a.1.total_duration));
        for (name, timing) in entries {
            println!(
                "{:24} | calls: {:6} | total: {:8.2}ms | avg: {:6.2}us",
                name,
                timing.call_count,
                timing.total_duration.as_secs_f64() * 1000.0,
                timing.avg_duration().as_secs_f64() * 1_000_000.0,
            );
        }
    }
}

/// Timer guard that records elapsed time into a [`BlockTimings`] on
/// drop, used to bracket one phase of `next_block`.
pub struct PhaseTimer<'a> {
    timings: Option<&'a mut BlockTimings>,
    phase: &'static str,
    start: Instant,
}

impl<'a> PhaseTimer<'a> {
    pub fn start(timings: Option<&'a mut BlockTimings>, phase: &'static str) -> Self {
        Self { timings, phase, start: Instant::now() }
    }
}

impl<'a> Drop for PhaseTimer<'a> {
    fn drop(&mut self) {
        if let Some(timings) = self.timings.as_deref_mut() {
            timings.record(self.phase, self.start.elapsed());
        }
    }
}
