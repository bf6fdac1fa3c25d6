//! Rolling history of per-block scalar metrics.
//!
//! Every tracked metric gets three [`CircularBuffer`]s at three
//! different window lengths — one for the UI-facing smoothing window,
//! one for end-of-run results, one for the equilibration controller —
//! all three fed the same value every block. Keeping three separate
//! buffers per metric is redundant (the narrower windows are suffixes
//! of the widest one) but it keeps each consumer's window length
//! independent without the consumer having to know how to slice a
//! wider buffer, matching the data model this crate's grid and
//! dispatch semantics are ported from.

use crate::circular_buffer::CircularBuffer;

/// Every scalar pushed into the history store once per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    VehicleCount,
    VehicleTime,
    VehicleTimeP1,
    VehicleTimeP2,
    VehicleTimeP3,
    TripCount,
    TripCompletedCount,
    TripRequestRate,
    TripWaitTime,
    TripUnassignedTime,
    TripAwaitingTime,
    TripRidingTime,
    TripDistance,
    TripPrice,
    TripForwardDispatchCount,
}

pub const ALL_METRICS: [Metric; 15] = [
    Metric::VehicleCount,
    Metric::VehicleTime,
    Metric::VehicleTimeP1,
    Metric::VehicleTimeP2,
    Metric::VehicleTimeP3,
    Metric::TripCount,
    Metric::TripCompletedCount,
    Metric::TripRequestRate,
    Metric::TripWaitTime,
    Metric::TripUnassignedTime,
    Metric::TripAwaitingTime,
    Metric::TripRidingTime,
    Metric::TripDistance,
    Metric::TripPrice,
    Metric::TripForwardDispatchCount,
];

fn index(metric: Metric) -> usize {
    metric as usize
}

impl Metric {
    /// The metric name as it appears in the flat per-block state map
    /// (spec.md §6) and in serialized results.
    pub fn name(self) -> &'static str {
        match self {
            Metric::VehicleCount => "VEHICLE_COUNT",
            Metric::VehicleTime => "VEHICLE_TIME",
            Metric::VehicleTimeP1 => "VEHICLE_TIME_P1",
            Metric::VehicleTimeP2 => "VEHICLE_TIME_P2",
            Metric::VehicleTimeP3 => "VEHICLE_TIME_P3",
            Metric::TripCount => "TRIP_COUNT",
            Metric::TripCompletedCount => "TRIP_COMPLETED_COUNT",
            Metric::TripRequestRate => "TRIP_REQUEST_RATE",
            Metric::TripWaitTime => "TRIP_WAIT_TIME",
            Metric::TripUnassignedTime => "TRIP_UNASSIGNED_TIME",
            Metric::TripAwaitingTime => "TRIP_AWAITING_TIME",
            Metric::TripRidingTime => "TRIP_RIDING_TIME",
            Metric::TripDistance => "TRIP_DISTANCE",
            Metric::TripPrice => "TRIP_PRICE",
            Metric::TripForwardDispatchCount => "TRIP_FORWARD_DISPATCH_COUNT",
        }
    }
}

struct MetricHistory {
    /// Narrow window kept for live/UI smoothing.
    buffer: CircularBuffer,
    /// Window used for end-of-run derived measures (§4.7).
    results: CircularBuffer,
    /// Window used by the equilibration controller (§4.9).
    equilibration: CircularBuffer,
}

pub struct HistoryStore {
    smoothing_window: usize,
    results_window: usize,
    equilibration_interval: usize,
    metrics: Vec<MetricHistory>,
}

impl HistoryStore {
    pub fn new(smoothing_window: usize, results_window: usize, equilibration_interval: usize) -> Self {
        let metrics = ALL_METRICS
            .iter()
            .map(|_| MetricHistory {
                buffer: CircularBuffer::new(smoothing_window),
                results: CircularBuffer::new(results_window),
                equilibration: CircularBuffer::new(equilibration_interval),
            })
            .collect();
        Self {
            smoothing_window,
            results_window,
            equilibration_interval,
            metrics
        }
    }

    pub fn push(&mut self, metric: Metric, value: f64) {
        let h = &mut self.metrics[index(metric)];
        h.buffer.push(value);
        h.results.push(value);
        h.equilibration.push(value);
    }

    pub fn results(&self, metric: Metric) -> &CircularBuffer {
        &self.metrics[index(metric)].results
    }

    pub fn buffer(&self, metric: Metric) -> &CircularBuffer {
        &self.metrics[index(metric)].buffer
    }

    pub fn equilibration(&self, metric: Metric) -> &CircularBuffer {
        &self.metrics[index(metric)].equilibration
    }

    pub fn smoothing_window(&self) -> usize {
        self.smoothing_window
    }

    pub fn results_window(&self) -> usize {
        self.results_window
    }

    pub fn equilibration_interval(&self) -> usize {
        self.equilibration_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_reaches_all_three_windows() {
        let mut store = HistoryStore::new(3, 5, 2);
        store.push(Metric::TripCount, 1.0);
        store.push(Metric::TripCount, 2.0);
        assert_eq!(store.buffer(Metric::TripCount).sum(), 3.0);
        assert_eq!(store.results(Metric::TripCount).sum(), 3.0);
        assert_eq!(store.equilibration(Metric::TripCount).sum(), 3.0);
    }

    #[test]
    fn other_metrics_unaffected() {
        let mut store = HistoryStore::new(3, 5, 2);
        store.push(Metric::TripCount, 7.0);
        assert_eq!(store.results(Metric::VehicleCount).sum(), 0.0);
    }
}
