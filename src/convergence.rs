//! Gelman-Rubin R-hat convergence diagnostic (§4.8).
//!
//! Splits a metric's recent history into `n_chains` contiguous chains of
//! `chain_length` blocks each and compares between-chain variance to
//! within-chain variance. R-hat near 1.0 means the chains are
//! statistically indistinguishable from one another, i.e. the run has
//! settled into steady state.

use std::collections::HashMap;

use crate::circular_buffer::CircularBuffer;
use crate::history::{HistoryStore, Metric};

pub const DEFAULT_CONVERGENCE_METRICS: [Metric; 5] = [
    Metric::VehicleTimeP1,
    Metric::VehicleTimeP2,
    Metric::VehicleTimeP3,
    Metric::TripWaitTime,
    Metric::TripDistance,
];

#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    n_chains: usize,
    chain_length: usize,
    convergence_threshold: f64,
    total_length: usize,
    current_rhat_values: HashMap<Metric, f64>,
    max_rhat: Option<f64>,
    worst_metric: Option<Metric>,
    is_converged: bool,
}

impl Default for ConvergenceTracker {
    fn default() -> Self {
        Self::new(4, 50, 1.1)
    }
}

impl ConvergenceTracker {
    pub fn new(n_chains: usize, chain_length: usize, convergence_threshold: f64) -> Self {
        Self {
            n_chains,
            chain_length,
            convergence_threshold,
            total_length: n_chains * chain_length,
            current_rhat_values: HashMap::new(),
            max_rhat: None,
            worst_metric: None,
            is_converged: false,
        }
    }

    /// R-hat for a single metric's buffer, or `None` if the buffer's
    /// capacity is smaller than `n_chains * chain_length`.
    pub fn compute_rhat(&self, buffer: &CircularBuffer) -> Option<f64> {
        if buffer.capacity() < self.total_length {
            return None;
        }
        let ordered = buffer.ordered();
        let recent = &ordered[ordered.len() - self.total_length..];

        let chain_means: Vec<f64> = recent
            .chunks(self.chain_length)
            .map(|chain| chain.iter().sum::<f64>() / chain.len() as f64)
            .collect();

        let chain_variances: Vec<f64> = recent
            .chunks(self.chain_length)
            .map(sample_variance)
            .collect();

        let b = self.chain_length as f64 * sample_variance(&chain_means);
        let w = chain_variances.iter().sum::<f64>() / chain_variances.len() as f64;

        let var_plus = ((self.chain_length - 1) as f64 / self.chain_length as f64) * w
            + b / self.chain_length as f64;

        if w > 0.0 {
            Some((var_plus / w).sqrt())
        } else if b == 0.0 {
            Some(1.0)
        } else {
            None
        }
    }

    /// Recompute R-hat for every metric in `metrics` from `history`'s
    /// results-window buffers, and update the tracker's verdict.
    pub fn update(&mut self, history: &HistoryStore, metrics: &[Metric]) -> &HashMap<Metric, f64> {
        let mut values = HashMap::new();
        for &metric in metrics {
            if let Some(rhat) = self.compute_rhat(history.results(metric)) {
                values.insert(metric, rhat);
            }
        }

        if values.is_empty() {
            self.max_rhat = None;
            self.worst_metric = None;
            self.is_converged = false;
        } else {
            let (&worst_metric, &max_rhat) = values
                .iter()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .expect("non-empty");
            self.max_rhat = Some(max_rhat);
            self.worst_metric = Some(worst_metric);
            self.is_converged = max_rhat < self.convergence_threshold;
        }

        self.current_rhat_values = values;
        &self.current_rhat_values
    }

    pub fn check_convergence(&self) -> (bool, Option<f64>, Option<Metric>) {
        (self.is_converged, self.max_rhat, self.worst_metric)
    }

    pub fn rhat_values(&self) -> &HashMap<Metric, f64> {
        &self.current_rhat_values
    }
}

fn sample_variance(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean = data.iter().sum::<f64>() / n;
    data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_converges_to_one() {
        let mut buf = CircularBuffer::new(200);
        for _ in 0..200 {
            buf.push(3.0);
        }
        let tracker = ConvergenceTracker::new(4, 50, 1.1);
        let rhat = tracker.compute_rhat(&buf).expect("enough data");
        assert!((rhat - 1.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_data_returns_none() {
        let buf = CircularBuffer::new(10);
        let tracker = ConvergenceTracker::new(4, 50, 1.1);
        assert!(tracker.compute_rhat(&buf).is_none());
    }

    #[test]
    fn noisy_series_has_finite_rhat() {
        let mut buf = CircularBuffer::new(200);
        for i in 0..200 {
            let v = if i % 2 == 0 { 1.0 } else { 5.0 };
            buf.push(v);
        }
        let tracker = ConvergenceTracker::new(4, 50, 1.1);
        let rhat = tracker.compute_rhat(&buf).expect("enough data");
        assert!(rhat.is_finite() && rhat > 0.0);
    }
}
