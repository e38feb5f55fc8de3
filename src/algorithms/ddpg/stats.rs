//! Per-update and per-epoch training statistics

use serde::{Deserialize, Serialize};

use crate::utils::{mean, std_dev};

/// Diagnostics of a single critic/actor update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStats {
    /// Critic mean-squared TD error
    pub qf_loss: f64,
    /// Actor objective, `-mean(Q(s, μ(s)))`
    pub policy_surr: f64,
    pub q_mean: f64,
    pub abs_q_mean: f64,
    pub y_mean: f64,
    pub abs_y_mean: f64,
    pub abs_qy_diff_mean: f64,
}

/// Running collection of [`UpdateStats`] between two evaluations.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccumulator {
    updates: Vec<UpdateStats>,
}

impl UpdateAccumulator {
    pub fn push(&mut self, stats: UpdateStats) {
        self.updates.push(stats);
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn clear(&mut self) {
        self.updates.clear();
    }

    fn average(&self, field: impl Fn(&UpdateStats) -> f64) -> f64 {
        mean(&self.updates.iter().map(field).collect::<Vec<_>>())
    }

    pub fn averaged(&self) -> UpdateStats {
        UpdateStats {
            qf_loss: self.average(|s| s.qf_loss),
            policy_surr: self.average(|s| s.policy_surr),
            q_mean: self.average(|s| s.q_mean),
            abs_q_mean: self.average(|s| s.abs_q_mean),
            y_mean: self.average(|s| s.y_mean),
            abs_y_mean: self.average(|s| s.abs_y_mean),
            abs_qy_diff_mean: self.average(|s| s.abs_qy_diff_mean),
        }
    }
}

/// Report produced at the end of an epoch by the noise-free evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalStats {
    pub epoch: usize,
    pub num_paths: usize,
    pub num_samples: usize,
    pub average_return: f64,
    pub std_return: f64,
    pub max_return: f64,
    pub min_return: f64,
    /// Mean return of the exploration episodes finished since the last report
    pub average_es_return: f64,
    pub updates: UpdateStats,
    pub num_updates: usize,
    pub average_abs_action: f64,
    pub policy_param_norm: f64,
    pub qf_param_norm: f64,
}

/// Return summary `(average, std, max, min)` of a set of path returns.
pub fn summarize_returns(returns: &[f64]) -> (f64, f64, f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let max = returns.iter().cloned().fold(f64::MIN, f64::max);
    let min = returns.iter().cloned().fold(f64::MAX, f64::min);
    (mean(returns), std_dev(returns), max, min)
}
