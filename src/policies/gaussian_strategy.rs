use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use super::{ExplorationStrategy, clip_action};
use crate::policy::Policy;

/// Independent Gaussian noise whose scale decays linearly from `max_sigma` to
/// `min_sigma` over `decay_period` steps.
pub struct GaussianStrategy {
    max_sigma: f32,
    min_sigma: f32,
    decay_period: usize,
    action_bound: f32,
    rng: StdRng,
}

impl GaussianStrategy {
    pub fn new(action_bound: f32) -> Self {
        Self::with_params(action_bound, 1.0, 0.1, 1_000_000)
    }

    pub fn with_params(action_bound: f32, max_sigma: f32, min_sigma: f32, decay_period: usize) -> Self {
        GaussianStrategy {
            max_sigma,
            min_sigma,
            decay_period: decay_period.max(1),
            action_bound,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed(seed);
        self
    }

    pub fn sigma(&self, step: usize) -> f32 {
        let progress = (step as f32 / self.decay_period as f32).min(1.0);
        self.max_sigma - (self.max_sigma - self.min_sigma) * progress
    }
}

impl ExplorationStrategy for GaussianStrategy {
    fn get_action(
        &mut self,
        step: usize,
        observation: &[f32],
        policy: &dyn Policy<[f32], Vec<f32>>,
    ) -> Result<Vec<f32>> {
        let mut action = policy.select_action(observation)?;
        let normal = Normal::new(0.0_f32, self.sigma(step))?;
        for a in action.iter_mut() {
            *a += normal.sample(&mut self.rng);
        }
        clip_action(&mut action, self.action_bound);
        Ok(action)
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_decays_then_holds() {
        let es = GaussianStrategy::with_params(1.0, 1.0, 0.2, 100);
        assert_eq!(es.sigma(0), 1.0);
        assert!((es.sigma(50) - 0.6).abs() < 1e-6);
        assert!((es.sigma(100) - 0.2).abs() < 1e-6);
        assert!((es.sigma(10_000) - 0.2).abs() < 1e-6);
    }
}
