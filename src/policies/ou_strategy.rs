use anyhow::{Result, ensure};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

use super::{ExplorationStrategy, clip_action};
use crate::policy::Policy;

/// Ornstein-Uhlenbeck process noise, temporally correlated within an episode.
///
/// `x ← x + θ(μ − x) + σ·N(0, 1)`, restarted at `μ` on reset.
pub struct OUStrategy {
    mu: f32,
    theta: f32,
    sigma: f32,
    action_bound: f32,
    state: Vec<f32>,
    rng: StdRng,
}

impl OUStrategy {
    pub fn new(action_dim: usize, action_bound: f32) -> Self {
        Self::with_params(action_dim, action_bound, 0.0, 0.15, 0.3)
    }

    pub fn with_params(action_dim: usize, action_bound: f32, mu: f32, theta: f32, sigma: f32) -> Self {
        OUStrategy {
            mu,
            theta,
            sigma,
            action_bound,
            state: vec![mu; action_dim],
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed(seed);
        self
    }

    pub fn state(&self) -> &[f32] {
        &self.state
    }

    fn evolve_state(&mut self) -> &[f32] {
        for x in self.state.iter_mut() {
            let noise: f32 = StandardNormal.sample(&mut self.rng);
            *x += self.theta * (self.mu - *x) + self.sigma * noise;
        }
        &self.state
    }
}

impl ExplorationStrategy for OUStrategy {
    fn get_action(
        &mut self,
        _step: usize,
        observation: &[f32],
        policy: &dyn Policy<[f32], Vec<f32>>,
    ) -> Result<Vec<f32>> {
        let mut action = policy.select_action(observation)?;
        ensure!(
            action.len() == self.state.len(),
            "policy produced {} action values, OU process has {}",
            action.len(),
            self.state.len()
        );
        let noise = self.evolve_state().to_vec();
        for (a, n) in action.iter_mut().zip(noise) {
            *a += n;
        }
        clip_action(&mut action, self.action_bound);
        Ok(action)
    }

    fn reset(&mut self) {
        self.state.fill(self.mu);
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstPolicy(Vec<f32>);

    impl Policy<[f32], Vec<f32>> for ConstPolicy {
        fn select_action(&self, _state: &[f32]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn reset_returns_state_to_mean() {
        let mut es = OUStrategy::with_params(2, 1.0, 0.5, 0.15, 0.3).seeded(3);
        let policy = ConstPolicy(vec![0.0, 0.0]);
        for step in 0..10 {
            es.get_action(step, &[0.0], &policy).unwrap();
        }
        assert!(es.state().iter().any(|&x| x != 0.5));
        es.reset();
        assert_eq!(es.state(), &[0.5, 0.5]);
    }

    #[test]
    fn actions_stay_within_bound() {
        let mut es = OUStrategy::with_params(3, 0.5, 0.0, 0.15, 5.0).seeded(11);
        let policy = ConstPolicy(vec![0.4, -0.4, 0.0]);
        for step in 0..50 {
            let action = es.get_action(step, &[0.0], &policy).unwrap();
            assert!(action.iter().all(|a| a.abs() <= 0.5));
        }
    }

    #[test]
    fn same_seed_gives_same_noise() {
        let policy = ConstPolicy(vec![0.0, 0.0]);
        let mut a = OUStrategy::new(2, 1.0);
        let mut b = OUStrategy::new(2, 1.0);
        a.seed(5);
        b.seed(5);
        for step in 0..20 {
            assert_eq!(
                a.get_action(step, &[0.0], &policy).unwrap(),
                b.get_action(step, &[0.0], &policy).unwrap()
            );
        }
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let mut es = OUStrategy::new(2, 1.0);
        let policy = ConstPolicy(vec![0.0]);
        assert!(es.get_action(0, &[0.0], &policy).is_err());
    }
}
