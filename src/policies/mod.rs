//! Exploration strategies: noise added on top of the deterministic policy while collecting data.

pub mod gaussian_strategy;
pub mod ou_strategy;

use anyhow::Result;

use crate::policy::Policy;

pub use gaussian_strategy::GaussianStrategy;
pub use ou_strategy::OUStrategy;

pub trait ExplorationStrategy {
    /// Noisy action for `observation` at global step `step`.
    fn get_action(
        &mut self,
        step: usize,
        observation: &[f32],
        policy: &dyn Policy<[f32], Vec<f32>>,
    ) -> Result<Vec<f32>>;

    /// Called at every episode boundary.
    fn reset(&mut self) {}

    /// Reseed the noise source.
    fn seed(&mut self, _seed: u64) {}
}

fn clip_action(action: &mut [f32], bound: f32) {
    for a in action.iter_mut() {
        *a = a.clamp(-bound, bound);
    }
}
