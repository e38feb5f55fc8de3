//! DDPG hyperparameters
//!
//! Defaults follow the usual DDPG settings for low-dimensional control tasks.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig};

/// Gradient optimizer used for one of the two networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UpdateMethod {
    #[default]
    Adam,
    Sgd,
    RmsProp,
}

impl UpdateMethod {
    /// Build an optimizer bound to every trainable variable of `vs`.
    pub fn build(
        self,
        vs: &nn::VarStore,
        learning_rate: f64,
        weight_decay: f64,
    ) -> Result<nn::Optimizer> {
        let opt = match self {
            UpdateMethod::Adam => nn::Adam {
                wd: weight_decay,
                ..Default::default()
            }
            .build(vs, learning_rate)?,
            UpdateMethod::Sgd => nn::Sgd {
                wd: weight_decay,
                ..Default::default()
            }
            .build(vs, learning_rate)?,
            UpdateMethod::RmsProp => nn::RmsProp {
                wd: weight_decay,
                ..Default::default()
            }
            .build(vs, learning_rate)?,
        };
        Ok(opt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdpgConfig {
    /// Transitions per mini-batch
    pub batch_size: usize,
    pub n_epochs: usize,
    /// Environment steps per epoch
    pub epoch_length: usize,
    /// Replay size required before updates, evaluation and snapshots start
    pub min_pool_size: usize,
    /// Replay buffer capacity
    pub replay_pool_size: usize,
    pub discount: f64,
    /// Episodes are cut after this many steps
    pub max_path_length: usize,

    pub qf_weight_decay: f64,
    pub qf_update_method: UpdateMethod,
    pub qf_learning_rate: f64,

    pub policy_weight_decay: f64,
    pub policy_update_method: UpdateMethod,
    pub policy_learning_rate: f64,

    /// Environment steps spent on each evaluation
    pub eval_samples: usize,
    /// Soft target tracking rate, in (0, 1]
    pub soft_target_tau: f64,
    pub n_updates_per_sample: usize,
    /// Multiplier applied to rewards before they are stored
    pub scale_reward: f32,
    /// Store the final transition of a truncated episode (marked terminal)
    pub include_horizon_terminal_transitions: bool,

    pub actor_hidden_sizes: Vec<i64>,
    pub critic_hidden_sizes: Vec<i64>,
    pub seed: Option<u64>,
    /// Write a chart of evaluation returns here at the end of training
    pub plot_path: Option<String>,
}

impl Default for DdpgConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            n_epochs: 200,
            epoch_length: 1000,
            min_pool_size: 10_000,
            replay_pool_size: 1_000_000,
            discount: 0.99,
            max_path_length: 250,
            qf_weight_decay: 0.0,
            qf_update_method: UpdateMethod::Adam,
            qf_learning_rate: 1e-3,
            policy_weight_decay: 0.0,
            policy_update_method: UpdateMethod::Adam,
            policy_learning_rate: 1e-4,
            eval_samples: 10_000,
            soft_target_tau: 0.001,
            n_updates_per_sample: 1,
            scale_reward: 1.0,
            include_horizon_terminal_transitions: false,
            actor_hidden_sizes: vec![32, 32],
            critic_hidden_sizes: vec![32, 32],
            seed: None,
            plot_path: None,
        }
    }
}

impl DdpgConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be positive"));
        }
        if self.epoch_length == 0 {
            return Err(anyhow!("epoch_length must be positive"));
        }
        if self.replay_pool_size == 0 {
            return Err(anyhow!("replay_pool_size must be positive"));
        }
        if self.min_pool_size > self.replay_pool_size {
            return Err(anyhow!(
                "min_pool_size ({}) exceeds replay_pool_size ({})",
                self.min_pool_size,
                self.replay_pool_size
            ));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(anyhow!("discount must be in [0, 1]"));
        }
        if self.max_path_length == 0 {
            return Err(anyhow!("max_path_length must be positive"));
        }
        if self.qf_learning_rate <= 0.0 || self.policy_learning_rate <= 0.0 {
            return Err(anyhow!("learning rates must be positive"));
        }
        if self.qf_weight_decay < 0.0 || self.policy_weight_decay < 0.0 {
            return Err(anyhow!("weight decay must be non-negative"));
        }
        if !(self.soft_target_tau > 0.0 && self.soft_target_tau <= 1.0) {
            return Err(anyhow!("soft_target_tau must be in (0, 1]"));
        }
        if self.n_updates_per_sample == 0 {
            return Err(anyhow!("n_updates_per_sample must be positive"));
        }
        if !self.scale_reward.is_finite() {
            return Err(anyhow!("scale_reward must be finite"));
        }
        if self.actor_hidden_sizes.iter().any(|&h| h <= 0)
            || self.critic_hidden_sizes.iter().any(|&h| h <= 0)
        {
            return Err(anyhow!("hidden layer sizes must be positive"));
        }
        Ok(())
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn epoch_length(mut self, epoch_length: usize) -> Self {
        self.epoch_length = epoch_length;
        self
    }

    pub fn min_pool_size(mut self, size: usize) -> Self {
        self.min_pool_size = size;
        self
    }

    pub fn replay_pool_size(mut self, size: usize) -> Self {
        self.replay_pool_size = size;
        self
    }

    pub fn discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn max_path_length(mut self, len: usize) -> Self {
        self.max_path_length = len;
        self
    }

    pub fn qf_optimizer(mut self, method: UpdateMethod, lr: f64, weight_decay: f64) -> Self {
        self.qf_update_method = method;
        self.qf_learning_rate = lr;
        self.qf_weight_decay = weight_decay;
        self
    }

    pub fn policy_optimizer(mut self, method: UpdateMethod, lr: f64, weight_decay: f64) -> Self {
        self.policy_update_method = method;
        self.policy_learning_rate = lr;
        self.policy_weight_decay = weight_decay;
        self
    }

    pub fn eval_samples(mut self, n: usize) -> Self {
        self.eval_samples = n;
        self
    }

    pub fn soft_target_tau(mut self, tau: f64) -> Self {
        self.soft_target_tau = tau;
        self
    }

    pub fn n_updates_per_sample(mut self, n: usize) -> Self {
        self.n_updates_per_sample = n;
        self
    }

    pub fn scale_reward(mut self, scale: f32) -> Self {
        self.scale_reward = scale;
        self
    }

    pub fn include_horizon_terminal_transitions(mut self, include: bool) -> Self {
        self.include_horizon_terminal_transitions = include;
        self
    }

    pub fn hidden_sizes(mut self, actor: Vec<i64>, critic: Vec<i64>) -> Self {
        self.actor_hidden_sizes = actor;
        self.critic_hidden_sizes = critic;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn plot_path(mut self, path: impl Into<String>) -> Self {
        self.plot_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DdpgConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_tau() {
        assert!(DdpgConfig::new().soft_target_tau(0.0).validate().is_err());
        assert!(DdpgConfig::new().soft_target_tau(1.5).validate().is_err());
        assert!(DdpgConfig::new().soft_target_tau(1.0).validate().is_ok());
    }

    #[test]
    fn rejects_warmup_larger_than_capacity() {
        let config = DdpgConfig::new().replay_pool_size(100).min_pool_size(101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_discount_and_batch() {
        assert!(DdpgConfig::new().discount(1.2).validate().is_err());
        assert!(DdpgConfig::new().batch_size(0).validate().is_err());
    }

    #[test]
    fn every_update_method_takes_a_decayed_step() {
        for method in [UpdateMethod::Adam, UpdateMethod::Sgd, UpdateMethod::RmsProp] {
            let vs = nn::VarStore::new(tch::Device::Cpu);
            let w = vs.root().var("w", &[3], nn::Init::Const(1.0));
            let mut opt = method.build(&vs, 0.1, 0.01).unwrap();

            let loss = (&w * &w).sum(tch::Kind::Float);
            opt.backward_step(&loss);

            let after = Vec::<f32>::try_from(&w.detach()).unwrap();
            assert!(after.iter().all(|&v| v < 1.0), "{method:?} did not descend: {after:?}");
        }
    }

    #[test]
    fn serde_round_trip_keeps_update_method() {
        let config = DdpgConfig::new().qf_optimizer(UpdateMethod::RmsProp, 5e-4, 0.01);
        let json = serde_json::to_string(&config).unwrap();
        let back: DdpgConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
