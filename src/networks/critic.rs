use anyhow::Result;
use tch::{Device, Tensor, nn, nn::Module};

use crate::networks::mlp::MLP;
use crate::networks::params;

/// Action-value function `Q(s, a)`; observation and action are concatenated at the input.
pub struct Critic {
    net: MLP,
}

impl Critic {
    pub fn new(vs: nn::VarStore, observation_dim: usize, action_dim: usize, hidden_sizes: &[i64]) -> Self {
        let net = MLP::new(vs, (observation_dim + action_dim) as i64, hidden_sizes, 1);
        Critic { net }
    }

    /// `([batch, obs_dim], [batch, action_dim]) -> [batch, 1]`
    pub fn forward(&self, observations: &Tensor, actions: &Tensor) -> Tensor {
        let xs = Tensor::cat(&[observations, actions], 1);
        self.net.model.forward(&xs)
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Critic {
            net: self.net.try_clone()?,
        })
    }

    pub fn var_store(&self) -> &nn::VarStore {
        self.net.var_store()
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        self.net.var_store_mut()
    }

    pub fn param_values(&self) -> Result<Vec<f32>> {
        params::param_values(self.var_store())
    }

    pub fn set_param_values(&mut self, values: &[f32]) -> Result<()> {
        params::set_param_values(self.var_store_mut(), values)
    }

    pub fn device(&self) -> Device {
        self.net.device()
    }
}
