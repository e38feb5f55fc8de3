use anyhow::Result;
use tch::{Device, Tensor, nn, nn::Module};

use crate::networks::mlp::MLP;
use crate::networks::params;
use crate::policy::Policy;
use crate::utils::ToTensor;

/// Deterministic policy `μ(s)`: an MLP squashed by `tanh` and scaled to the action bound.
pub struct Actor {
    net: MLP,
    action_bound: f64,
}

impl Actor {
    pub fn new(
        vs: nn::VarStore,
        observation_dim: usize,
        action_dim: usize,
        hidden_sizes: &[i64],
        action_bound: f32,
    ) -> Self {
        let net = MLP::new(vs, observation_dim as i64, hidden_sizes, action_dim as i64);
        Actor {
            net,
            action_bound: action_bound as f64,
        }
    }

    /// `[batch, obs_dim] -> [batch, action_dim]`
    pub fn forward(&self, observations: &Tensor) -> Tensor {
        self.net.model.forward(observations).tanh() * self.action_bound
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Actor {
            net: self.net.try_clone()?,
            action_bound: self.action_bound,
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

    pub fn action_dim(&self) -> usize {
        self.net.output_dim() as usize
    }

    pub fn action_bound(&self) -> f32 {
        self.action_bound as f32
    }
}

impl Policy<[f32], Vec<f32>> for Actor {
    fn select_action(&self, state: &[f32]) -> Result<Vec<f32>> {
        let _no_grad_guard = tch::no_grad_guard();
        let obs = state.to_tensor().to(self.device());
        let action = self.forward(&obs).flatten(0, -1).to(Device::Cpu);
        Ok(Vec::<f32>::try_from(&action)?)
    }
}
