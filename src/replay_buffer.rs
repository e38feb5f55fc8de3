use std::collections::VecDeque;

use anyhow::{Result, anyhow, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One environment step as stored for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Vec<f32>,
    pub action: Vec<f32>,
    pub reward: f32,
    pub next_observation: Vec<f32>,
    pub terminal: bool,
}

/// Mini-batch in row-major layout, one row per sampled transition.
#[derive(Debug, Clone)]
pub struct TransitionBatch {
    pub observations: Vec<f32>,
    pub actions: Vec<f32>,
    pub rewards: Vec<f32>,
    pub next_observations: Vec<f32>,
    /// 1.0 for terminal transitions, 0.0 otherwise
    pub terminals: Vec<f32>,
    pub batch_size: usize,
    pub observation_dim: usize,
    pub action_dim: usize,
}

impl TransitionBatch {
    pub fn from_transitions<'a, I>(transitions: I, observation_dim: usize, action_dim: usize) -> Self
    where
        I: IntoIterator<Item = &'a Transition>,
    {
        let mut batch = TransitionBatch {
            observations: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            next_observations: Vec::new(),
            terminals: Vec::new(),
            batch_size: 0,
            observation_dim,
            action_dim,
        };
        for t in transitions {
            batch.observations.extend_from_slice(&t.observation);
            batch.actions.extend_from_slice(&t.action);
            batch.rewards.push(t.reward);
            batch.next_observations.extend_from_slice(&t.next_observation);
            batch.terminals.push(if t.terminal { 1.0 } else { 0.0 });
            batch.batch_size += 1;
        }
        batch
    }
}

/// Fixed-capacity ring buffer of transitions; the oldest entry is evicted on overflow.
pub struct ReplayBuffer {
    storage: VecDeque<Transition>,
    capacity: usize,
    observation_dim: usize,
    action_dim: usize,
    rng: StdRng,
}

impl ReplayBuffer {
    pub fn new(capacity: usize, observation_dim: usize, action_dim: usize) -> Self {
        Self::with_rng(capacity, observation_dim, action_dim, StdRng::from_os_rng())
    }

    pub fn with_seed(capacity: usize, observation_dim: usize, action_dim: usize, seed: u64) -> Self {
        Self::with_rng(capacity, observation_dim, action_dim, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, observation_dim: usize, action_dim: usize, rng: StdRng) -> Self {
        ReplayBuffer {
            storage: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
            observation_dim,
            action_dim,
            rng,
        }
    }

    pub fn add_sample(
        &mut self,
        observation: &[f32],
        action: &[f32],
        reward: f32,
        next_observation: &[f32],
        terminal: bool,
    ) -> Result<()> {
        ensure!(
            observation.len() == self.observation_dim && next_observation.len() == self.observation_dim,
            "observation has {} values, replay buffer expects {}",
            observation.len(),
            self.observation_dim
        );
        ensure!(
            action.len() == self.action_dim,
            "action has {} values, replay buffer expects {}",
            action.len(),
            self.action_dim
        );

        // store memory
        if self.storage.len() >= self.capacity {
            self.storage.pop_front();
        }
        self.storage.push_back(Transition {
            observation: observation.to_vec(),
            action: action.to_vec(),
            reward,
            next_observation: next_observation.to_vec(),
            terminal,
        });
        Ok(())
    }

    /// Sample `batch_size` transitions uniformly, each index drawn independently.
    pub fn random_batch(&mut self, batch_size: usize) -> Result<TransitionBatch> {
        if self.storage.is_empty() {
            return Err(anyhow!("cannot sample from an empty replay buffer"));
        }
        let len = self.storage.len();
        let indices: Vec<usize> = (0..batch_size).map(|_| self.rng.random_range(0..len)).collect();
        Ok(TransitionBatch::from_transitions(
            indices.iter().map(|&i| &self.storage[i]),
            self.observation_dim,
            self.action_dim,
        ))
    }

    pub fn size(&self) -> usize {
        self.storage.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.storage.iter()
    }
}
