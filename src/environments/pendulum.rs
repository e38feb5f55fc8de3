use std::f32::consts::PI;

use anyhow::{Result, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::environment::{Environment, StepResult};

const MAX_SPEED: f32 = 8.0;
const MAX_TORQUE: f32 = 2.0;
const DT: f32 = 0.05;
const G: f32 = 10.0;
const M: f32 = 1.0;
const L: f32 = 1.0;

/// Inverted pendulum swing-up, observation `[cos θ, sin θ, θ_dot]`.
///
/// Never terminates on its own; episodes are cut by the trainer's path limit.
#[derive(Debug, Clone)]
pub struct Pendulum {
    theta: f32,
    theta_dot: f32,
    rng: StdRng,
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

fn angle_normalize(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Pendulum {
    pub fn new() -> Self {
        Pendulum {
            theta: 0.0,
            theta_dot: 0.0,
            rng: StdRng::from_os_rng(),
        }
    }

    fn observation(&self) -> [f32; 3] {
        [self.theta.cos(), self.theta.sin(), self.theta_dot]
    }
}

impl Environment for Pendulum {
    type State = [f32; 3];
    type Reward = f32;

    fn reset(&mut self) -> Result<Self::State> {
        self.theta = self.rng.random_range(-PI..PI);
        self.theta_dot = self.rng.random_range(-1.0..1.0);
        Ok(self.observation())
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult<Self::State, Self::Reward>> {
        ensure!(action.len() == 1, "Pendulum expects 1 action value, got {}", action.len());
        let u = action[0].clamp(-MAX_TORQUE, MAX_TORQUE);
        let th = self.theta;
        let thdot = self.theta_dot;

        let cost = angle_normalize(th).powi(2) + 0.1 * thdot.powi(2) + 0.001 * u.powi(2);

        let new_thdot = (thdot + (3.0 * G / (2.0 * L) * th.sin() + 3.0 / (M * L * L) * u) * DT)
            .clamp(-MAX_SPEED, MAX_SPEED);
        self.theta = th + new_thdot * DT;
        self.theta_dot = new_thdot;

        Ok(StepResult {
            next_state: self.observation(),
            reward: -cost,
            done: false,
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn current_state(&self) -> Self::State {
        self.observation()
    }

    fn action_dim(&self) -> usize {
        1
    }

    fn state_dim(&self) -> usize {
        3
    }

    fn action_bound(&self) -> f32 {
        MAX_TORQUE
    }
}
