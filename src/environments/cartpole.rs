use anyhow::{Result, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::environment::{Environment, StepResult};

/// 连续动作版 CartPole，状态维度为 [x, x_dot, theta, theta_dot]
///
/// The single action component in `[-1, 1]` is scaled to a horizontal force of
/// up to 10 N. Episodes end when the cart leaves the track or the pole tips past
/// 12 degrees; there is no built-in time limit.
#[derive(Debug, Clone)]
pub struct CartPole {
    pub state: [f32; 4],
    pub step_count: usize,
    rng: StdRng,
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new()
    }
}

impl CartPole {
    pub fn new() -> Self {
        Self {
            state: [0.0; 4],
            step_count: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    fn is_done(&self, state: &[f32; 4]) -> bool {
        let x = state[0];
        let theta = state[2];
        x.abs() > 2.4 || theta.abs() > 12.0_f32.to_radians()
    }
}

impl Environment for CartPole {
    type State = [f32; 4];
    type Reward = f32;

    fn reset(&mut self) -> Result<Self::State> {
        for x in self.state.iter_mut() {
            *x = self.rng.random_range(-0.05..0.05);
        }
        self.step_count = 0;
        Ok(self.state)
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult<Self::State, Self::Reward>> {
        ensure!(action.len() == 1, "CartPole expects 1 action value, got {}", action.len());
        let mut state = self.state;

        // 动力学参数
        let g = 9.8; // 重力加速度
        let m_c = 1.0; // 小车质量
        let m_p = 0.1; // 杆质量
        let l = 0.5; // 杆长度
        let dt = 0.02; // 时间步长

        let x = state[0];
        let x_dot = state[1];
        let theta = state[2];
        let theta_dot = state[3];

        // 动作力
        let force = action[0].clamp(-1.0, 1.0) * 10.0;

        // 动力学方程
        let costheta = theta.cos();
        let sintheta = theta.sin();
        let temp = (force + m_p * l * theta_dot.powi(2) * sintheta) / (m_c + m_p);
        let theta_acc = (g * sintheta - costheta * temp)
            / (l * (4.0 / 3.0 - m_p * costheta.powi(2) / (m_c + m_p)));
        let x_acc = temp - m_p * l * theta_acc * costheta / (m_c + m_p);

        state[0] = x + dt * x_dot;
        state[1] = x_dot + dt * x_acc;
        state[2] = theta + dt * theta_dot;
        state[3] = theta_dot + dt * theta_acc;

        self.step_count += 1;
        self.state = state;

        let done = self.is_done(&state);

        // 奖励函数
        let reward = 1.0 - (x.abs() / 2.4 + theta.abs() / 12.0_f32.to_radians());

        Ok(StepResult {
            next_state: state,
            reward: if done { 0.0 } else { reward },
            done,
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn current_state(&self) -> Self::State {
        self.state
    }

    fn action_dim(&self) -> usize {
        1 // horizontal force
    }

    fn state_dim(&self) -> usize {
        4 // [x, x_dot, theta, theta_dot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushing_one_way_eventually_terminates() {
        let mut env = CartPole::new();
        env.reset().unwrap();
        let mut steps = 0;
        loop {
            let result = env.step(&[1.0]).unwrap();
            steps += 1;
            if result.done {
                assert_eq!(result.reward, 0.0);
                break;
            }
            assert!(steps < 1000);
        }
    }

    #[test]
    fn seeded_reset_is_reproducible() {
        let mut a = CartPole::new();
        a.seed(4);
        let mut b = a.clone();
        assert_eq!(a.reset().unwrap(), b.reset().unwrap());
        assert!(a.state.iter().all(|x| x.abs() <= 0.05));
    }

    #[test]
    fn rejects_wrong_action_size() {
        let mut env = CartPole::new();
        env.reset().unwrap();
        assert!(env.step(&[0.0, 0.0]).is_err());
    }
}
