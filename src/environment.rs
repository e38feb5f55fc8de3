use anyhow::Result;

pub struct StepResult<S, R> {
    pub next_state: S,
    pub reward: R,
    pub done: bool,
}

/// Continuous-control environment.
///
/// States are flat `f32` vectors (anything viewable as `&[f32]`), actions are
/// `Vec<f32>` of length `action_dim()`.
pub trait Environment {
    type State: Clone + AsRef<[f32]>;
    type Reward: Copy + Into<f32>;

    fn reset(&mut self) -> Result<Self::State>;
    fn step(&mut self, action: &[f32]) -> Result<StepResult<Self::State, Self::Reward>>; // (next_state, reward, if_done)

    /// 释放环境资源
    fn terminate(&mut self) {}

    /// Reseed the initial-state distribution used by `reset`.
    fn seed(&mut self, _seed: u64) {}

    /// 获取当前状态
    fn current_state(&self) -> Self::State;

    /// 动作空间维度
    fn action_dim(&self) -> usize;

    /// 状态空间维度
    fn state_dim(&self) -> usize;

    /// Symmetric bound of every action component: actions live in `[-b, b]`.
    fn action_bound(&self) -> f32 {
        1.0
    }
}
