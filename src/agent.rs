use std::path::Path;

use anyhow::Result;

use crate::environment::Environment;

pub trait Agent<E: Environment> {
    type Report;

    /// 完整训练流程（所有 epoch）
    fn train(&mut self, env: &mut E) -> Result<()>;

    // 评估当前策略（无探索噪声）
    fn evaluate(&mut self, env: &mut E, epoch: usize) -> Result<Self::Report>;

    fn save(&self, dir: &Path) -> Result<()>;

    fn load(&mut self, dir: &Path) -> Result<()>;
}
