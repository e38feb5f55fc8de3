//! Train DDPG on the pendulum swing-up task.
//!
//! ```text
//! RUST_LOG=info cargo run --release --example train_pendulum [snapshot_dir]
//! ```

use anyhow::Result;
use ddpg_rl::agent::Agent;
use ddpg_rl::algorithms::ddpg::DdpgAgent;
use ddpg_rl::config::DdpgConfig;
use ddpg_rl::environment::Environment;
use ddpg_rl::environments::pendulum::Pendulum;
use ddpg_rl::policies::OUStrategy;
use ddpg_rl::snapshot::{DirectorySnapshotter, SnapshotMode};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let snapshot_dir = std::env::args().nth(1).unwrap_or_else(|| "ddpg_snapshots".to_string());

    let device = tch::Device::cuda_if_available();
    let mut env = Pendulum::new();
    let config = DdpgConfig::new()
        .n_epochs(50)
        .epoch_length(1000)
        .min_pool_size(1000)
        .max_path_length(200)
        .batch_size(64)
        .eval_samples(1000)
        .soft_target_tau(0.005)
        .hidden_sizes(vec![64, 64], vec![64, 64])
        .plot_path("ddpg_training.png");

    let es = OUStrategy::new(env.action_dim(), env.action_bound());
    let mut agent = DdpgAgent::new(&env, es, config, device)?
        .with_snapshotter(DirectorySnapshotter::new(&snapshot_dir, SnapshotMode::Last)?);

    agent.train(&mut env)?;

    if let Some(last) = agent.eval_history().last() {
        println!(
            "Final evaluation: epoch {} average return {:.2}",
            last.epoch, last.average_return
        );
    }
    Ok(())
}
