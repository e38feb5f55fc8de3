//! Persistence of DDPG parameters at epoch boundaries.
//!
//! Layout of one snapshot directory:
//!
//! ```text
//! actor.ot  critic.ot  target_actor.ot  target_critic.ot  metadata.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tch::nn;

use crate::algorithms::ddpg::stats::EvalStats;
use crate::config::DdpgConfig;

pub const ACTOR_FILE: &str = "actor.ot";
pub const CRITIC_FILE: &str = "critic.ot";
pub const TARGET_ACTOR_FILE: &str = "target_actor.ot";
pub const TARGET_CRITIC_FILE: &str = "target_critic.ot";
pub const METADATA_FILE: &str = "metadata.json";

/// Borrowed view of everything worth persisting after an epoch.
pub struct DdpgSnapshot<'a> {
    pub epoch: usize,
    pub actor: &'a nn::VarStore,
    pub critic: &'a nn::VarStore,
    pub target_actor: &'a nn::VarStore,
    pub target_critic: &'a nn::VarStore,
    pub config: &'a DdpgConfig,
    pub stats: Option<&'a EvalStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub epoch: usize,
    pub config: DdpgConfig,
    pub stats: Option<EvalStats>,
}

/// Sink for per-epoch parameter snapshots.
pub trait Snapshotter {
    fn save_itr_params(&mut self, epoch: usize, snapshot: &DdpgSnapshot<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotMode {
    /// One directory per epoch, `itr_<epoch>`
    All,
    /// A single `params` directory overwritten every epoch
    Last,
    None,
}

pub struct DirectorySnapshotter {
    dir: PathBuf,
    mode: SnapshotMode,
}

impl DirectorySnapshotter {
    pub fn new(dir: impl Into<PathBuf>, mode: SnapshotMode) -> Result<Self> {
        let dir = dir.into();
        if mode != SnapshotMode::None {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating snapshot directory {}", dir.display()))?;
        }
        Ok(Self { dir, mode })
    }

    pub fn snapshot_dir(&self, epoch: usize) -> Option<PathBuf> {
        match self.mode {
            SnapshotMode::All => Some(self.dir.join(format!("itr_{epoch}"))),
            SnapshotMode::Last => Some(self.dir.join("params")),
            SnapshotMode::None => None,
        }
    }
}

impl Snapshotter for DirectorySnapshotter {
    fn save_itr_params(&mut self, epoch: usize, snapshot: &DdpgSnapshot<'_>) -> Result<()> {
        let Some(dir) = self.snapshot_dir(epoch) else {
            return Ok(());
        };
        write_snapshot(&dir, snapshot)?;
        tracing::debug!(epoch, path = %dir.display(), "saved snapshot");
        Ok(())
    }
}

/// Write all four parameter stores and the metadata file into `dir`.
pub fn write_snapshot(dir: &Path, snapshot: &DdpgSnapshot<'_>) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    snapshot.actor.save(dir.join(ACTOR_FILE))?;
    snapshot.critic.save(dir.join(CRITIC_FILE))?;
    snapshot.target_actor.save(dir.join(TARGET_ACTOR_FILE))?;
    snapshot.target_critic.save(dir.join(TARGET_CRITIC_FILE))?;

    let metadata = SnapshotMetadata {
        epoch: snapshot.epoch,
        config: snapshot.config.clone(),
        stats: snapshot.stats.cloned(),
    };
    fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(&metadata)?)?;
    Ok(())
}

pub fn read_metadata(dir: &Path) -> Result<SnapshotMetadata> {
    let path = dir.join(METADATA_FILE);
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;
    use tempfile::tempdir;

    fn store() -> nn::VarStore {
        let vs = nn::VarStore::new(Device::Cpu);
        vs.root().var("w", &[2], nn::Init::Const(1.0));
        vs
    }

    #[test]
    fn modes_choose_directories() {
        let tmp = tempdir().unwrap();
        let all = DirectorySnapshotter::new(tmp.path(), SnapshotMode::All).unwrap();
        assert_eq!(all.snapshot_dir(3), Some(tmp.path().join("itr_3")));
        let last = DirectorySnapshotter::new(tmp.path(), SnapshotMode::Last).unwrap();
        assert_eq!(last.snapshot_dir(3), Some(tmp.path().join("params")));
        let none = DirectorySnapshotter::new(tmp.path(), SnapshotMode::None).unwrap();
        assert_eq!(none.snapshot_dir(3), None);
    }

    #[test]
    fn writes_files_and_metadata() {
        let tmp = tempdir().unwrap();
        let (a, c, ta, tc) = (store(), store(), store(), store());
        let config = DdpgConfig::default();
        let snapshot = DdpgSnapshot {
            epoch: 7,
            actor: &a,
            critic: &c,
            target_actor: &ta,
            target_critic: &tc,
            config: &config,
            stats: None,
        };
        let mut snapshotter = DirectorySnapshotter::new(tmp.path(), SnapshotMode::All).unwrap();
        snapshotter.save_itr_params(7, &snapshot).unwrap();

        let dir = tmp.path().join("itr_7");
        for file in [ACTOR_FILE, CRITIC_FILE, TARGET_ACTOR_FILE, TARGET_CRITIC_FILE] {
            assert!(dir.join(file).exists(), "{file} missing");
        }
        let metadata = read_metadata(&dir).unwrap();
        assert_eq!(metadata.epoch, 7);
        assert_eq!(metadata.config, config);
    }
}
