use anyhow::Result;
use tch::{Device, nn};

/// Fully connected ReLU network; owns the `VarStore` holding its weights.
pub struct MLP {
    pub model: nn::Sequential,
    pub var_store: nn::VarStore, // 👈 保存 VarStore 的所有权
    input_dim: i64,
    hidden_sizes: Vec<i64>,
    output_dim: i64,
}

impl MLP {
    pub fn new(vs: nn::VarStore, input_dim: i64, hidden_sizes: &[i64], output_dim: i64) -> Self {
        let model = {
            let root = vs.root();
            let mut model = nn::seq();
            let mut in_dim = input_dim;
            for (i, &hidden) in hidden_sizes.iter().enumerate() {
                model = model
                    .add(nn::linear(
                        &root / format!("layer{}", i + 1),
                        in_dim,
                        hidden,
                        Default::default(),
                    ))
                    .add_fn(|xs| xs.relu());
                in_dim = hidden;
            }
            model.add(nn::linear(&root / "output", in_dim, output_dim, Default::default()))
        };

        MLP {
            model,
            var_store: vs,
            input_dim,
            hidden_sizes: hidden_sizes.to_vec(),
            output_dim,
        }
    }

    /// Same architecture on a fresh `VarStore`, initialized with a copy of this network's weights.
    pub fn try_clone(&self) -> Result<Self> {
        let vs = nn::VarStore::new(self.device());
        let mut clone = MLP::new(vs, self.input_dim, &self.hidden_sizes, self.output_dim);
        clone.var_store.copy(&self.var_store)?;
        Ok(clone)
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.var_store
    }

    pub fn device(&self) -> Device {
        self.var_store.device()
    }

    pub fn input_dim(&self) -> i64 {
        self.input_dim
    }

    pub fn output_dim(&self) -> i64 {
        self.output_dim
    }
}
