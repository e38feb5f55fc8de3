//! Flat parameter access and target tracking for `VarStore`s.
//!
//! Variables are always visited in name order so that flat vectors taken from
//! two stores with the same architecture line up element by element.

use anyhow::{Result, anyhow, ensure};
use tch::{Kind, Tensor, nn};

fn sorted_variables(vs: &nn::VarStore) -> Vec<(String, Tensor)> {
    let mut vars: Vec<(String, Tensor)> = vs.variables().into_iter().collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    vars
}

/// All parameters of `vs` concatenated into one vector.
pub fn param_values(vs: &nn::VarStore) -> Result<Vec<f32>> {
    let mut values = Vec::new();
    for (_, var) in sorted_variables(vs) {
        let flat = var.detach().to_kind(Kind::Float).flatten(0, -1);
        values.extend(Vec::<f32>::try_from(&flat)?);
    }
    Ok(values)
}

/// Overwrite every parameter of `vs` from a vector produced by [`param_values`].
pub fn set_param_values(vs: &mut nn::VarStore, values: &[f32]) -> Result<()> {
    let vars = sorted_variables(vs);
    let expected: usize = vars.iter().map(|(_, v)| v.numel()).sum();
    ensure!(
        values.len() == expected,
        "parameter vector has {} values, expected {}",
        values.len(),
        expected
    );

    let mut offset = 0;
    tch::no_grad(|| {
        for (_, mut var) in vars {
            let n = var.numel();
            let src = Tensor::from_slice(&values[offset..offset + n])
                .view(var.size().as_slice())
                .to_kind(var.kind())
                .to_device(var.device());
            var.copy_(&src);
            offset += n;
        }
    });
    Ok(())
}

/// `θ_target ← τ·θ_source + (1 − τ)·θ_target` for every variable.
pub fn soft_update(target: &mut nn::VarStore, source: &nn::VarStore, tau: f64) -> Result<()> {
    let source_vars = source.variables();
    tch::no_grad(|| {
        for (name, mut target_var) in target.variables() {
            let source_var = source_vars
                .get(&name)
                .ok_or_else(|| anyhow!("variable {name} missing from source network"))?;
            let blended = source_var * tau + &target_var * (1.0 - tau);
            target_var.copy_(&blended);
        }
        Ok(())
    })
}

/// L2 norm over all parameters.
pub fn param_norm(vs: &nn::VarStore) -> f64 {
    tch::no_grad(|| {
        vs.variables()
            .values()
            .map(|v| v.pow_tensor_scalar(2.0).sum(Kind::Double).double_value(&[]))
            .sum::<f64>()
            .sqrt()
    })
}
