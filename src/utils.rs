use anyhow::{Result, anyhow};
use tch::{Device, Tensor};

pub trait ToTensor {
    fn to_tensor(&self) -> Tensor;
}

impl ToTensor for [f32] {
    fn to_tensor(&self) -> Tensor {
        Tensor::from_slice(self).unsqueeze(0)
    }
}

/// Row-major `rows x cols` buffer as a `[rows, cols]` tensor on `device`.
pub fn batch_tensor(data: &[f32], rows: usize, cols: usize, device: Device) -> Tensor {
    Tensor::from_slice(data)
        .view([rows as i64, cols as i64])
        .to_device(device)
}

/// Per-sample scalars as a `[rows, 1]` column.
pub fn column_tensor(data: &[f32], device: Device) -> Tensor {
    Tensor::from_slice(data).to_device(device).unsqueeze(1)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn plot_rewards(rewards: &[f32], filename: &str, title: &str) -> Result<()> {
    use plotters::prelude::*;

    if rewards.is_empty() {
        return Err(anyhow!("no rewards to plot"));
    }

    let root = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow!("{e}"))?;

    // 回报可能为负，上下界都要从数据中取
    let max_reward = rewards.iter().cloned().fold(f32::MIN, f32::max);
    let min_reward = rewards.iter().cloned().fold(f32::MAX, f32::min);
    let (lo, hi) = if max_reward > min_reward {
        (min_reward, max_reward)
    } else {
        (min_reward - 1.0, max_reward + 1.0)
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 32).into_font())
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..rewards.len(), lo..hi)
        .map_err(|e| anyhow!("{e}"))?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc("Average Return")
        .axis_desc_style(("sans-serif", 22))
        .label_style(("sans-serif", 18))
        .light_line_style(&WHITE.mix(0.3))
        .draw()
        .map_err(|e| anyhow!("{e}"))?;

    chart
        .draw_series(LineSeries::new(
            rewards.iter().enumerate().map(|(i, r)| (i, *r)),
            &BLUE,
        ))
        .map_err(|e| anyhow!("{e}"))?
        .label("Return")
        .legend(|(x, y)| PathElement::new([(x, y), (x + 20, y)], BLUE));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 18))
        .draw()
        .map_err(|e| anyhow!("{e}"))?;

    root.present().map_err(|e| anyhow!("{e}"))?;
    tracing::info!("Saved training plot to {}", filename);
    Ok(())
}
