use rayon::prelude::*;
use roofline_core::config::PancakeConfig;
use roofline_core::{Cloud, Result};

/// Keeps points whose horizontal distance to `cfg.center` is at most
/// `cfg.radius`. Every scalar layer is carried along with its points.
pub fn pancake_cut(input: &Cloud, cfg: &PancakeConfig) -> Result<Cloud> {
    cfg.validate()?;
    let [cx, cy] = cfg.center;
    let r2 = cfg.radius * cfg.radius;
    let keep: Vec<bool> = (0..input.len())
        .into_par_iter()
        .map(|i| {
            let dx = input.x[i] as f64 - cx;
            let dy = input.y[i] as f64 - cy;
            dx * dx + dy * dy <= r2
        })
        .collect();

    // check alignment up front so a bad layer fails before any copying
    let names = input.layer_names();
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(input.layer(name)?);
    }

    let kept = keep.iter().filter(|&&k| k).count();
    let mut out = Cloud::default();
    out.reserve(kept);
    let mut layers_out: Vec<Vec<f32>> = vec![Vec::with_capacity(kept); names.len()];
    for i in 0..input.len() {
        if keep[i] {
            out.push(input.x[i], input.y[i], input.z[i]);
            for (col, dst) in columns.iter().zip(layers_out.iter_mut()) {
                dst.push(col[i]);
            }
        }
    }
    for (name, values) in names.iter().zip(layers_out) {
        out.set_layer(name, values)?;
    }

    log::info!("pancake cut: {} -> {} points (r={})", input.len(), out.len(), cfg.radius);
    Ok(out)
}
