use roofline_core::Cloud;

/// Appends an `nx` × `ny` unit-spaced horizontal grid with its lower corner at
/// `(x0, y0)`, returning the index range it occupies.
pub fn push_grid(cloud: &mut Cloud, x0: f32, y0: f32, z: f32, nx: usize, ny: usize) -> std::ops::Range<usize> {
    assert!(nx > 0 && ny > 0, "grid dimensions must be positive");
    let start = cloud.len();
    for i in 0..nx {
        for j in 0..ny {
            cloud.push(x0 + i as f32, y0 + j as f32, z);
        }
    }
    start..cloud.len()
}

/// Four corners of the `z = 0` plane.
pub fn ground_reference() -> Vec<[f64; 3]> {
    vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0], [100.0, 100.0, 0.0]]
}
