/// Fire-and-forget progress sink. Returning `false` means the update could
/// not be shown; algorithms log it and keep going.
pub trait Progress: Sync {
    fn update(&self, fraction: f32) -> bool;
}

/// Discards every update.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&self, _fraction: f32) -> bool { true }
}

impl<F> Progress for F
where
    F: Fn(f32) -> bool + Sync,
{
    fn update(&self, fraction: f32) -> bool { self(fraction) }
}

/// Reports `done / total` clamped to `[0, 1]`.
pub fn report(progress: &dyn Progress, done: usize, total: usize) {
    let fraction = if total == 0 { 1.0 } else { (done as f32 / total as f32).min(1.0) };
    if !progress.update(fraction) {
        log::warn!("progress update rejected at {:.1}%", fraction * 100.0);
    }
}
