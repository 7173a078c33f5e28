pub mod synthetic_cloud;

/// Routes `log` output through the test harness; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
