#![allow(dead_code)]

pub mod mock_http_client;
pub mod mock_server;

/// Route flow logs to the test harness. Set `RUST_LOG=authflow=debug` to
/// see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
