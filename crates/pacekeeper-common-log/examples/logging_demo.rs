//! Example demonstrating subscriber setup and the tracing log sink.

use pacekeeper_common_log::{
    debug, info, init, spans::request_span, warn, LogConfig, LogFormat, LogLevel, LogSink,
    TracingSink,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LogConfig {
        level: LogLevel::Debug,
        format: LogFormat::Compact,
        ..LogConfig::from_env()
    };
    init(config)?;

    info!("logging initialized");

    let span = request_span("rqr_demo0001", "call_demo", "GET", "https://example.com/");
    let _guard = span.enter();
    debug!(attempt = 1, "sending request");
    warn!(attempt = 1, "status 503, will retry");

    let sink = TracingSink::new("rqr_demo0001");
    sink.log_error("request to https://example.com/ failed after 1 attempt");

    Ok(())
}
