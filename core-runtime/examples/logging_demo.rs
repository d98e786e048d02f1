//! Logging setup for a sign-in host.
//!
//! Run with:
//! ```bash
//! cargo run -p core-runtime --example logging_demo
//! cargo run -p core-runtime --example logging_demo -- json
//! cargo run -p core-runtime --example logging_demo -- compact "core_auth=trace"
//! ```

use bridge_traits::{ConsoleLogger, LogLevel};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_logger_sink(Arc::new(ConsoleLogger {
            min_level: LogLevel::Info,
        }));

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    init_logging(config)?;
    info!(format = ?format, "Logging initialized");

    let bus = EventBus::default();
    let mut events = bus.subscribe();

    simulate_sign_in(&bus, "u1", "user@example.com").await;

    while let Ok(event) = events.try_recv() {
        info!(event = event.description(), "Delivered to subscriber");
    }

    Ok(())
}

#[instrument(skip(bus, email))]
async fn simulate_sign_in(bus: &EventBus, user_id: &str, email: &str) {
    bus.emit(CoreEvent::Auth(AuthEvent::SignInStarted)).ok();
    debug!(attempt = "attempt-1", "Provider flow started");

    // The sink layer redacts these when mirroring to the host logger.
    info!(
        email = %redact_if_sensitive("email", email),
        access_token = %redact_if_sensitive("access_token", "ya29.secret"),
        "Provider returned credentials"
    );

    bus.emit(CoreEvent::Auth(AuthEvent::CredentialsAvailable {
        user_id: user_id.to_string(),
    }))
    .ok();
    bus.emit(CoreEvent::Auth(AuthEvent::SignInCompleted { auto_sign_in: false }))
        .ok();

    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    warn!("Refresh failed, keeping current credentials");
}
