pub mod config;
pub mod db;
pub mod events; // Patient event log + windowed queries
pub mod models;
pub mod patients;
pub mod persistence;
pub mod protocols; // Escalation protocols + criterion grammar
pub mod tasks; // Follow-up and escalation queue
pub mod tools; // Conversational tool surface
pub mod triage; // Decision engine + symptom workflow

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Logs go to stderr so stdout stays reserved for tool responses.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("TriageCore starting v{}", config::APP_VERSION);
}
