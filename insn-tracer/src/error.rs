//! Session-level errors

use thiserror::Error;

/// Errors surfaced to the caller of a trace session.
///
/// Examine failures and interrupts are not errors: they end the session
/// normally and are reported through [`crate::StopReason`].
#[derive(Debug, Error)]
pub enum TraceError {
    /// Rejected before any session state or output file exists
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The debugger failed while the trace window was being armed
    #[error("setup failed while {stage}: {source}")]
    Setup {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("trace sink: {0}")]
    Sink(#[from] std::io::Error),

    #[error("serializing trace document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The ctrl+c handler could not be installed
    #[error("installing interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// The writer or session was driven out of order
    #[error("trace session misuse: {0}")]
    Misuse(&'static str),
}
