//! Error types for telemetry initialization

use thiserror::Error;

/// Error type for telemetry initialization and shutdown
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the tracing subscriber
    #[error("Failed to initialize tracing: {0}")]
    Init(String),

    /// Failed to create a span exporter
    #[error("Failed to create span exporter: {0}")]
    Exporter(String),

    /// Unknown value for the span exporter selection
    #[error("Unsupported span exporter {0:?}")]
    UnsupportedExporter(String),

    /// Failed to flush or shut down the tracer provider
    #[error("Failed to shut down tracer provider: {0}")]
    Shutdown(String),
}
