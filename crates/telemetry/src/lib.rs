//! Distributed tracing bootstrap for the registry service
//!
//! Builds the OpenTelemetry pipeline once at process start: a resource
//! descriptor identifying the service, an auto-detected span exporter
//! (OTLP by default) fanned out together with a log-backed exporter,
//! wrapped in a batch processor and installed as the global tracer
//! provider alongside W3C trace-context and baggage propagation.

pub mod composite;
pub mod config;
pub mod detect;
pub mod error;
pub mod init;
pub mod log_exporter;

pub use composite::CompositeSpanExporter;
pub use config::{ATTRIBUTE_PREFIX, DEFAULT_SAMPLING_RATIO, TelemetryConfig};
pub use detect::{OTLP_ENDPOINT_ENV, SpanExporterKind, TRACES_EXPORTER_ENV, detect_exporter_kind};
pub use error::TelemetryError;
pub use init::{TelemetryGuard, build_tracer_provider, init_telemetry};
pub use log_exporter::{LogSpanExporter, LoggerWriter};
