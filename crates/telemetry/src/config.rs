//! Configuration for the tracing pipeline

use serde::{Deserialize, Serialize};

use crate::detect::SpanExporterKind;

/// Prefix for registry-specific span attributes.
pub const ATTRIBUTE_PREFIX: &str = "io.registry.";

/// Default sampling ratio: record every span.
pub const DEFAULT_SAMPLING_RATIO: f64 = 1.0;

/// Configuration for telemetry/tracing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every emitted span
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Service version attached to every emitted span
    #[serde(default = "default_service_version")]
    pub service_version: String,

    /// Span exporter to combine with the log-backed exporter;
    /// overridden by `OTEL_TRACES_EXPORTER` when set
    #[serde(default)]
    pub exporter: SpanExporterKind,

    /// OTLP endpoint URL (e.g., "http://localhost:4317" for gRPC);
    /// overridden by `OTEL_EXPORTER_OTLP_ENDPOINT` when set
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Sampling ratio (0.0 - 1.0)
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,

    /// OTLP export timeout in seconds
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,

    /// Maximum batch size for trace export
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Maximum number of finished spans queued before batching drops them
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Log level filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

const fn default_sampling_ratio() -> f64 {
    DEFAULT_SAMPLING_RATIO
}

const fn default_export_timeout() -> u64 {
    30
}

const fn default_max_batch_size() -> usize {
    512
}

const fn default_max_queue_size() -> usize {
    2048
}

fn default_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "registry".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_log_filter() -> String {
    "registry=info,telemetry=info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_version: default_service_version(),
            exporter: SpanExporterKind::default(),
            endpoint: default_endpoint(),
            sampling_ratio: default_sampling_ratio(),
            export_timeout_secs: default_export_timeout(),
            max_batch_size: default_max_batch_size(),
            max_queue_size: default_max_queue_size(),
            log_filter: default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "registry");
        assert_eq!(config.service_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.exporter, SpanExporterKind::Otlp);
        assert_eq!(config.endpoint, "http://localhost:4317");
        assert!((config.sampling_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.export_timeout_secs, 30);
        assert_eq!(config.max_batch_size, 512);
        assert_eq!(config.max_queue_size, 2048);
    }

    #[test]
    fn test_config_serialization() {
        let config = TelemetryConfig {
            service_name: "test-registry".to_string(),
            service_version: "3.0.0".to_string(),
            exporter: SpanExporterKind::Console,
            endpoint: "http://tempo:4317".to_string(),
            sampling_ratio: 0.5,
            export_timeout_secs: 60,
            max_batch_size: 1024,
            max_queue_size: 4096,
            log_filter: "debug".to_string(),
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: TelemetryConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.service_name, "test-registry");
        assert_eq!(parsed.service_version, "3.0.0");
        assert_eq!(parsed.exporter, SpanExporterKind::Console);
        assert_eq!(parsed.endpoint, "http://tempo:4317");
        assert!((parsed.sampling_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(parsed.export_timeout_secs, 60);
        assert_eq!(parsed.max_batch_size, 1024);
        assert_eq!(parsed.max_queue_size, 4096);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let json = r#"{"endpoint": "http://collector:4317"}"#;
        let parsed: TelemetryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.endpoint, "http://collector:4317");
        assert_eq!(parsed.exporter, SpanExporterKind::Otlp);
        assert_eq!(parsed.service_name, "registry");
    }

    #[test]
    fn test_exporter_kind_deserializes_lowercase() {
        let json = r#"{"exporter": "none"}"#;
        let parsed: TelemetryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.exporter, SpanExporterKind::None);
    }
}
