//! Span exporter auto-detection
//!
//! Resolves which exporter to pair with the log-backed sink from the
//! standard OpenTelemetry environment variables, falling back to the
//! configured values when the environment is silent.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use opentelemetry_otlp::WithExportConfig;
use serde::{Deserialize, Serialize};

use crate::composite::CompositeSpanExporter;
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;

/// Environment variable selecting the span exporter (`otlp`, `console`,
/// `none`).
pub const TRACES_EXPORTER_ENV: &str = "OTEL_TRACES_EXPORTER";

/// Environment variable overriding the OTLP endpoint.
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Which exporter the auto-detection resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanExporterKind {
    /// OTLP over gRPC to the configured endpoint
    #[default]
    Otlp,
    /// Human-readable output on stdout
    Console,
    /// No auto-configured exporter; only the log-backed sink runs
    None,
}

impl FromStr for SpanExporterKind {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "otlp" => Ok(Self::Otlp),
            "console" | "stdout" => Ok(Self::Console),
            "none" => Ok(Self::None),
            other => Err(TelemetryError::UnsupportedExporter(other.to_string())),
        }
    }
}

impl fmt::Display for SpanExporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Otlp => f.write_str("otlp"),
            Self::Console => f.write_str("console"),
            Self::None => f.write_str("none"),
        }
    }
}

/// Resolves the exporter kind, preferring `OTEL_TRACES_EXPORTER` over the
/// configured value. Unknown values are a construction error, not a
/// silent fallback.
pub fn detect_exporter_kind(config: &TelemetryConfig) -> Result<SpanExporterKind, TelemetryError> {
    resolve_kind(env::var(TRACES_EXPORTER_ENV).ok().as_deref(), config.exporter)
}

fn resolve_kind(
    env_value: Option<&str>,
    fallback: SpanExporterKind,
) -> Result<SpanExporterKind, TelemetryError> {
    match env_value {
        Some(value) if !value.trim().is_empty() => value.trim().parse(),
        _ => Ok(fallback),
    }
}

fn resolve_endpoint(env_value: Option<&str>, fallback: &str) -> String {
    match env_value {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => fallback.to_string(),
    }
}

/// Outcome of the auto-detection: which exporter to build and, for OTLP,
/// where to send spans. Resolved from the environment exactly once so the
/// rest of the bootstrap stays independent of ambient process state.
#[derive(Debug, Clone)]
pub(crate) struct ExporterSelection {
    pub(crate) kind: SpanExporterKind,
    pub(crate) endpoint: String,
}

impl ExporterSelection {
    pub(crate) fn from_env(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        Ok(Self {
            kind: detect_exporter_kind(config)?,
            endpoint: resolve_endpoint(
                env::var(OTLP_ENDPOINT_ENV).ok().as_deref(),
                &config.endpoint,
            ),
        })
    }
}

/// Builds the selected exporter and appends it to the composite.
/// `None` contributes nothing; the composite still carries the
/// log-backed sink added by the bootstrap.
pub(crate) fn attach_selected_exporter(
    composite: &mut CompositeSpanExporter,
    selection: &ExporterSelection,
    config: &TelemetryConfig,
) -> Result<(), TelemetryError> {
    match selection.kind {
        SpanExporterKind::Otlp => composite.push(build_otlp_exporter(
            selection.endpoint.clone(),
            Duration::from_secs(config.export_timeout_secs),
        )?),
        SpanExporterKind::Console => composite.push(opentelemetry_stdout::SpanExporter::default()),
        SpanExporterKind::None => {}
    }
    Ok(())
}

fn build_otlp_exporter(
    endpoint: String,
    timeout: Duration,
) -> Result<opentelemetry_otlp::SpanExporter, TelemetryError> {
    opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(timeout)
        .build()
        .map_err(|err| TelemetryError::Exporter(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_exporter_names() {
        assert_eq!("otlp".parse::<SpanExporterKind>().unwrap(), SpanExporterKind::Otlp);
        assert_eq!(
            "console".parse::<SpanExporterKind>().unwrap(),
            SpanExporterKind::Console
        );
        assert_eq!(
            "stdout".parse::<SpanExporterKind>().unwrap(),
            SpanExporterKind::Console
        );
        assert_eq!("none".parse::<SpanExporterKind>().unwrap(), SpanExporterKind::None);
        assert_eq!("OTLP".parse::<SpanExporterKind>().unwrap(), SpanExporterKind::Otlp);
    }

    #[test]
    fn rejects_unknown_exporter_names() {
        let err = "jaeger".parse::<SpanExporterKind>().unwrap_err();
        assert!(matches!(err, TelemetryError::UnsupportedExporter(name) if name == "jaeger"));
    }

    #[test]
    fn environment_wins_over_configured_kind() {
        let kind = resolve_kind(Some("console"), SpanExporterKind::Otlp).unwrap();
        assert_eq!(kind, SpanExporterKind::Console);
    }

    #[test]
    fn blank_environment_falls_back_to_configured_kind() {
        assert_eq!(
            resolve_kind(None, SpanExporterKind::None).unwrap(),
            SpanExporterKind::None
        );
        assert_eq!(
            resolve_kind(Some("  "), SpanExporterKind::Console).unwrap(),
            SpanExporterKind::Console
        );
    }

    #[test]
    fn endpoint_prefers_environment_value() {
        assert_eq!(
            resolve_endpoint(Some("http://collector:4317"), "http://localhost:4317"),
            "http://collector:4317"
        );
        assert_eq!(
            resolve_endpoint(None, "http://localhost:4317"),
            "http://localhost:4317"
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for kind in [
            SpanExporterKind::Otlp,
            SpanExporterKind::Console,
            SpanExporterKind::None,
        ] {
            assert_eq!(kind.to_string().parse::<SpanExporterKind>().unwrap(), kind);
        }
    }
}
