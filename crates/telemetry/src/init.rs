//! One-shot tracing bootstrap
//!
//! Builds the exporter fan-out, batch processor and tracer provider from
//! a [`TelemetryConfig`], installs the provider and the trace-context +
//! baggage propagators as process-wide defaults, and hands ownership of
//! the pipeline back to the caller as a [`TelemetryGuard`].

use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions as semconv;
use tracing::info;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::composite::CompositeSpanExporter;
use crate::config::TelemetryConfig;
use crate::detect;
use crate::error::TelemetryError;
use crate::log_exporter::LogSpanExporter;

/// Guard that shuts down the tracer provider when dropped
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Flushes all pending spans without shutting the pipeline down.
    pub fn force_flush(&self) -> Result<(), TelemetryError> {
        match &self.provider {
            Some(provider) => provider
                .force_flush()
                .map_err(|err| TelemetryError::Shutdown(err.to_string())),
            None => Ok(()),
        }
    }

    /// Flushes and shuts down the pipeline, consuming the guard.
    /// Dropping the guard performs the same shutdown but swallows the
    /// outcome.
    pub fn shutdown(mut self) -> Result<(), TelemetryError> {
        match self.provider.take() {
            Some(provider) => provider
                .shutdown()
                .map_err(|err| TelemetryError::Shutdown(err.to_string())),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("active", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::error!("Failed to shutdown tracer provider: {:?}", e);
            }
        }
    }
}

fn build_resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(
                    semconv::resource::SERVICE_NAME,
                    config.service_name.clone(),
                ),
                KeyValue::new(
                    semconv::resource::SERVICE_VERSION,
                    config.service_version.clone(),
                ),
            ],
            semconv::SCHEMA_URL,
        )
        .build()
}

fn sampler_for(ratio: f64) -> Sampler {
    if (ratio - 1.0).abs() < f64::EPSILON {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

/// Builds the tracer provider without touching any global state, so
/// multiple instances can coexist in tests.
///
/// The pipeline is: detected exporter (OTLP/console/none) and the
/// log-backed exporter fanned out behind one composite, wrapped in a
/// batch processor, owned by a provider carrying the service resource
/// and the ratio sampler.
///
/// # Errors
///
/// Returns the exporter construction error unchanged; nothing is
/// installed in that case.
pub fn build_tracer_provider(
    config: &TelemetryConfig,
) -> Result<SdkTracerProvider, TelemetryError> {
    let selection = detect::ExporterSelection::from_env(config)?;
    build_provider_with(config, &selection)
}

fn build_provider_with(
    config: &TelemetryConfig,
    selection: &detect::ExporterSelection,
) -> Result<SdkTracerProvider, TelemetryError> {
    let resource = build_resource(config);

    let mut composite = CompositeSpanExporter::new();
    detect::attach_selected_exporter(&mut composite, selection, config)?;
    composite.push(LogSpanExporter::new());

    let batch_config = BatchConfigBuilder::default()
        .with_max_queue_size(config.max_queue_size)
        .with_max_export_batch_size(config.max_batch_size)
        .build();
    let processor = BatchSpanProcessor::builder(composite)
        .with_batch_config(batch_config)
        .build();

    let provider = SdkTracerProvider::builder()
        .with_span_processor(processor)
        .with_sampler(sampler_for(config.sampling_ratio))
        .with_resource(resource)
        .build();

    Ok(provider)
}

/// Initialize telemetry with the given configuration
///
/// Builds the span pipeline, installs the tracing subscriber and the
/// process-wide tracer provider and propagator, and returns a guard that
/// must be kept alive for the duration of the application. When the
/// guard is dropped, the tracer provider is shut down and pending traces
/// are flushed.
///
/// Expected to run at most once per process; global installation is
/// last-write-wins with no locking discipline beyond what the SDK
/// provides.
///
/// # Example
///
/// ```ignore
/// use telemetry::{TelemetryConfig, init_telemetry};
///
/// fn main() {
///     let config = TelemetryConfig::default();
///     let _guard = init_telemetry(&config).expect("Failed to initialize telemetry");
///
///     // Application code...
/// }
/// ```
///
/// # Errors
///
/// Returns the first construction error encountered; no global state is
/// mutated on failure.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let selection = detect::ExporterSelection::from_env(config)?;
    init_with_selection(config, &selection)
}

fn init_with_selection(
    config: &TelemetryConfig,
    selection: &detect::ExporterSelection,
) -> Result<TelemetryGuard, TelemetryError> {
    let provider = build_provider_with(config, selection)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let tracer = provider.tracer(config.service_name.clone());
    let otel_layer = OpenTelemetryLayer::new(tracer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    info!(
        service = %config.service_name,
        version = %config.service_version,
        sampling = %config.sampling_ratio,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{Span, Tracer};

    use crate::detect::{ExporterSelection, SpanExporterKind};

    use super::*;

    fn selection(kind: SpanExporterKind, endpoint: &str) -> ExporterSelection {
        ExporterSelection {
            kind,
            endpoint: endpoint.to_string(),
        }
    }

    #[test]
    fn sampler_maps_ratio_one_to_always_on() {
        assert!(matches!(sampler_for(1.0), Sampler::AlwaysOn));
    }

    #[test]
    fn sampler_maps_non_positive_ratio_to_always_off() {
        assert!(matches!(sampler_for(0.0), Sampler::AlwaysOff));
        assert!(matches!(sampler_for(-0.5), Sampler::AlwaysOff));
    }

    #[test]
    fn sampler_maps_fractional_ratio_to_ratio_based() {
        match sampler_for(0.25) {
            Sampler::TraceIdRatioBased(ratio) => assert!((ratio - 0.25).abs() < f64::EPSILON),
            other => panic!("unexpected sampler {other:?}"),
        }
    }

    #[test]
    fn builds_provider_without_an_auto_exporter() {
        let config = TelemetryConfig::default();
        let provider = build_provider_with(
            &config,
            &selection(SpanExporterKind::None, &config.endpoint),
        )
        .unwrap();
        provider.shutdown().unwrap();
    }

    #[test]
    fn rejects_an_invalid_otlp_endpoint() {
        let config = TelemetryConfig::default();
        let err = build_provider_with(
            &config,
            &selection(SpanExporterKind::Otlp, "definitely not a uri"),
        )
        .unwrap_err();
        assert!(matches!(err, TelemetryError::Exporter(_)));
    }

    #[test]
    fn failed_init_installs_no_globals() {
        let config = TelemetryConfig::default();
        let err = init_with_selection(
            &config,
            &selection(SpanExporterKind::Otlp, "definitely not a uri"),
        )
        .unwrap_err();
        assert!(matches!(err, TelemetryError::Exporter(_)));

        // Tracer provider slot still holds the noop default, which hands
        // out spans with an invalid context.
        let span = global::tracer("startup-check").start("startup");
        assert!(!span.span_context().is_valid());

        // Subscriber slot is still free.
        assert!(tracing_subscriber::registry().try_init().is_ok());
    }

    #[test]
    fn guard_without_a_provider_is_inert() {
        let guard = TelemetryGuard { provider: None };
        assert!(guard.force_flush().is_ok());
        assert!(guard.shutdown().is_ok());
    }

    #[test]
    fn guard_drop_without_a_provider_does_not_panic() {
        let guard = TelemetryGuard { provider: None };
        drop(guard);
    }
}
