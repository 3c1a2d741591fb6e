//! Fan-out span exporter
//!
//! Presents an ordered list of span exporters as a single exporter so the
//! batch processor stays unaware that spans are duplicated to multiple
//! sinks. Export and shutdown continue past individual sink failures:
//! the remote collector being unreachable must not suppress the local
//! debug sink, and vice versa.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{SpanData, SpanExporter};

/// Object-safe view of [`SpanExporter`], which itself is not
/// dyn-compatible because `export` returns an opaque future.
#[async_trait]
pub(crate) trait DynSpanExporter: Send + Sync + fmt::Debug {
    async fn export_batch(&self, batch: Vec<SpanData>) -> OTelSdkResult;
    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult;
    fn force_flush(&mut self) -> OTelSdkResult;
    fn set_resource(&mut self, resource: &Resource);
}

#[async_trait]
impl<E> DynSpanExporter for E
where
    E: SpanExporter + Send + Sync + fmt::Debug,
{
    async fn export_batch(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        SpanExporter::export(self, batch).await
    }

    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult {
        SpanExporter::shutdown_with_timeout(self, timeout)
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        SpanExporter::force_flush(self)
    }

    fn set_resource(&mut self, resource: &Resource) {
        SpanExporter::set_resource(self, resource);
    }
}

/// Span exporter that multiplexes every call to an ordered list of
/// underlying exporters.
///
/// Holds no state besides the exporter list: no buffering and no
/// deduplication. A batch is forwarded unmodified to every exporter in
/// the order they were added, regardless of individual outcomes; an
/// error is returned only if at least one exporter failed.
#[derive(Debug, Default)]
pub struct CompositeSpanExporter {
    exporters: Vec<Box<dyn DynSpanExporter>>,
}

impl CompositeSpanExporter {
    pub fn new() -> Self {
        Self {
            exporters: Vec::new(),
        }
    }

    /// Appends an exporter; it will be invoked after all previously
    /// added exporters.
    pub fn push(&mut self, exporter: impl SpanExporter + 'static) {
        self.exporters.push(Box::new(exporter));
    }

    /// Builder-style variant of [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, exporter: impl SpanExporter + 'static) -> Self {
        self.push(exporter);
        self
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }
}

/// Folds the failures collected across all sinks into a single result:
/// no failures is success, a single failure is returned as-is, and
/// several failures are merged into one `InternalFailure`.
fn combine_errors(mut errors: Vec<OTelSdkError>) -> OTelSdkResult {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => {
            let combined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(OTelSdkError::InternalFailure(combined))
        }
    }
}

impl SpanExporter for CompositeSpanExporter {
    fn export(
        &self,
        batch: Vec<SpanData>,
    ) -> impl std::future::Future<Output = OTelSdkResult> + Send {
        async move {
            let mut errors = Vec::new();
            // The last exporter takes the batch by value; only the
            // preceding ones need a clone.
            if let Some((last, rest)) = self.exporters.split_last() {
                for exporter in rest {
                    if let Err(err) = exporter.export_batch(batch.clone()).await {
                        errors.push(err);
                    }
                }
                if let Err(err) = last.export_batch(batch).await {
                    errors.push(err);
                }
            }
            combine_errors(errors)
        }
    }

    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult {
        let mut errors = Vec::new();
        for exporter in &mut self.exporters {
            if let Err(err) = exporter.shutdown_with_timeout(timeout) {
                errors.push(err);
            }
        }
        combine_errors(errors)
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        let mut errors = Vec::new();
        for exporter in &mut self.exporters {
            if let Err(err) = exporter.force_flush() {
                errors.push(err);
            }
        }
        combine_errors(errors)
    }

    fn set_resource(&mut self, resource: &Resource) {
        for exporter in &mut self.exporters {
            exporter.set_resource(resource);
        }
    }
}
