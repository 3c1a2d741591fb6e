//! Log-backed span export
//!
//! [`LoggerWriter`] adapts a byte-stream write into a single debug-level
//! log event, and [`LogSpanExporter`] renders finished spans as text and
//! pushes them through such a writer. Together they give local debug
//! visibility of every exported batch without touching stdout directly.

use std::fmt;
use std::io::{self, Write};

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use parking_lot::Mutex;
use tracing::debug;

/// Writer that forwards every buffer as one debug-level log event.
///
/// The whole buffer is always considered consumed and no error is ever
/// reported; whether anyone sees the event is up to the installed
/// tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggerWriter;

impl LoggerWriter {
    pub const fn new() -> Self {
        Self
    }
}

impl Write for LoggerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        debug!(target: "telemetry::spans", "{}", String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Span exporter that serializes each batch to text and writes it in a
/// single call to the underlying writer, so one exported batch becomes
/// one log entry.
#[derive(Debug)]
pub struct LogSpanExporter<W = LoggerWriter> {
    writer: Mutex<W>,
}

impl LogSpanExporter<LoggerWriter> {
    pub fn new() -> Self {
        Self::with_writer(LoggerWriter::new())
    }
}

impl Default for LogSpanExporter<LoggerWriter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> LogSpanExporter<W>
where
    W: Write + Send + fmt::Debug,
{
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    fn write_batch(&self, batch: &[SpanData]) -> OTelSdkResult {
        if batch.is_empty() {
            return Ok(());
        }

        let mut text = String::with_capacity(batch.len() * 96);
        for span in batch {
            let duration = span
                .end_time
                .duration_since(span.start_time)
                .unwrap_or_default();
            text.push_str(&format!(
                "{} trace_id={} span_id={} kind={:?} status={:?} duration={}us attributes={}\n",
                span.name,
                span.span_context.trace_id(),
                span.span_context.span_id(),
                span.span_kind,
                span.status,
                duration.as_micros(),
                span.attributes.len(),
            ));
        }

        let mut writer = self.writer.lock();
        writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|err| OTelSdkError::InternalFailure(err.to_string()))
    }
}

impl<W> SpanExporter for LogSpanExporter<W>
where
    W: Write + Send + fmt::Debug,
{
    fn export(
        &self,
        batch: Vec<SpanData>,
    ) -> impl std::future::Future<Output = OTelSdkResult> + Send {
        std::future::ready(self.write_batch(&batch))
    }

    fn shutdown_with_timeout(&mut self, _timeout: std::time::Duration) -> OTelSdkResult {
        self.force_flush()
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.writer
            .lock()
            .flush()
            .map_err(|err| OTelSdkError::InternalFailure(err.to_string()))
    }
}
