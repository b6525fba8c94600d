//! Span-style events around synthesis.
//!
//! Synthesis runs are short and synchronous, so spans here are reported as a
//! start/end pair through a [`TracingEmitter`] instead of being held open.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Attributes describing one stack's synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthSpanAttributes {
    /// Application name.
    pub app: Option<String>,
    /// Stack being synthesized.
    pub stack: Option<String>,
    /// `pipeline` or `resources`.
    pub kind: Option<String>,
    /// Number of resources in the template.
    pub resources: Option<usize>,
    /// SHA-256 of the rendered template.
    pub digest: Option<String>,
}

impl SynthSpanAttributes {
    /// Creates empty attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name.
    #[must_use]
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Sets the stack name and kind.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>, kind: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self.kind = Some(kind.into());
        self
    }

    /// Sets the resource count and digest once the template is rendered.
    #[must_use]
    pub fn with_result(mut self, resources: usize, digest: impl Into<String>) -> Self {
        self.resources = Some(resources);
        self.digest = Some(digest.into());
        self
    }

    /// Flattens into dotted attribute keys.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();

        if let Some(ref v) = self.app {
            attrs.insert("synth.app".to_string(), v.clone());
        }
        if let Some(ref v) = self.stack {
            attrs.insert("synth.stack".to_string(), v.clone());
        }
        if let Some(ref v) = self.kind {
            attrs.insert("synth.kind".to_string(), v.clone());
        }
        if let Some(v) = self.resources {
            attrs.insert("synth.resources".to_string(), v.to_string());
        }
        if let Some(ref v) = self.digest {
            attrs.insert("synth.digest".to_string(), v.clone());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

/// Receives span events.
pub trait TracingEmitter: Send + Sync {
    /// A span started.
    fn span_start(&self, name: &str, attributes: &BTreeMap<String, String>);

    /// A span finished.
    fn span_end(&self, name: &str, duration_ms: f64, attributes: &BTreeMap<String, String>);

    /// A span failed.
    fn span_error(&self, name: &str, error: &str, attributes: &BTreeMap<String, String>);
}

/// Drops every event.
#[derive(Debug, Clone, Default)]
pub struct NoOpTracingEmitter;

impl TracingEmitter for NoOpTracingEmitter {
    fn span_start(&self, _name: &str, _attributes: &BTreeMap<String, String>) {}
    fn span_end(&self, _name: &str, _duration_ms: f64, _attributes: &BTreeMap<String, String>) {}
    fn span_error(&self, _name: &str, _error: &str, _attributes: &BTreeMap<String, String>) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingTracingEmitter;

impl TracingEmitter for LoggingTracingEmitter {
    fn span_start(&self, name: &str, attributes: &BTreeMap<String, String>) {
        tracing::debug!(span_name = name, ?attributes, "Span started");
    }

    fn span_end(&self, name: &str, duration_ms: f64, attributes: &BTreeMap<String, String>) {
        tracing::info!(span_name = name, duration_ms, ?attributes, "Span ended");
    }

    fn span_error(&self, name: &str, error: &str, attributes: &BTreeMap<String, String>) {
        tracing::error!(span_name = name, error, ?attributes, "Span error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synth_span_attributes() {
        let attrs = SynthSpanAttributes::new()
            .with_app("demo")
            .with_stack("TestPipelineStack", "pipeline")
            .with_result(12, "abc");

        let flat = attrs.to_attributes();
        assert_eq!(flat.get("synth.app"), Some(&"demo".to_string()));
        assert_eq!(flat.get("synth.kind"), Some(&"pipeline".to_string()));
        assert_eq!(flat.get("synth.resources"), Some(&"12".to_string()));
        assert_eq!(flat.get("synth.digest"), Some(&"abc".to_string()));
    }

    #[test]
    fn test_empty_attributes() {
        assert!(SynthSpanAttributes::new().to_attributes().is_empty());
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("test_span");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.name(), "test_span");
        let duration = timer.finish();
        assert!(duration >= 10.0);
    }

    #[test]
    fn test_noop_emitter() {
        let emitter = NoOpTracingEmitter;
        emitter.span_start("test", &BTreeMap::new());
        emitter.span_end("test", 100.0, &BTreeMap::new());
        emitter.span_error("test", "error", &BTreeMap::new());
    }
}
