//! InstrumentedTool - wraps a tool with execution events and latency alarms

use std::sync::Arc;
use std::time::Instant;

use tracing::{instrument, warn};

use contracts::{BusError, Tool};
use event_bus::EventBus;

use crate::events::SystemEvent;

/// A tool decorated with start/complete/error events.
///
/// Preserves the wrapped tool's external contract exactly; callers only
/// notice the events. Events are emitted asynchronously so instrumentation
/// never blocks the tool itself.
pub struct InstrumentedTool<T> {
    inner: T,
    bus: Arc<EventBus<SystemEvent>>,
    source: String,
}

impl<T: Tool> InstrumentedTool<T> {
    pub fn wrap(inner: T, bus: Arc<EventBus<SystemEvent>>) -> Self {
        let source = format!("tool:{}", inner.name());
        Self { inner, bus, source }
    }

    /// Unwrap, returning the inner tool.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn emit(&self, event: SystemEvent) {
        // Queue-full drops are the bus's concern; instrumentation stays silent
        let _ = self.bus.publish_async(event);
    }

    fn check_latency(&self, duration_ms: f64) {
        let target_ms = self.bus.config().max_latency_ms as f64;
        if duration_ms > target_ms {
            warn!(
                tool = self.inner.name(),
                duration_ms,
                target_ms,
                "tool execution over latency target"
            );
            self.emit(SystemEvent::performance_alert(
                &self.source,
                format!("tool:{}:duration_ms", self.inner.name()),
                duration_ms,
                target_ms,
            ));
        }
    }
}

impl<T: Tool + Sync> Tool for InstrumentedTool<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn input_schema(&self) -> &serde_json::Value {
        self.inner.input_schema()
    }

    #[instrument(name = "instrumented_tool_execute", skip(self, params), fields(tool = self.inner.name()))]
    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, BusError> {
        self.emit(SystemEvent::tool_start(
            &self.source,
            self.inner.name(),
            params.clone(),
        ));
        let started = Instant::now();

        match self.inner.execute(params).await {
            Ok(result) => {
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.emit(SystemEvent::tool_complete(
                    &self.source,
                    self.inner.name(),
                    duration_ms,
                    result.clone(),
                ));
                self.check_latency(duration_ms);
                Ok(result)
            }
            Err(err) => {
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.emit(SystemEvent::tool_failed(
                    &self.source,
                    self.inner.name(),
                    duration_ms,
                    err.to_string(),
                ));
                // Re-raise the original error unchanged
                Err(err)
            }
        }
    }
}
