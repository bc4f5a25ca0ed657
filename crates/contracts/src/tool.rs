//! Tool trait - instrumentable callable interface
//!
//! Defines the abstract interface for tools the integration layer can wrap.

use crate::BusError;

/// Callable tool contract
///
/// A wrapped tool preserves this exact shape; callers cannot distinguish a
/// wrapped tool from an unwrapped one except by observing emitted events.
#[trait_variant::make(Tool: Send)]
pub trait LocalTool {
    /// Tool name (used for logging/events)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON schema describing the accepted parameters
    fn input_schema(&self) -> &serde_json::Value;

    /// Execute the tool
    ///
    /// # Errors
    /// Returns the tool's own failure; wrappers must re-raise it unchanged.
    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, BusError>;
}
