//! BusEvent trait - the routing contract for published values

use serde::Serialize;

/// An event value the bus can route.
///
/// The bus is generic over the concrete event type; the only requirement is a
/// discriminator string used as the routing key, plus serializability so a
/// canonical cache key can be derived from the full value.
pub trait BusEvent: Clone + Send + Sync + Serialize + 'static {
    /// Discriminator used to select the subscriber bucket.
    fn event_type(&self) -> &str;
}
