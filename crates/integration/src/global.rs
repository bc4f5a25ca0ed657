//! Process-wide bus accessor
//!
//! The engine itself has no global state; this accessor exists purely as a
//! convenience for integration consumers that want one shared bus.

use std::sync::{Arc, Mutex, OnceLock};

use bus_config::ConfigProfile;
use event_bus::EventBus;

use crate::events::SystemEvent;

static GLOBAL_BUS: OnceLock<Mutex<Option<Arc<EventBus<SystemEvent>>>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Arc<EventBus<SystemEvent>>>> {
    GLOBAL_BUS.get_or_init(|| Mutex::new(None))
}

/// The shared bus, created lazily from the balanced profile.
///
/// Must first be called inside a tokio runtime (construction spawns the
/// drain worker).
pub fn global_bus() -> Arc<EventBus<SystemEvent>> {
    let mut slot = match slot().lock() {
        Ok(slot) => slot,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(bus) = slot.as_ref() {
        return Arc::clone(bus);
    }
    let bus = Arc::new(EventBus::new(ConfigProfile::Balanced.config()));
    *slot = Some(Arc::clone(&bus));
    bus
}

/// Replace the shared bus, returning the previous one if any.
pub fn set_global_bus(bus: Arc<EventBus<SystemEvent>>) -> Option<Arc<EventBus<SystemEvent>>> {
    let mut slot = match slot().lock() {
        Ok(slot) => slot,
        Err(poisoned) => poisoned.into_inner(),
    };
    slot.replace(bus)
}

/// Drop the shared bus. For tests: the next `global_bus()` starts fresh.
pub fn reset_global_bus() {
    let mut slot = match slot().lock() {
        Ok(slot) => slot,
        Err(poisoned) => poisoned.into_inner(),
    };
    *slot = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests share one global slot; serialize access across test threads.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_global_bus_is_shared_until_reset() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_global_bus();

        let first = global_bus();
        let second = global_bus();
        assert!(Arc::ptr_eq(&first, &second));

        reset_global_bus();
        let third = global_bus();
        assert!(!Arc::ptr_eq(&first, &third));

        reset_global_bus();
    }

    #[tokio::test]
    async fn test_set_global_bus_replaces() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_global_bus();

        let custom = Arc::new(EventBus::new(
            bus_config::BusConfig {
                identifier: "custom-global".to_string(),
                ..bus_config::BusConfig::default()
            },
        ));
        set_global_bus(Arc::clone(&custom));
        assert_eq!(global_bus().config().identifier, "custom-global");

        reset_global_bus();
    }
}
