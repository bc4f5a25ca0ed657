//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 发布/订阅/异步派发全链路测试
//! - 缓存与注册表交互行为
//! - 工具包装与监控层端到端验证

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use bus_config::{BusConfig, ConfigProfile};
    use contracts::{BusEvent, SubscribeOptions, Tool};
    use event_bus::EventBus;
    use integration::{InstrumentedTool, SystemEvent, SystemEventPayload};
    use observability::MetricsAggregator;

    fn manual_bus(identifier: &str) -> Arc<EventBus<SystemEvent>> {
        Arc::new(EventBus::new(BusConfig {
            identifier: identifier.to_string(),
            daemon_mode: false,
            ..BusConfig::default()
        }))
    }

    fn memory_stored(key: &str) -> SystemEvent {
        SystemEvent {
            // Fixed timestamp keeps equal keys canonically identical
            timestamp: 1_700_000_000_000,
            source: "test".to_string(),
            payload: SystemEventPayload::MemoryStored {
                key: key.to_string(),
                size_bytes: 16,
            },
        }
    }

    async fn drain_all(bus: &EventBus<SystemEvent>) {
        while bus.pending_dispatches() > 0 {
            bus.drain_now().await;
        }
    }

    /// End-to-end flow: subscribe -> publish_async -> drain -> metrics.
    #[tokio::test]
    async fn test_e2e_async_flow() {
        let bus = manual_bus("e2e-flow");
        let invocations = Arc::new(AtomicU64::new(0));
        let invocations_in = Arc::clone(&invocations);
        bus.on(
            "memory_stored",
            move |_event: SystemEvent| {
                let invocations = Arc::clone(&invocations_in);
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            SubscribeOptions::default(),
        );

        for i in 0..20 {
            bus.publish_async(memory_stored(&format!("key-{i}"))).unwrap();
        }
        drain_all(&bus).await;

        assert_eq!(invocations.load(Ordering::SeqCst), 20);
        let snapshot = bus.snapshot();
        assert_eq!(snapshot.publishes, 20);
        assert_eq!(snapshot.dispatches, 20);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.publish_latency.count, 20);
    }

    /// Exactly max_queue_size items survive a burst; the rest are dropped.
    #[tokio::test]
    async fn test_e2e_backpressure_accounting() {
        let bus: Arc<EventBus<SystemEvent>> = Arc::new(EventBus::new(BusConfig {
            identifier: "e2e-backpressure".to_string(),
            daemon_mode: false,
            cache_enabled: false,
            max_queue_size: 8,
            ..BusConfig::default()
        }));
        let invocations = Arc::new(AtomicU64::new(0));
        let invocations_in = Arc::clone(&invocations);
        bus.on(
            "memory_stored",
            move |_event: SystemEvent| {
                let invocations = Arc::clone(&invocations_in);
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            SubscribeOptions::default(),
        );

        for i in 0..20 {
            bus.publish_async(memory_stored(&format!("key-{i}"))).unwrap();
        }
        drain_all(&bus).await;

        assert_eq!(invocations.load(Ordering::SeqCst), 8);
        let snapshot = bus.snapshot();
        assert_eq!(snapshot.queue_drops, 12);
        assert_eq!(snapshot.publishes, 20);
        assert_eq!(snapshot.dispatches, 8);
    }

    /// Cached publication survives across calls until any registry change.
    #[tokio::test]
    async fn test_e2e_cache_and_invalidation() {
        let bus = manual_bus("e2e-cache");
        bus.on(
            "memory_stored",
            |_event: SystemEvent| async { Ok(()) },
            SubscribeOptions::default(),
        );

        let first = bus.publish(memory_stored("same")).unwrap();
        let second = bus.publish(memory_stored("same")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // Registry change on an unrelated type still flushes everything
        let id = bus.on(
            "cache_hit",
            |_event: SystemEvent| async { Ok(()) },
            SubscribeOptions::default(),
        );
        let third = bus.publish(memory_stored("same")).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));

        bus.off("cache_hit", Some(&id));
        let fourth = bus.publish(memory_stored("same")).unwrap();
        assert!(!Arc::ptr_eq(&third, &fourth));

        let snapshot = bus.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 3);
    }

    /// Priority, filter and once semantics through the public API.
    #[tokio::test]
    async fn test_e2e_subscription_semantics() {
        let bus = manual_bus("e2e-subs");
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        for (name, priority) in [("low", 1), ("high", 5), ("mid", 3)] {
            let log = Arc::clone(&log);
            bus.on(
                "memory_stored",
                move |_event: SystemEvent| {
                    let log = Arc::clone(&log);
                    async move {
                        log.lock().unwrap().push(name);
                        Ok(())
                    }
                },
                SubscribeOptions::default().priority(priority),
            );
        }

        let log_filtered = Arc::clone(&log);
        bus.on(
            "memory_stored",
            move |_event: SystemEvent| {
                let log = Arc::clone(&log_filtered);
                async move {
                    log.lock().unwrap().push("filtered");
                    Ok(())
                }
            },
            SubscribeOptions::default()
                .priority(10)
                .filter(|event: &SystemEvent| {
                    matches!(
                        &event.payload,
                        SystemEventPayload::MemoryStored { key, .. } if key == "special"
                    )
                }),
        );

        bus.publish(memory_stored("plain")).unwrap().dispatch().await;
        assert_eq!(*log.lock().unwrap(), vec!["high", "mid", "low"]);

        log.lock().unwrap().clear();
        bus.publish(memory_stored("special")).unwrap().dispatch().await;
        assert_eq!(*log.lock().unwrap(), vec!["filtered", "high", "mid", "low"]);
    }

    struct EchoTool {
        schema: serde_json::Value,
    }

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its parameters"
        }

        fn input_schema(&self) -> &serde_json::Value {
            &self.schema
        }

        async fn execute(
            &self,
            params: serde_json::Value,
        ) -> Result<serde_json::Value, contracts::BusError> {
            Ok(params)
        }
    }

    /// A wrapped tool emits start/complete events observable via the bus.
    #[tokio::test]
    async fn test_e2e_instrumented_tool() {
        let bus = manual_bus("e2e-tool");
        let kinds = Arc::new(Mutex::new(Vec::new()));
        for kind in ["tool_execution_start", "tool_execution_complete"] {
            let kinds = Arc::clone(&kinds);
            bus.on(
                kind,
                move |event: SystemEvent| {
                    let kinds = Arc::clone(&kinds);
                    async move {
                        kinds
                            .lock()
                            .unwrap()
                            .push((event.event_type().to_string(), event.source.clone()));
                        Ok(())
                    }
                },
                SubscribeOptions::default(),
            );
        }

        let tool = InstrumentedTool::wrap(
            EchoTool {
                schema: serde_json::json!({"type": "object"}),
            },
            Arc::clone(&bus),
        );
        let output = tool.execute(serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(output, serde_json::json!({"x": 1}));

        drain_all(&bus).await;
        let kinds = kinds.lock().unwrap();
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0].0, "tool_execution_start");
        assert_eq!(kinds[1].0, "tool_execution_complete");
        assert_eq!(kinds[0].1, "tool:echo");
    }

    /// Two instances aggregate into fleet sums and health flags.
    #[tokio::test]
    async fn test_e2e_fleet_aggregation() {
        let fast = manual_bus("fleet-fast");
        let slow = manual_bus("fleet-slow");

        let aggregator = MetricsAggregator::new();
        aggregator.register(fast.metrics());
        aggregator.register(slow.metrics());

        fast.on(
            "memory_stored",
            |_event: SystemEvent| async { Ok(()) },
            SubscribeOptions::default(),
        );
        fast.publish(memory_stored("a")).unwrap().dispatch().await;

        // Simulate a slow instance breaching a 25ms target
        slow.metrics().record_dispatch(120.0);

        let stats = aggregator.aggregated();
        assert_eq!(stats.instance_count, 2);
        assert_eq!(stats.publishes, 1);
        assert_eq!(stats.dispatches, 2);

        assert_eq!(aggregator.check_latency_health(25), vec!["fleet-slow"]);
    }

    /// Profile-built bus behaves per its tuning.
    #[tokio::test]
    async fn test_e2e_profile_bus() {
        let config = BusConfig {
            daemon_mode: false,
            ..ConfigProfile::Debug.config()
        };
        let bus: EventBus<SystemEvent> = EventBus::new(config);
        bus.on(
            "memory_stored",
            |_event: SystemEvent| async { Ok(()) },
            SubscribeOptions::default(),
        );

        // Debug profile disables caching: identical publishes never hit
        let first = bus.publish(memory_stored("same")).unwrap();
        let second = bus.publish(memory_stored("same")).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(bus.snapshot().cache_hits, 0);
    }
}
