//! # Stack Flows
//!
//! The stack service driven purely through the buses:
//!
//! 1. **Request → update → event → relay**: an update answered on the request
//!    bus reaches the snapshot sink through `stack.changed`
//! 2. **Fan-out reads**: `parallel` over the stack topics
//! 3. **Pipelines**: `chain` feeding one stack answer into the next call

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use courier_bus::{ApplicationError, CancellationToken, EventBus, Request, RequestBus};
    use serde_json::json;
    use stack_service::error::codes;
    use stack_service::{
        ChannelSink, SnapshotRelay, Stack, StackManager, TOPIC_GET, TOPIC_LIST, TOPIC_UPDATE,
    };
    use tokio::time::timeout;

    struct Harness {
        requests: RequestBus,
        events: EventBus,
        manager: Arc<StackManager>,
    }

    fn harness(locations: &[&str]) -> Harness {
        courier_telemetry::init_test_logging();
        let requests = RequestBus::new();
        let events = EventBus::new();
        let manager = Arc::new(StackManager::new(locations.iter().copied()));
        manager.attach(&requests, events.clone());
        Harness {
            requests,
            events,
            manager,
        }
    }

    #[tokio::test]
    async fn test_update_reaches_snapshot_sink() {
        let h = harness(&["A1", "A2"]);
        let (sink, mut snapshots) = ChannelSink::new(4);
        let relay = SnapshotRelay::start(&h.events, Arc::new(sink));

        let response = h
            .requests
            .request(
                TOPIC_UPDATE,
                json!({"location": "A1", "name": "cold room", "description": "2-8C", "disabled": false}),
            )
            .await
            .unwrap();
        let updated: Stack = response.decode().unwrap().unwrap();
        assert_eq!(updated.name, "cold room");

        let snapshot = timeout(Duration::from_secs(1), snapshots.recv())
            .await
            .expect("snapshot relayed")
            .unwrap();
        assert_eq!(snapshot.location, "A1");
        assert_eq!(snapshot.stack, updated);
        assert_eq!(h.manager.get("A1").unwrap(), updated);

        relay.stop().unwrap();
        assert!(!h.events.has_subscribers("stack.changed"));
    }

    #[tokio::test]
    async fn test_update_of_unknown_location_publishes_nothing() {
        let h = harness(&["A1"]);
        let (sink, mut snapshots) = ChannelSink::new(4);
        let _relay = SnapshotRelay::start(&h.events, Arc::new(sink));

        let response = h
            .requests
            .request(
                TOPIC_UPDATE,
                json!({"location": "Z9", "name": "n", "description": "d"}),
            )
            .await
            .unwrap();
        assert_eq!(response.application_error().unwrap().code, codes::STACK_NOT_FOUND);

        let nothing = timeout(Duration::from_millis(50), snapshots.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_parallel_reads_across_topics() {
        let h = harness(&["A1", "B1"]);

        let payloads = HashMap::from([
            (TOPIC_GET.to_string(), json!({"location": "B1"})),
            (TOPIC_LIST.to_string(), json!(null)),
        ]);
        let responses = h
            .requests
            .parallel(&CancellationToken::new(), payloads)
            .await
            .into_result()
            .unwrap();

        let single: Stack = responses[TOPIC_GET].decode().unwrap().unwrap();
        assert_eq!(single.stack_count, 2);
        let all = responses[TOPIC_LIST].payload().unwrap().as_object().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_chain_from_lookup_to_update() {
        let h = harness(&["A1"]);
        // Turns a stack snapshot into an update that disables it.
        h.requests.register_handler(
            "stack.disable_request",
            |_ctx: CancellationToken, req: Request| async move {
                let stack: Stack = req
                    .decode()
                    .map_err(|e| ApplicationError::new(e.to_string()))?;
                Ok::<_, ApplicationError>(json!({
                    "location": "A1",
                    "name": stack.name,
                    "description": stack.description,
                    "disabled": true,
                }))
            },
        );

        let last = h
            .requests
            .chain(
                &CancellationToken::new(),
                &[TOPIC_GET, "stack.disable_request", TOPIC_UPDATE],
                json!({"location": "A1"}),
            )
            .await
            .unwrap()
            .unwrap();

        let stack: Stack = last.decode().unwrap().unwrap();
        assert!(stack.disabled);
        assert!(h.manager.get("A1").unwrap().disabled);
    }

    #[tokio::test]
    async fn test_chain_stops_at_missing_stack() {
        let h = harness(&["A1"]);

        let last = h
            .requests
            .chain(
                &CancellationToken::new(),
                &[TOPIC_GET, TOPIC_UPDATE],
                json!({"location": "nowhere"}),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.application_error().unwrap().code, codes::STACK_NOT_FOUND);
    }
}
