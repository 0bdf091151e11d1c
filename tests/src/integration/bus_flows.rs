//! # Bus Flows
//!
//! End-to-end behaviour of the two buses as collaborators see it:
//!
//! 1. **Call primitive**: missing handler, timeout, cancellation, application errors
//! 2. **Combinators**: chain, parallel with a timed-out branch, retry, async callbacks
//! 3. **Events**: ordered sync delivery next to fire-and-forget delivery
//! 4. **Telemetry**: bus traffic shows up in the Prometheus exposition

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use courier_bus::{
        typed_handler, ApplicationError, BusConfig, CancellationToken, EventBus, Payload, Request,
        RequestBus, RequestError, RequestOptions,
    };
    use courier_telemetry::{encode_metrics, init_test_logging, register_metrics};
    use futures::future::join_all;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::timeout;

    // =============================================================================
    // FIXTURES
    // =============================================================================

    fn bus_with_timeout(ms: u64) -> RequestBus {
        init_test_logging();
        RequestBus::with_config(BusConfig::default().with_default_timeout(Duration::from_millis(ms)))
    }

    fn register_math(bus: &RequestBus) {
        bus.register_handler("a", |_ctx: CancellationToken, req: Request| async move {
            Ok::<_, ApplicationError>(json!(req.payload.as_i64().unwrap_or_default() + 1))
        });
        bus.register_handler("b", |_ctx: CancellationToken, req: Request| async move {
            Ok::<_, ApplicationError>(json!(req.payload.as_i64().unwrap_or_default() * 2))
        });
    }

    #[derive(Deserialize)]
    struct Transfer {
        from: String,
        to: String,
        amount: u64,
    }

    // =============================================================================
    // CALL PRIMITIVE
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_topic_never_waits() {
        let bus = bus_with_timeout(5_000);
        let started = Instant::now();

        let err = bus.request("ghost", json!(null)).await.unwrap_err();

        assert!(err.is_handler_not_found());
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_callers_each_get_their_own_answer() {
        let bus = bus_with_timeout(2_000);
        bus.register_handler("echo", |_ctx: CancellationToken, req: Request| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, ApplicationError>(req.payload)
        });

        let calls = (0..200).map(|i| {
            let bus = bus.clone();
            async move { (i, bus.request("echo", json!(i)).await) }
        });

        for (i, outcome) in join_all(calls).await {
            let response = outcome.unwrap();
            assert_eq!(response.payload(), Some(&json!(i)));
        }
        assert_eq!(bus.pending_count(), 0);
        assert_eq!(bus.stats().completed, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_then_late_result_is_discarded() {
        let bus = bus_with_timeout(100);
        let finished = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&finished);
        bus.register_handler("slow", move |_ctx: CancellationToken, _req: Request| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                flag.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApplicationError>(json!("too late"))
            }
        });

        let started = Instant::now();
        let err = bus.request("slow", json!(null)).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(bus.pending_count(), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().late_discarded, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_handler_observes_caller_cancellation() {
        let bus = bus_with_timeout(5_000);
        let (seen_tx, seen_rx) = oneshot::channel();
        let seen_tx = Arc::new(std::sync::Mutex::new(Some(seen_tx)));
        bus.register_handler("watcher", move |ctx: CancellationToken, _req: Request| {
            let seen_tx = Arc::clone(&seen_tx);
            async move {
                ctx.cancelled().await;
                let tx = seen_tx.lock().unwrap().take();
                if let Some(tx) = tx {
                    let _ = tx.send(());
                }
                Ok::<_, ApplicationError>(json!(null))
            }
        });

        let ctx = CancellationToken::new();
        let caller = {
            let bus = bus.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { bus.request_with_context(&ctx, "watcher", json!(null)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.cancel();

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err, RequestError::Cancelled);
        timeout(Duration::from_secs(1), seen_rx)
            .await
            .expect("handler saw cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_typed_handler_end_to_end() {
        let bus = bus_with_timeout(1_000);
        bus.register_handler(
            "ledger.transfer",
            typed_handler(|_ctx, t: Transfer| async move {
                if t.amount == 0 {
                    return Err(ApplicationError::new("empty transfer").with_code(400));
                }
                Ok(json!({"from": t.from, "to": t.to, "moved": t.amount}))
            }),
        );

        let ok = bus
            .request("ledger.transfer", json!({"from": "x", "to": "y", "amount": 5}))
            .await
            .unwrap();
        assert_eq!(ok.payload().unwrap()["moved"], 5);

        let rejected = bus
            .request("ledger.transfer", json!({"from": "x", "to": "y", "amount": 0}))
            .await
            .unwrap();
        assert_eq!(rejected.application_error().unwrap().code, 400);

        let malformed = bus.request("ledger.transfer", json!("nope")).await.unwrap();
        assert_eq!(
            malformed.application_error().unwrap().code,
            ApplicationError::INVALID_PAYLOAD
        );
    }

    // =============================================================================
    // COMBINATORS
    // =============================================================================

    #[tokio::test]
    async fn test_chain_over_three() {
        let bus = bus_with_timeout(1_000);
        register_math(&bus);

        let last = bus
            .chain(&CancellationToken::new(), &["a", "b"], json!(3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.payload(), Some(&json!(8)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_with_timed_out_branch() {
        let bus = bus_with_timeout(100);
        bus.register_handler("a", |_ctx: CancellationToken, _req: Request| async move {
            Ok::<_, ApplicationError>(json!("A"))
        });
        bus.register_handler("b", |_ctx: CancellationToken, _req: Request| async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, ApplicationError>(json!("B"))
        });

        let payloads = HashMap::from([("a".to_string(), json!(null)), ("b".to_string(), json!(null))]);
        let result = bus.parallel(&CancellationToken::new(), payloads).await;

        assert_eq!(result.responses["a"].payload(), Some(&json!("A")));
        assert!(!result.responses.contains_key("b"));
        let err = result.error.expect("aggregate error");
        assert!(err.is_timeout());
        assert!(err.to_string().starts_with("parallel requests had 1 errors"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retry_recovers_after_two_failures() {
        let bus = bus_with_timeout(1_000);
        let invocations = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&invocations);
        bus.register_handler("flaky", move |_ctx: CancellationToken, _req: Request| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt <= 2 {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                }
                Ok::<_, ApplicationError>(json!("done"))
            }
        });

        let response = bus
            .request_with_options(
                &CancellationToken::new(),
                "flaky",
                json!(null),
                RequestOptions {
                    timeout: Some(Duration::from_millis(50)),
                    retries: 3,
                    retry_delay: Duration::from_millis(5),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.payload(), Some(&json!("done")));
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_async_callbacks_run_once_each() {
        let bus = bus_with_timeout(1_000);
        register_math(&bus);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let tx = tx.clone();
                bus.request_async("a", json!(i), move |_ctx, response| async move {
                    let _ = tx.send(response);
                })
            })
            .collect();
        for handle in join_all(handles).await {
            handle.unwrap();
        }
        drop(tx);

        let mut results = Vec::new();
        while let Some(response) = rx.recv().await {
            results.push(response.payload().and_then(Payload::as_i64).unwrap());
        }
        results.sort_unstable();
        assert_eq!(results, (1..=10).collect::<Vec<_>>());
    }

    // =============================================================================
    // EVENTS
    // =============================================================================

    #[tokio::test]
    async fn test_sync_and_async_delivery_side_by_side() {
        init_test_logging();
        let events = EventBus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for name in ["audit", "cache", "notify"] {
            let order = Arc::clone(&order);
            events.subscribe("order.placed", move |_p: Payload| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(name);
                    Ok::<_, anyhow::Error>(())
                }
            });
        }

        events.publish_sync("order.placed", json!({"id": 1})).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["audit", "cache", "notify"]);

        assert_eq!(events.publish("order.placed", json!({"id": 2})), 3);
        timeout(Duration::from_secs(1), async {
            while order.lock().unwrap().len() < 6 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fire-and-forget delivery");
    }

    #[tokio::test]
    async fn test_clear_all_twice_on_both_buses() {
        let events = EventBus::new();
        let requests = bus_with_timeout(1_000);
        events.subscribe("x", |_p: Payload| async { Ok::<_, anyhow::Error>(()) });
        register_math(&requests);

        events.clear_all();
        requests.clear_all();
        events.clear_all();
        requests.clear_all();

        assert!(events.topics().is_empty());
        assert!(requests.topics().is_empty());
        assert!(requests.request("a", json!(1)).await.unwrap_err().is_handler_not_found());
    }

    // =============================================================================
    // TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_metrics_exposition_lists_bus_counters() {
        register_metrics().unwrap();
        let bus = bus_with_timeout(1_000);
        register_math(&bus);
        bus.request("a", json!(1)).await.unwrap();

        let text = encode_metrics().unwrap();
        assert!(text.contains("courier_request_bus_requests_total"));
        assert!(text.contains("courier_event_bus_events_published_total"));
    }
}
