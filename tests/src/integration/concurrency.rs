//! # Concurrent Publishers and Registrations
//!
//! Many threads publish and re-register at once; delivery must still be one
//! total order that respects each thread's own order.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use parking_lot::Mutex;
    use probe_hub::{Event, EventListener, EventSource, EventType, ExtensionError, SharedStateKind};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;

    #[derive(Clone, Default)]
    struct Tally {
        heard: Arc<AtomicUsize>,
        retired: Arc<AtomicUsize>,
    }

    impl EventListener for Tally {
        fn hear(&mut self, _event: &Event) {
            self.heard.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unregistered(&mut self) {
            self.retired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_per_thread_order_preserved() {
        let hub = start_hub();
        let events = Events::default();
        let listener = recorder(&events);
        let (_ctx, _) = start_module(&hub, "com.example.sink", move |ctx| {
            ctx.register_wildcard_listener(listener, None);
        })
        .await;

        let publishers: Vec<_> = (0..THREADS)
            .map(|t| {
                let hub = hub.clone();
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let event = Event::builder(format!("t{t}"), EventType::CUSTOM, EventSource::NONE)
                            .entry("seq", i)
                            .build();
                        assert!(hub.publish(event, None) > 0);
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.join().unwrap();
        }
        idle(&hub).await;

        let events = events.lock();
        assert_eq!(events.len(), THREADS * PER_THREAD);
        assert!(events.windows(2).all(|pair| pair[0].number() < pair[1].number()));

        let mut next: HashMap<String, u64> = HashMap::new();
        for event in events.iter() {
            let expected = next.entry(event.name().to_string()).or_insert(0);
            assert_eq!(event.data().get("seq"), Some(&json!(*expected)));
            *expected += 1;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_reregistration_leaves_one_listener() {
        let hub = start_hub();
        let (ctx, _) = start_module(&hub, "com.example.churn", |_| {}).await;
        let tally = Tally::default();

        let registrars: Vec<_> = (0..THREADS)
            .map(|_| {
                let ctx = ctx.clone();
                let tally = tally.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        let listener = tally.clone();
                        ctx.register_listener(EventType::CUSTOM, EventSource::NONE, move |_| Ok(listener), None);
                    }
                })
            })
            .collect();
        let publisher = {
            let hub = hub.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    hub.publish(custom(&format!("noise{i}")), None);
                }
            })
        };
        for registrar in registrars {
            registrar.join().unwrap();
        }
        publisher.join().unwrap();
        idle(&hub).await;

        assert_eq!(tally.retired.load(Ordering::SeqCst), THREADS * 25 - 1);

        let before = tally.heard.load(Ordering::SeqCst);
        hub.publish(custom("probe"), None);
        idle(&hub).await;
        assert_eq!(tally.heard.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_writes_from_many_threads_all_land() {
        let hub = start_hub();
        let (ctx, _) = start_module(&hub, "com.example.writer", |_| {}).await;
        let accepted = Arc::new(AtomicUsize::new(0));
        let errors: Arc<Mutex<Vec<ExtensionError>>> = Arc::default();

        let writers: Vec<_> = (0..THREADS)
            .map(|t| {
                let ctx = ctx.clone();
                let hub = hub.clone();
                let accepted = Arc::clone(&accepted);
                let errors = Arc::clone(&errors);
                thread::spawn(move || {
                    for i in 0..50 {
                        hub.publish(custom("tick"), None);
                        let state = data(json!({"writer": t, "i": i}));
                        let errors = Arc::clone(&errors);
                        let on_error: probe_hub::ErrorCallback =
                            Box::new(move |error| errors.lock().push(error));
                        if ctx.create_shared_state(Some(state), None, SharedStateKind::Standard, Some(on_error)) {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        idle(&hub).await;

        assert_eq!(accepted.load(Ordering::SeqCst), THREADS * 50);
        assert!(errors.lock().is_empty());
        assert!(hub
            .get_shared_state("com.example.writer", u64::MAX, SharedStateKind::Standard, None)
            .is_set());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_as_of_event_does_not_change_later() {
        let hub = start_hub();
        let (writer, _) = start_module(&hub, "com.example.writer", |_| {}).await;
        let observed = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&observed);
        let (_reader, _) = start_module(&hub, "com.example.reader", move |ctx| {
            ctx.register_listener(
                EventType::CUSTOM,
                EventSource::NONE,
                move |ctx| {
                    Ok(move |event: &Event| {
                        let seen =
                            ctx.get_shared_state("com.example.writer", event, SharedStateKind::Standard, None);
                        log.lock().push((event.number(), seen));
                    })
                },
                None,
            );
        })
        .await;

        let publisher = {
            let hub = hub.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    hub.publish(custom(&format!("e{i}")), None);
                }
            })
        };
        for i in 0..PER_THREAD {
            assert!(writer.create_shared_state(Some(data(json!({"i": i}))), None, SharedStateKind::Standard, None));
        }
        publisher.join().unwrap();
        idle(&hub).await;

        let observed = observed.lock();
        assert_eq!(observed.len(), PER_THREAD);
        for (number, seen) in observed.iter() {
            assert_eq!(
                &hub.get_shared_state("com.example.writer", *number, SharedStateKind::Standard, None),
                seen
            );
        }
    }
}
