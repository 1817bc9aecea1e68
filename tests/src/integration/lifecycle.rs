//! # Module Lifecycle
//!
//! Boot with several modules, unregistration while events are flowing, and
//! hub shutdown.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use probe_hub::{
        Event, EventListener, EventSource, EventType, ExtensionError, SharedStateKind,
        SharedStateResult, StateVersion,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::timeout;

    #[derive(Clone, Default)]
    struct Retirements(Arc<AtomicUsize>);

    struct Tracked(Retirements);

    impl EventListener for Tracked {
        fn hear(&mut self, _event: &Event) {}

        fn on_unregistered(&mut self) {
            self.0 .0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_boot_constructs_modules_in_order() {
        let hub = start_hub();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for name in ["com.example.one", "com.example.two", "com.example.three"] {
            let order = Arc::clone(&order);
            start_module(&hub, name, move |_| order.lock().push(name)).await;
        }
        boot(&hub).await;

        assert_eq!(*order.lock(), vec!["com.example.one", "com.example.two", "com.example.three"]);
        assert_eq!(
            hub.registered_modules(),
            vec!["com.example.one", "com.example.three", "com.example.two"]
        );
    }

    #[tokio::test]
    async fn test_boot_callback_runs_after_booted_event() {
        let hub = start_hub();
        let events = Events::default();
        let listener = recorder(&events);
        let (_ctx, _) = start_module(&hub, "com.example.watcher", move |ctx| {
            ctx.register_wildcard_listener(listener, None);
        })
        .await;

        let seen_at_boot = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel();
        let snapshot = Arc::clone(&events);
        let seen = Arc::clone(&seen_at_boot);
        hub.finish_modules_registration(move || {
            seen.store(snapshot.lock().len(), Ordering::SeqCst);
            let _ = tx.send(());
        });
        timeout(WAIT, rx).await.unwrap().unwrap();

        assert_eq!(seen_at_boot.load(Ordering::SeqCst), 2);
        let sources: Vec<EventSource> = events.lock().iter().map(|e| e.source().clone()).collect();
        assert_eq!(sources, vec![EventSource::SHARED_STATE, EventSource::BOOTED]);
    }

    #[tokio::test]
    async fn test_unregistered_module_stops_hearing_events() {
        let hub = start_hub();
        let kept = Events::default();
        let dropped = Events::default();
        let kept_listener = recorder(&kept);
        let dropped_listener = recorder(&dropped);

        let (_a, _) = start_module(&hub, "com.example.kept", move |ctx| {
            ctx.register_listener(EventType::CUSTOM, EventSource::NONE, kept_listener, None);
        })
        .await;
        let (b, b_probe) = start_module(&hub, "com.example.dropped", move |ctx| {
            ctx.register_listener(EventType::CUSTOM, EventSource::NONE, dropped_listener, None);
        })
        .await;

        hub.publish(custom("one"), None);
        b.unregister_module(None);
        hub.publish(custom("two"), None);
        idle(&hub).await;

        assert_eq!(names(&kept), vec!["one", "two"]);
        assert_eq!(names(&dropped), vec!["one"]);
        assert_eq!(b_probe.unregistered(), 1);
        assert_eq!(hub.registered_modules(), vec!["com.example.kept"]);
    }

    #[tokio::test]
    async fn test_unregistering_module_retires_each_listener() {
        let hub = start_hub();
        let retirements = Retirements::default();
        let r = retirements.clone();
        let (ctx, probe) = start_module(&hub, "com.example.many", move |ctx| {
            for source in [EventSource::NONE, EventSource::OS, EventSource::REQUEST_RESET] {
                let r = r.clone();
                ctx.register_listener(EventType::CUSTOM, source, move |_| Ok(Tracked(r)), None);
            }
            let r = r.clone();
            ctx.register_wildcard_listener(move |_| Ok(Tracked(r)), None);
        })
        .await;
        ctx.create_shared_state(Some(data(json!({"k": 1}))), None, SharedStateKind::Xdm, None);

        hub.unregister_module("com.example.many", None);
        idle(&hub).await;

        assert_eq!(retirements.0.load(Ordering::SeqCst), 4);
        assert_eq!(probe.unregistered(), 1);
        assert_eq!(
            hub.get_shared_state("com.example.many", StateVersion::Newest, SharedStateKind::Xdm, None),
            SharedStateResult::None
        );

        let errors = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        ctx.register_listener(
            EventType::CUSTOM,
            EventSource::NONE,
            |_| Ok(|_: &Event| {}),
            Some(Box::new(move |e| sink.lock().push(e))),
        );
        assert_eq!(
            *errors.lock(),
            vec![ExtensionError::ModuleNotRegistered { name: "com.example.many".into() }]
        );
    }

    #[tokio::test]
    async fn test_module_name_reusable_after_unregistration() {
        let hub = start_hub();
        let (_first, first_probe) = start_module(&hub, "com.example.reused", |_| {}).await;
        hub.unregister_module("com.example.reused", None);
        idle(&hub).await;

        let (second, second_probe) = start_module(&hub, "com.example.reused", |_| {}).await;
        assert!(second.is_registered());
        assert_eq!(first_probe.unregistered(), 1);
        assert!(second_probe.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue_first() {
        let hub = start_hub();
        let events = Events::default();
        let listener = recorder(&events);
        let (_ctx, probe) = start_module(&hub, "com.example.drain", move |ctx| {
            ctx.register_listener(EventType::CUSTOM, EventSource::NONE, listener, None);
        })
        .await;

        for i in 0..100 {
            hub.publish(custom(&format!("e{i}")), None);
        }
        timeout(WAIT, hub.shutdown()).await.unwrap().unwrap();

        assert_eq!(events.lock().len(), 100);
        assert_eq!(probe.unregistered(), 1);
        assert!(hub.registered_modules().is_empty());

        // A second request still completes.
        timeout(WAIT, hub.shutdown()).await.unwrap().ok();
    }
}
