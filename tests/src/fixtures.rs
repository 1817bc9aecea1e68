//! Shared fixtures for the scenario suite.

use parking_lot::Mutex;
use probe_hub::{
    Event, EventData, EventHub, EventListener, EventSource, EventType, ExtensionError, HubConfig,
    Module, ModuleContext,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(10);

pub type Events = Arc<Mutex<Vec<Event>>>;

pub fn start_hub() -> EventHub {
    probe_telemetry::init_test_logging();
    EventHub::new(HubConfig::default()).expect("hub starts")
}

pub async fn idle(hub: &EventHub) {
    timeout(WAIT, hub.wait_idle())
        .await
        .expect("hub did not go idle")
        .expect("hub stopped while draining");
}

pub async fn boot(hub: &EventHub) {
    let (tx, rx) = oneshot::channel();
    hub.finish_modules_registration(move || {
        let _ = tx.send(());
    });
    timeout(WAIT, rx)
        .await
        .expect("hub did not boot")
        .expect("boot callback dropped");
}

pub fn custom(name: &str) -> Event {
    Event::builder(name, EventType::CUSTOM, EventSource::NONE).build()
}

pub fn data(value: Value) -> EventData {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Appends every event it hears.
pub struct Recorder(pub Events);

impl EventListener for Recorder {
    fn hear(&mut self, event: &Event) {
        self.0.lock().push(event.clone());
    }
}

pub fn recorder(
    events: &Events,
) -> impl FnOnce(ModuleContext) -> anyhow::Result<Recorder> + Send + 'static {
    let events = Arc::clone(events);
    move |_ctx| Ok(Recorder(events))
}

pub fn names(events: &Events) -> Vec<String> {
    events.lock().iter().map(|e| e.name().to_string()).collect()
}

/// Counters shared between a test and its module.
#[derive(Clone, Default)]
pub struct ModuleProbe {
    pub unregistered: Arc<AtomicUsize>,
    pub errors: Arc<Mutex<Vec<ExtensionError>>>,
}

impl ModuleProbe {
    pub fn unregistered(&self) -> usize {
        self.unregistered.load(Ordering::SeqCst)
    }
}

pub struct BasicModule {
    pub name: String,
    pub version: String,
    pub probe: ModuleProbe,
}

impl Module for BasicModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn on_unregistered(&mut self) {
        self.probe.unregistered.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unexpected_error(&mut self, error: &ExtensionError) {
        self.probe.errors.lock().push(error.clone());
    }
}

/// Register a [`BasicModule`], run `setup` inside its factory, and return its
/// context once the hub has processed everything `setup` queued.
pub async fn start_module<F>(hub: &EventHub, name: &str, setup: F) -> (ModuleContext, ModuleProbe)
where
    F: FnOnce(&ModuleContext) + Send + 'static,
{
    let probe = ModuleProbe::default();
    let slot: Arc<Mutex<Option<ModuleContext>>> = Arc::default();
    let out = Arc::clone(&slot);
    let module_probe = probe.clone();
    let name = name.to_string();

    hub.register_module(
        move |ctx| {
            setup(&ctx);
            *out.lock() = Some(ctx);
            Ok(BasicModule {
                name,
                version: "1.0.0".to_string(),
                probe: module_probe,
            })
        },
        None,
    );
    idle(hub).await;

    let ctx = slot.lock().take().expect("module was not constructed");
    (ctx, probe)
}
