//! # Modules
//!
//! A module is a pluggable component registered with the hub. It is built by
//! a factory on the hub worker and talks to the rest of the system only
//! through its [`ModuleContext`]: publishing events, registering listeners,
//! and publishing or reading shared state.
//!
//! ## Example
//!
//! ```rust,ignore
//! struct Identity { ctx: ModuleContext }
//!
//! impl Module for Identity {
//!     fn name(&self) -> &str { "com.example.identity" }
//! }
//!
//! hub.register_module(|ctx| {
//!     ctx.register_listener(
//!         EventType::IDENTITY,
//!         EventSource::REQUEST_IDENTITY,
//!         |ctx| Ok(move |event: &Event| { /* answer the request */ }),
//!         None,
//!     );
//!     Ok(Identity { ctx })
//! }, None);
//! ```

use crate::dispatcher::Command;
use crate::hub::HubShared;
use crate::listener::{EventListener, ListenerFactory, OneTimeCallback, OneTimeKey};
use crate::registry::{ModuleId, SlotKey};
use probe_state::{LedgerLink, ModuleLedgers, SharedStateKind, SharedStateResult};
use probe_types::{
    report, ErrorCallback, Event, EventData, EventSource, EventType, ExtensionError, StateVersion,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// A component registered with the hub.
///
/// Lifecycle callbacks run on the hub worker.
pub trait Module: Send + 'static {
    /// Unique module name.
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        ""
    }

    /// Called once when the module is unregistered or the hub shuts down.
    fn on_unregistered(&mut self) {}

    /// Called when one of the module's listeners fails to build or panics,
    /// or when the module itself cannot be enrolled.
    fn on_unexpected_error(&mut self, error: &ExtensionError) {
        warn!(module = self.name(), error = %error, "Unexpected module error");
    }
}

/// Builds a module on the hub worker.
pub type ModuleFactory =
    Box<dyn FnOnce(ModuleContext) -> anyhow::Result<Box<dyn Module>> + Send + 'static>;

const CONSTRUCTING: u8 = 0;
const ACTIVE: u8 = 1;
const RETIRED: u8 = 2;

#[derive(Debug, Clone)]
pub(crate) struct ModuleIdentity {
    pub name: String,
    pub version: String,
}

/// Hub-side record of one module, shared by its contexts and the directory.
#[derive(Debug)]
pub(crate) struct ModuleCell {
    id: ModuleId,
    identity: OnceLock<ModuleIdentity>,
    status: AtomicU8,
    ledgers: ModuleLedgers,
}

impl ModuleCell {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            identity: OnceLock::new(),
            status: AtomicU8::new(CONSTRUCTING),
            ledgers: ModuleLedgers::new(),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Name, once the module has been enrolled.
    pub fn name(&self) -> Option<&str> {
        self.identity.get().map(|identity| identity.name.as_str())
    }

    pub fn identity(&self) -> Option<&ModuleIdentity> {
        self.identity.get()
    }

    /// Name for log lines and error reports.
    pub fn label(&self) -> String {
        self.name()
            .map_or_else(|| format!("<module #{}>", self.id), str::to_string)
    }

    pub fn ledgers(&self) -> &ModuleLedgers {
        &self.ledgers
    }

    pub fn activate(&self, name: String, version: String) {
        let _ = self.identity.set(ModuleIdentity { name, version });
        self.status.store(ACTIVE, Ordering::Release);
    }

    pub fn retire(&self) {
        self.status.store(RETIRED, Ordering::Release);
    }

    pub fn is_retired(&self) -> bool {
        self.status.load(Ordering::Acquire) == RETIRED
    }

    pub fn is_active(&self) -> bool {
        self.status.load(Ordering::Acquire) == ACTIVE
    }
}

/// Deliver the error of `result` through `on_error`, returning `fallback`.
pub(crate) fn or_report<T>(
    result: Result<T, ExtensionError>,
    on_error: Option<ErrorCallback>,
    fallback: T,
) -> T {
    result.unwrap_or_else(|error| {
        report(on_error, error);
        fallback
    })
}

/// Listener keys may use the wildcard; they may not be blank.
pub(crate) fn validate_key(event_type: &EventType, source: &EventSource) -> Result<(), ExtensionError> {
    if event_type.is_empty() {
        return Err(ExtensionError::EventTypeNotSupported);
    }
    if source.is_empty() {
        return Err(ExtensionError::EventSourceNotSupported);
    }
    Ok(())
}

/// Published events need a concrete type and source.
pub(crate) fn validate_event(event: &Event) -> Result<(), ExtensionError> {
    if event.event_type().is_empty() || event.event_type().is_wildcard() {
        return Err(ExtensionError::EventTypeNotSupported);
    }
    if event.source().is_empty() || event.source().is_wildcard() {
        return Err(ExtensionError::EventSourceNotSupported);
    }
    Ok(())
}

/// The contract a module uses against the hub.
///
/// Cheap to clone; listeners receive their own copy when they are built.
/// Every mutating call takes an optional error callback and never panics or
/// returns an error type: failures go to the callback, or to the log.
#[derive(Clone)]
pub struct ModuleContext {
    hub: Arc<HubShared>,
    cell: Arc<ModuleCell>,
}

impl ModuleContext {
    pub(crate) fn new(hub: Arc<HubShared>, cell: Arc<ModuleCell>) -> Self {
        Self { hub, cell }
    }

    /// The module's name; `None` while its factory is still running.
    #[must_use]
    pub fn module_name(&self) -> Option<String> {
        self.cell.name().map(str::to_string)
    }

    /// Whether the module is still registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        !self.cell.is_retired() && !self.hub.is_stopped()
    }

    fn ensure_usable(&self) -> Result<(), ExtensionError> {
        if self.hub.is_stopped() {
            return Err(ExtensionError::HubShutdown);
        }
        if self.cell.is_retired() {
            return Err(ExtensionError::ModuleNotRegistered {
                name: self.cell.label(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Queue `event` for delivery. Returns its sequence number, or 0 when the
    /// event was not accepted.
    pub fn publish(&self, event: Event, on_error: Option<ErrorCallback>) -> u64 {
        let result = self.ensure_usable().and_then(|()| self.hub.publish(event));
        or_report(result, on_error, 0)
    }

    /// Publish a request and call `on_response` with the first event that
    /// answers it (`response_pair_id` equal to the request's pair id).
    pub fn publish_with_response<F>(
        &self,
        event: Event,
        on_response: F,
        on_error: Option<ErrorCallback>,
    ) -> u64
    where
        F: FnOnce(&Event) + Send + 'static,
    {
        let event = event.with_pair_id();
        let result = self.ensure_usable().and_then(|()| {
            validate_event(&event)?;
            let pair_id = event.pair_id().map(str::to_string);
            self.hub.enqueue(Command::RegisterOneTime {
                key: OneTimeKey::from(pair_id),
                callback: Box::new(on_response),
            })?;
            self.hub.publish(event)
        });
        or_report(result, on_error, 0)
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Register the listener for `(event_type, source)`, replacing any
    /// existing one (which receives `on_unregistered` first).
    ///
    /// The factory runs on the hub worker. If it fails the slot stays empty
    /// and the module's `on_unexpected_error` is called.
    pub fn register_listener<F, L>(
        &self,
        event_type: EventType,
        source: EventSource,
        factory: F,
        on_error: Option<ErrorCallback>,
    ) -> bool
    where
        F: FnOnce(ModuleContext) -> anyhow::Result<L> + Send + 'static,
        L: EventListener,
    {
        if let Err(error) = validate_key(&event_type, &source) {
            report(on_error, error);
            return false;
        }
        debug!(module = %self.cell.label(), %event_type, %source, "Queueing listener registration");
        self.submit(on_error, |on_error| Command::RegisterListener {
            cell: Arc::clone(&self.cell),
            key: SlotKey::new(event_type, source),
            factory: boxed_factory(factory),
            on_error,
        })
    }

    /// Register the module's wildcard listener, which hears every event.
    pub fn register_wildcard_listener<F, L>(&self, factory: F, on_error: Option<ErrorCallback>) -> bool
    where
        F: FnOnce(ModuleContext) -> anyhow::Result<L> + Send + 'static,
        L: EventListener,
    {
        self.submit(on_error, |on_error| Command::RegisterWildcard {
            cell: Arc::clone(&self.cell),
            factory: boxed_factory(factory),
            on_error,
        })
    }

    /// Call `callback` once with the first matching event: the response to
    /// `pair_id`, or the next event at all when `pair_id` is `None`.
    pub fn register_one_time_listener<F>(
        &self,
        pair_id: Option<String>,
        callback: F,
        on_error: Option<ErrorCallback>,
    ) -> bool
    where
        F: FnOnce(&Event) + Send + 'static,
    {
        let callback: OneTimeCallback = Box::new(callback);
        self.submit(on_error, |_| Command::RegisterOneTime {
            key: OneTimeKey::from(pair_id),
            callback,
        })
    }

    /// Remove the listener for `(event_type, source)`.
    ///
    /// A missing listener is reported through `on_error` once the hub
    /// processes the request.
    pub fn unregister_listener(
        &self,
        event_type: EventType,
        source: EventSource,
        on_error: Option<ErrorCallback>,
    ) -> bool {
        if let Err(error) = validate_key(&event_type, &source) {
            report(on_error, error);
            return false;
        }
        self.submit(on_error, |on_error| Command::UnregisterListener {
            cell: Arc::clone(&self.cell),
            key: SlotKey::new(event_type, source),
            on_error,
        })
    }

    /// Remove the module's wildcard listener.
    pub fn unregister_wildcard_listener(&self, on_error: Option<ErrorCallback>) -> bool {
        self.submit(on_error, |on_error| Command::UnregisterWildcard {
            cell: Arc::clone(&self.cell),
            on_error,
        })
    }

    /// Unregister this module: its listeners and then the module receive
    /// `on_unregistered`, and both of its ledgers are released.
    pub fn unregister_module(&self, on_error: Option<ErrorCallback>) -> bool {
        self.submit(on_error, |on_error| Command::UnregisterModule {
            cell: Arc::clone(&self.cell),
            on_error,
        })
    }

    /// Queue a command whose errors surface on the worker through `on_error`.
    fn submit(
        &self,
        on_error: Option<ErrorCallback>,
        command: impl FnOnce(Option<ErrorCallback>) -> Command,
    ) -> bool {
        if let Err(error) = self.ensure_usable() {
            report(on_error, error);
            return false;
        }
        // A refused command reports through its own callback.
        self.hub.enqueue(command(on_error)).is_ok()
    }

    // =========================================================================
    // SHARED STATE
    // =========================================================================

    /// Publish `state` as of `at`, or as of the event after the latest one
    /// published when `at` is `None`.
    ///
    /// `None` state records a pending slot to be filled by a later call with
    /// the same event. Filling a pending slot updates it in place.
    pub fn create_shared_state(
        &self,
        state: Option<EventData>,
        at: Option<&Event>,
        kind: SharedStateKind,
        on_error: Option<ErrorCallback>,
    ) -> bool {
        let result = self.ensure_usable().and_then(|()| {
            self.hub.mutate_shared_state(&self.cell, kind, |now| {
                let version = at.map_or(now, Event::number);
                let outcome = self.cell.ledgers().create_or_update(version, state, kind)?;
                debug!(
                    module = %self.cell.label(),
                    version,
                    kind = %kind,
                    outcome = ?outcome,
                    "Shared state written"
                );
                Ok(())
            })
        });
        or_report(result.map(|()| true), on_error, false)
    }

    /// Resolve the pending slot at `at` to the neighbouring value instead of
    /// giving it its own.
    pub fn link_shared_state(
        &self,
        at: &Event,
        link: LedgerLink,
        kind: SharedStateKind,
        on_error: Option<ErrorCallback>,
    ) -> bool {
        let result = self.ensure_usable().and_then(|()| {
            self.hub.mutate_shared_state(&self.cell, kind, |_| {
                self.cell.ledgers().link(at.number(), link, kind)
            })
        });
        or_report(result.map(|()| true), on_error, false)
    }

    /// Read the shared state of module `owner` as of `version`.
    pub fn get_shared_state(
        &self,
        owner: &str,
        version: impl Into<StateVersion>,
        kind: SharedStateKind,
        on_error: Option<ErrorCallback>,
    ) -> SharedStateResult {
        let result = self.hub.get_shared_state(owner, version.into(), kind);
        or_report(result, on_error, SharedStateResult::None)
    }

    /// Drop every version of this module's `kind` ledger.
    pub fn clear_shared_states(&self, kind: SharedStateKind, on_error: Option<ErrorCallback>) -> bool {
        let result = self.ensure_usable().and_then(|()| {
            self.hub.mutate_shared_state(&self.cell, kind, |_| {
                self.cell.ledgers().clear(kind);
                debug!(module = %self.cell.label(), kind = %kind, "Shared state cleared");
                Ok(())
            })
        });
        or_report(result.map(|()| true), on_error, false)
    }
}

fn boxed_factory<F, L>(factory: F) -> ListenerFactory
where
    F: FnOnce(ModuleContext) -> anyhow::Result<L> + Send + 'static,
    L: EventListener,
{
    Box::new(move |context| {
        factory(context).map(|listener| Box::new(listener) as Box<dyn EventListener>)
    })
}
