//! # Hub Worker
//!
//! One thread drains one FIFO of [`Command`]s. Every listener call, factory
//! call and module lifecycle callback happens here, one at a time, so the
//! listener tables need no locking.
//!
//! ## Boot sequence
//!
//! ```text
//! register_module(A) ─┐
//! register_module(B) ─┤  factories run in queue order
//! finish_registration ┴─▶ hub shared state ─▶ HUB/BOOTED ─▶ on_booted
//! ```

use crate::hub::HubShared;
use crate::hub_module::{booted_event, hub_state, shared_state_change_event};
use crate::listener::{
    panic_message, BoxedListener, ListenerFactory, OneTimeCallback, OneTimeKey,
};
use crate::module::{Module, ModuleCell, ModuleContext, ModuleFactory};
use crate::registry::{ListenerRegistry, ModuleId, SlotKey};
use probe_state::SharedStateKind;
use probe_types::{report, ErrorCallback, Event, EventSource, EventType, ExtensionError};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Work items processed by the hub worker, in order.
pub(crate) enum Command {
    Dispatch(Event),
    RegisterModule {
        cell: Arc<ModuleCell>,
        factory: ModuleFactory,
        on_error: Option<ErrorCallback>,
    },
    UnregisterModule {
        cell: Arc<ModuleCell>,
        on_error: Option<ErrorCallback>,
    },
    RegisterListener {
        cell: Arc<ModuleCell>,
        key: SlotKey,
        factory: ListenerFactory,
        on_error: Option<ErrorCallback>,
    },
    RegisterWildcard {
        cell: Arc<ModuleCell>,
        factory: ListenerFactory,
        on_error: Option<ErrorCallback>,
    },
    UnregisterListener {
        cell: Arc<ModuleCell>,
        key: SlotKey,
        on_error: Option<ErrorCallback>,
    },
    UnregisterWildcard {
        cell: Arc<ModuleCell>,
        on_error: Option<ErrorCallback>,
    },
    RegisterOneTime {
        key: OneTimeKey,
        callback: OneTimeCallback,
    },
    /// Announce a state change written before the owner's name was known.
    SharedStateChanged {
        cell: Arc<ModuleCell>,
        kind: SharedStateKind,
    },
    FinishRegistration {
        on_booted: Task,
    },
    Run(Task),
    Idle(oneshot::Sender<()>),
    Shutdown(Option<oneshot::Sender<()>>),
}

impl Command {
    /// Drop a command the worker will never process. Its error callback, if
    /// it has one, hears `HubShutdown`.
    pub fn reject(self) {
        let on_error = match self {
            Self::RegisterModule { on_error, .. }
            | Self::UnregisterModule { on_error, .. }
            | Self::RegisterListener { on_error, .. }
            | Self::RegisterWildcard { on_error, .. }
            | Self::UnregisterListener { on_error, .. }
            | Self::UnregisterWildcard { on_error, .. } => on_error,
            _ => return,
        };
        report_guarded(on_error, ExtensionError::HubShutdown);
    }
}

struct ModuleEntry {
    cell: Arc<ModuleCell>,
    module: Box<dyn Module>,
}

enum Flow {
    Continue,
    Stop(Option<oneshot::Sender<()>>),
}

/// Run `f`, logging instead of unwinding if it panics.
fn guarded(what: &str, module: &str, f: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        error!(
            module,
            reason = %panic_message(payload.as_ref()),
            "{} panicked",
            what
        );
    }
}

/// Run a user factory. Errors and panics become a reason string.
fn build<T>(factory: impl FnOnce() -> anyhow::Result<T>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(factory)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(format!("factory panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn report_guarded(on_error: Option<ErrorCallback>, error: ExtensionError) {
    guarded("error callback", "-", || report(on_error, error));
}

fn retire_listener(module: &str, mut listener: BoxedListener) {
    guarded("Listener on_unregistered", module, || listener.on_unregistered());
}

pub(crate) struct Dispatcher {
    hub: Arc<HubShared>,
    hub_cell: Arc<ModuleCell>,
    receiver: mpsc::UnboundedReceiver<Command>,
    registry: ListenerRegistry,
    modules: HashMap<ModuleId, ModuleEntry>,
    booted: bool,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl Dispatcher {
    pub fn new(
        hub: Arc<HubShared>,
        hub_cell: Arc<ModuleCell>,
        receiver: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            hub,
            hub_cell,
            receiver,
            registry: ListenerRegistry::new(),
            modules: HashMap::new(),
            booted: false,
            idle_waiters: Vec::new(),
        }
    }

    /// Worker loop. Returns after a shutdown command.
    pub fn run(mut self) {
        debug!("Event hub worker running");
        while let Some(command) = self.receiver.blocking_recv() {
            let flow = self.process(command);
            let remaining = self.hub.finish_command();
            if let Flow::Stop(done) = flow {
                self.stop(done);
                return;
            }
            if remaining == 0 {
                for waiter in self.idle_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }
        self.stop(None);
    }

    fn process(&mut self, command: Command) -> Flow {
        match command {
            Command::Dispatch(event) => self.dispatch(&event),
            Command::RegisterModule {
                cell,
                factory,
                on_error,
            } => self.register_module(cell, factory, on_error),
            Command::UnregisterModule { cell, on_error } => self.unregister_module(&cell, on_error),
            Command::RegisterListener {
                cell,
                key,
                factory,
                on_error,
            } => self.register_listener(&cell, Some(key), factory, on_error),
            Command::RegisterWildcard {
                cell,
                factory,
                on_error,
            } => self.register_listener(&cell, None, factory, on_error),
            Command::UnregisterListener {
                cell,
                key,
                on_error,
            } => self.unregister_listener(&cell, Some(key), on_error),
            Command::UnregisterWildcard { cell, on_error } => {
                self.unregister_listener(&cell, None, on_error);
            }
            Command::RegisterOneTime { key, callback } => self.registry.add_one_time(key, callback),
            Command::SharedStateChanged { cell, kind } => self.announce(&cell, kind),
            Command::FinishRegistration { on_booted } => self.finish_registration(on_booted),
            Command::Run(task) => guarded("Hub task", "-", task),
            Command::Idle(waiter) => self.idle_waiters.push(waiter),
            Command::Shutdown(done) => return Flow::Stop(done),
        }
        Flow::Continue
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    fn dispatch(&mut self, event: &Event) {
        if self.hub.config().log_events {
            debug!(
                event_number = event.number(),
                event_type = %event.event_type(),
                event_source = %event.source(),
                name = event.name(),
                "Dispatching event"
            );
        }
        for failure in self.registry.deliver(event) {
            let label = self.label(failure.module);
            error!(
                module = %label,
                event_number = event.number(),
                reason = %failure.reason,
                "Listener panicked"
            );
            self.notify_module(
                failure.module,
                &ExtensionError::Unexpected {
                    reason: format!("listener panicked: {}", failure.reason),
                },
            );
        }
    }

    fn label(&self, module: ModuleId) -> String {
        self.modules
            .get(&module)
            .map_or_else(|| format!("<module #{module}>"), |entry| entry.cell.label())
    }

    fn notify_module(&mut self, module: ModuleId, error: &ExtensionError) {
        if let Some(entry) = self.modules.get_mut(&module) {
            let label = entry.cell.label();
            guarded("Module on_unexpected_error", &label, || {
                entry.module.on_unexpected_error(error);
            });
        }
    }

    // =========================================================================
    // MODULES
    // =========================================================================

    fn register_module(
        &mut self,
        cell: Arc<ModuleCell>,
        factory: ModuleFactory,
        on_error: Option<ErrorCallback>,
    ) {
        let context = ModuleContext::new(Arc::clone(&self.hub), Arc::clone(&cell));
        let mut module = match build(|| factory(context)) {
            Ok(module) => module,
            Err(reason) => {
                cell.retire();
                error!(module_id = cell.id(), reason = %reason, "Module construction failed");
                report_guarded(on_error, ExtensionError::ModuleConstructionFailed { reason });
                return;
            }
        };

        let name = module.name().trim().to_string();
        let version = module.version().to_string();
        let rejection = if name.is_empty() {
            Some(ExtensionError::BadName { what: "module name" })
        } else if !self.hub.enroll(&name, Arc::clone(&cell)) {
            Some(ExtensionError::DuplicateName { name: name.clone() })
        } else {
            None
        };
        if let Some(rejection) = rejection {
            cell.retire();
            warn!(module = %name, error = %rejection, "Module rejected");
            guarded("Module on_unexpected_error", &name, || {
                module.on_unexpected_error(&rejection);
            });
            report_guarded(on_error, rejection);
            return;
        }

        cell.activate(name.clone(), version.clone());
        self.registry.add_module(cell.id());
        self.modules.insert(cell.id(), ModuleEntry { cell, module });
        info!(module = %name, version = %version, "Module registered");

        if self.booted {
            self.share_hub_state();
        }
    }

    fn unregister_module(&mut self, cell: &Arc<ModuleCell>, on_error: Option<ErrorCallback>) {
        if cell.id() == self.hub_cell.id() {
            report_guarded(
                on_error,
                ExtensionError::Unexpected {
                    reason: "the event hub module cannot be unregistered".to_string(),
                },
            );
            return;
        }
        let Some(entry) = self.modules.remove(&cell.id()) else {
            report_guarded(on_error, ExtensionError::ModuleNotRegistered { name: cell.label() });
            return;
        };
        self.retire_module(entry);
        if self.booted {
            self.share_hub_state();
        }
    }

    fn retire_module(&mut self, mut entry: ModuleEntry) {
        let label = entry.cell.label();
        for listener in self.registry.remove_module(entry.cell.id()) {
            retire_listener(&label, listener);
        }
        guarded("Module on_unregistered", &label, || entry.module.on_unregistered());
        entry.cell.retire();
        entry.cell.ledgers().clear_all();
        if let Some(name) = entry.cell.name() {
            self.hub.withdraw(name);
        }
        info!(module = %label, "Module unregistered");
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// `key` is `None` for the wildcard slot.
    fn register_listener(
        &mut self,
        cell: &Arc<ModuleCell>,
        key: Option<SlotKey>,
        factory: ListenerFactory,
        on_error: Option<ErrorCallback>,
    ) {
        let module = cell.id();
        if !self.registry.contains_module(module) {
            report_guarded(on_error, ExtensionError::ModuleNotRegistered { name: cell.label() });
            return;
        }
        let label = cell.label();

        let previous = match &key {
            Some(key) => self.registry.remove(module, key),
            None => self.registry.take_wildcard(module),
        };
        if let Some(previous) = previous {
            retire_listener(&label, previous);
        }

        let context = ModuleContext::new(Arc::clone(&self.hub), Arc::clone(cell));
        match build(|| factory(context)) {
            Ok(listener) => {
                match key {
                    Some(key) => {
                        debug!(
                            module = %label,
                            event_type = %key.event_type,
                            event_source = %key.source,
                            "Listener registered"
                        );
                        self.registry.insert(module, key, listener);
                    }
                    None => {
                        debug!(module = %label, "Wildcard listener registered");
                        self.registry.set_wildcard(module, listener);
                    }
                }
            }
            Err(reason) => {
                error!(module = %label, reason = %reason, "Listener construction failed");
                self.notify_module(
                    module,
                    &ExtensionError::ListenerConstructionFailed {
                        module: label,
                        reason,
                    },
                );
            }
        }
    }

    fn unregister_listener(
        &mut self,
        cell: &Arc<ModuleCell>,
        key: Option<SlotKey>,
        on_error: Option<ErrorCallback>,
    ) {
        let module = cell.id();
        if !self.registry.contains_module(module) {
            report_guarded(on_error, ExtensionError::ModuleNotRegistered { name: cell.label() });
            return;
        }
        let removed = match &key {
            Some(key) => self.registry.remove(module, key),
            None => self.registry.take_wildcard(module),
        };
        match removed {
            Some(listener) => {
                retire_listener(&cell.label(), listener);
                debug!(module = %cell.label(), "Listener unregistered");
            }
            None => {
                let (event_type, event_source) = key.map_or(
                    (EventType::WILDCARD, EventSource::WILDCARD),
                    |key| (key.event_type, key.source),
                );
                report_guarded(
                    on_error,
                    ExtensionError::ListenerNotRegistered {
                        event_type,
                        event_source,
                    },
                );
            }
        }
    }

    // =========================================================================
    // SHARED STATE AND BOOT
    // =========================================================================

    fn announce(&self, cell: &ModuleCell, kind: SharedStateKind) {
        if !cell.is_active() {
            return;
        }
        if let Some(owner) = cell.name() {
            if let Err(err) = self.hub.dispatch(shared_state_change_event(owner, kind)) {
                warn!(module = owner, error = %err, "Shared state change not announced");
            }
        }
    }

    fn share_hub_state(&mut self) {
        if !self.hub.config().share_hub_state {
            return;
        }
        let modules = self.hub.module_versions();
        let data = hub_state(
            &self.hub.config().version,
            modules.iter().map(|(name, version)| (name.as_str(), version.as_str())),
        );

        let ledgers = self.hub_cell.ledgers();
        let written = self.hub.mutate_shared_state(&self.hub_cell, SharedStateKind::Standard, |version| {
            ledgers
                .create_or_update(version, Some(data), SharedStateKind::Standard)
                .map(|_| version)
        });
        match written {
            Ok(version) => debug!(version, modules = modules.len(), "Hub shared state updated"),
            Err(err) => warn!(error = %err, "Hub shared state not updated"),
        }
    }

    fn finish_registration(&mut self, on_booted: Task) {
        if self.booted {
            guarded("on_booted", "-", on_booted);
            return;
        }
        self.booted = true;
        self.share_hub_state();
        if let Err(err) = self.hub.dispatch(booted_event()) {
            warn!(error = %err, "Boot event not dispatched");
        }
        // Runs after BOOTED has been delivered.
        if let Err(err) = self.hub.send(Command::Run(on_booted)) {
            warn!(error = %err, "Boot callback dropped");
        }
        info!(modules = self.modules.len(), "Event hub booted");
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    fn stop(&mut self, done: Option<oneshot::Sender<()>>) {
        self.receiver.close();
        let mut waiters: Vec<_> = done.into_iter().collect();
        waiters.append(&mut self.idle_waiters);
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                Command::Shutdown(Some(waiter)) | Command::Idle(waiter) => waiters.push(waiter),
                command => command.reject(),
            }
        }

        let order: Vec<ModuleId> = self.registry.modules().to_vec();
        for module in order {
            if let Some(entry) = self.modules.remove(&module) {
                self.retire_module(entry);
            }
        }
        self.hub_cell.retire();
        self.hub_cell.ledgers().clear_all();
        self.hub.withdraw_all();

        info!("Event hub stopped");
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}
