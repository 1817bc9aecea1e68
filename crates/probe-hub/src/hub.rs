//! # Event Hub
//!
//! [`EventHub`] is the public handle. It is cheap to clone; when the last
//! clone is dropped the hub stops after draining what was already queued.
//!
//! ## Threading
//!
//! ```text
//! any thread ──publish/register──▶ [ FIFO ] ──▶ hub worker ──▶ listeners
//!      │                                          (one thread, in order)
//!      └───── shared-state read/write ──▶ RwLock'd ledgers (no queueing)
//! ```

use crate::clock::{Clock, SystemClock};
use crate::config::HubConfig;
use crate::dispatcher::{Command, Dispatcher};
use crate::error::HubResult;
use crate::hub_module::{shared_state_change_event, EVENT_HUB_MODULE_NAME};
use crate::listener::OneTimeKey;
use crate::module::{or_report, validate_event, ModuleCell, ModuleContext, ModuleFactory};
use crate::Module;
use parking_lot::{Mutex, RwLock};
use probe_state::{SharedStateKind, SharedStateResult};
use probe_types::{report, ErrorCallback, Event, ExtensionError, StateVersion};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// State shared by the hub handle, every module context and the worker.
pub(crate) struct HubShared {
    config: HubConfig,
    clock: Arc<dyn Clock>,
    sender: mpsc::UnboundedSender<Command>,
    /// Held while numbering and sending an event, so queue order is number order.
    enqueue_lock: Mutex<()>,
    last_event_number: AtomicU64,
    /// Commands sent but not yet processed.
    outstanding: AtomicUsize,
    next_module_id: AtomicU64,
    stopped: AtomicBool,
    directory: RwLock<HashMap<String, Arc<ModuleCell>>>,
}

impl HubShared {
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn finish_command(&self) -> usize {
        self.outstanding.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn last_event_number(&self) -> u64 {
        self.last_event_number.load(Ordering::Acquire)
    }

    pub fn allocate_module_id(&self) -> u64 {
        self.next_module_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn enqueue(&self, command: Command) -> Result<(), ExtensionError> {
        if self.is_stopped() {
            command.reject();
            return Err(ExtensionError::HubShutdown);
        }
        self.send(command)
    }

    /// Send without the stopped check; the worker uses this while draining.
    pub fn send(&self, command: Command) -> Result<(), ExtensionError> {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.sender.send(command).map_err(|mpsc::error::SendError(command)| {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            command.reject();
            ExtensionError::HubShutdown
        })
    }

    /// Number, stamp and queue `event`. Returns its sequence number.
    pub fn publish(&self, event: Event) -> Result<u64, ExtensionError> {
        if self.is_stopped() {
            return Err(ExtensionError::HubShutdown);
        }
        self.dispatch(event)
    }

    pub fn dispatch(&self, event: Event) -> Result<u64, ExtensionError> {
        validate_event(&event)?;
        let _guard = self.enqueue_lock.lock();
        self.stamp_and_send(event)
    }

    /// Caller holds `enqueue_lock`.
    fn stamp_and_send(&self, event: Event) -> Result<u64, ExtensionError> {
        let number = self.last_event_number() + 1;
        let event = event.stamped(number, self.clock.now_millis());
        self.send(Command::Dispatch(event))?;
        self.last_event_number.store(number, Ordering::Release);
        Ok(number)
    }

    /// Mutate `cell`'s `kind` ledger and queue the change notification as a
    /// single step of the event sequence.
    ///
    /// `mutate` receives the version a write made "now" belongs to: above the
    /// last stamped event and above the ledger's latest version. No event can
    /// be numbered between choosing that version and the write landing.
    pub fn mutate_shared_state<T>(
        &self,
        cell: &Arc<ModuleCell>,
        kind: SharedStateKind,
        mutate: impl FnOnce(u64) -> Result<T, ExtensionError>,
    ) -> Result<T, ExtensionError> {
        let _guard = self.enqueue_lock.lock();
        let next = self.last_event_number() + 1;
        let now = cell
            .ledgers()
            .latest_version(kind)
            .map_or(next, |latest| next.max(latest + 1));
        let value = mutate(now)?;

        match cell.name() {
            Some(owner) => self
                .stamp_and_send(shared_state_change_event(owner, kind))
                .map(|_| ())?,
            // Still constructing: the worker announces once the name is known.
            None => self.send(Command::SharedStateChanged {
                cell: Arc::clone(cell),
                kind,
            })?,
        }
        Ok(value)
    }

    pub fn get_shared_state(
        &self,
        owner: &str,
        version: StateVersion,
        kind: SharedStateKind,
    ) -> Result<SharedStateResult, ExtensionError> {
        if owner.trim().is_empty() {
            return Err(ExtensionError::BadName { what: "state owner" });
        }
        Ok(self
            .lookup(owner)
            .map_or(SharedStateResult::None, |cell| cell.ledgers().resolve(version, kind)))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ModuleCell>> {
        self.directory.read().get(name).cloned()
    }

    pub fn enroll(&self, name: &str, cell: Arc<ModuleCell>) -> bool {
        let mut directory = self.directory.write();
        if directory.contains_key(name) {
            return false;
        }
        directory.insert(name.to_string(), cell);
        true
    }

    pub fn withdraw(&self, name: &str) -> Option<Arc<ModuleCell>> {
        self.directory.write().remove(name)
    }

    pub fn withdraw_all(&self) -> Vec<Arc<ModuleCell>> {
        self.directory.write().drain().map(|(_, cell)| cell).collect()
    }

    /// `(name, version)` of every enrolled module except the hub, by name.
    pub fn module_versions(&self) -> Vec<(String, String)> {
        let directory = self.directory.read();
        let mut modules: Vec<_> = directory
            .iter()
            .filter(|(name, _)| name.as_str() != EVENT_HUB_MODULE_NAME)
            .map(|(name, cell)| {
                let version = cell.identity().map(|id| id.version.clone()).unwrap_or_default();
                (name.clone(), version)
            })
            .collect();
        modules.sort();
        modules
    }

    fn begin_shutdown(&self, done: Option<oneshot::Sender<()>>) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            info!(worker = %self.config.worker_name, "Event hub shutting down");
        }
        // A second request still waits for the worker to finish.
        let _ = self.send(Command::Shutdown(done));
    }
}

/// Stops the worker when the last [`EventHub`] clone goes away.
struct Lifetime {
    shared: Arc<HubShared>,
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        if !self.shared.is_stopped() {
            self.shared.begin_shutdown(None);
        }
    }
}

/// Handle to a running event hub.
#[derive(Clone)]
pub struct EventHub {
    shared: Arc<HubShared>,
    _lifetime: Arc<Lifetime>,
}

impl EventHub {
    /// Start a hub with the system clock.
    pub fn new(config: HubConfig) -> HubResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Start a hub whose events are stamped by `clock`.
    pub fn with_clock(config: HubConfig, clock: Arc<dyn Clock>) -> HubResult<Self> {
        config.validate()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker_name = config.worker_name.clone();

        let shared = Arc::new(HubShared {
            config,
            clock,
            sender,
            enqueue_lock: Mutex::new(()),
            last_event_number: AtomicU64::new(0),
            outstanding: AtomicUsize::new(0),
            next_module_id: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            directory: RwLock::new(HashMap::new()),
        });

        let hub_cell = Arc::new(ModuleCell::new(shared.allocate_module_id()));
        hub_cell.activate(
            EVENT_HUB_MODULE_NAME.to_string(),
            shared.config().version.clone(),
        );
        shared.enroll(EVENT_HUB_MODULE_NAME, Arc::clone(&hub_cell));

        let dispatcher = Dispatcher::new(Arc::clone(&shared), hub_cell, receiver);
        thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || dispatcher.run())?;

        info!(worker = %worker_name, "Event hub started");
        Ok(Self {
            _lifetime: Arc::new(Lifetime {
                shared: Arc::clone(&shared),
            }),
            shared,
        })
    }

    /// Queue `event` for delivery. Returns its sequence number, or 0 when it
    /// was not accepted.
    pub fn publish(&self, event: Event, on_error: Option<ErrorCallback>) -> u64 {
        or_report(self.shared.publish(event), on_error, 0)
    }

    /// Queue construction of a module. The factory runs on the hub worker.
    ///
    /// Returns `false` only when the request could not be queued; failures
    /// of the factory itself are reported through `on_error` later.
    pub fn register_module<F, M>(&self, factory: F, on_error: Option<ErrorCallback>) -> bool
    where
        F: FnOnce(ModuleContext) -> anyhow::Result<M> + Send + 'static,
        M: Module,
    {
        let factory: ModuleFactory =
            Box::new(move |context| factory(context).map(|module| Box::new(module) as Box<dyn Module>));
        let cell = Arc::new(ModuleCell::new(self.shared.allocate_module_id()));
        debug!(module_id = cell.id(), "Queueing module registration");

        if self.shared.is_stopped() {
            report(on_error, ExtensionError::HubShutdown);
            return false;
        }
        let command = Command::RegisterModule {
            cell,
            factory,
            on_error,
        };
        // A refused command reports through its own callback.
        self.shared.enqueue(command).is_ok()
    }

    /// Finish the boot sequence once every module queued so far is built:
    /// share the hub state, dispatch `HUB/BOOTED`, then call `on_booted`.
    ///
    /// Later calls only invoke `on_booted`.
    pub fn finish_modules_registration<F>(&self, on_booted: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let command = Command::FinishRegistration {
            on_booted: Box::new(on_booted),
        };
        or_report(self.shared.enqueue(command).map(|()| true), None, false)
    }

    /// Call `callback` once with the response to `pair_id`, or with the next
    /// event when `pair_id` is `None`.
    pub fn register_one_time_listener<F>(
        &self,
        pair_id: Option<String>,
        callback: F,
        on_error: Option<ErrorCallback>,
    ) -> bool
    where
        F: FnOnce(&Event) + Send + 'static,
    {
        let command = Command::RegisterOneTime {
            key: OneTimeKey::from(pair_id),
            callback: Box::new(callback),
        };
        or_report(self.shared.enqueue(command).map(|()| true), on_error, false)
    }

    /// Read `owner`'s shared state as of `version`.
    pub fn get_shared_state(
        &self,
        owner: &str,
        version: impl Into<StateVersion>,
        kind: SharedStateKind,
        on_error: Option<ErrorCallback>,
    ) -> SharedStateResult {
        let result = self.shared.get_shared_state(owner, version.into(), kind);
        or_report(result, on_error, SharedStateResult::None)
    }

    /// Unregister the module called `name`.
    pub fn unregister_module(&self, name: &str, on_error: Option<ErrorCallback>) -> bool {
        let cell = match self.lookup_unregistrable(name) {
            Ok(cell) => cell,
            Err(error) => {
                report(on_error, error);
                return false;
            }
        };
        let command = Command::UnregisterModule { cell, on_error };
        // A refused command reports through its own callback.
        self.shared.enqueue(command).is_ok()
    }

    fn lookup_unregistrable(&self, name: &str) -> Result<Arc<ModuleCell>, ExtensionError> {
        if name.trim().is_empty() {
            return Err(ExtensionError::BadName { what: "module name" });
        }
        if name == EVENT_HUB_MODULE_NAME {
            return Err(ExtensionError::Unexpected {
                reason: "the event hub module cannot be unregistered".to_string(),
            });
        }
        self.shared
            .lookup(name)
            .ok_or_else(|| ExtensionError::ModuleNotRegistered {
                name: name.to_string(),
            })
    }

    /// Highest sequence number assigned so far.
    #[must_use]
    pub fn last_event_number(&self) -> u64 {
        self.shared.last_event_number()
    }

    /// Names of the registered modules, excluding the hub's own, sorted.
    #[must_use]
    pub fn registered_modules(&self) -> Vec<String> {
        self.shared
            .module_versions()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Completes once the queue has drained, including any work that
    /// draining produced.
    pub fn wait_idle(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        // On failure `tx` is dropped and the receiver reports it.
        let _ = self.shared.send(Command::Idle(tx));
        rx
    }

    /// Stop accepting work, drain the queue, unregister every module and
    /// stop the worker. The receiver completes when the worker is done.
    pub fn shutdown(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.shared.begin_shutdown(Some(tx));
        rx
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.shared.is_stopped()
    }
}
