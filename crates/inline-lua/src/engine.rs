//! State shared by the runtime, module handles, stubs and the `inline` API.

use crate::host::HostServices;
use crate::lazy::LazyModule;
use crate::registry::Registries;
use crate::scheduler::Scheduler;
use inline_runtime::{ModuleStore, Notification, NotificationSource, Notifier};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Weak};

/// One engine per [`ScriptRuntime`](crate::ScriptRuntime), living across
/// reloads.
///
/// Lua closures hold it through a `Weak` so the VM never keeps it alive.
pub struct Engine {
    pub(crate) registries: Mutex<Registries>,
    pub(crate) lazy: Mutex<HashMap<String, Arc<LazyModule>>>,
    pub(crate) scheduler: Scheduler,
    pub(crate) store: Arc<dyn ModuleStore>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) host: Arc<dyn HostServices>,
}

impl Engine {
    pub(crate) fn new(
        store: Arc<dyn ModuleStore>,
        notifier: Arc<dyn Notifier>,
        host: Arc<dyn HostServices>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registries: Mutex::new(Registries::new()),
            lazy: Mutex::new(HashMap::new()),
            scheduler: Scheduler::new(),
            store,
            notifier,
            host,
        })
    }

    /// Upgrades a weak reference held by a Lua closure.
    pub(crate) fn upgrade(weak: &Weak<Self>) -> mlua::Result<Arc<Self>> {
        weak.upgrade()
            .ok_or_else(|| mlua::Error::RuntimeError("script runtime has been shut down".into()))
    }

    pub(crate) fn generation(&self) -> u64 {
        self.scheduler.generation()
    }

    /// Reports a non-fatal error to the notification channel.
    pub(crate) fn notify(&self, source: NotificationSource, key: &str, error: impl Display) {
        self.notifier
            .notify(Notification::new(source, key, error.to_string()));
    }

    /// Clears registries and lazy guards, cancels timers and starts a new
    /// generation.
    pub(crate) fn reset(&self) -> u64 {
        self.registries.lock().clear();
        self.lazy.lock().clear();
        self.scheduler.reset()
    }
}
