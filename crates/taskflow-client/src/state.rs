//! Application state shared by every command handler.
//!
//! [`AppState`] wires the session gate to the task list store: the store is
//! registered as a session observer, so it rebinds its feed whenever the
//! signed-in user changes.

use std::sync::Arc;

use taskflow_store::{AuthBackend, TaskBackend};

use crate::session::SessionGate;
use crate::tasks::TaskListStore;

/// Central application state.
#[derive(Clone)]
pub struct AppState {
    /// Who is signed in, plus the last authentication error.
    pub session: SessionGate,

    /// The signed-in user's tasks, kept live while a session exists.
    pub tasks: TaskListStore,
}

impl AppState {
    /// Build state over separate auth and data capabilities.
    pub fn new(auth: Arc<dyn AuthBackend>, tasks: Arc<dyn TaskBackend>) -> Self {
        let session = SessionGate::new(auth);
        let tasks = TaskListStore::new(tasks);
        session.add_observer(Arc::new(tasks.clone()));
        Self { session, tasks }
    }

    /// Build state over one backend that provides both capabilities.
    pub fn with_backend<B>(backend: B) -> Self
    where
        B: AuthBackend + TaskBackend + 'static,
    {
        let backend = Arc::new(backend);
        Self::new(backend.clone(), backend)
    }

    /// Begin following the backend's session reports.
    pub fn start(&self) {
        self.session.start();
    }

    /// Stop following session reports and release the task feed.
    pub fn shutdown(&self) {
        self.session.stop();
        self.tasks.unbind();
    }
}
