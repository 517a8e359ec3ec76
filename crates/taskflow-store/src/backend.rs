//! Capability traits for the hosted backend.

use std::sync::Arc;

use async_trait::async_trait;

use taskflow_shared::{Identity, NewTask, Task, TaskId, TaskPatch, UserId};

use crate::error::BackendError;

/// Called with the current session on registration and on every change.
pub type AuthStateHandler = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Called with every event of a live task subscription.
pub type FeedHandler = Arc<dyn Fn(FeedEvent) + Send + Sync>;

/// One delivery from the live change feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The complete current set of the subscribed owner's tasks, in no
    /// particular order. Never a diff.
    Snapshot(Vec<Task>),
    /// Subscription-level failure, e.g. the query was rejected.
    Error(BackendError),
}

/// Authentication capabilities of the backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, BackendError>;

    async fn sign_in_anonymously(&self) -> Result<Identity, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Register a session listener. The handler is invoked with the current
    /// (possibly persisted) session before this returns, then on every change.
    fn on_state_change(&self, handler: AuthStateHandler) -> Unsubscribe;
}

/// Document store and live feed for task documents.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Subscribe to every task owned by `owner`.
    fn subscribe(&self, owner: &UserId, handler: FeedHandler) -> Unsubscribe;

    async fn create(&self, task: NewTask) -> Result<TaskId, BackendError>;

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<(), BackendError>;

    async fn delete(&self, id: &TaskId) -> Result<(), BackendError>;
}

/// Handle to a listener registration.
///
/// [`Unsubscribe::unsubscribe`] releases the registration before it returns;
/// dropping a handle that was not released explicitly releases it too.
pub struct Unsubscribe {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.release.is_some())
            .finish()
    }
}
