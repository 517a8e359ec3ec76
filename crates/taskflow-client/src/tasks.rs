//! The Task List Store: a live, ordered projection of the bound identity's
//! tasks.
//!
//! The list is never edited locally. `add`, `toggle` and `remove` only send
//! requests; the next feed snapshot is the sole source of truth and replaces
//! the whole list.
//!
//! Ordering is applied here rather than by the backend query: filtering by
//! owner and ordering by creation time on the server would need a composite
//! index, while per-user lists are small enough to sort on every snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use taskflow_shared::validation::{normalize_task_text, ValidationError};
use taskflow_shared::{ClassifiedError, Identity, NewTask, Task, TaskId, TaskPatch, UserId};
use taskflow_store::{FeedEvent, FeedHandler, TaskBackend, Unsubscribe};

use crate::classify::{classify_task, TaskOperation};
use crate::session::SessionObserver;

/// Everything the presentation layer reads from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListState {
    /// Identity the list is bound to.
    pub owner: Option<UserId>,
    /// Newest first; undated tasks last.
    pub tasks: Vec<Task>,
    /// Last feed or request failure. Cleared by the next good snapshot.
    pub error: Option<ClassifiedError>,
}

impl ListState {
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}

/// Cheaply clonable handle to the task list store.
#[derive(Clone)]
pub struct TaskListStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backend: Arc<dyn TaskBackend>,
    /// Held for the whole of a rebind, so rebinds never overlap.
    subscription: Mutex<Option<Unsubscribe>>,
    state: Mutex<Binding>,
    tx: watch::Sender<ListState>,
}

/// Mutable binding. `generation` changes on every rebind; feed handlers
/// carry the generation they were created for and are ignored once stale.
#[derive(Default)]
struct Binding {
    generation: u64,
    identity: Option<Identity>,
    list: ListState,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sort by creation time, newest first. Tasks without a timestamp count as
/// the oldest possible value; the sort is stable.
pub fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl StoreInner {
    fn publish(&self, binding: &Binding) {
        self.tx.send_replace(binding.list.clone());
    }

    fn on_feed_event(&self, generation: u64, event: FeedEvent) {
        let mut binding = lock(&self.state);
        if binding.generation != generation {
            debug!(generation, current = binding.generation, "Dropping stale feed event");
            return;
        }
        let Some(owner) = binding.identity.as_ref().map(|i| i.uid.clone()) else {
            return;
        };

        match event {
            FeedEvent::Snapshot(tasks) => {
                let mut tasks: Vec<Task> =
                    tasks.into_iter().filter(|t| t.owner_id == owner).collect();
                sort_newest_first(&mut tasks);
                debug!(owner = %owner.short(), count = tasks.len(), "Applied feed snapshot");
                binding.list.tasks = tasks;
                binding.list.error = None;
            }
            FeedEvent::Error(e) => {
                let err = classify_task(&e, TaskOperation::Subscribe);
                warn!(owner = %owner.short(), code = %e.code, "Feed error, keeping last snapshot");
                binding.list.error = Some(err);
            }
        }
        self.publish(&binding);
    }
}

impl TaskListStore {
    pub fn new(backend: Arc<dyn TaskBackend>) -> Self {
        let (tx, _) = watch::channel(ListState::default());
        Self {
            inner: Arc::new(StoreInner {
                backend,
                subscription: Mutex::new(None),
                state: Mutex::new(Binding::default()),
                tx,
            }),
        }
    }

    pub fn state(&self) -> ListState {
        lock(&self.inner.state).list.clone()
    }

    /// Receiver that sees every published list state.
    pub fn watch(&self) -> watch::Receiver<ListState> {
        self.inner.tx.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        lock(&self.inner.state).identity.clone()
    }

    /// Bind to `identity`, or unbind with `None`.
    ///
    /// The previous subscription is released before the new one is opened,
    /// and once this returns no event from the previous subscription can
    /// reach the list.
    pub fn bind(&self, identity: Option<Identity>) {
        let mut subscription = lock(&self.inner.subscription);
        if let Some(previous) = subscription.take() {
            previous.unsubscribe();
        }

        let generation = {
            let mut binding = lock(&self.inner.state);
            binding.generation += 1;
            binding.identity = identity.clone();
            binding.list = ListState {
                owner: identity.as_ref().map(|i| i.uid.clone()),
                ..Default::default()
            };
            self.inner.publish(&binding);
            binding.generation
        };

        let Some(identity) = identity else {
            info!("Task list unbound");
            return;
        };

        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let handler: FeedHandler = Arc::new(move |event: FeedEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_feed_event(generation, event);
            }
        });

        info!(owner = %identity.uid.short(), generation, "Task list bound");
        *subscription = Some(self.inner.backend.subscribe(&identity.uid, handler));
    }

    pub fn unbind(&self) {
        self.bind(None);
    }

    /// Request creation of a task. The trimmed text must be non-empty and an
    /// identity must be bound; otherwise nothing is sent.
    pub async fn add(&self, text: &str) -> Result<TaskId, ClassifiedError> {
        let text = normalize_task_text(text)?;
        let (identity, generation) = self.bound()?;

        let task = NewTask::for_identity(&identity, text);
        let result = self
            .inner
            .backend
            .create(task)
            .await
            .map_err(|e| classify_task(&e, TaskOperation::Add));
        if let Ok(ref id) = result {
            debug!(task = %id.short(), "Create request accepted");
        }
        self.record(generation, &result);
        result
    }

    /// Request the completion flag of `id` be flipped, based on the flag in
    /// the current list.
    pub async fn toggle(&self, id: &TaskId) -> Result<(), ClassifiedError> {
        let current = lock(&self.inner.state)
            .list
            .get(id)
            .map(|t| t.completed);
        match current {
            Some(completed) => self.set_completed(id, !completed).await,
            None => {
                self.bound()?;
                Err(ClassifiedError::validation(format!("No task with id {id}.")))
            }
        }
    }

    /// Request the completion flag of `id` be set to `completed`.
    pub async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<(), ClassifiedError> {
        let (_, generation) = self.bound()?;
        let result = self
            .inner
            .backend
            .update(id, TaskPatch::completed(completed))
            .await
            .map_err(|e| classify_task(&e, TaskOperation::Toggle));
        self.record(generation, &result);
        result
    }

    /// Request deletion of `id`, which must be in the current list.
    pub async fn remove(&self, id: &TaskId) -> Result<(), ClassifiedError> {
        let (_, generation) = self.bound()?;
        if lock(&self.inner.state).list.get(id).is_none() {
            return Err(ClassifiedError::validation(format!("No task with id {id}.")));
        }
        let result = self
            .inner
            .backend
            .delete(id)
            .await
            .map_err(|e| classify_task(&e, TaskOperation::Remove));
        self.record(generation, &result);
        result
    }

    fn bound(&self) -> Result<(Identity, u64), ClassifiedError> {
        let binding = lock(&self.inner.state);
        match binding.identity {
            Some(ref identity) => Ok((identity.clone(), binding.generation)),
            None => Err(ValidationError::NotSignedIn.into()),
        }
    }

    /// Record a request outcome, unless the store was rebound meanwhile.
    fn record<T>(&self, generation: u64, result: &Result<T, ClassifiedError>) {
        let mut binding = lock(&self.inner.state);
        if binding.generation != generation {
            return;
        }
        match result {
            Ok(_) if binding.list.error.is_none() => return,
            Ok(_) => binding.list.error = None,
            Err(e) => {
                warn!(kind = %e.kind, error = %e, "Task request failed");
                binding.list.error = Some(e.clone());
            }
        }
        self.inner.publish(&binding);
    }
}

impl SessionObserver for TaskListStore {
    fn on_session_change(&self, identity: Option<&Identity>) {
        let bound = self.identity().map(|i| i.uid);
        if bound.as_ref() == identity.map(|i| &i.uid) {
            return;
        }
        self.bind(identity.cloned());
    }
}
