//! Shared fixtures for the scenario tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use taskflow_shared::{Identity, NewTask, Task, TaskId, TaskPatch, UserId};
use taskflow_store::{
    AuthBackend, AuthStateHandler, BackendError, FeedEvent, FeedHandler, MemoryBackend,
    TaskBackend, Unsubscribe,
};

/// One call observed by [`Recording`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SignUp(String),
    SignIn(String),
    SignInAnonymously,
    SignOutStarted,
    SignOutDone,
    Subscribe(UserId),
    Unsubscribe(UserId),
    Create(NewTask),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
}

/// Wraps a [`MemoryBackend`] and records every call made through it.
///
/// In detached mode task writes are recorded and acknowledged without
/// reaching the inner backend, and feed deliveries come only from
/// [`Recording::push`].
#[derive(Clone)]
pub struct Recording {
    pub inner: MemoryBackend,
    log: Arc<Mutex<Vec<Call>>>,
    /// Every handler ever registered, released or not.
    feeds: Arc<Mutex<Vec<(UserId, FeedHandler)>>>,
    detached: bool,
    next_id: Arc<AtomicUsize>,
}

impl Recording {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn detached() -> Self {
        Self::build(true)
    }

    /// Record calls made to an already configured backend.
    pub fn over(inner: MemoryBackend) -> Self {
        Self {
            inner,
            ..Self::new()
        }
    }

    fn build(detached: bool) -> Self {
        Self {
            inner: MemoryBackend::in_memory(),
            log: Arc::default(),
            feeds: Arc::default(),
            detached,
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Number of calls that reached the task store.
    pub fn task_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_) | Call::Update(..) | Call::Delete(_)))
            .count()
    }

    /// Deliver `event` to every handler ever registered for `owner`,
    /// including released ones.
    pub fn push(&self, owner: &UserId, event: FeedEvent) {
        let handlers: Vec<FeedHandler> = self
            .feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AuthBackend for Recording {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        self.record(Call::SignUp(email.to_string()));
        self.inner.sign_up(email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        self.record(Call::SignIn(email.to_string()));
        self.inner.sign_in(email, password).await
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, BackendError> {
        self.record(Call::SignInAnonymously);
        self.inner.sign_in_anonymously().await
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.record(Call::SignOutStarted);
        let result = self.inner.sign_out().await;
        self.record(Call::SignOutDone);
        result
    }

    fn on_state_change(&self, handler: AuthStateHandler) -> Unsubscribe {
        self.inner.on_state_change(handler)
    }
}

#[async_trait]
impl TaskBackend for Recording {
    fn subscribe(&self, owner: &UserId, handler: FeedHandler) -> Unsubscribe {
        self.record(Call::Subscribe(owner.clone()));
        self.feeds.lock().unwrap().push((owner.clone(), handler.clone()));

        let inner = if self.detached {
            Unsubscribe::noop()
        } else {
            self.inner.subscribe(owner, handler)
        };
        let log = self.log.clone();
        let owner = owner.clone();
        Unsubscribe::new(move || {
            log.lock().unwrap().push(Call::Unsubscribe(owner));
            inner.unsubscribe();
        })
    }

    async fn create(&self, task: NewTask) -> Result<TaskId, BackendError> {
        self.record(Call::Create(task.clone()));
        if self.detached {
            let n = self.next_id.fetch_add(1, Ordering::Relaxed);
            return Ok(TaskId::new(format!("t{n}")));
        }
        self.inner.create(task).await
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<(), BackendError> {
        self.record(Call::Update(id.clone(), patch.clone()));
        if self.detached {
            return Ok(());
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), BackendError> {
        self.record(Call::Delete(id.clone()));
        if self.detached {
            return Ok(());
        }
        self.inner.delete(id).await
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn task(id: &str, owner: &str, created_at: Option<DateTime<Utc>>) -> Task {
    Task {
        id: TaskId::new(id),
        text: format!("task {id}"),
        completed: false,
        created_at,
        owner_id: UserId::new(owner),
        owner_email: None,
    }
}
