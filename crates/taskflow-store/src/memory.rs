//! In-process backend implementing [`AuthBackend`] and [`TaskBackend`].
//!
//! Behaves like the hosted service as far as the client can observe:
//! accounts and guest sessions, owner-scoped write rules, and a live feed
//! that pushes the full owner-filtered task set after every change. State
//! can optionally be persisted to a JSON file so a restarted process finds
//! its previous session.
//!
//! Listeners are never invoked while an internal lock is held, so a
//! listener may call back into the backend (a session listener that
//! subscribes to the feed, for instance).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskflow_shared::constants::{DEFAULT_PROJECT_ID, MIN_PASSWORD_LEN};
use taskflow_shared::validation::validate_email;
use taskflow_shared::{CreatedAt, Identity, NewTask, Task, TaskId, TaskPatch, UserId};

use crate::backend::{
    AuthBackend, AuthStateHandler, FeedEvent, FeedHandler, TaskBackend, Unsubscribe,
};
use crate::error::{codes, BackendError, StoreError};
use crate::persist::{self, Account, PersistedState};

/// Key derivation context for stored password hashes (BLAKE3).
const PASSWORD_KDF_CONTEXT: &str = "taskflow-password-v1";

const PERMISSION_MESSAGE: &str = "Missing or insufficient permissions.";

/// Settings of the in-process backend.
#[derive(Clone)]
pub struct MemoryConfig {
    /// Project the backend pretends to serve; only used in logs.
    pub project_id: String,
    /// Auth domain of the project; only used in logs.
    pub auth_domain: String,
    /// Client API key. Never logged.
    pub api_key: Option<String>,
    /// Email/password sign-in enabled on the project.
    pub email_auth_enabled: bool,
    /// Anonymous (guest) sign-in enabled on the project.
    pub anonymous_auth_enabled: bool,
    /// Artificial delay applied to every async request.
    pub latency: Duration,
    /// Where to persist state. `None` keeps everything in memory.
    pub state_path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            auth_domain: format!("{DEFAULT_PROJECT_ID}.local"),
            api_key: None,
            email_auth_enabled: true,
            anonymous_auth_enabled: true,
            latency: Duration::ZERO,
            state_path: None,
        }
    }
}

impl fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("project_id", &self.project_id)
            .field("auth_domain", &self.auth_domain)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("email_auth_enabled", &self.email_auth_enabled)
            .field("anonymous_auth_enabled", &self.anonymous_auth_enabled)
            .field("latency", &self.latency)
            .field("state_path", &self.state_path)
            .finish()
    }
}

/// Cheaply clonable handle to one in-process backend instance.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

struct Inner {
    config: MemoryConfig,
    auth: Mutex<AuthState>,
    docs: Mutex<DocState>,
    /// Held from snapshot to rename so writes reach disk in order.
    persist: Mutex<()>,
    next_listener: AtomicU64,
}

#[derive(Default)]
struct AuthState {
    /// Keyed by lower-cased email.
    accounts: HashMap<String, Account>,
    session: Option<Identity>,
    listeners: Vec<(u64, AuthStateHandler)>,
    fail_next: Option<BackendError>,
}

#[derive(Default)]
struct DocState {
    /// Storage order, which is also feed order.
    tasks: Vec<Task>,
    subscribers: Vec<Subscriber>,
    denied: HashSet<UserId>,
    fail_next: Option<BackendError>,
}

struct Subscriber {
    id: u64,
    owner: UserId,
    handler: FeedHandler,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn password_hash(uid: &UserId, password: &str) -> String {
    let mut hasher = blake3::Hasher::new_derive_key(PASSWORD_KDF_CONTEXT);
    hasher.update(uid.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MemoryBackend {
    /// Create a backend, loading persisted state if a state path is set.
    pub fn new(config: MemoryConfig) -> Result<Self, StoreError> {
        let state = match config.state_path {
            Some(ref path) => {
                let state = persist::load(path)?;
                info!(
                    path = %path.display(),
                    accounts = state.accounts.len(),
                    tasks = state.tasks.len(),
                    session = state.session.is_some(),
                    "Loaded backend state"
                );
                state
            }
            None => PersistedState::default(),
        };
        Ok(Self::from_state(config, state))
    }

    /// A fresh backend with default settings and no persistence.
    pub fn in_memory() -> Self {
        Self::from_state(MemoryConfig::default(), PersistedState::default())
    }

    fn from_state(config: MemoryConfig, state: PersistedState) -> Self {
        info!(
            project = %config.project_id,
            auth_domain = %config.auth_domain,
            api_key_set = config.api_key.is_some(),
            email_auth = config.email_auth_enabled,
            anonymous_auth = config.anonymous_auth_enabled,
            "Starting in-process backend"
        );

        let accounts = state
            .accounts
            .into_iter()
            .map(|account| (email_key(&account.email), account))
            .collect();

        Self {
            inner: Arc::new(Inner {
                config,
                auth: Mutex::new(AuthState {
                    accounts,
                    session: state.session,
                    listeners: Vec::new(),
                    fail_next: None,
                }),
                docs: Mutex::new(DocState {
                    tasks: state.tasks,
                    ..Default::default()
                }),
                persist: Mutex::new(()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.inner.config
    }

    /// The session the backend currently considers signed in.
    pub fn session(&self) -> Option<Identity> {
        lock(&self.inner.auth).session.clone()
    }

    /// All stored tasks owned by `owner`, in storage order.
    pub fn tasks_of(&self, owner: &UserId) -> Vec<Task> {
        owned_by(&lock(&self.inner.docs).tasks, owner)
    }

    /// Number of live feed subscriptions for `owner`.
    pub fn subscriber_count(&self, owner: &UserId) -> usize {
        lock(&self.inner.docs)
            .subscribers
            .iter()
            .filter(|s| &s.owner == owner)
            .count()
    }

    /// Store a task document as-is, bypassing write rules, and notify the
    /// owner's subscribers.
    pub fn import_task(&self, task: Task) {
        let owner = task.owner_id.clone();
        lock(&self.inner.docs).tasks.push(task);
        self.persist();
        self.publish(&owner);
    }

    /// Reject `owner`'s feed: current and future subscribers receive
    /// `permission-denied` instead of snapshots.
    pub fn deny_feed(&self, owner: &UserId) {
        lock(&self.inner.docs).denied.insert(owner.clone());
        warn!(owner = %owner, "Feed denied");
        self.publish(owner);
    }

    /// Lift a [`deny_feed`](Self::deny_feed) and push a fresh snapshot.
    pub fn allow_feed(&self, owner: &UserId) {
        lock(&self.inner.docs).denied.remove(owner);
        self.publish(owner);
    }

    /// Make the next task write fail with the given code.
    pub fn fail_next(&self, code: &str, message: &str) {
        lock(&self.inner.docs).fail_next = Some(BackendError::new(code, message));
    }

    /// Make the next auth request (sign-up, sign-in or sign-out) fail with
    /// the given code. The session is left untouched.
    pub fn fail_next_auth(&self, code: &str, message: &str) {
        lock(&self.inner.auth).fail_next = Some(BackendError::new(code, message));
    }

    /// End the current session from the backend side.
    pub fn expire_session(&self) {
        info!("Session expired by backend");
        self.set_session(None);
    }

    async fn delay(&self) {
        let latency = self.inner.config.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_listener_id(&self) -> u64 {
        self.inner.next_listener.fetch_add(1, Ordering::Relaxed)
    }

    fn session_uid(&self) -> Option<UserId> {
        lock(&self.inner.auth)
            .session
            .as_ref()
            .map(|identity| identity.uid.clone())
    }

    fn require_owner(&self, owner: &UserId) -> Result<(), BackendError> {
        match self.session_uid() {
            Some(ref uid) if uid == owner => Ok(()),
            _ => Err(BackendError::permission_denied(PERMISSION_MESSAGE)),
        }
    }

    fn take_failure(&self) -> Option<BackendError> {
        lock(&self.inner.docs).fail_next.take()
    }

    fn take_auth_failure(&self) -> Result<(), BackendError> {
        match lock(&self.inner.auth).fail_next.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Replace the session, notify session listeners, then revoke feed
    /// subscriptions the new session may no longer read.
    fn set_session(&self, session: Option<Identity>) {
        let listeners: Vec<AuthStateHandler> = {
            let mut auth = lock(&self.inner.auth);
            auth.session = session.clone();
            auth.listeners.iter().map(|(_, h)| h.clone()).collect()
        };
        self.persist();

        for listener in &listeners {
            listener(session.clone());
        }

        let uid = session.map(|identity| identity.uid);
        let revoked: Vec<FeedHandler> = lock(&self.inner.docs)
            .subscribers
            .iter()
            .filter(|s| uid.as_ref() != Some(&s.owner))
            .map(|s| s.handler.clone())
            .collect();
        if !revoked.is_empty() {
            debug!(count = revoked.len(), "Revoking feed subscriptions after session change");
        }
        for handler in revoked {
            handler(FeedEvent::Error(BackendError::permission_denied(
                PERMISSION_MESSAGE,
            )));
        }
    }

    /// Push the current state of `owner`'s feed to its subscribers.
    fn publish(&self, owner: &UserId) {
        let (event, handlers) = {
            let docs = lock(&self.inner.docs);
            let handlers: Vec<FeedHandler> = docs
                .subscribers
                .iter()
                .filter(|s| &s.owner == owner)
                .map(|s| s.handler.clone())
                .collect();
            if handlers.is_empty() {
                return;
            }
            (feed_event(&docs, owner), handlers)
        };

        debug!(owner = %owner, subscribers = handlers.len(), "Publishing feed event");
        for handler in handlers {
            handler(event.clone());
        }
    }

    fn persist(&self) {
        let Some(ref path) = self.inner.config.state_path else {
            return;
        };

        let _writer = lock(&self.inner.persist);
        let state = {
            let auth = lock(&self.inner.auth);
            let docs = lock(&self.inner.docs);
            let mut accounts: Vec<Account> = auth.accounts.values().cloned().collect();
            accounts.sort_by(|a, b| a.email.cmp(&b.email));
            PersistedState {
                accounts,
                tasks: docs.tasks.clone(),
                session: auth.session.clone(),
            }
        };

        if let Err(e) = persist::save(path, &state) {
            warn!(path = %path.display(), error = %e, "Failed to persist backend state");
        }
    }
}

fn owned_by(tasks: &[Task], owner: &UserId) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| &t.owner_id == owner)
        .cloned()
        .collect()
}

fn feed_event(docs: &DocState, owner: &UserId) -> FeedEvent {
    if docs.denied.contains(owner) {
        FeedEvent::Error(BackendError::permission_denied(PERMISSION_MESSAGE))
    } else {
        FeedEvent::Snapshot(owned_by(&docs.tasks, owner))
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        self.delay().await;
        self.take_auth_failure()?;

        if !self.inner.config.email_auth_enabled {
            return Err(BackendError::new(
                codes::CONFIGURATION_NOT_FOUND,
                "Email/password sign-in is disabled for this project",
            ));
        }
        if validate_email(email).is_err() {
            return Err(BackendError::new(
                codes::INVALID_EMAIL,
                "The email address is badly formatted.",
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::new(
                codes::WEAK_PASSWORD,
                "Password should be at least 6 characters",
            ));
        }

        let identity = {
            let mut auth = lock(&self.inner.auth);
            let key = email_key(email);
            if auth.accounts.contains_key(&key) {
                return Err(BackendError::new(
                    codes::EMAIL_ALREADY_IN_USE,
                    "The email address is already in use by another account.",
                ));
            }

            let uid = UserId::new(Uuid::new_v4().to_string());
            let account = Account {
                uid: uid.clone(),
                email: email.trim().to_string(),
                password_hash: password_hash(&uid, password),
            };
            let identity = Identity::named(uid, account.email.clone());
            auth.accounts.insert(key, account);
            identity
        };

        info!(uid = %identity.uid.short(), "Account created");
        self.set_session(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        self.delay().await;
        self.take_auth_failure()?;

        if !self.inner.config.email_auth_enabled {
            return Err(BackendError::new(
                codes::CONFIGURATION_NOT_FOUND,
                "Email/password sign-in is disabled for this project",
            ));
        }
        if validate_email(email).is_err() {
            return Err(BackendError::new(
                codes::INVALID_EMAIL,
                "The email address is badly formatted.",
            ));
        }

        let identity = {
            let auth = lock(&self.inner.auth);
            let account = auth.accounts.get(&email_key(email)).ok_or_else(|| {
                BackendError::new(
                    codes::USER_NOT_FOUND,
                    "There is no user record for this email.",
                )
            })?;
            if account.password_hash != password_hash(&account.uid, password) {
                return Err(BackendError::new(codes::WRONG_PASSWORD, "The password is invalid."));
            }
            Identity::named(account.uid.clone(), account.email.clone())
        };

        info!(uid = %identity.uid.short(), "Signed in with password");
        self.set_session(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, BackendError> {
        self.delay().await;
        self.take_auth_failure()?;

        if !self.inner.config.anonymous_auth_enabled {
            return Err(BackendError::new(
                codes::ADMIN_RESTRICTED_OPERATION,
                "Anonymous sign-in is disabled for this project",
            ));
        }

        let identity = Identity::anonymous(UserId::new(Uuid::new_v4().to_string()));
        info!(uid = %identity.uid.short(), "Signed in anonymously");
        self.set_session(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.delay().await;
        self.take_auth_failure()?;
        info!("Signed out");
        self.set_session(None);
        Ok(())
    }

    fn on_state_change(&self, handler: AuthStateHandler) -> Unsubscribe {
        let id = self.next_listener_id();
        let current = {
            let mut auth = lock(&self.inner.auth);
            auth.listeners.push((id, handler.clone()));
            auth.session.clone()
        };
        handler(current);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.auth).listeners.retain(|(i, _)| *i != id);
            }
        })
    }
}

#[async_trait]
impl TaskBackend for MemoryBackend {
    fn subscribe(&self, owner: &UserId, handler: FeedHandler) -> Unsubscribe {
        let id = self.next_listener_id();
        let permitted = self.require_owner(owner);
        let event = {
            let mut docs = lock(&self.inner.docs);
            docs.subscribers.push(Subscriber {
                id,
                owner: owner.clone(),
                handler: handler.clone(),
            });
            match permitted {
                Ok(()) => feed_event(&docs, owner),
                Err(e) => FeedEvent::Error(e),
            }
        };
        debug!(owner = %owner, subscription = id, "Feed subscription opened");
        handler(event);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.docs).subscribers.retain(|s| s.id != id);
                debug!(subscription = id, "Feed subscription closed");
            }
        })
    }

    async fn create(&self, task: NewTask) -> Result<TaskId, BackendError> {
        self.delay().await;
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        if task.text.trim().is_empty() {
            return Err(BackendError::new(codes::INVALID_ARGUMENT, "Task text is required"));
        }
        self.require_owner(&task.owner_id)?;

        let created_at = match task.created_at {
            CreatedAt::ServerTimestamp => Utc::now(),
            CreatedAt::At(at) => at,
        };
        let id = TaskId::new(Uuid::new_v4().to_string());
        let owner = task.owner_id.clone();

        lock(&self.inner.docs).tasks.push(Task {
            id: id.clone(),
            text: task.text,
            completed: task.completed,
            created_at: Some(created_at),
            owner_id: task.owner_id,
            owner_email: Some(task.owner_email),
        });
        debug!(task = %id.short(), owner = %owner.short(), "Task created");

        self.persist();
        self.publish(&owner);
        Ok(id)
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<(), BackendError> {
        self.delay().await;
        if let Some(e) = self.take_failure() {
            return Err(e);
        }

        let session = self.session_uid();
        let owner = {
            let mut docs = lock(&self.inner.docs);
            let task = docs
                .tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| BackendError::new(codes::NOT_FOUND, "No document to update"))?;
            if session.as_ref() != Some(&task.owner_id) {
                return Err(BackendError::permission_denied(PERMISSION_MESSAGE));
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
            task.owner_id.clone()
        };
        debug!(task = %id.short(), ?patch, "Task updated");

        self.persist();
        self.publish(&owner);
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), BackendError> {
        self.delay().await;
        if let Some(e) = self.take_failure() {
            return Err(e);
        }

        let session = self.session_uid();
        let owner = {
            let mut docs = lock(&self.inner.docs);
            let index = docs
                .tasks
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| BackendError::new(codes::NOT_FOUND, "No document to delete"))?;
            if session.as_ref() != Some(&docs.tasks[index].owner_id) {
                return Err(BackendError::permission_denied(PERMISSION_MESSAGE));
            }
            docs.tasks.remove(index).owner_id
        };
        debug!(task = %id.short(), "Task deleted");

        self.persist();
        self.publish(&owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn recorder() -> (FeedHandler, Arc<Mutex<Vec<FeedEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handler: FeedHandler =
            Arc::new(move |event: FeedEvent| sink.lock().unwrap().push(event));
        (handler, events)
    }

    fn last_snapshot(events: &Arc<Mutex<Vec<FeedEvent>>>) -> Vec<Task> {
        match events.lock().unwrap().last() {
            Some(FeedEvent::Snapshot(tasks)) => tasks.clone(),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let backend = MemoryBackend::in_memory();
        let created = backend.sign_up("a@b.com", "secret1").await.unwrap();
        backend.sign_out().await.unwrap();

        let signed_in = backend.sign_in("A@B.com", "secret1").await.unwrap();
        assert_eq!(created.uid, signed_in.uid);
        assert_eq!(signed_in.email.as_deref(), Some("a@b.com"));
        assert!(!signed_in.is_anonymous);
    }

    #[tokio::test]
    async fn test_auth_error_codes() {
        let backend = MemoryBackend::in_memory();
        backend.sign_up("a@b.com", "secret1").await.unwrap();

        let dup = backend.sign_up("a@b.com", "secret2").await.unwrap_err();
        assert_eq!(dup.code, codes::EMAIL_ALREADY_IN_USE);

        let weak = backend.sign_up("c@d.com", "123").await.unwrap_err();
        assert_eq!(weak.code, codes::WEAK_PASSWORD);

        let bad = backend.sign_in("nope", "secret1").await.unwrap_err();
        assert_eq!(bad.code, codes::INVALID_EMAIL);

        let unknown = backend.sign_in("x@y.com", "secret1").await.unwrap_err();
        assert_eq!(unknown.code, codes::USER_NOT_FOUND);

        let wrong = backend.sign_in("a@b.com", "wrong-pw").await.unwrap_err();
        assert_eq!(wrong.code, codes::WRONG_PASSWORD);
    }

    #[test]
    fn test_config_debug_hides_api_key() {
        let config = MemoryConfig {
            api_key: Some("AIza-very-secret".into()),
            ..Default::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("very-secret"));
        assert!(shown.contains("<redacted>"));
        assert!(shown.contains("taskflow-local.local"));
    }

    #[tokio::test]
    async fn test_disabled_providers() {
        let backend = MemoryBackend::new(MemoryConfig {
            email_auth_enabled: false,
            anonymous_auth_enabled: false,
            ..Default::default()
        })
        .unwrap();

        let email = backend.sign_up("a@b.com", "secret1").await.unwrap_err();
        assert_eq!(email.code, codes::CONFIGURATION_NOT_FOUND);

        let guest = backend.sign_in_anonymously().await.unwrap_err();
        assert_eq!(guest.code, codes::ADMIN_RESTRICTED_OPERATION);
        assert!(backend.session().is_none());
    }

    #[tokio::test]
    async fn test_state_listener_sees_current_session_first() {
        let backend = MemoryBackend::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = backend.on_state_change(Arc::new(move |s: Option<Identity>| {
            sink.lock().unwrap().push(s.map(|i| i.is_anonymous));
        }));

        backend.sign_in_anonymously().await.unwrap();
        backend.sign_out().await.unwrap();
        handle.unsubscribe();
        backend.sign_in_anonymously().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![None, Some(true), None]);
    }

    #[tokio::test]
    async fn test_feed_filters_by_owner() {
        let backend = MemoryBackend::in_memory();
        let alice = backend.sign_up("alice@example.com", "secret1").await.unwrap();
        backend
            .create(NewTask::for_identity(&alice, "alice task"))
            .await
            .unwrap();

        let bob = backend.sign_up("bob@example.com", "secret1").await.unwrap();
        let (handler, events) = recorder();
        let _sub = backend.subscribe(&bob.uid, handler);
        assert!(last_snapshot(&events).is_empty());

        backend.create(NewTask::for_identity(&bob, "bob task")).await.unwrap();
        let tasks = last_snapshot(&events);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "bob task");
        assert!(tasks[0].created_at.is_some());
        assert_eq!(tasks[0].owner_email.as_deref(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn test_update_and_delete_notify() {
        let backend = MemoryBackend::in_memory();
        let me = backend.sign_in_anonymously().await.unwrap();
        let (handler, events) = recorder();
        let _sub = backend.subscribe(&me.uid, handler);

        let id = backend.create(NewTask::for_identity(&me, "walk")).await.unwrap();
        backend.update(&id, TaskPatch::completed(true)).await.unwrap();
        assert!(last_snapshot(&events)[0].completed);

        backend.delete(&id).await.unwrap();
        assert!(last_snapshot(&events).is_empty());

        let missing = backend.delete(&id).await.unwrap_err();
        assert_eq!(missing.code, codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_writes_require_owner_session() {
        let backend = MemoryBackend::in_memory();
        let me = backend.sign_in_anonymously().await.unwrap();
        let id = backend.create(NewTask::for_identity(&me, "mine")).await.unwrap();
        backend.sign_out().await.unwrap();

        let err = backend.update(&id, TaskPatch::completed(true)).await.unwrap_err();
        assert_eq!(err.code, codes::PERMISSION_DENIED);
        let err = backend.create(NewTask::for_identity(&me, "again")).await.unwrap_err();
        assert_eq!(err.code, codes::PERMISSION_DENIED);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let backend = MemoryBackend::in_memory();
        let me = backend.sign_in_anonymously().await.unwrap();
        let (handler, events) = recorder();
        let sub = backend.subscribe(&me.uid, handler);
        assert_eq!(backend.subscriber_count(&me.uid), 1);

        sub.unsubscribe();
        assert_eq!(backend.subscriber_count(&me.uid), 0);
        backend.create(NewTask::for_identity(&me, "quiet")).await.unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deny_feed_and_fail_next() {
        let backend = MemoryBackend::in_memory();
        let me = backend.sign_in_anonymously().await.unwrap();
        let (handler, events) = recorder();
        let _sub = backend.subscribe(&me.uid, handler);

        backend.deny_feed(&me.uid);
        match events.lock().unwrap().last() {
            Some(FeedEvent::Error(e)) => assert_eq!(e.code, codes::PERMISSION_DENIED),
            other => panic!("expected error, got {other:?}"),
        }

        backend.fail_next(codes::UNAVAILABLE, "offline");
        let err = backend.create(NewTask::for_identity(&me, "x")).await.unwrap_err();
        assert_eq!(err.code, codes::UNAVAILABLE);
        assert!(backend.tasks_of(&me.uid).is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_auth_keeps_session() {
        let backend = MemoryBackend::in_memory();
        let me = backend.sign_in_anonymously().await.unwrap();

        backend.fail_next_auth(codes::NETWORK_REQUEST_FAILED, "offline");
        let err = backend.sign_out().await.unwrap_err();
        assert_eq!(err.code, codes::NETWORK_REQUEST_FAILED);
        assert_eq!(backend.session().map(|s| s.uid), Some(me.uid));

        backend.sign_out().await.unwrap();
        assert!(backend.session().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_stale_subscriptions() {
        let backend = MemoryBackend::in_memory();
        let me = backend.sign_in_anonymously().await.unwrap();
        let (handler, events) = recorder();
        let _sub = backend.subscribe(&me.uid, handler);

        backend.sign_out().await.unwrap();
        match events.lock().unwrap().last() {
            Some(FeedEvent::Error(e)) => assert_eq!(e.code, codes::PERMISSION_DENIED),
            other => panic!("expected error, got {other:?}"),
        };
    }

    #[tokio::test]
    async fn test_persisted_session_is_rehydrated() {
        let dir = TempDir::new().unwrap();
        let config = MemoryConfig {
            state_path: Some(dir.path().join("state.json")),
            ..Default::default()
        };

        let uid = {
            let backend = MemoryBackend::new(config.clone()).unwrap();
            let me = backend.sign_up("a@b.com", "secret1").await.unwrap();
            backend.create(NewTask::for_identity(&me, "persist me")).await.unwrap();
            me.uid
        };

        let reopened = MemoryBackend::new(config).unwrap();
        assert_eq!(reopened.session().map(|s| s.uid), Some(uid.clone()));
        assert_eq!(reopened.tasks_of(&uid).len(), 1);

        reopened.sign_out().await.unwrap();
        let again = reopened.sign_in("a@b.com", "secret1").await.unwrap();
        assert_eq!(again.uid, uid);
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_reach_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let backend = MemoryBackend::new(MemoryConfig {
            state_path: Some(path.clone()),
            ..Default::default()
        })
        .unwrap();
        let me = backend.sign_in_anonymously().await.unwrap();

        for round in 0..10 {
            let writers: Vec<_> = (0..16)
                .map(|i| {
                    let backend = backend.clone();
                    let task = NewTask::for_identity(&me, format!("round {round} task {i}"));
                    tokio::spawn(async move { backend.create(task).await })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let on_disk = persist::load(&path).unwrap();
            assert_eq!(on_disk.tasks, backend.tasks_of(&me.uid));
        }

        let reopened = MemoryBackend::new(MemoryConfig {
            state_path: Some(path),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(reopened.tasks_of(&me.uid).len(), 160);
    }
}
