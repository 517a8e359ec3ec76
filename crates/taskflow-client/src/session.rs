//! The Session Gate: single authority for who is signed in.
//!
//! Status moves `Unknown -> {Unauthenticated, Authenticated}` once the
//! backend reports its persisted session, and between `Unauthenticated` and
//! `Authenticated` afterwards. `Unknown` is never re-entered.
//!
//! On every transition the gate first calls its [`SessionObserver`]s
//! synchronously and in registration order, then publishes the new status
//! to readers and broadcast subscribers. A dependent such as the Task List
//! Store has therefore released its old subscription before anyone can
//! observe the new status.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use taskflow_shared::validation::{validate_email, validate_new_password, ValidationError};
use taskflow_shared::{ClassifiedError, Identity};
use taskflow_store::{AuthBackend, Unsubscribe};

use crate::classify::{classify_auth, classify_sign_out, AuthMethod};

/// Buffered transitions per broadcast subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "identity", rename_all = "camelCase")]
pub enum SessionStatus {
    /// The backend's persisted-session check has not answered yet.
    Unknown,
    Unauthenticated,
    Authenticated(Identity),
}

impl SessionStatus {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionStatus::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Unknown => "unknown",
            SessionStatus::Unauthenticated => "unauthenticated",
            SessionStatus::Authenticated(_) => "authenticated",
        }
    }
}

/// Everything the presentation layer reads from the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub status: SessionStatus,
    /// Outcome of the last sign-in, sign-up or sign-out attempt.
    pub error: Option<ClassifiedError>,
    /// A credentialed operation is in flight.
    pub pending: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Unknown,
            error: None,
            pending: false,
        }
    }
}

/// A component whose lifetime follows the current identity.
pub trait SessionObserver: Send + Sync {
    /// Called with the new identity (`None` when signed out) before the
    /// transition becomes visible to anyone else.
    fn on_session_change(&self, identity: Option<&Identity>);
}

/// Cheaply clonable handle to the session gate.
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    auth: Arc<dyn AuthBackend>,
    state: Mutex<SessionState>,
    observers: Mutex<Vec<Arc<dyn SessionObserver>>>,
    events: broadcast::Sender<SessionStatus>,
    listener: Mutex<Option<Unsubscribe>>,
    /// Serialises transitions so observers see them one at a time.
    transition: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionGate {
    pub fn new(auth: Arc<dyn AuthBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(GateInner {
                auth,
                state: Mutex::new(SessionState::default()),
                observers: Mutex::new(Vec::new()),
                events,
                listener: Mutex::new(None),
                transition: Mutex::new(()),
            }),
        }
    }

    /// Start following the backend's session reports. The first report
    /// (persisted session or none) moves the gate out of `Unknown`.
    pub fn start(&self) {
        let mut listener = lock(&self.inner.listener);
        if listener.is_some() {
            return;
        }

        let weak: Weak<GateInner> = Arc::downgrade(&self.inner);
        let handle = self
            .inner
            .auth
            .on_state_change(Arc::new(move |identity: Option<Identity>| {
                if let Some(inner) = weak.upgrade() {
                    SessionGate { inner }.apply(identity);
                }
            }));
        *listener = Some(handle);
        debug!("Session gate listening for backend session reports");
    }

    /// Stop following backend session reports.
    pub fn stop(&self) {
        let handle = lock(&self.inner.listener).take();
        if let Some(handle) = handle {
            handle.unsubscribe();
        }
    }

    /// Register a dependent. If an identity is already current the observer
    /// is bound to it immediately.
    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        let _transition = lock(&self.inner.transition);
        lock(&self.inner.observers).push(observer.clone());

        let current = lock(&self.inner.state).status.clone();
        if let SessionStatus::Authenticated(ref identity) = current {
            observer.on_session_change(Some(identity));
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.state).clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.inner.state).status.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.status().identity().cloned()
    }

    /// Every future transition, delivered once each and in order.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionStatus> {
        self.inner.events.subscribe()
    }

    /// Create an email/password account and sign in with it.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ClassifiedError> {
        self.begin();
        let result = match validate_email(email).and_then(|()| validate_new_password(password)) {
            Ok(()) => self
                .inner
                .auth
                .sign_up(email.trim(), password)
                .await
                .map_err(|e| classify_auth(&e, AuthMethod::EmailPassword)),
            Err(e) => Err(e.into()),
        };
        self.finish_sign_in(result, "sign-up")
    }

    /// Sign in to an existing account. Password strength is not checked
    /// locally; the backend judges the credentials.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ClassifiedError> {
        self.begin();
        let result = match validate_email(email) {
            Ok(()) => self
                .inner
                .auth
                .sign_in(email.trim(), password)
                .await
                .map_err(|e| classify_auth(&e, AuthMethod::EmailPassword)),
            Err(e) => Err(e.into()),
        };
        self.finish_sign_in(result, "sign-in")
    }

    /// Start an anonymous guest session.
    pub async fn sign_in_as_guest(&self) -> Result<Identity, ClassifiedError> {
        self.begin();
        let result = self
            .inner
            .auth
            .sign_in_anonymously()
            .await
            .map_err(|e| classify_auth(&e, AuthMethod::Anonymous));
        self.finish_sign_in(result, "guest sign-in")
    }

    /// End the current session. Dependents have released their
    /// subscriptions by the time this returns `Ok`.
    pub async fn sign_out(&self) -> Result<(), ClassifiedError> {
        if !self.status().is_authenticated() {
            let err: ClassifiedError = ValidationError::NotSignedIn.into();
            self.settle(&Err::<(), _>(err.clone()));
            return Err(err);
        }

        self.begin();
        let result = self
            .inner
            .auth
            .sign_out()
            .await
            .map_err(|e| classify_sign_out(&e));

        match result {
            Ok(()) => self.apply(None),
            Err(ref e) => warn!(error = %e, "Sign-out failed"),
        }
        self.settle(&result);
        result
    }

    fn begin(&self) {
        let mut state = lock(&self.inner.state);
        state.pending = true;
        state.error = None;
    }

    fn settle<T>(&self, result: &Result<T, ClassifiedError>) {
        let mut state = lock(&self.inner.state);
        state.pending = false;
        state.error = result.as_ref().err().cloned();
    }

    fn finish_sign_in(
        &self,
        result: Result<Identity, ClassifiedError>,
        action: &'static str,
    ) -> Result<Identity, ClassifiedError> {
        match result {
            Ok(ref identity) => self.apply(Some(identity.clone())),
            Err(ref e) => warn!(action, kind = %e.kind, "Authentication failed"),
        }
        self.settle(&result);
        result
    }

    /// Move to the status implied by `next`, if that is a transition.
    /// Repeated reports of the same identity are ignored.
    fn apply(&self, next: Option<Identity>) {
        let _transition = lock(&self.inner.transition);

        let current = lock(&self.inner.state).status.clone();
        let changed = match (&current, &next) {
            (SessionStatus::Unknown, _) => true,
            (SessionStatus::Unauthenticated, None) => false,
            (SessionStatus::Authenticated(a), Some(b)) => a.uid != b.uid,
            _ => true,
        };
        if !changed {
            return;
        }

        let status = match next {
            Some(identity) => SessionStatus::Authenticated(identity),
            None => SessionStatus::Unauthenticated,
        };

        let observers = lock(&self.inner.observers).clone();
        for observer in &observers {
            observer.on_session_change(status.identity());
        }

        lock(&self.inner.state).status = status.clone();

        match status.identity() {
            Some(identity) => info!(
                uid = %identity.uid.short(),
                anonymous = identity.is_anonymous,
                from = current.as_str(),
                "Session authenticated"
            ),
            None => info!(from = current.as_str(), "Session unauthenticated"),
        }

        // No receivers is fine; the current status is always readable.
        let _ = self.inner.events.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_shared::ErrorKind;
    use taskflow_store::{MemoryBackend, MemoryConfig};

    struct Recorder {
        seen: Mutex<Vec<Option<String>>>,
    }

    impl SessionObserver for Recorder {
        fn on_session_change(&self, identity: Option<&Identity>) {
            self.seen
                .lock()
                .unwrap()
                .push(identity.map(|i| i.uid.to_string()));
        }
    }

    fn started_gate() -> (SessionGate, MemoryBackend) {
        let backend = MemoryBackend::in_memory();
        let gate = SessionGate::new(Arc::new(backend.clone()));
        gate.start();
        (gate, backend)
    }

    #[test]
    fn test_unknown_until_started() {
        let gate = SessionGate::new(Arc::new(MemoryBackend::in_memory()));
        assert_eq!(gate.status(), SessionStatus::Unknown);

        gate.start();
        assert_eq!(gate.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let (gate, _backend) = started_gate();

        let created = gate.sign_up("a@b.com", "secret1").await.unwrap();
        assert!(gate.status().is_authenticated());
        gate.sign_out().await.unwrap();
        assert_eq!(gate.status(), SessionStatus::Unauthenticated);

        let signed_in = gate.sign_in("a@b.com", "secret1").await.unwrap();
        assert_eq!(signed_in.uid, created.uid);
        assert_eq!(signed_in.email.as_deref(), Some("a@b.com"));
        assert!(!signed_in.is_anonymous);
        assert_eq!(gate.identity(), Some(signed_in));
    }

    #[tokio::test]
    async fn test_guest_identity() {
        let (gate, _backend) = started_gate();
        let guest = gate.sign_in_as_guest().await.unwrap();
        assert!(guest.is_anonymous);
        assert!(guest.email.is_none());
    }

    #[tokio::test]
    async fn test_local_checks_never_reach_backend() {
        let (gate, backend) = started_gate();

        let err = gate.sign_up("not-an-email", "secret1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentialFormat);

        let err = gate.sign_up("a@b.com", "12345").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WeakPassword);

        // no account was created by the rejected sign-up
        let err = gate.sign_in("a@b.com", "12345").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccountNotFound);

        assert!(backend.session().is_none());
        assert_eq!(gate.status(), SessionStatus::Unauthenticated);
        assert_eq!(gate.state().error, Some(err));
        assert!(!gate.state().pending);
    }

    #[tokio::test]
    async fn test_failure_keeps_status() {
        let (gate, _backend) = started_gate();
        gate.sign_up("a@b.com", "secret1").await.unwrap();
        gate.sign_out().await.unwrap();

        let err = gate.sign_in("a@b.com", "not-it").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongPassword);
        assert_eq!(err.message, "Incorrect password.");
        assert_eq!(gate.status(), SessionStatus::Unauthenticated);

        let err = gate.sign_up("a@b.com", "secret1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccountAlreadyExists);
    }

    #[tokio::test]
    async fn test_disabled_guest_auth() {
        let backend = MemoryBackend::new(MemoryConfig {
            anonymous_auth_enabled: false,
            ..Default::default()
        })
        .unwrap();
        let gate = SessionGate::new(Arc::new(backend));
        gate.start();

        let err = gate.sign_in_as_guest().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderMisconfigured);
        assert!(!err.kind.is_credential_error());
    }

    #[tokio::test]
    async fn test_sign_out_requires_session() {
        let (gate, _backend) = started_gate();
        let err = gate.sign_out().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailure);
    }

    #[tokio::test]
    async fn test_transitions_broadcast_once_in_order() {
        let (gate, backend) = started_gate();
        let mut rx = gate.subscribe();

        let guest = gate.sign_in_as_guest().await.unwrap();
        gate.sign_out().await.unwrap();
        gate.sign_in_as_guest().await.unwrap();
        backend.expire_session();

        assert_eq!(rx.recv().await.unwrap(), SessionStatus::Authenticated(guest));
        assert_eq!(rx.recv().await.unwrap(), SessionStatus::Unauthenticated);
        assert!(rx.recv().await.unwrap().is_authenticated());
        assert_eq!(rx.recv().await.unwrap(), SessionStatus::Unauthenticated);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_observers_follow_identity() {
        let (gate, _backend) = started_gate();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        gate.add_observer(recorder.clone());

        let guest = gate.sign_in_as_guest().await.unwrap();
        gate.sign_out().await.unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Some(guest.uid.to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_persisted_session_rehydrates() {
        let backend = MemoryBackend::in_memory();
        let identity = backend.sign_in_anonymously().await.unwrap();

        let gate = SessionGate::new(Arc::new(backend));
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        gate.add_observer(recorder.clone());
        gate.start();

        assert_eq!(gate.identity(), Some(identity.clone()));
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Some(identity.uid.to_string())]
        );
    }
}
