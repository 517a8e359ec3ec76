//! Change notifications written as JSON lines, one object per event.

use std::io::Write;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use taskflow_shared::{ClassifiedError, UserId};

use crate::session::SessionStatus;
use crate::state::AppState;
use crate::tasks::ListState;

pub const EVENT_SESSION_CHANGED: &str = "session-changed";
pub const EVENT_TASKS_CHANGED: &str = "tasks-changed";

#[derive(Debug, Clone, Serialize)]
pub struct SessionChangedPayload {
    pub status: String,
    pub uid: Option<UserId>,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

impl From<&SessionStatus> for SessionChangedPayload {
    fn from(status: &SessionStatus) -> Self {
        let identity = status.identity();
        Self {
            status: status.as_str().to_string(),
            uid: identity.map(|i| i.uid.clone()),
            email: identity.and_then(|i| i.email.clone()),
            is_anonymous: identity.is_some_and(|i| i.is_anonymous),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TasksChangedPayload {
    pub owner: Option<UserId>,
    pub total: usize,
    pub completed: usize,
    pub error: Option<ClassifiedError>,
}

impl From<&ListState> for TasksChangedPayload {
    fn from(list: &ListState) -> Self {
        Self {
            owner: list.owner.clone(),
            total: list.tasks.len(),
            completed: list.tasks.iter().filter(|t| t.completed).count(),
            error: list.error.clone(),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, S> {
    event: &'a str,
    payload: S,
}

pub fn emit_event<W: Write, S: Serialize>(out: &mut W, event: &str, payload: S) {
    let line = match serde_json::to_string(&Envelope { event, payload }) {
        Ok(line) => line,
        Err(e) => {
            tracing::error!(event, error = %e, "Failed to serialize event");
            return;
        }
    };
    if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
        tracing::error!(event, error = %e, "Failed to emit event");
    }
}

/// Forward session transitions and list changes to `out` until the state
/// is dropped.
pub fn spawn_event_forwarder<W>(state: &AppState, mut out: W) -> JoinHandle<()>
where
    W: Write + Send + 'static,
{
    let mut sessions = state.session.subscribe();
    let mut lists = state.tasks.watch();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                status = sessions.recv() => match status {
                    Ok(status) => {
                        emit_event(&mut out, EVENT_SESSION_CHANGED, SessionChangedPayload::from(&status));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event forwarder lagged behind session changes");
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = lists.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let payload = TasksChangedPayload::from(&*lists.borrow_and_update());
                    emit_event(&mut out, EVENT_TASKS_CHANGED, payload);
                }
            }
        }
        tracing::debug!("Event forwarder stopped");
    })
}
