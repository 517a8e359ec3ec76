//! Presentation view-models: pure functions of gate and store state.

use std::fmt::Write as _;

use serde::Serialize;

use taskflow_shared::constants::APP_NAME;
use taskflow_shared::TaskId;

use crate::session::{SessionState, SessionStatus};
use crate::tasks::ListState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "camelCase")]
pub enum SessionView {
    /// Waiting for the backend's persisted-session check.
    Loading,
    SignIn {
        error: Option<String>,
        pending: bool,
    },
    SignedIn {
        display_name: String,
        subtitle: String,
        /// Shows the guest-mode warning: guest data is lost on sign-out.
        guest_mode: bool,
        error: Option<String>,
    },
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        let error = state.error.as_ref().map(|e| e.message.clone());
        match state.status {
            SessionStatus::Unknown => SessionView::Loading,
            SessionStatus::Unauthenticated => SessionView::SignIn {
                error,
                pending: state.pending,
            },
            SessionStatus::Authenticated(ref identity) if identity.is_anonymous => {
                SessionView::SignedIn {
                    display_name: "Guest User".to_string(),
                    subtitle: "Temporary session".to_string(),
                    guest_mode: true,
                    error,
                }
            }
            SessionStatus::Authenticated(ref identity) => SessionView::SignedIn {
                display_name: identity
                    .email
                    .clone()
                    .unwrap_or_else(|| identity.uid.to_string()),
                subtitle: "Signed in".to_string(),
                guest_mode: false,
                error,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    pub rows: Vec<TaskRow>,
    pub completed: usize,
    pub total: usize,
    pub progress_percent: f64,
    pub progress_label: String,
    pub empty: bool,
    pub error: Option<String>,
}

impl From<&ListState> for ListView {
    fn from(state: &ListState) -> Self {
        let rows: Vec<TaskRow> = state
            .tasks
            .iter()
            .map(|t| TaskRow {
                id: t.id.clone(),
                text: t.text.clone(),
                completed: t.completed,
            })
            .collect();

        let total = rows.len();
        let completed = rows.iter().filter(|r| r.completed).count();
        let progress_percent = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let progress_label = if total > 0 && completed == total {
            "All tasks completed!".to_string()
        } else {
            format!("{}% complete", progress_percent.round() as u32)
        };

        ListView {
            empty: rows.is_empty(),
            rows,
            completed,
            total,
            progress_percent,
            progress_label,
            error: state.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

pub fn render_session(view: &SessionView) -> String {
    match view {
        SessionView::Loading => "Loading...".to_string(),
        SessionView::SignIn { error, pending } => {
            let mut out = format!("{APP_NAME}: please sign in, sign up, or continue as guest.");
            if *pending {
                out.push_str("\nPlease wait...");
            }
            if let Some(error) = error {
                let _ = write!(out, "\nError: {error}");
            }
            out
        }
        SessionView::SignedIn {
            display_name,
            subtitle,
            guest_mode,
            error,
        } => {
            let mut out = format!("{display_name} ({subtitle})");
            if *guest_mode {
                out.push_str(" [Guest Mode: tasks are lost when you sign out]");
            }
            if let Some(error) = error {
                let _ = write!(out, "\nError: {error}");
            }
            out
        }
    }
}

pub fn render_list(view: &ListView) -> String {
    let mut out = String::new();
    if let Some(ref error) = view.error {
        let _ = writeln!(out, "Error: {error}");
    }
    if view.empty {
        out.push_str("No tasks yet. Add your first task to get started.");
        return out;
    }

    let _ = writeln!(
        out,
        "Progress: {} of {} completed, {}",
        view.completed, view.total, view.progress_label
    );
    for (index, row) in view.rows.iter().enumerate() {
        let mark = if row.completed { 'x' } else { ' ' };
        let _ = writeln!(
            out,
            "  #{:<3} [{mark}] {}  ({})",
            index + 1,
            row.text,
            row.id.short()
        );
    }
    out.truncate(out.trim_end().len());
    out
}
