//! TaskFlow client: session gating, a live per-user task list and the
//! command shell that drives them.

pub mod classify;
pub mod commands;
pub mod config;
pub mod events;
pub mod session;
pub mod state;
pub mod tasks;
pub mod view;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use session::{SessionGate, SessionObserver, SessionState, SessionStatus};
pub use state::AppState;
pub use tasks::{ListState, TaskListStore};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Output goes to stderr so it never mixes with command replies.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("taskflow=info,taskflow_client=debug,taskflow_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
