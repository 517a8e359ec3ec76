//! # taskflow
//!
//! Interactive to-do shell. Reads one command per line from stdin and prints
//! the reply on stdout. With `--events`, session and list changes are also
//! written to stdout as JSON lines.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use taskflow_client::commands::{self, Outcome};
use taskflow_client::events::spawn_event_forwarder;
use taskflow_client::view::{render_session, SessionView};
use taskflow_client::{init_tracing, AppState, ClientConfig};
use taskflow_shared::constants::APP_NAME;
use taskflow_store::MemoryBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting {APP_NAME} v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let backend = MemoryBackend::new(config.memory_config())?;
    let state = AppState::with_backend(backend);

    let forwarder = std::env::args()
        .skip(1)
        .any(|arg| arg == "--events")
        .then(|| spawn_event_forwarder(&state, std::io::stdout()));

    state.start();
    println!("{}", render_session(&SessionView::from(&state.session.state())));
    println!("Type `help` for a list of commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match commands::parse(&line) {
                    None => continue,
                    Some(Ok(command)) => command,
                    Some(Err(e)) => {
                        println!("{e}");
                        continue;
                    }
                };
                match commands::execute(&state, command).await {
                    Outcome::Continue(reply) => println!("{reply}"),
                    Outcome::Quit => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    state.shutdown();
    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    info!("Goodbye");
    Ok(())
}
