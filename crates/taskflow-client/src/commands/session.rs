use tracing::info;

use crate::state::AppState;
use crate::view::{render_session, SessionView};

pub async fn sign_up(state: &AppState, email: &str, password: &str) -> String {
    match state.session.sign_up(email, password).await {
        Ok(identity) => {
            info!(uid = %identity.uid.short(), "Account created");
            format!("Account created. Signed in as {}.", identity.owner_email())
        }
        Err(e) => format!("Error: {e}"),
    }
}

pub async fn sign_in(state: &AppState, email: &str, password: &str) -> String {
    match state.session.sign_in(email, password).await {
        Ok(identity) => format!("Signed in as {}.", identity.owner_email()),
        Err(e) => format!("Error: {e}"),
    }
}

pub async fn guest(state: &AppState) -> String {
    match state.session.sign_in_as_guest().await {
        Ok(_) => "Signed in as guest. Your tasks cannot be recovered after you sign out.".to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

pub async fn sign_out(state: &AppState) -> String {
    match state.session.sign_out().await {
        Ok(()) => "Signed out.".to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

pub fn who_am_i(state: &AppState) -> String {
    render_session(&SessionView::from(&state.session.state()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_store::MemoryBackend;

    #[tokio::test]
    async fn test_guest_reply_warns_about_sign_out() {
        let state = AppState::with_backend(MemoryBackend::in_memory());
        state.start();
        let reply = guest(&state).await;
        assert!(reply.contains("cannot be recovered"), "{reply}");
    }
}
