use taskflow_shared::validation::ValidationError;
use taskflow_shared::{ClassifiedError, TaskId};

use crate::commands::TaskRef;
use crate::state::AppState;
use crate::view::{render_list, ListView};

pub async fn add(state: &AppState, text: &str) -> String {
    match state.tasks.add(text).await {
        Ok(id) => format!("Added task {}.", id.short()),
        Err(e) => format!("Error: {e}"),
    }
}

pub async fn toggle(state: &AppState, target: &TaskRef) -> String {
    let result = match resolve(state, target) {
        Ok(id) => state.tasks.toggle(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => "Task updated.".to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

pub async fn remove(state: &AppState, target: &TaskRef) -> String {
    let result = match resolve(state, target) {
        Ok(id) => state.tasks.remove(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => "Task deleted.".to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

pub fn list(state: &AppState) -> String {
    if state.tasks.identity().is_none() {
        return format!("Error: {}", ValidationError::NotSignedIn);
    }
    render_list(&ListView::from(&state.tasks.state()))
}

/// Turn a row number or (possibly shortened) id into a task id, using the
/// list as currently shown.
fn resolve(state: &AppState, target: &TaskRef) -> Result<TaskId, ClassifiedError> {
    let list = state.tasks.state();
    match target {
        TaskRef::Index(n) => n
            .checked_sub(1)
            .and_then(|i| list.tasks.get(i))
            .map(|t| t.id.clone())
            .ok_or_else(|| ClassifiedError::validation(format!("There is no task #{n}."))),
        TaskRef::Id(id) => {
            let mut matches = list
                .tasks
                .iter()
                .filter(|t| t.id.as_str().starts_with(id.as_str()));
            match (matches.next(), matches.next()) {
                (Some(task), None) => Ok(task.id.clone()),
                (Some(_), Some(_)) => Err(ClassifiedError::validation(format!(
                    "Task id {id} is ambiguous."
                ))),
                (None, _) => Ok(id.clone()),
            }
        }
    }
}
