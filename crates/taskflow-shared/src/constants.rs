/// Application name
pub const APP_NAME: &str = "TaskFlow";

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

/// Owner email recorded on tasks created by a guest session
pub const ANONYMOUS_OWNER_EMAIL: &str = "anonymous";

/// Project id used when none is configured
pub const DEFAULT_PROJECT_ID: &str = "taskflow-local";

/// File name of the persisted backend state
pub const STATE_FILE_NAME: &str = "taskflow-state.json";
