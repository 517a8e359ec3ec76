//! # taskflow-shared
//!
//! Domain types shared by every TaskFlow crate: identities, task documents,
//! the classified error taxonomy and the input checks that run before any
//! request reaches the backend.

pub mod constants;
pub mod error;
pub mod types;
pub mod validation;

pub use error::{ClassifiedError, ErrorKind};
pub use types::{CreatedAt, Identity, NewTask, Task, TaskId, TaskPatch, UserId};
pub use validation::ValidationError;
