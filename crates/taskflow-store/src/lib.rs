//! # taskflow-store
//!
//! The backend capability interface consumed by the TaskFlow client, and
//! [`MemoryBackend`], an in-process implementation of it.
//!
//! The hosted service provides three things: credential and guest sign-in,
//! a document collection of tasks, and a live change feed that pushes the
//! full owner-filtered task set whenever it changes. The traits in
//! [`backend`] describe exactly that surface and nothing more, so the
//! client core can be driven by any provider SDK or by the in-process
//! backend used for local runs and tests.

pub mod backend;
pub mod memory;
pub mod persist;

mod error;

pub use backend::{
    AuthBackend, AuthStateHandler, FeedEvent, FeedHandler, TaskBackend, Unsubscribe,
};
pub use error::{codes, BackendError, Result, StoreError};
pub use memory::{MemoryBackend, MemoryConfig};
