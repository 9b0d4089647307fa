//! Wiring helpers for running a chat session.

pub mod wiring;

pub use wiring::{default_backends, init_tracing};
