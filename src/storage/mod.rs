//! Storage implementations backing host models

pub mod in_memory;

pub use in_memory::{InMemorySession, InMemoryStore};
