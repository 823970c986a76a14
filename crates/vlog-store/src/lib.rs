//! Versioned entity store.
//!
//! This crate provides:
//! - A typed [`Repository`] that assigns ids, owners and versions on create
//! - Optimistic-lock updates keyed on `(id, version)`
//! - An in-process backend for local runs and tests
//! - A Firestore REST backend with `updateTime` preconditions

pub mod backend;
pub mod client;
pub mod error;
pub mod firestore;
pub mod memory;
pub mod metrics;
pub mod repository;
pub mod retry;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use backend::{DocumentBackend, JsonMap};
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{StoreError, StoreResult};
pub use firestore::FirestoreBackend;
pub use memory::MemoryBackend;
pub use repository::Repository;
pub use retry::RetryConfig;
