//! Object storage for media uploads and generated videos.
//!
//! This crate provides:
//! - The [`ObjectStorage`] seam used by the pipelines
//! - An R2 / S3-compatible implementation
//! - Location parsing for `s3://`, `gs://`, public URLs and bare keys
//! - An in-process implementation for local runs and tests

pub mod client;
pub mod error;
pub mod location;
pub mod memory;
pub mod storage;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use location::ObjectLocation;
pub use memory::MemoryObjectStorage;
pub use storage::ObjectStorage;
