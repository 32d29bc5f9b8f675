//! Storage module
//!
//! Resolves input and output location strings into `object_store` backends
//! and offers the few operations the job needs: recursive discovery, whole
//! object reads, puts, and prefix deletion for overwrite writes.

mod location;

pub use location::{AccessMode, StorageLocation};
