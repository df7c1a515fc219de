//! Batch Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging and checksum utilities for the batch worker.
//!
//! # Overview
//!
//! - **Error Handling**: [`BatchError`] and the [`Result`] alias
//! - **Logging**: environment-driven `tracing` subscriber setup
//! - **Checksums**: SHA-256 fingerprint of result artifacts
//!
//! # Example
//!
//! ```
//! use batch_common::checksum::sha256_hex;
//!
//! let digest = sha256_hex(b"[{\"id\":1}]");
//! assert_eq!(digest.len(), 64);
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{BatchError, Result};
