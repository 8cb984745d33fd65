// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.
//!
//! Absent types are not errors: resolution reports them as `Ok(None)`.
//! Enumeration faults inside a module are absorbed by the scanner.

use thiserror::Error;

use crate::config::ConfigError;

/// Type cache errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or whitespace-only type name.
    #[error("Malformed type name: {0:?}")]
    MalformedName(String),

    /// Configuration rejected while building the cache.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for type cache operations.
pub type Result<T> = std::result::Result<T, Error>;
