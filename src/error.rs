//! # Error Handling
//!
//! This module defines the error types of the `checkout-pool` library. It uses
//! `thiserror` for a single [`Error`] enum covering every failure that can be
//! surfaced to a caller, plus a separate [`UsageError`] for caller mistakes
//! that the pool reports but never raises.
//!
//! ## Propagation
//!
//! Only two conditions are expected out of [`Pool::acquire`] in normal
//! operation:
//!
//! - **`Exhausted`**: every checkout unit is in use and nothing is waiting
//!   for eviction. Recoverable; the caller backs off and retries.
//! - **`CheckoutFailed`**: the checkout backend failed. The capacity unit has
//!   already been returned and no slot exists for the key.
//!
//! The remaining variants come from construction (configuration, I/O) and
//! from parsing user input (keys, variant tags, durations).
//!
//! [`Pool::acquire`]: crate::pool::Pool::acquire

use thiserror::Error;

/// Main error type for checkout-pool operations
#[derive(Error, Debug)]
pub enum Error {
    /// No capacity is left and no pending slot can be reclaimed.
    #[error("Checkout pool exhausted: all {capacity} checkout slots are in use")]
    Exhausted { capacity: usize },

    /// The checkout backend failed to materialize a working directory.
    #[error("Checkout failed for {repository}@{revision}: {message}")]
    CheckoutFailed {
        repository: String,
        revision: String,
        message: String,
    },

    /// An error occurred while parsing the pool configuration file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A string could not be parsed as a checkout key.
    #[error("Invalid checkout key '{input}': {message}")]
    InvalidKey { input: String, message: String },

    /// A variant tag was not of the form `key=value`.
    #[error("Invalid variant tag '{input}': expected key=value")]
    InvalidVariant { input: String },

    /// A duration string could not be parsed.
    #[error("Invalid duration '{input}': {message}")]
    InvalidDuration { input: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error indicating that the pool mutex has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// A caller mistake on release. Logged by the pool, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// Release of a key the pool has no slot for.
    #[error("release of unknown checkout {key}")]
    UnknownKey { key: String },

    /// Release of a slot whose reference count is already zero.
    #[error("release of checkout {key} which is not checked out")]
    NotCheckedOut { key: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
