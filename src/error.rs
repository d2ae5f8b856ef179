//! Error types for fetches and live subscriptions.

use thiserror::Error;

/// Errors that can occur while fetching historical packets or statistics.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Reading the archive failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse archived data.
    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    /// The transport reported an error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The fetch task ended without producing a result.
    #[error("Fetch task ended unexpectedly")]
    Closed,
}

/// Errors that can occur while setting up a live subscription.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// Connecting to the live feed failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The feed cannot serve this measurement.
    #[error("Measurement not available: {0}")]
    Unsupported(String),
}
