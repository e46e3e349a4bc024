//! Collaborator interfaces used by the submission workflow.
//!
//! Each external dependency of the controller is passed in explicitly, so
//! tests can substitute in-memory fakes for the network, the token provider,
//! the notification sink, persistent storage and time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::form::FormRequest;
use crate::error::Result;

/// Performs the single outbound form submission.
#[async_trait]
pub trait FormTransport: Send + Sync {
    /// Send the request. Any transport error or non-success status is an error.
    async fn send(&self, request: &FormRequest) -> Result<()>;
}

/// Issues anti-abuse tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a token for `action`, or `None` if the provider could not issue one.
    async fn token(&self, action: &str) -> Option<String>;
}

/// User-visible notification sink.
///
/// Implementations fall back to their own default message when `message`
/// is `None`.
pub trait Notifier: Send + Sync {
    /// Show a success notice.
    fn show_success(&self, message: Option<&str>);

    /// Show an error notice.
    fn show_error(&self, message: Option<&str>);
}

/// String key-value persistence.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Wall-clock time source.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}
