//! Transport seam for the reference sinks
//!
//! Nothing here speaks a wire protocol. [`LogPublisher`] stands in for a broker
//! client and [`MemoryPublisher`] keeps messages for inspection.

use std::fmt;

use super::columns::FlockBatch;
use super::records::AxisRecord;
use crate::error::PublishError;

pub const DEFAULT_BROKER_URL: &str = "nats://127.0.0.1:4222";
pub const DEFAULT_BROKER_USER: &str = "sys";

/// Where the sinks would publish to.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub url: String,
    pub user: String,
    password: Option<String>,
}

impl BrokerEndpoint {
    pub fn new(url: impl Into<String>, password: Option<String>) -> Self {
        Self {
            url: url.into(),
            user: DEFAULT_BROKER_USER.to_string(),
            password: password.filter(|password| !password.is_empty()),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl Default for BrokerEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_BROKER_URL, None)
    }
}

// Never print the credential.
impl fmt::Debug for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerEndpoint")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Unit of data handed to a publisher.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Batch { subject: String, batch: FlockBatch },
    Record(AxisRecord),
}

impl Message {
    pub fn subject(&self) -> String {
        match self {
            Message::Batch { subject, .. } => subject.clone(),
            Message::Record(record) => record.subject(),
        }
    }
}

pub trait Publisher: Send {
    fn publish(&mut self, message: Message) -> Result<(), PublishError>;

    /// Flush anything buffered. Called when the sink finalizes.
    fn flush(&mut self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Logs each message at debug level under the endpoint's name.
#[derive(Debug)]
pub struct LogPublisher {
    endpoint: BrokerEndpoint,
    published: u64,
}

impl LogPublisher {
    pub fn new(endpoint: BrokerEndpoint) -> Self {
        log::info!(
            "Publishing telemetry to {} as '{}' (password {})",
            endpoint,
            endpoint.user,
            if endpoint.has_password() { "set" } else { "not set" }
        );
        Self {
            endpoint,
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Publisher for LogPublisher {
    fn publish(&mut self, message: Message) -> Result<(), PublishError> {
        match &message {
            Message::Batch { subject, batch } => log::debug!(
                "[{}] {}: batch of {} rows at {}",
                self.endpoint,
                subject,
                batch.len(),
                batch.time.values().first().copied().unwrap_or_default()
            ),
            Message::Record(record) => log::trace!(
                "[{}] {}: {} at {}",
                self.endpoint,
                record.subject(),
                record.value,
                record.time
            ),
        }
        self.published += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PublishError> {
        log::debug!("[{}] flushed after {} messages", self.endpoint, self.published);
        Ok(())
    }
}

/// Collects messages, optionally failing every publish after a limit.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    pub messages: Vec<Message>,
    pub flushed: bool,
    accept_limit: Option<usize>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `limit` messages, then rejects everything.
    pub fn failing_after(limit: usize) -> Self {
        Self {
            accept_limit: Some(limit),
            ..Self::default()
        }
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, message: Message) -> Result<(), PublishError> {
        if self
            .accept_limit
            .is_some_and(|limit| self.messages.len() >= limit)
        {
            return Err(PublishError {
                subject: message.subject(),
                reason: "publisher rejected message".to_string(),
            });
        }
        self.messages.push(message);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PublishError> {
        self.flushed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_debug_redacts_password() {
        let endpoint = BrokerEndpoint::new("nats://broker:4222", Some("hunter2".to_string()));
        let printed = format!("{endpoint:?} {endpoint}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
        assert_eq!(endpoint.password.as_deref(), Some("hunter2"));
        assert_eq!(endpoint.user, "sys");
    }

    #[test]
    fn test_empty_password_is_none() {
        assert!(!BrokerEndpoint::new("nats://x", Some(String::new())).has_password());
        assert_eq!(BrokerEndpoint::default().url, DEFAULT_BROKER_URL);
    }
}
