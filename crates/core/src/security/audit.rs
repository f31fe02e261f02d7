//! Structured security audit events.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;
use uplink_shared::types::UserId;

use super::error::AuditError;

/// Log target for audit events.
pub const AUDIT_TARGET: &str = "uplink::audit";

/// Event names emitted by the coordinator.
pub mod events {
    /// A token refresh failed.
    pub const TOKEN_REFRESH_FAILED: &str = "token_refresh_failed";
    /// A refresh succeeded and the credentials were replaced.
    pub const TOKEN_ROTATED: &str = "token_rotated";
    /// A refresh was blocked by a rate limit.
    pub const RATE_LIMIT_EXCEEDED: &str = "token_refresh_rate_limit_exceeded";
    /// A rate limit was reset by an administrator.
    pub const RATE_LIMIT_RESET: &str = "token_refresh_rate_limit_reset";
    /// The user must reconnect the provider.
    pub const USER_INTERVENTION_REQUIRED: &str = "user_intervention_required";
}

/// One audit record: an event name plus a flat data object.
///
/// `data` always carries `user_id` and an RFC 3339 `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// Event name.
    pub event: String,
    /// Event data.
    pub data: Map<String, Value>,
}

impl AuditEvent {
    /// Creates an event for `user_id`, stamped with the current time.
    #[must_use]
    pub fn new(event: impl Into<String>, user_id: UserId) -> Self {
        let mut data = Map::new();
        data.insert("user_id".to_string(), Value::String(user_id.to_string()));
        data.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Self {
            event: event.into(),
            data,
        }
    }

    /// Adds a field. `user_id` and `timestamp` cannot be overwritten.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != "user_id" && key != "timestamp" {
            self.data.insert(key.to_string(), value.into());
        }
        self
    }

    /// Adds every field of a JSON object; other values are stored under `details`.
    #[must_use]
    pub fn with_details(self, details: Value) -> Self {
        match details {
            Value::Object(fields) => fields
                .into_iter()
                .fold(self, |event, (key, value)| event.with(&key, value)),
            Value::Null => self,
            other => self.with("details", other),
        }
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be recorded.
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes audit events as structured logs on the `uplink::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let data = serde_json::to_string(&event.data)?;
        info!(target: AUDIT_TARGET, event = %event.event, data = %data, "audit");
        Ok(())
    }
}
