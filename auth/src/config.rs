//! Orchestrator configuration.
//!
//! Every field has a default, so a JSON document only needs the values it
//! changes. Durations are written as whole seconds.
//!
//! ```
//! use scholarlens_auth::config::AuthConfig;
//! use std::time::Duration;
//!
//! let config = AuthConfig::from_json_str(r#"{ "operation_timeout": 10 }"#).unwrap();
//! assert_eq!(config.operation_timeout, Duration::from_secs(10));
//! assert_eq!(config.offline.max_offline_age, Duration::from_secs(30 * 24 * 60 * 60));
//! ```

use crate::policy::ErrorPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Longest accepted access-token lifetime and offline age (ten years).
pub const MAX_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for [`AuthConfig`].
    #[error("failed to parse auth config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid auth config: {0}")]
    Invalid(String),
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long a facade call waits for its operation to finish.
    #[serde(with = "secs")]
    pub operation_timeout: Duration,

    /// Capacity of the store's action broadcast.
    pub action_broadcast_capacity: usize,

    /// How long `shutdown` waits for running effects.
    #[serde(with = "secs")]
    pub shutdown_timeout: Duration,

    /// Per-kind error presentation.
    pub error_policy: ErrorPolicy,

    /// Session manager settings.
    pub session: SessionConfig,

    /// Offline cache settings.
    pub offline: OfflineConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
            action_broadcast_capacity: 64,
            shutdown_timeout: Duration::from_secs(5),
            error_policy: ErrorPolicy::default(),
            session: SessionConfig::default(),
            offline: OfflineConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid("operation_timeout must be positive".into()));
        }
        if self.action_broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "action_broadcast_capacity must be positive".into(),
            ));
        }
        if self.session.access_token_ttl.is_zero() {
            return Err(ConfigError::Invalid(
                "session.access_token_ttl must be positive".into(),
            ));
        }
        if self.session.access_token_ttl > MAX_LIFETIME {
            return Err(ConfigError::Invalid(
                "session.access_token_ttl must not exceed ten years".into(),
            ));
        }
        if self.session.event_capacity == 0 {
            return Err(ConfigError::Invalid("session.event_capacity must be positive".into()));
        }
        if self.offline.max_offline_age.is_zero() {
            return Err(ConfigError::Invalid(
                "offline.max_offline_age must be positive".into(),
            ));
        }
        if self.offline.max_offline_age > MAX_LIFETIME {
            return Err(ConfigError::Invalid(
                "offline.max_offline_age must not exceed ten years".into(),
            ));
        }
        Ok(())
    }

    /// Set the operation timeout.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the error policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Set the session manager settings.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the offline cache settings.
    #[must_use]
    pub fn with_offline(mut self, offline: OfflineConfig) -> Self {
        self.offline = offline;
        self
    }
}

/// [`LocalSessionManager`](crate::providers::LocalSessionManager) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of an access token.
    #[serde(with = "secs")]
    pub access_token_ttl: Duration,

    /// Storage key of the persisted session.
    pub storage_key: String,

    /// Capacity of the session state and error broadcasts.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(60 * 60),
            storage_key: "scholarlens.session".to_string(),
            event_capacity: 16,
        }
    }
}

impl SessionConfig {
    /// Set the access token lifetime.
    #[must_use]
    pub const fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }
}

/// [`CachedOfflineAuth`](crate::providers::CachedOfflineAuth) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// How long a cached user may sign in offline.
    #[serde(with = "secs")]
    pub max_offline_age: Duration,

    /// Storage key of the cached user.
    pub storage_key: String,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            max_offline_age: Duration::from_secs(30 * 24 * 60 * 60),
            storage_key: "scholarlens.offline_user".to_string(),
        }
    }
}

impl OfflineConfig {
    /// Set the maximum offline age.
    #[must_use]
    pub const fn with_max_offline_age(mut self, age: Duration) -> Self {
        self.max_offline_age = age;
        self
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuthConfig::default();
        config.validate().unwrap();
        assert_eq!(config.operation_timeout, Duration::from_secs(30));
        assert_eq!(config.session.storage_key, "scholarlens.session");
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = AuthConfig::from_json_str(
            r#"{
                "shutdown_timeout": 2,
                "session": { "access_token_ttl": 900 },
                "error_policy": { "rules": { "unknown": {
                    "message": null, "retryable": false,
                    "requires_reauth": false, "show_to_user": true
                } } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.session.access_token_ttl, Duration::from_secs(900));
        assert_eq!(config.session.event_capacity, 16);
        assert!(!config.error_policy.rule(ErrorKind::Unknown).retryable);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let error = AuthConfig::from_json_str(r#"{ "operation_timeout": 0 }"#).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_lifetimes_past_ten_years_are_rejected() {
        let ttl = AuthConfig::from_json_str(r#"{ "session": { "access_token_ttl": 9223372036854775807 } }"#)
            .unwrap_err();
        assert!(matches!(ttl, ConfigError::Invalid(message) if message.contains("access_token_ttl")));

        let age = AuthConfig::default()
            .with_offline(OfflineConfig::default().with_max_offline_age(MAX_LIFETIME + Duration::from_secs(1)))
            .validate()
            .unwrap_err();
        assert!(matches!(age, ConfigError::Invalid(message) if message.contains("max_offline_age")));

        AuthConfig::default()
            .with_session(SessionConfig::default().with_access_token_ttl(MAX_LIFETIME))
            .validate()
            .unwrap();
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let error = AuthConfig::from_json_str("{").unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = AuthConfig::default()
            .with_operation_timeout(Duration::from_secs(5))
            .with_offline(OfflineConfig::default().with_max_offline_age(Duration::from_secs(60)));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(AuthConfig::from_json_str(&json).unwrap(), config);
    }
}
