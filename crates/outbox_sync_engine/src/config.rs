//! Configuration for the sync engine.

use std::time::Duration;

/// What happens to a trigger that arrives while a run is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoalescePolicy {
    /// The active run makes exactly one more pass once it finishes.
    #[default]
    FollowUp,
    /// The trigger is discarded.
    Drop,
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Endpoint receiving one POST per record.
    pub endpoint: String,
    /// Upper bound on a single delivery attempt.
    pub request_timeout: Duration,
    /// Handling of overlapping triggers.
    pub coalesce: CoalescePolicy,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(30),
            coalesce: CoalescePolicy::default(),
            auth_token: None,
            user_agent: format!("outbox/{}", outbox_core::VERSION),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the coalescing policy.
    pub fn with_coalesce(mut self, policy: CoalescePolicy) -> Self {
        self.coalesce = policy;
        self
    }

    /// Sets the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/api/changes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://sync.example.com/changes")
            .with_timeout(Duration::from_secs(5))
            .with_coalesce(CoalescePolicy::Drop)
            .with_auth_token("secret")
            .with_user_agent("test-agent");

        assert_eq!(config.endpoint, "https://sync.example.com/changes");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.coalesce, CoalescePolicy::Drop);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.coalesce, CoalescePolicy::FollowUp);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.auth_token.is_none());
        assert!(config.user_agent.starts_with("outbox/"));
    }
}
