//! Provider types and configuration.

use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    AwsSqs,
    InMemory,
}

impl ProviderType {
    /// Get maximum message size for provider
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::AwsSqs => 256 * 1024,          // 256KB
            Self::InMemory => 10 * 1024 * 1024, // 10MB
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwsSqs => write!(f, "AwsSqs"),
            Self::InMemory => write!(f, "InMemory"),
        }
    }
}

/// AWS SQS configuration
#[derive(Clone)]
pub struct AwsSqsConfig {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: Zeroizing<String>,
    /// Endpoint override, e.g. a local SQS emulator. Defaults to the
    /// regional `https://sqs.{region}.amazonaws.com` endpoint.
    pub endpoint: Option<String>,
    /// HTTP timeout added on top of the long-poll wait
    pub request_timeout: Duration,
}

impl AwsSqsConfig {
    /// Create configuration for a region with static credentials
    pub fn new(region: String, access_key_id: String, secret_access_key: String) -> Self {
        Self {
            region,
            access_key_id,
            secret_access_key: Zeroizing::new(secret_access_key),
            endpoint: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Override the service endpoint
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Resolved endpoint URL
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://sqs.{}.amazonaws.com", self.region))
    }
}

impl fmt::Debug for AwsSqsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSqsConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Visibility timeout applied when a receive does not override it
    pub default_visibility_timeout: Duration,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            default_visibility_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
