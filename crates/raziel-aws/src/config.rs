//! SDK transport configuration.

use std::env;

use aws_credential_types::Credentials;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_LOCAL_PORT: &str = "8000";

/// Where and how the SDK client connects.
#[derive(Debug, Clone)]
pub struct SdkTransportConfig {
    /// AWS region (default `us-east-1`).
    pub region: String,
    /// Endpoint override, e.g. a local DynamoDB.
    pub endpoint: Option<String>,
    /// Static credentials; the SDK default chain is used when absent.
    pub credentials: Option<Credentials>,
}

impl SdkTransportConfig {
    /// Create configuration from environment variables.
    ///
    /// `DEFAULT_REGION` sets the region. When `LOCAL_DYNAMO` is set the
    /// endpoint becomes `http://localhost:{LOCAL_DYNAMO_PORT}` (port 8000 by
    /// default) with throwaway static credentials.
    #[must_use]
    pub fn from_env() -> Self {
        let region = env::var("DEFAULT_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_owned());
        if env::var_os("LOCAL_DYNAMO").is_some() {
            let port =
                env::var("LOCAL_DYNAMO_PORT").unwrap_or_else(|_| DEFAULT_LOCAL_PORT.to_owned());
            Self {
                region,
                ..Self::local(&port)
            }
        } else {
            Self {
                region,
                ..Self::default()
            }
        }
    }

    /// A local endpoint on `port` with static credentials.
    #[must_use]
    pub fn local(port: &str) -> Self {
        Self {
            region: DEFAULT_REGION.to_owned(),
            endpoint: Some(format!("http://localhost:{port}")),
            credentials: Some(Credentials::new("local", "local", None, None, "raziel-local")),
        }
    }

    /// Override the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use static credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl Default for SdkTransportConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_owned(),
            endpoint: None,
            credentials: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_point_local_config_at_localhost() {
        let config = SdkTransportConfig::local("8123");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:8123"));
        assert!(config.credentials.is_some());
        assert_eq!(config.region, "us-east-1");
    }

    #[test]
    fn test_should_default_to_sdk_credential_chain() {
        let config = SdkTransportConfig::default().with_endpoint("http://db:8000");
        assert!(config.credentials.is_none());
        assert_eq!(config.endpoint.as_deref(), Some("http://db:8000"));
    }
}
