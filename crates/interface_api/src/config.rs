//! API configuration

use serde::Deserialize;
use std::time::Duration;

use domain_recharge::OrchestratorConfig;

/// API configuration
///
/// Every field has a default, so any subset may be set through the
/// environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Secret shared with the identity provider that signs bearer tokens
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Upper bound on each payment gateway call
    pub gateway_timeout_ms: u64,
    /// Public base URL the gateway sends users back to
    pub redirect_base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/recharge".to_string(),
            log_level: "info".to_string(),
            gateway_timeout_ms: 10_000,
            redirect_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `RECHARGE_`-prefixed environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("RECHARGE").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_gateway_timeout(Duration::from_millis(self.gateway_timeout_ms))
            .with_redirect_base_url(self.redirect_base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_config_from_api_config() {
        let config = ApiConfig {
            gateway_timeout_ms: 2_500,
            redirect_base_url: "https://pay.example.in/".to_string(),
            ..ApiConfig::default()
        };

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.gateway_timeout, Duration::from_millis(2_500));
        assert_eq!(
            orchestrator.return_url("recharges/TXN-1"),
            "https://pay.example.in/recharges/TXN-1"
        );
    }

    #[test]
    fn test_server_addr() {
        assert_eq!(ApiConfig::default().server_addr(), "0.0.0.0:8080");
    }
}
