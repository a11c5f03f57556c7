//! Orchestrator configuration

use std::time::Duration;

use core_kernel::Currency;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Currency every plan and wallet is held in
    pub currency: Currency,
    /// Upper bound on each gateway call
    pub gateway_timeout: Duration,
    /// Base of the URL the gateway returns the user to after checkout
    pub redirect_base_url: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            currency: Currency::INR,
            gateway_timeout: Duration::from_secs(10),
            redirect_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn with_redirect_base_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_base_url = url.into();
        self
    }

    /// Where the user lands after paying for `transaction_id`
    pub fn return_url(&self, path: &str) -> String {
        format!("{}/{}", self.redirect_base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
