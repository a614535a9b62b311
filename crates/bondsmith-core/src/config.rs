//! Gateway configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the delivery gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Issuer recorded on grants whose request carries no facilitator identity
    pub facilitator_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            facilitator_name: "GM".to_string(),
        }
    }
}
