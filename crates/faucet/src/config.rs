//! Faucet configuration
//!
//! Layered the usual way: built-in defaults, then an optional TOML file, then
//! `FAUCET_*` environment variables. The binary applies CLI flags on top.
//! Variable names used by the original deployment scripts
//! (`ETHEREUM_PRIVATE_KEY`, `SEPOLIA_RPC_URL`, `FAUCET_AMOUNT`, `PORT`) are
//! still honored.

use crate::amount::parse_ether;
use crate::error::{FaucetError, FaucetResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Faucet service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Server address
    pub server_addr: String,

    /// RPC endpoint for blockchain
    pub rpc_url: String,

    /// Faucet account private key (hex)
    pub private_key: String,

    /// Amount to dispense per request (in ether, decimal)
    pub dispense_amount: String,

    /// Cooldown period between grants for the same address (seconds)
    pub cooldown_secs: u64,

    /// Gas limit for transfers
    pub gas_limit: u64,

    /// Upper bound on a single submission (seconds)
    pub submit_timeout_secs: u64,

    /// Timeout for individual RPC calls (seconds)
    pub rpc_timeout_secs: u64,

    /// How often expired cooldown entries are swept (seconds, 0 disables)
    pub prune_interval_secs: u64,

    /// Enable CORS
    pub cors_enabled: bool,

    pub logging: LoggingConfig,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:3001".to_string(),
            rpc_url: String::new(),
            private_key: String::new(),
            dispense_amount: "0.01".to_string(),
            cooldown_secs: 86400, // 24 hours
            gas_limit: 21000,
            submit_timeout_secs: 30,
            rpc_timeout_secs: 10,
            prune_interval_secs: 3600,
            cors_enabled: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl FaucetConfig {
    /// Load from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> FaucetResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FAUCET")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: FaucetConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| FaucetError::Config(e.to_string()))?;

        config.apply_legacy_env();
        Ok(config)
    }

    /// Load from environment variables with defaults
    pub fn from_env() -> FaucetResult<Self> {
        Self::load(None)
    }

    fn apply_legacy_env(&mut self) {
        if self.private_key.is_empty() {
            if let Ok(key) = std::env::var("ETHEREUM_PRIVATE_KEY") {
                self.private_key = key;
            }
        }

        if self.rpc_url.is_empty() {
            if let Ok(url) = std::env::var("SEPOLIA_RPC_URL") {
                self.rpc_url = url;
            }
        }

        if let Ok(amount) = std::env::var("FAUCET_AMOUNT") {
            self.dispense_amount = amount;
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server_addr = format!("0.0.0.0:{}", port);
            }
        }
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> FaucetResult<()> {
        let mut missing = Vec::new();
        if self.private_key.trim().is_empty() {
            missing.push("private_key");
        }
        if self.rpc_url.trim().is_empty() {
            missing.push("rpc_url");
        }
        if !missing.is_empty() {
            return Err(FaucetError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let amount = parse_ether(&self.dispense_amount)
            .map_err(|e| FaucetError::Config(format!("dispense_amount: {}", e)))?;
        if amount == 0 {
            return Err(FaucetError::Config("dispense_amount must be positive".to_string()));
        }
        if self.cooldown_secs == 0 {
            return Err(FaucetError::Config("cooldown_secs must be positive".to_string()));
        }
        if self.gas_limit == 0 {
            return Err(FaucetError::Config("gas_limit must be positive".to_string()));
        }
        if self.submit_timeout_secs == 0 {
            return Err(FaucetError::Config(
                "submit_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Dispense amount in wei
    pub fn dispense_amount_wei(&self) -> FaucetResult<u128> {
        parse_ether(&self.dispense_amount)
            .map_err(|e| FaucetError::Config(format!("dispense_amount: {}", e)))
    }

    /// Get address cooldown duration
    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}
