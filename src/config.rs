use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use signum_vm::ProtocolConfig;
use std::fs;
use std::path::Path;

/// Complete simulator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Protocol constants seen by contracts
    pub protocol: ProtocolConfig,
    /// Ledger seeding
    pub simulation: SimulationConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for transaction, asset and account ids
    pub rng_seed: u64,
    /// Height of the first simulated block
    pub start_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level
    pub level: String,
    /// Enable JSON logging
    pub json: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0,
            start_block: 1,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // A free instruction set would let a looping contract run forever
        if self.protocol.fee_per_unit == 0 {
            anyhow::bail!("fee_per_unit must be greater than 0");
        }
        if self.protocol.standard_fee_units == 0 || self.protocol.api_fee_units == 0 {
            anyhow::bail!("fee units must be greater than 0");
        }

        if self.protocol.user_stack_pages == 0 || self.protocol.code_stack_pages == 0 {
            anyhow::bail!("stack pages must be greater than 0");
        }

        if self.simulation.start_block == 0 {
            anyhow::bail!("start_block must be greater than 0");
        }

        if self.log.level.trim().is_empty() {
            anyhow::bail!("log level must not be empty");
        }

        Ok(())
    }
}
