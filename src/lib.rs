pub mod config;
pub mod scenario;
pub mod session;

pub use config::{Config, LogConfig, SimulationConfig};
pub use scenario::{parse_numeric_literal, parse_scenario, ScenarioError, ScenarioTransaction};
pub use session::{Simulator, SimulatorError};

// Re-export workspace crates
pub use signum_core as core;
pub use signum_crypto as crypto;
pub use signum_debug as debug;
pub use signum_types as types;
pub use signum_vm as vm;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
