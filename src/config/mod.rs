//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! While running (standalone mode):
//!     watcher.rs detects a change under app_path or the policy file
//!     → queues a reload
//!     → the reload loop rebuilds and publishes a new registry snapshot
//! ```
//!
//! # Design Decisions
//! - Gateway config is immutable once loaded; API definitions and policies
//!   are the hot-reloaded part
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
pub use schema::{
    AuthOverrideConfig, DashboardConfig, GatewayConfig, ListenerConfig, ObservabilityConfig,
    PolicyConfig, PolicySource, ReloadConfig, SlaveConfig, StorageConfig, StorageKind,
    TimeoutConfig,
};
