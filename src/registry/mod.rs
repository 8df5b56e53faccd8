//! API registry.
//!
//! # Data Flow
//! ```text
//! ConfigSource → loader.rs SpecLoader (overrides, dedup, inactive, listen paths)
//!     → ChainBuilder per spec (failures skipped)
//!     → snapshot.rs RegistrySnapshot (sorted routes + policies)
//!     → published through ArcSwap; request dispatch reads one snapshot per request
//! ```

pub mod loader;
pub mod snapshot;

use std::sync::Arc;

use arc_swap::ArcSwap;

pub use loader::{normalize_listen_path, prepare_specs, SpecLoader};
pub use snapshot::RegistrySnapshot;

/// Shared handle to the currently published snapshot.
pub type SharedSnapshot = Arc<ArcSwap<RegistrySnapshot>>;

pub fn empty_snapshot() -> SharedSnapshot {
    Arc::new(ArcSwap::from_pointee(RegistrySnapshot::default()))
}
