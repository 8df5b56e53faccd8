//! Policy loading and storage.
//!
//! # Data Flow
//! ```text
//! ConfigSource::load_policies (ordered, duplicates intact)
//!     → loader.rs dedup_policies (first wins, warn on the rest)
//!     → store.rs PolicyStore::replace (wholesale swap, empty/None ignored)
//!     → snapshot() shared into the next RegistrySnapshot
//! ```

pub mod loader;
pub mod store;

pub use loader::dedup_policies;
pub use store::{PolicyMap, PolicyStore};
