//! Cache module - In-memory caches built on Moka.
//!
//! Nothing here is persisted; every cache starts empty on restart.
//!
//! - `CacheRegistry` - named caches, used for startup/shutdown stats
//! - `TypedCache` - cheap-to-clone typed wrapper over `moka::sync::Cache`
//! - `CacheConfig` - capacity/TTL presets per use case

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
