//! The bridged API.
//!
//! Every trait here is a `#[bridge_api]` surface: its `#[bridge]` methods
//! get stable ids in the generated contract and can be forwarded from a
//! follower to the leader. Unmarked methods are local only.

mod data;
mod library;
mod manager;
mod profile;
mod service;

pub use data::{ConfigSnapshot, SkinData};
pub use library::LibraryApi;
pub use manager::{ConfigManager, ServiceManager};
pub use profile::ProfileService;
pub use service::Service;

/// Interface names used in class descriptions and type references.
pub mod interfaces {
    pub const SERVICE: &str = "Service";
    pub const LIBRARY_API: &str = "LibraryApi";
    pub const SERVICE_MANAGER: &str = "ServiceManager";
    pub const CONFIG_MANAGER: &str = "ConfigManager";
    pub const PROFILE_SERVICE: &str = "ProfileService";
    /// Services with a bound owner.
    pub const OWNER_BOUND: &str = "OwnerBoundService";
    /// Services with an executor.
    pub const ASYNC: &str = "AsyncService";
    /// Services with a configuration.
    pub const CONFIGURABLE: &str = "ConfigurableService";
}
