use crate::api::{ConfigSnapshot, Service};
use crate::error::BridgeResult;
use crate::reflect::Reflect;
use crate::value::{OwnerRef, TypeRef};
use quorum_macros::bridge_api;
use std::sync::Arc;

/// Registry of services, indexed flat and by owner.
///
/// Type queries treat a type from another realm as a non-match; they never
/// fail because of it.
#[bridge_api(namespace = "service_manager")]
pub trait ServiceManager: Reflect {
    /// Every registered service, in registration order.
    #[bridge]
    fn all_services(&self) -> BridgeResult<Vec<Arc<dyn Service>>>;

    /// Services assignable to `service_type`.
    #[bridge]
    fn services_by_type(&self, service_type: &TypeRef) -> BridgeResult<Vec<Arc<dyn Service>>>;

    /// First service whose name matches, ignoring case.
    #[bridge]
    fn service(&self, name: &str) -> BridgeResult<Option<Arc<dyn Service>>>;

    #[bridge]
    fn owner_bound_services(&self, owner: &OwnerRef) -> BridgeResult<Vec<Arc<dyn Service>>>;

    /// Register `service`.
    ///
    /// Fails with [`BridgeError::DuplicateRegistration`](crate::BridgeError::DuplicateRegistration)
    /// when the owner already has a service with the same name and
    /// implementation.
    #[bridge]
    fn register_service(&self, service: Arc<dyn Service>) -> BridgeResult<()>;

    #[bridge]
    fn has_registered_service(&self, owner: &OwnerRef, service_type: &TypeRef) -> BridgeResult<bool>;

    #[bridge]
    fn service_for_owner(
        &self,
        owner: &OwnerRef,
        service_type: &TypeRef,
    ) -> BridgeResult<Option<Arc<dyn Service>>>;
}

/// Per-owner configuration files.
#[bridge_api(namespace = "config_manager")]
pub trait ConfigManager: Reflect {
    /// Load `file_name` from the owner's data directory, creating an empty
    /// file when it does not exist yet.
    #[bridge]
    fn create_config(&self, owner: &OwnerRef, file_name: &str) -> BridgeResult<ConfigSnapshot>;
}
