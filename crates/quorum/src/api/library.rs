use crate::api::{ConfigManager, ProfileService, Service, ServiceManager};
use crate::bootstrap::Role;
use crate::error::BridgeResult;
use crate::value::OwnerRef;
use quorum_macros::bridge_api;
use std::sync::Arc;

/// The library as handed out by the entry point, leader or follower alike.
#[bridge_api(namespace = "library")]
pub trait LibraryApi: Service {
    /// Profile lookups bound to `owner`. The leader hands out one instance
    /// per owner.
    #[bridge(stable_id = "LIB_API_PROFILE_SERVICE")]
    fn profile_service(&self, owner: &OwnerRef) -> BridgeResult<Arc<dyn ProfileService>>;

    #[bridge(stable_id = "LIB_API_SERVICE_MANAGER")]
    fn service_manager(&self) -> BridgeResult<Arc<dyn ServiceManager>>;

    #[bridge(stable_id = "LIB_API_CONFIG_MANAGER")]
    fn config_manager(&self) -> BridgeResult<Arc<dyn ConfigManager>>;

    /// Leader: step down, and release the shared runtime. Follower: detach.
    #[bridge(stable_id = "LIB_API_SHUTDOWN")]
    fn shutdown(&self) -> BridgeResult<()>;

    fn role(&self) -> Role;
}
