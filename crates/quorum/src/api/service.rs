use crate::api::ConfigSnapshot;
use crate::error::BridgeResult;
use crate::reflect::Reflect;
use crate::value::OwnerRef;
use quorum_macros::bridge_api;
use tokio::runtime::Handle;

/// Anything registered with a [`ServiceManager`](crate::api::ServiceManager).
///
/// Owner binding, executor and configuration are optional capabilities; the
/// defaults report their absence.
#[bridge_api(namespace = "service")]
pub trait Service: Reflect {
    /// Display name. Not unique.
    #[bridge]
    fn service_name(&self) -> BridgeResult<String>;

    /// Owner this service is bound to.
    #[bridge]
    fn bound_owner(&self) -> BridgeResult<Option<OwnerRef>> {
        Ok(None)
    }

    /// Executor running this service's asynchronous work.
    #[bridge]
    fn executor(&self) -> BridgeResult<Option<Handle>> {
        Ok(None)
    }

    #[bridge]
    fn configuration(&self) -> BridgeResult<Option<ConfigSnapshot>> {
        Ok(None)
    }
}
