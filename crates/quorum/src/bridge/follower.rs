use super::{
    adapt_profile_service, BridgedConfigManager, BridgedServiceManager, Dispatcher, LeaderLink,
    Target,
};
use crate::api::{ConfigManager, LibraryApi, ProfileService, Service, ServiceManager};
use crate::bootstrap::Role;
use crate::contract::ids;
use crate::error::{BridgeResult, InvokeError};
use crate::reflect::{Call, ClassInfo, Reflect};
use crate::skeleton;
use crate::value::{OwnerRef, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// The library as seen by a follower: every call is forwarded to whichever
/// leader is published when it is made.
///
/// The manager bridges are built once and kept; their targets are
/// re-acquired from the current leader on every call.
pub struct BridgedApi {
    class: ClassInfo,
    link: Arc<LeaderLink>,
    calls: Dispatcher,
    service_manager: Mutex<Option<Arc<BridgedServiceManager>>>,
    config_manager: Mutex<Option<Arc<BridgedConfigManager>>>,
}

impl BridgedApi {
    pub(crate) fn new(link: Arc<LeaderLink>) -> Arc<Self> {
        Arc::new(Self {
            class: skeleton::library_class("BridgedApi", link.realm().id()),
            calls: Dispatcher::new(Target::Leader(link.clone())),
            link,
            service_manager: Mutex::new(None),
            config_manager: Mutex::new(None),
        })
    }

    pub fn owner(&self) -> &OwnerRef {
        self.link.owner()
    }
}

impl Service for BridgedApi {
    fn service_name(&self) -> BridgeResult<String> {
        Ok(format!("quorum-bridge({})", self.link.owner().name()))
    }
}

impl LibraryApi for BridgedApi {
    fn profile_service(&self, owner: &OwnerRef) -> BridgeResult<Arc<dyn ProfileService>> {
        let realm = self.link.realm();
        self.calls.call_as(
            ids::library::PROFILE_SERVICE__OWNERREF,
            &[Value::Owner(owner.clone())],
            |value| Ok(adapt_profile_service(realm, value.into_object()?)),
        )
    }

    fn service_manager(&self) -> BridgeResult<Arc<dyn ServiceManager>> {
        let manager = self
            .service_manager
            .lock()
            .get_or_insert_with(|| {
                BridgedServiceManager::new(
                    self.link.realm().clone(),
                    Dispatcher::new(Target::LeaderAccessor {
                        link: self.link.clone(),
                        stable_id: ids::library::SERVICE_MANAGER,
                    }),
                )
            })
            .clone();
        Ok(manager)
    }

    fn config_manager(&self) -> BridgeResult<Arc<dyn ConfigManager>> {
        let manager = self
            .config_manager
            .lock()
            .get_or_insert_with(|| {
                BridgedConfigManager::new(
                    self.link.realm().clone(),
                    Dispatcher::new(Target::LeaderAccessor {
                        link: self.link.clone(),
                        stable_id: ids::library::CONFIG_MANAGER,
                    }),
                )
            })
            .clone();
        Ok(manager)
    }

    /// Detach from the anchor and drop local caches. The leader and its
    /// runtime are left alone.
    fn shutdown(&self) -> BridgeResult<()> {
        match self.link.bootstrap().detach_follower(self.link.owner()) {
            Ok(was_live) => debug!(owner = %self.link.owner(), was_live, "Follower detached"),
            Err(err) => debug!(owner = %self.link.owner(), error = %err, "Follower detach skipped"),
        }
        self.service_manager.lock().take();
        self.config_manager.lock().take();
        self.calls.clear();
        Ok(())
    }

    fn role(&self) -> Role {
        Role::Follower
    }
}

impl Reflect for BridgedApi {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        skeleton::dispatch_library(self, &call)?.ok_or_else(|| call.unsupported(&self.class))
    }

    fn into_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }
}
