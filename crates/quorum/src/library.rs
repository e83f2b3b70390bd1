//! The leader: the real implementation of [`LibraryApi`].

use crate::anchor::Anchor;
use crate::api::{interfaces, ConfigManager, LibraryApi, ProfileService, Service, ServiceManager};
use crate::bootstrap::{LeaderFactory, Role};
use crate::error::{BridgeError, BridgeResult, InvokeError};
use crate::realm::Realm;
use crate::reflect::{Call, ClassInfo, Reflect};
use crate::runtime::SharedRuntime;
use crate::service::{
    find_by_owner_name, ConfigManagerImpl, MojangProfileSource, ProfileServiceImpl, ProfileSource,
    ServiceManagerImpl,
};
use crate::skeleton;
use crate::value::{OwnerRef, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// A leader owning the shared runtime, the service registry and the config
/// manager. Published leaders and isolated leaders are the same type; only
/// the anchor tells them apart.
pub struct Library {
    class: ClassInfo,
    realm: Arc<Realm>,
    owner: OwnerRef,
    runtime: Arc<SharedRuntime>,
    source: Arc<dyn ProfileSource>,
    services: Arc<ServiceManagerImpl>,
    configs: Arc<ConfigManagerImpl>,
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    closed: AtomicBool,
}

impl Library {
    /// Build a leader for `owner`. Without a profile source, lookups go to
    /// the configured Mojang endpoints.
    pub fn new(
        realm: Arc<Realm>,
        owner: OwnerRef,
        source: Option<Arc<dyn ProfileSource>>,
    ) -> BridgeResult<Arc<Self>> {
        let runtime = Arc::new(SharedRuntime::new(realm.settings())?);
        let source = source.unwrap_or_else(|| {
            Arc::new(MojangProfileSource::new(
                runtime.http().clone(),
                realm.settings().profiles.clone(),
            ))
        });

        debug!(owner = %owner, realm = %realm.id(), "Leader created");
        Ok(Arc::new(Self {
            class: skeleton::library_class("Library", realm.id()),
            services: ServiceManagerImpl::new(realm.clone()),
            configs: ConfigManagerImpl::new(realm.id()),
            realm,
            owner,
            runtime,
            source,
            owner_locks: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    pub fn runtime(&self) -> &Arc<SharedRuntime> {
        &self.runtime
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.is_closed() {
            return Err(BridgeError::Closed(format!("library of {}", self.owner)));
        }
        Ok(())
    }

    /// Whether this object is the leader published in `anchor`.
    fn is_published(&self, anchor: &Anchor) -> bool {
        anchor
            .leader()
            .is_some_and(|leader| std::ptr::addr_eq(Arc::as_ptr(&leader), self as *const Self))
    }

    fn owner_lock(&self, owner: &OwnerRef) -> Arc<Mutex<()>> {
        self.owner_locks
            .lock()
            .entry(owner.name().to_string())
            .or_default()
            .clone()
    }

    /// Step down if published: drop the leader owner's own follower entry,
    /// clear the leader fields, and clear the whole anchor when no
    /// followers remain.
    fn step_down(&self) {
        let anchor = match self.realm.anchor() {
            Ok(anchor) => anchor,
            Err(err) => {
                debug!(error = %err, "Anchor unavailable during shutdown");
                return;
            }
        };
        let _guard = anchor.lock();
        if !self.is_published(&anchor) {
            return;
        }

        let followers = anchor.followers();
        if let Some(leader_owner) = anchor.leader_owner() {
            followers.unregister(&leader_owner);
        }
        let remaining = followers.len();
        anchor.clear_leader();
        if remaining == 0 {
            anchor.clear_all();
            debug!(owner = %self.owner, "Leader stepped down, anchor cleared");
        } else {
            debug!(owner = %self.owner, followers = remaining, "Leader stepped down, followers remain");
        }
    }
}

impl Service for Library {
    fn service_name(&self) -> BridgeResult<String> {
        Ok(format!("quorum({})", self.owner.name()))
    }

    fn executor(&self) -> BridgeResult<Option<Handle>> {
        Ok(Some(self.runtime.handle().clone()))
    }
}

impl LibraryApi for Library {
    fn profile_service(&self, owner: &OwnerRef) -> BridgeResult<Arc<dyn ProfileService>> {
        self.ensure_open()?;
        let lock = self.owner_lock(owner);
        let _guard = lock.lock();

        let profile_type = self.realm.type_ref(interfaces::PROFILE_SERVICE);
        if let Some(existing) = self.services.service_for_owner(owner, &profile_type)? {
            if let Some(service) = existing.into_profile_service() {
                return Ok(service);
            }
        }
        if let Some(existing) =
            find_by_owner_name(self.services.as_ref(), owner, interfaces::PROFILE_SERVICE)?
        {
            if let Some(service) = existing.into_profile_service() {
                debug!(owner = %owner, "Reusing profile service registered under a previous owner handle");
                return Ok(service);
            }
        }

        let service = ProfileServiceImpl::new(
            self.realm.id(),
            owner.clone(),
            self.runtime.clone(),
            self.source.clone(),
        );
        self.services.register_service(service.clone())?;
        debug!(owner = %owner, "Profile service created");
        Ok(service)
    }

    fn service_manager(&self) -> BridgeResult<Arc<dyn ServiceManager>> {
        self.ensure_open()?;
        Ok(self.services.clone())
    }

    fn config_manager(&self) -> BridgeResult<Arc<dyn ConfigManager>> {
        self.ensure_open()?;
        Ok(self.configs.clone())
    }

    fn shutdown(&self) -> BridgeResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.step_down();
        self.runtime.shutdown();
        self.runtime.profiles().clear();
        info!(owner = %self.owner, "Library shut down");
        Ok(())
    }

    fn role(&self) -> Role {
        match self.realm.anchor() {
            Ok(anchor) => {
                let _guard = anchor.lock();
                if self.is_published(&anchor) {
                    Role::Leader
                } else {
                    Role::Isolated
                }
            }
            Err(_) => Role::Isolated,
        }
    }
}

impl Reflect for Library {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        if self.is_closed() {
            return Err(InvokeError::Closed {
                class: self.class.name().to_string(),
            });
        }
        let call = Call::new(&self.class, slot, args)?;
        skeleton::dispatch_library(self, &call)?.ok_or_else(|| call.unsupported(&self.class))
    }

    fn into_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }
}

/// Builds [`Library`] leaders.
#[derive(Clone, Default)]
pub struct LibraryFactory {
    source: Option<Arc<dyn ProfileSource>>,
}

impl LibraryFactory {
    /// Leaders built by this factory look profiles up in `source`.
    pub fn with_profile_source(source: Arc<dyn ProfileSource>) -> Self {
        Self {
            source: Some(source),
        }
    }
}

impl LeaderFactory for LibraryFactory {
    fn create_leader(&self, realm: &Arc<Realm>, owner: &OwnerRef) -> BridgeResult<Arc<dyn LibraryApi>> {
        let library: Arc<dyn LibraryApi> = Library::new(realm.clone(), owner.clone(), self.source.clone())?;
        Ok(library)
    }
}
