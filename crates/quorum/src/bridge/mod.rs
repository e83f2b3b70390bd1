//! The follower side of the bridge.
//!
//! Every forwarded call goes through a [`Dispatcher`]: acquire the target
//! (usually by re-reading the anchor), resolve the stable id against the
//! target's class, invoke, and adapt the raw result. A failed invocation is
//! retried exactly once against a freshly acquired target with a freshly
//! resolved handle.
//!
//! Raw results are never handed to callers. Service-shaped objects are
//! wrapped in local proxies unless they already come from this realm, and
//! plain data is copied field by field through accessors.

mod follower;
mod managers;
mod proxy;

pub use follower::BridgedApi;
pub use managers::{BridgedConfigManager, BridgedServiceManager};
pub use proxy::{ProfileServiceProxy, ServiceProxy};

use crate::api::{ConfigManager, ConfigSnapshot, ProfileService, Service, ServiceManager, SkinData};
use crate::bootstrap::{Bootstrap, LeaderFactory};
use crate::contract::ids;
use crate::error::{BridgeError, BridgeResult, InvokeError};
use crate::realm::Realm;
use crate::reflect::ObjectRef;
use crate::resolver::{load_descriptor, read_accessor, HandleCache};
use crate::value::{OwnerRef, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// What a follower needs to reach (or re-elect) the leader.
pub struct LeaderLink {
    bootstrap: Bootstrap,
    owner: OwnerRef,
    factory: Arc<dyn LeaderFactory>,
    verbose: bool,
}

impl LeaderLink {
    pub(crate) fn new(
        bootstrap: Bootstrap,
        owner: OwnerRef,
        factory: Arc<dyn LeaderFactory>,
        verbose: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            bootstrap,
            owner,
            factory,
            verbose,
        })
    }

    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    pub fn realm(&self) -> &Arc<Realm> {
        self.bootstrap.realm()
    }

    pub(crate) fn bootstrap(&self) -> &Bootstrap {
        &self.bootstrap
    }

    pub fn ensure_leader(&self) -> BridgeResult<ObjectRef> {
        self.bootstrap
            .ensure_leader(&self.owner, &self.factory, self.verbose)
    }
}

/// Where a dispatcher sends its calls.
pub(crate) enum Target {
    /// The published leader, re-read before every call.
    Leader(Arc<LeaderLink>),
    /// An object the leader hands out through a zero-argument accessor,
    /// re-fetched from the current leader before every call.
    LeaderAccessor {
        link: Arc<LeaderLink>,
        stable_id: &'static str,
    },
    /// One raw object, e.g. a service returned by the leader.
    Fixed(ObjectRef),
}

/// Forwards calls by stable id with the retry-once policy.
pub(crate) struct Dispatcher {
    target: Target,
    handles: HandleCache,
}

impl Dispatcher {
    pub(crate) fn new(target: Target) -> Self {
        Self {
            target,
            handles: HandleCache::new(),
        }
    }

    pub(crate) fn fixed(target: ObjectRef) -> Self {
        Self::new(Target::Fixed(target))
    }

    pub(crate) fn clear(&self) {
        self.handles.clear();
    }

    fn acquire(&self) -> BridgeResult<ObjectRef> {
        match &self.target {
            Target::Fixed(object) => Ok(object.clone()),
            Target::Leader(link) => link.ensure_leader(),
            Target::LeaderAccessor { link, stable_id } => {
                let leader = link.ensure_leader()?;
                if *stable_id == ids::library::SERVICE_MANAGER {
                    if let Some(manager) = link.bootstrap().cached_service_manager(&leader) {
                        return Ok(manager);
                    }
                }
                let descriptor = load_descriptor(stable_id)?;
                let handle = self.handles.get_or_resolve(leader.class(), descriptor)?;
                handle
                    .invoke(&leader, &[])
                    .and_then(Value::into_object)
                    .map_err(|source| BridgeError::Invocation {
                        stable_id: stable_id.to_string(),
                        source,
                    })
            }
        }
    }

    /// Forward `stable_id` and return the raw result.
    pub(crate) fn call(&self, stable_id: &'static str, args: &[Value]) -> BridgeResult<Value> {
        let descriptor = load_descriptor(stable_id)?;

        let target = self.acquire()?;
        let handle = self.handles.get_or_resolve(target.class(), descriptor)?;
        let first = match handle.invoke(&target, args) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        debug!(
            stable_id,
            class = target.class().name(),
            error = %first,
            "Bridged call failed, retrying against a fresh target"
        );
        self.handles.invalidate(stable_id);
        let target = self.acquire()?;
        let handle = self.handles.get_or_resolve(target.class(), descriptor)?;
        handle
            .invoke(&target, args)
            .map_err(|source| BridgeError::Invocation {
                stable_id: stable_id.to_string(),
                source,
            })
    }

    /// Forward `stable_id` and adapt the result with `adapt`.
    pub(crate) fn call_as<T>(
        &self,
        stable_id: &'static str,
        args: &[Value],
        adapt: impl FnOnce(Value) -> Result<T, InvokeError>,
    ) -> BridgeResult<T> {
        let value = self.call(stable_id, args)?;
        adapt(value).map_err(|source| BridgeError::Adaptation {
            stable_id: stable_id.to_string(),
            source,
        })
    }
}

fn local(realm: &Realm, raw: &ObjectRef) -> bool {
    raw.class().realm() == realm.id()
}

/// `raw` as a local service: itself if it is from this realm, otherwise a
/// forwarding proxy.
pub fn adapt_service(realm: &Arc<Realm>, raw: ObjectRef) -> Arc<dyn Service> {
    if local(realm, &raw) {
        if let Some(service) = raw.clone().into_service() {
            return service;
        }
    }
    ServiceProxy::new(realm, raw)
}

pub fn adapt_profile_service(realm: &Arc<Realm>, raw: ObjectRef) -> Arc<dyn ProfileService> {
    if local(realm, &raw) {
        if let Some(service) = raw.clone().into_profile_service() {
            return service;
        }
    }
    ProfileServiceProxy::new(realm, raw)
}

pub fn adapt_service_manager(realm: &Arc<Realm>, raw: ObjectRef) -> Arc<dyn ServiceManager> {
    if local(realm, &raw) {
        if let Some(manager) = raw.clone().into_service_manager() {
            return manager;
        }
    }
    BridgedServiceManager::new(realm.clone(), Dispatcher::fixed(raw))
}

pub fn adapt_config_manager(realm: &Arc<Realm>, raw: ObjectRef) -> Arc<dyn ConfigManager> {
    if local(realm, &raw) {
        if let Some(manager) = raw.clone().into_config_manager() {
            return manager;
        }
    }
    BridgedConfigManager::new(realm.clone(), Dispatcher::fixed(raw))
}

fn adapt_services(realm: &Arc<Realm>, value: Value) -> Result<Vec<Arc<dyn Service>>, InvokeError> {
    value
        .into_list()?
        .into_iter()
        .map(|item| item.into_object().map(|raw| adapt_service(realm, raw)))
        .collect()
}

fn adapt_optional_service(
    realm: &Arc<Realm>,
    value: Value,
) -> Result<Option<Arc<dyn Service>>, InvokeError> {
    Ok(value
        .into_optional_object()?
        .map(|raw| adapt_service(realm, raw)))
}

/// Rebuild a [`SkinData`] from a raw object of any realm.
pub fn copy_skin(raw: &ObjectRef) -> Result<SkinData, InvokeError> {
    Ok(SkinData {
        value: read_accessor(raw, "value")?.into_text()?,
        signature: read_accessor(raw, "signature")?.into_optional_text()?,
    })
}

/// Rebuild a [`ConfigSnapshot`] from a raw object of any realm.
pub fn copy_config(raw: &ObjectRef) -> Result<ConfigSnapshot, InvokeError> {
    let values = read_accessor(raw, "values")?
        .into_map()?
        .into_iter()
        .map(|(key, value)| value.into_text().map(|value| (key, value)))
        .collect::<Result<_, _>>()?;

    Ok(ConfigSnapshot {
        file_name: read_accessor(raw, "file_name")?.into_text()?,
        path: read_accessor(raw, "path")?
            .into_optional_text()?
            .map(PathBuf::from),
        values,
    })
}
