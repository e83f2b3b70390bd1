use crate::api::{interfaces, Service, ServiceManager};
use crate::error::{BridgeError, BridgeResult, InvokeError};
use crate::realm::Realm;
use crate::reflect::{Call, ClassInfo, Reflect};
use crate::skeleton;
use crate::value::{OwnerId, OwnerRef, TypeRef, Value};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Registry {
    all: Vec<Arc<dyn Service>>,
    by_owner: HashMap<OwnerId, Vec<Arc<dyn Service>>>,
    keys: HashSet<String>,
}

/// The leader's service registry.
///
/// Owner-bound services are de-duplicated by a string key made of the owner
/// name, the lowercased service name and the implementation class name, so a
/// reloaded copy of the same service is still recognised.
pub struct ServiceManagerImpl {
    class: ClassInfo,
    realm: Arc<Realm>,
    registry: RwLock<Registry>,
}

impl ServiceManagerImpl {
    pub fn new(realm: Arc<Realm>) -> Arc<Self> {
        Arc::new(Self {
            class: skeleton::service_manager_class("ServiceManagerImpl", realm.id()),
            realm,
            registry: RwLock::new(Registry::default()),
        })
    }

    pub fn len(&self) -> usize {
        self.registry.read().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn owner_services(&self, owner: &OwnerRef) -> Vec<Arc<dyn Service>> {
        self.registry
            .read()
            .by_owner
            .get(&owner.id())
            .cloned()
            .unwrap_or_default()
    }
}

/// Display name for keys and errors; falls back to the short class name.
fn display_name(service: &Arc<dyn Service>) -> String {
    match service.service_name() {
        Ok(name) if !name.trim().is_empty() => name,
        _ => {
            let class = service.class().name();
            class.rsplit("::").next().unwrap_or(class).to_string()
        }
    }
}

fn registration_key(owner: &OwnerRef, name: &str, service: &Arc<dyn Service>) -> String {
    format!(
        "{}|{}|{}",
        owner.name(),
        name.to_lowercase(),
        service.class().name()
    )
}

/// Type check that treats a cross-realm check as a non-match.
fn is_instance(service_type: &TypeRef, service: &Arc<dyn Service>) -> bool {
    match service_type.is_instance(service.class()) {
        Ok(matches) => matches,
        Err(err) => {
            trace!(error = %err, "Type check across realms, treating as non-match");
            false
        }
    }
}

/// Case-insensitive name match, folded the same way as registration keys.
fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn same_service(a: &Arc<dyn Service>, b: &Arc<dyn Service>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl ServiceManager for ServiceManagerImpl {
    fn all_services(&self) -> BridgeResult<Vec<Arc<dyn Service>>> {
        Ok(self.registry.read().all.clone())
    }

    fn services_by_type(&self, service_type: &TypeRef) -> BridgeResult<Vec<Arc<dyn Service>>> {
        let services = self.registry.read().all.clone();
        Ok(services
            .into_iter()
            .filter(|service| is_instance(service_type, service))
            .collect())
    }

    fn service(&self, name: &str) -> BridgeResult<Option<Arc<dyn Service>>> {
        let services = self.registry.read().all.clone();
        Ok(services.into_iter().find(|service| match service.service_name() {
            Ok(candidate) => same_name(&candidate, name),
            Err(err) => {
                debug!(error = %err, "Service name lookup failed, skipping");
                false
            }
        }))
    }

    fn owner_bound_services(&self, owner: &OwnerRef) -> BridgeResult<Vec<Arc<dyn Service>>> {
        Ok(self.owner_services(owner))
    }

    fn register_service(&self, service: Arc<dyn Service>) -> BridgeResult<()> {
        let owner = service.bound_owner()?;
        let name = display_name(&service);
        let key = owner
            .as_ref()
            .map(|owner| registration_key(owner, &name, &service));

        let mut registry = self.registry.write();
        if let (Some(owner), Some(key)) = (&owner, key) {
            if !registry.keys.insert(key) {
                return Err(BridgeError::DuplicateRegistration {
                    owner: owner.name().to_string(),
                    service: name,
                });
            }
            registry
                .by_owner
                .entry(owner.id())
                .or_default()
                .push(service.clone());
        }

        if !registry.all.iter().any(|known| same_service(known, &service)) {
            registry.all.push(service);
        }
        debug!(
            service = %name,
            owner = owner.as_ref().map(OwnerRef::name).unwrap_or("-"),
            total = registry.all.len(),
            "Service registered"
        );
        Ok(())
    }

    fn has_registered_service(&self, owner: &OwnerRef, service_type: &TypeRef) -> BridgeResult<bool> {
        Ok(self
            .owner_services(owner)
            .iter()
            .any(|service| is_instance(service_type, service)))
    }

    fn service_for_owner(
        &self,
        owner: &OwnerRef,
        service_type: &TypeRef,
    ) -> BridgeResult<Option<Arc<dyn Service>>> {
        Ok(self
            .owner_services(owner)
            .into_iter()
            .find(|service| is_instance(service_type, service)))
    }
}

impl Reflect for ServiceManagerImpl {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        skeleton::dispatch_service_manager(self, &self.realm, &call)?
            .ok_or_else(|| call.unsupported(&self.class))
    }

    fn into_service_manager(self: Arc<Self>) -> Option<Arc<dyn ServiceManager>> {
        Some(self)
    }
}

/// Owner-bound services of `owner` whose class implements `interface`,
/// matched by owner name. Finds services registered under an owner handle
/// that has since been replaced, e.g. after a plugin reload.
pub(crate) fn find_by_owner_name(
    manager: &dyn ServiceManager,
    owner: &OwnerRef,
    interface: &str,
) -> BridgeResult<Option<Arc<dyn Service>>> {
    Ok(manager.all_services()?.into_iter().find(|service| {
        service.class().implements(interface)
            && service.class().implements(interfaces::OWNER_BOUND)
            && matches!(service.bound_owner(), Ok(Some(bound)) if same_name(bound.name(), owner.name()))
    }))
}
