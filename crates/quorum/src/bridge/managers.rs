use super::{adapt_optional_service, adapt_services, copy_config, Dispatcher};
use crate::api::{ConfigManager, ConfigSnapshot, Service, ServiceManager};
use crate::contract::ids;
use crate::error::{BridgeResult, InvokeError};
use crate::realm::Realm;
use crate::reflect::{Call, ClassInfo, ObjectRef, Reflect};
use crate::skeleton;
use crate::value::{OwnerRef, TypeRef, Value};
use std::sync::Arc;

/// A leader-side [`ServiceManager`] seen from another realm.
pub struct BridgedServiceManager {
    class: ClassInfo,
    realm: Arc<Realm>,
    calls: Dispatcher,
}

impl BridgedServiceManager {
    pub(crate) fn new(realm: Arc<Realm>, calls: Dispatcher) -> Arc<Self> {
        Arc::new(Self {
            class: skeleton::service_manager_class("BridgedServiceManager", realm.id()),
            realm,
            calls,
        })
    }
}

impl ServiceManager for BridgedServiceManager {
    fn all_services(&self) -> BridgeResult<Vec<Arc<dyn Service>>> {
        self.calls.call_as(ids::service_manager::ALL_SERVICES, &[], |value| {
            adapt_services(&self.realm, value)
        })
    }

    fn services_by_type(&self, service_type: &TypeRef) -> BridgeResult<Vec<Arc<dyn Service>>> {
        self.calls.call_as(
            ids::service_manager::SERVICES_BY_TYPE__TYPEREF,
            &[Value::Type(service_type.clone())],
            |value| adapt_services(&self.realm, value),
        )
    }

    fn service(&self, name: &str) -> BridgeResult<Option<Arc<dyn Service>>> {
        self.calls.call_as(
            ids::service_manager::SERVICE__STR,
            &[Value::from(name)],
            |value| adapt_optional_service(&self.realm, value),
        )
    }

    fn owner_bound_services(&self, owner: &OwnerRef) -> BridgeResult<Vec<Arc<dyn Service>>> {
        self.calls.call_as(
            ids::service_manager::OWNER_BOUND_SERVICES__OWNERREF,
            &[Value::Owner(owner.clone())],
            |value| adapt_services(&self.realm, value),
        )
    }

    fn register_service(&self, service: Arc<dyn Service>) -> BridgeResult<()> {
        let service: ObjectRef = service;
        self.calls.call_as(
            ids::service_manager::REGISTER_SERVICE__SERVICE,
            &[Value::Object(service)],
            Value::into_unit,
        )
    }

    fn has_registered_service(&self, owner: &OwnerRef, service_type: &TypeRef) -> BridgeResult<bool> {
        self.calls.call_as(
            ids::service_manager::HAS_REGISTERED_SERVICE__OWNERREF__TYPEREF,
            &[Value::Owner(owner.clone()), Value::Type(service_type.clone())],
            Value::into_bool,
        )
    }

    fn service_for_owner(
        &self,
        owner: &OwnerRef,
        service_type: &TypeRef,
    ) -> BridgeResult<Option<Arc<dyn Service>>> {
        self.calls.call_as(
            ids::service_manager::SERVICE_FOR_OWNER__OWNERREF__TYPEREF,
            &[Value::Owner(owner.clone()), Value::Type(service_type.clone())],
            |value| adapt_optional_service(&self.realm, value),
        )
    }
}

impl Reflect for BridgedServiceManager {
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

/// A leader-side [`ConfigManager`] seen from another realm.
pub struct BridgedConfigManager {
    class: ClassInfo,
    calls: Dispatcher,
}

impl BridgedConfigManager {
    pub(crate) fn new(realm: Arc<Realm>, calls: Dispatcher) -> Arc<Self> {
        Arc::new(Self {
            class: skeleton::config_manager_class("BridgedConfigManager", realm.id()),
            calls,
        })
    }
}

impl ConfigManager for BridgedConfigManager {
    fn create_config(&self, owner: &OwnerRef, file_name: &str) -> BridgeResult<ConfigSnapshot> {
        self.calls.call_as(
            ids::config_manager::CREATE_CONFIG__OWNERREF__STR,
            &[Value::Owner(owner.clone()), Value::from(file_name)],
            |value| copy_config(&value.into_object()?),
        )
    }
}

impl Reflect for BridgedConfigManager {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        skeleton::dispatch_config_manager(self, &call)?.ok_or_else(|| call.unsupported(&self.class))
    }

    fn into_config_manager(self: Arc<Self>) -> Option<Arc<dyn ConfigManager>> {
        Some(self)
    }
}
