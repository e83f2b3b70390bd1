//! Method tables and call dispatch for the bridged traits.
//!
//! Real implementations and forwarding proxies describe themselves with the
//! same tables, so both resolve the same stable ids and a proxy can be
//! handed across the bridge again. Method and parameter names here are the
//! erased names the contract generator derives from `src/api`.

use crate::api::{
    interfaces, ConfigManager, ConfigSnapshot, LibraryApi, ProfileService, Service,
    ServiceManager, SkinData,
};
use crate::bridge;
use crate::error::{BridgeResult, InvokeError};
use crate::realm::Realm;
use crate::reflect::{Call, ClassInfo, MethodInfo, ObjectRef, RealmId, Reflect};
use crate::value::{PendingValue, Value};
use futures::future::BoxFuture;
use std::sync::Arc;

pub(crate) fn service_methods() -> Vec<MethodInfo> {
    vec![
        MethodInfo::new("service_name", &[], "String"),
        MethodInfo::new("bound_owner", &[], "Option"),
        MethodInfo::new("executor", &[], "Option"),
        MethodInfo::new("configuration", &[], "Option"),
    ]
}

pub(crate) fn library_methods() -> Vec<MethodInfo> {
    vec![
        MethodInfo::new("profile_service", &["OwnerRef"], "ProfileService"),
        MethodInfo::new("service_manager", &[], "ServiceManager"),
        MethodInfo::new("config_manager", &[], "ConfigManager"),
        MethodInfo::new("shutdown", &[], "()"),
    ]
}

pub(crate) fn service_manager_methods() -> Vec<MethodInfo> {
    vec![
        MethodInfo::new("all_services", &[], "Vec"),
        MethodInfo::new("services_by_type", &["TypeRef"], "Vec"),
        MethodInfo::new("service", &["str"], "Option"),
        MethodInfo::new("owner_bound_services", &["OwnerRef"], "Vec"),
        MethodInfo::new("register_service", &["Service"], "()"),
        MethodInfo::new("has_registered_service", &["OwnerRef", "TypeRef"], "bool"),
        MethodInfo::new("service_for_owner", &["OwnerRef", "TypeRef"], "Option"),
    ]
}

pub(crate) fn config_manager_methods() -> Vec<MethodInfo> {
    vec![MethodInfo::new(
        "create_config",
        &["OwnerRef", "str"],
        "ConfigSnapshot",
    )]
}

pub(crate) fn profile_service_methods() -> Vec<MethodInfo> {
    vec![
        MethodInfo::new("name_of", &["Uuid"], "BoxFuture"),
        MethodInfo::new("id_of", &["str"], "BoxFuture"),
        MethodInfo::new("skin_of", &["Uuid"], "BoxFuture"),
    ]
}

pub(crate) fn library_class(name: &str, realm: RealmId) -> ClassInfo {
    ClassInfo::new(name, realm)
        .implementing(interfaces::LIBRARY_API)
        .implementing(interfaces::SERVICE)
        .with_methods(library_methods())
        .with_methods(service_methods())
}

pub(crate) fn service_manager_class(name: &str, realm: RealmId) -> ClassInfo {
    ClassInfo::new(name, realm)
        .implementing(interfaces::SERVICE_MANAGER)
        .with_methods(service_manager_methods())
}

pub(crate) fn config_manager_class(name: &str, realm: RealmId) -> ClassInfo {
    ClassInfo::new(name, realm)
        .implementing(interfaces::CONFIG_MANAGER)
        .with_methods(config_manager_methods())
}

pub(crate) fn profile_service_class(name: &str, realm: RealmId) -> ClassInfo {
    ClassInfo::new(name, realm)
        .implementing(interfaces::PROFILE_SERVICE)
        .implementing(interfaces::SERVICE)
        .implementing(interfaces::OWNER_BOUND)
        .implementing(interfaces::ASYNC)
        .with_methods(profile_service_methods())
        .with_methods(service_methods())
}

/// Class of a plain service. Extra interfaces are added after `Service`.
pub fn service_class(name: &str, realm: RealmId, extra: &[&str]) -> ClassInfo {
    extra
        .iter()
        .fold(
            ClassInfo::new(name, realm).implementing(interfaces::SERVICE),
            |class, interface| class.implementing(interface),
        )
        .with_methods(service_methods())
}

fn object(object: ObjectRef) -> Value {
    Value::Object(object)
}

fn service_value(service: Arc<dyn Service>) -> Value {
    let object: ObjectRef = service;
    Value::Object(object)
}

fn service_list(services: Vec<Arc<dyn Service>>) -> Value {
    Value::List(services.into_iter().map(service_value).collect())
}

fn pending<T, F>(future: BoxFuture<'static, BridgeResult<T>>, wrap: F) -> Value
where
    T: Send + 'static,
    F: FnOnce(T) -> Value + Send + 'static,
{
    Value::Pending(PendingValue::new(async move {
        future.await.map(wrap).map_err(InvokeError::from)
    }))
}

/// Serve the [`Service`] methods. `Ok(None)` means the call is not one of
/// them.
pub fn dispatch_service(target: &dyn Service, call: &Call<'_>) -> Result<Option<Value>, InvokeError> {
    let realm = target.class().realm();
    let value = match call.name() {
        "service_name" => Value::Text(target.service_name()?),
        "bound_owner" => Value::from_option(target.bound_owner()?, Value::Owner),
        "executor" => Value::from_option(target.executor()?, Value::Executor),
        "configuration" => {
            Value::from_option(target.configuration()?, |config| config_object(config, realm))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(crate) fn dispatch_library(
    target: &dyn LibraryApi,
    call: &Call<'_>,
) -> Result<Option<Value>, InvokeError> {
    let value = match call.name() {
        "profile_service" => {
            let service: ObjectRef = target.profile_service(call.owner(0)?)?;
            object(service)
        }
        "service_manager" => {
            let manager: ObjectRef = target.service_manager()?;
            object(manager)
        }
        "config_manager" => {
            let manager: ObjectRef = target.config_manager()?;
            object(manager)
        }
        "shutdown" => {
            target.shutdown()?;
            Value::Unit
        }
        _ => return dispatch_service(target, call),
    };
    Ok(Some(value))
}

/// `realm` adapts incoming service arguments for `register_service`.
pub(crate) fn dispatch_service_manager(
    target: &dyn ServiceManager,
    realm: &Arc<Realm>,
    call: &Call<'_>,
) -> Result<Option<Value>, InvokeError> {
    let value = match call.name() {
        "all_services" => service_list(target.all_services()?),
        "services_by_type" => service_list(target.services_by_type(call.type_ref(0)?)?),
        "service" => Value::from_option(target.service(call.text(0)?)?, service_value),
        "owner_bound_services" => service_list(target.owner_bound_services(call.owner(0)?)?),
        "register_service" => {
            let service = bridge::adapt_service(realm, call.object(0)?.clone());
            target.register_service(service)?;
            Value::Unit
        }
        "has_registered_service" => {
            Value::Bool(target.has_registered_service(call.owner(0)?, call.type_ref(1)?)?)
        }
        "service_for_owner" => Value::from_option(
            target.service_for_owner(call.owner(0)?, call.type_ref(1)?)?,
            service_value,
        ),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(crate) fn dispatch_config_manager(
    target: &dyn ConfigManager,
    call: &Call<'_>,
) -> Result<Option<Value>, InvokeError> {
    match call.name() {
        "create_config" => {
            let config = target.create_config(call.owner(0)?, call.text(1)?)?;
            Ok(Some(config_object(config, target.class().realm())))
        }
        _ => Ok(None),
    }
}

pub(crate) fn dispatch_profile_service(
    target: &dyn ProfileService,
    call: &Call<'_>,
) -> Result<Option<Value>, InvokeError> {
    let realm = target.class().realm();
    let value = match call.name() {
        "name_of" => pending(target.name_of(call.uuid(0)?), |name| {
            Value::from_option(name, Value::Text)
        }),
        "id_of" => pending(target.id_of(call.text(0)?), |id| {
            Value::from_option(id, Value::Uuid)
        }),
        "skin_of" => pending(target.skin_of(call.uuid(0)?), move |skin| {
            Value::from_option(skin, |skin| skin_object(skin, realm))
        }),
        _ => return dispatch_service(target, call),
    };
    Ok(Some(value))
}

/// [`SkinData`] as seen from another realm: two accessors.
struct SkinObject {
    class: ClassInfo,
    skin: SkinData,
}

impl Reflect for SkinObject {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        match call.name() {
            "value" => Ok(Value::Text(self.skin.value.clone())),
            "signature" => Ok(Value::from_option(self.skin.signature.clone(), Value::Text)),
            _ => Err(call.unsupported(&self.class)),
        }
    }
}

pub(crate) fn skin_object(skin: SkinData, realm: RealmId) -> Value {
    let class = ClassInfo::new("SkinData", realm).with_methods([
        MethodInfo::new("value", &[], "String"),
        MethodInfo::new("signature", &[], "Option"),
    ]);
    object(Arc::new(SkinObject { class, skin }))
}

/// [`ConfigSnapshot`] as seen from another realm.
struct ConfigObject {
    class: ClassInfo,
    config: ConfigSnapshot,
}

impl Reflect for ConfigObject {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        match call.name() {
            "file_name" => Ok(Value::Text(self.config.file_name.clone())),
            "path" => Ok(Value::from_option(self.config.path.as_ref(), |path| {
                Value::Text(path.display().to_string())
            })),
            "values" => Ok(Value::Map(
                self.config
                    .values
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::Text(value.clone())))
                    .collect(),
            )),
            _ => Err(call.unsupported(&self.class)),
        }
    }
}

pub(crate) fn config_object(config: ConfigSnapshot, realm: RealmId) -> Value {
    let class = ClassInfo::new("ConfigSnapshot", realm).with_methods([
        MethodInfo::new("file_name", &[], "String"),
        MethodInfo::new("path", &[], "Option"),
        MethodInfo::new("values", &[], "BTreeMap"),
    ]);
    object(Arc::new(ConfigObject { class, config }))
}
