use super::{copy_config, copy_skin, Dispatcher};
use crate::api::{interfaces, ConfigSnapshot, ProfileService, Service, SkinData};
use crate::contract::ids;
use crate::error::{BridgeError, BridgeResult, InvokeError};
use crate::realm::Realm;
use crate::reflect::{Call, ClassInfo, ObjectRef, Reflect};
use crate::skeleton;
use crate::value::{OwnerRef, Value};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Copy the name and interfaces of a foreign class onto a local one.
fn mirror(base: ClassInfo, target: &ClassInfo) -> ClassInfo {
    target
        .interfaces()
        .iter()
        .fold(base, |class, interface| class.implementing(interface))
}

fn service_name(calls: &Dispatcher) -> BridgeResult<String> {
    calls.call_as(ids::service::SERVICE_NAME, &[], Value::into_text)
}

fn bound_owner(calls: &Dispatcher) -> BridgeResult<Option<OwnerRef>> {
    calls.call_as(ids::service::BOUND_OWNER, &[], Value::into_optional_owner)
}

fn executor(calls: &Dispatcher) -> BridgeResult<Option<Handle>> {
    calls.call_as(ids::service::EXECUTOR, &[], Value::into_optional_executor)
}

fn configuration(calls: &Dispatcher) -> BridgeResult<Option<ConfigSnapshot>> {
    calls.call_as(ids::service::CONFIGURATION, &[], |value| {
        value
            .into_optional_object()?
            .map(|raw| copy_config(&raw))
            .transpose()
    })
}

/// A service from another realm behind the local [`Service`] trait.
///
/// The proxy reports the target's class name and interfaces, so registry
/// keys and type checks see the service it stands for.
pub struct ServiceProxy {
    class: ClassInfo,
    realm: Arc<Realm>,
    target: ObjectRef,
    calls: Dispatcher,
}

impl ServiceProxy {
    pub fn new(realm: &Arc<Realm>, target: ObjectRef) -> Arc<Self> {
        let class = mirror(
            skeleton::service_class(target.class().name(), realm.id(), &[]),
            target.class(),
        );
        Arc::new(Self {
            class,
            realm: realm.clone(),
            calls: Dispatcher::fixed(target.clone()),
            target,
        })
    }

    /// The raw object calls are forwarded to.
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }
}

impl Service for ServiceProxy {
    fn service_name(&self) -> BridgeResult<String> {
        service_name(&self.calls)
    }

    fn bound_owner(&self) -> BridgeResult<Option<OwnerRef>> {
        bound_owner(&self.calls)
    }

    fn executor(&self) -> BridgeResult<Option<Handle>> {
        executor(&self.calls)
    }

    fn configuration(&self) -> BridgeResult<Option<ConfigSnapshot>> {
        configuration(&self.calls)
    }
}

impl Reflect for ServiceProxy {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        skeleton::dispatch_service(self, &call)?.ok_or_else(|| call.unsupported(&self.class))
    }

    fn into_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }

    fn into_profile_service(self: Arc<Self>) -> Option<Arc<dyn ProfileService>> {
        if self.target.class().implements(interfaces::PROFILE_SERVICE) {
            Some(ProfileServiceProxy::new(&self.realm, self.target.clone()))
        } else {
            None
        }
    }
}

/// A profile service from another realm.
///
/// Lookups return the leader's pending result adapted on completion, so
/// they still run on the leader's worker pool.
pub struct ProfileServiceProxy {
    class: ClassInfo,
    calls: Dispatcher,
}

impl ProfileServiceProxy {
    pub fn new(realm: &Arc<Realm>, target: ObjectRef) -> Arc<Self> {
        let class = mirror(
            skeleton::profile_service_class(target.class().name(), realm.id()),
            target.class(),
        );
        Arc::new(Self {
            class,
            calls: Dispatcher::fixed(target),
        })
    }

    fn forward<T: Send + 'static>(
        &self,
        stable_id: &'static str,
        args: Vec<Value>,
        adapt: fn(Value) -> Result<T, InvokeError>,
    ) -> BoxFuture<'static, BridgeResult<T>> {
        let pending = self.calls.call_as(stable_id, &args, Value::into_pending);
        async move {
            let value = pending?
                .into_future()
                .await
                .map_err(|source| BridgeError::Invocation {
                    stable_id: stable_id.to_string(),
                    source,
                })?;
            adapt(value).map_err(|source| BridgeError::Adaptation {
                stable_id: stable_id.to_string(),
                source,
            })
        }
        .boxed()
    }
}

impl Service for ProfileServiceProxy {
    fn service_name(&self) -> BridgeResult<String> {
        service_name(&self.calls)
    }

    fn bound_owner(&self) -> BridgeResult<Option<OwnerRef>> {
        bound_owner(&self.calls)
    }

    fn executor(&self) -> BridgeResult<Option<Handle>> {
        executor(&self.calls)
    }

    fn configuration(&self) -> BridgeResult<Option<ConfigSnapshot>> {
        configuration(&self.calls)
    }
}

impl ProfileService for ProfileServiceProxy {
    fn name_of(&self, id: Uuid) -> BoxFuture<'static, BridgeResult<Option<String>>> {
        self.forward(
            ids::profile_service::NAME_OF__UUID,
            vec![Value::Uuid(id)],
            Value::into_optional_text,
        )
    }

    fn id_of(&self, name: &str) -> BoxFuture<'static, BridgeResult<Option<Uuid>>> {
        self.forward(
            ids::profile_service::ID_OF__STR,
            vec![Value::from(name)],
            Value::into_optional_uuid,
        )
    }

    fn skin_of(&self, id: Uuid) -> BoxFuture<'static, BridgeResult<Option<SkinData>>> {
        self.forward(ids::profile_service::SKIN_OF__UUID, vec![Value::Uuid(id)], |value| {
            value
                .into_optional_object()?
                .map(|raw| copy_skin(&raw))
                .transpose()
        })
    }
}

impl Reflect for ProfileServiceProxy {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        skeleton::dispatch_profile_service(self, &call)?.ok_or_else(|| call.unsupported(&self.class))
    }

    fn into_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }

    fn into_profile_service(self: Arc<Self>) -> Option<Arc<dyn ProfileService>> {
        Some(self)
    }
}
