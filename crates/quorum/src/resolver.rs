//! Stable-id method resolution.
//!
//! A [`CallHandle`] is the slot of the first method on a class whose name
//! and erased parameter type names equal a descriptor's. Resolution is a
//! pure function of (class, descriptor), so handles may be cached and
//! recomputed freely.

use crate::contract::{self, MethodDescriptor};
use crate::error::{BridgeError, BridgeResult, InvokeError};
use crate::reflect::{ClassInfo, ObjectRef, RealmId};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// Descriptor for `stable_id` from this realm's contract.
pub fn load_descriptor(stable_id: &str) -> BridgeResult<&'static MethodDescriptor> {
    contract::lookup(stable_id).ok_or_else(|| BridgeError::UnknownContractId(stable_id.to_string()))
}

/// A resolved method slot, bound to the class it was resolved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle {
    slot: usize,
    arity: usize,
    class_name: String,
    realm: RealmId,
}

impl CallHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Whether this handle is valid for `class`.
    pub fn binds(&self, class: &ClassInfo) -> bool {
        self.class_name == class.name() && self.realm == class.realm()
    }

    /// Invoke on `target`, which must be of the class this handle was
    /// resolved on.
    pub fn invoke(&self, target: &ObjectRef, args: &[Value]) -> Result<Value, InvokeError> {
        let class = target.class();
        if !self.binds(class) {
            return Err(InvokeError::ClassMismatch {
                expected: self.class_name.clone(),
                found: class.name().to_string(),
            });
        }
        if args.len() != self.arity {
            return Err(InvokeError::Arity {
                method: format!("{}#{}", self.class_name, self.slot),
                expected: self.arity,
                found: args.len(),
            });
        }
        target.invoke(self.slot, args)
    }
}

/// Find the method of `class` matching `descriptor`.
pub fn resolve(class: &ClassInfo, descriptor: &MethodDescriptor) -> BridgeResult<CallHandle> {
    class
        .methods()
        .iter()
        .position(|method| {
            method.matches(descriptor.declaring_name, descriptor.parameter_type_names)
        })
        .map(|slot| CallHandle {
            slot,
            arity: descriptor.arity(),
            class_name: class.name().to_string(),
            realm: class.realm(),
        })
        .ok_or_else(|| BridgeError::MethodNotFound {
            stable_id: descriptor.stable_id.to_string(),
            signature: descriptor.signature(),
            class: class.name().to_string(),
        })
}

/// Find a zero-argument accessor called `name`.
pub fn resolve_accessor(class: &ClassInfo, name: &str) -> BridgeResult<CallHandle> {
    class
        .methods()
        .iter()
        .position(|method| method.matches::<&str>(name, &[]))
        .map(|slot| CallHandle {
            slot,
            arity: 0,
            class_name: class.name().to_string(),
            realm: class.realm(),
        })
        .ok_or_else(|| BridgeError::MethodNotFound {
            stable_id: format!("accessor:{name}"),
            signature: format!("{name}()"),
            class: class.name().to_string(),
        })
}

/// Read one field of a plain-data object through its accessor.
pub fn read_accessor(target: &ObjectRef, name: &str) -> Result<Value, InvokeError> {
    resolve_accessor(target.class(), name)?.invoke(target, &[])
}

/// Memoized handles keyed by stable id.
///
/// A cached handle is only reused for the class it was resolved on; any
/// other class, such as a re-elected leader from another realm, resolves
/// afresh.
#[derive(Debug, Default)]
pub struct HandleCache {
    handles: RwLock<HashMap<String, CallHandle>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_resolve(
        &self,
        class: &ClassInfo,
        descriptor: &MethodDescriptor,
    ) -> BridgeResult<CallHandle> {
        if let Some(handle) = self.handles.read().get(descriptor.stable_id) {
            if handle.binds(class) {
                return Ok(handle.clone());
            }
        }

        trace!(stable_id = descriptor.stable_id, class = class.name(), "Resolving call handle");
        let handle = resolve(class, descriptor)?;
        self.handles
            .write()
            .insert(descriptor.stable_id.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn invalidate(&self, stable_id: &str) {
        self.handles.write().remove(stable_id);
    }

    pub fn clear(&self) {
        self.handles.write().clear();
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ids, METHODS};
    use crate::reflect::{MethodInfo, Reflect};
    use std::sync::Arc;

    struct Echo {
        class: ClassInfo,
    }

    impl Reflect for Echo {
        fn class(&self) -> &ClassInfo {
            &self.class
        }

        fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
            match (slot, args) {
                (0, []) => Ok(Value::from("echo")),
                (1, [Value::Text(name)]) => Ok(Value::Text(name.clone())),
                _ => Ok(Value::Null),
            }
        }
    }

    fn echo_class(realm: RealmId) -> ClassInfo {
        ClassInfo::new("Echo", realm).with_methods([
            MethodInfo::new("service_name", &[], "String"),
            MethodInfo::new("service", &["str"], "Option"),
            MethodInfo::new("service", &["str"], "Option"),
        ])
    }

    #[test]
    fn test_load_descriptor() {
        let descriptor = load_descriptor(ids::service_manager::SERVICE__STR).unwrap();
        assert_eq!(descriptor.declaring_name, "service");
        assert_eq!(descriptor.parameter_type_names, ["str"]);

        assert!(matches!(
            load_descriptor("service_manager#nope()"),
            Err(BridgeError::UnknownContractId(_))
        ));
    }

    #[test]
    fn test_contract_is_sorted_and_unique() {
        let keys: Vec<(&str, &str)> = METHODS.iter().map(|m| (m.namespace, m.stable_id)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup_by(|a, b| a.1 == b.1);
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_resolve_first_structural_match() {
        let class = echo_class(RealmId::new());
        let descriptor = load_descriptor(ids::service_manager::SERVICE__STR).unwrap();

        let handle = resolve(&class, descriptor).unwrap();
        assert_eq!(handle.slot(), 1);
        assert_eq!(handle.arity(), 1);
        assert_eq!(handle, resolve(&class, descriptor).unwrap());
    }

    #[test]
    fn test_resolve_miss_names_id_and_class() {
        let class = echo_class(RealmId::new());
        let descriptor = load_descriptor(ids::library::SHUTDOWN).unwrap();
        let err = resolve(&class, descriptor).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot resolve 'LIB_API_SHUTDOWN' (shutdown()) on Echo"
        );
    }

    #[test]
    fn test_handle_is_bound_to_its_class() {
        let realm = RealmId::new();
        let echo: ObjectRef = Arc::new(Echo {
            class: echo_class(realm),
        });
        let other: ObjectRef = Arc::new(Echo {
            class: echo_class(RealmId::new()),
        });
        let descriptor = load_descriptor(ids::service_manager::SERVICE__STR).unwrap();
        let handle = resolve(echo.class(), descriptor).unwrap();

        let value = handle.invoke(&echo, &[Value::from("Svc")]).unwrap();
        assert_eq!(value.into_text().unwrap(), "Svc");
        assert!(matches!(
            handle.invoke(&other, &[Value::from("Svc")]),
            Err(InvokeError::ClassMismatch { .. })
        ));
        assert!(matches!(
            handle.invoke(&echo, &[]),
            Err(InvokeError::Arity { .. })
        ));
    }

    #[test]
    fn test_accessors() {
        let echo: ObjectRef = Arc::new(Echo {
            class: echo_class(RealmId::new()),
        });
        assert_eq!(read_accessor(&echo, "service_name").unwrap().into_text().unwrap(), "echo");
        assert!(read_accessor(&echo, "missing").is_err());
    }

    #[test]
    fn test_cache_reresolves_for_other_class() {
        let cache = HandleCache::new();
        let descriptor = load_descriptor(ids::service_manager::SERVICE__STR).unwrap();
        let first = echo_class(RealmId::new());
        let second = echo_class(RealmId::new());

        let a = cache.get_or_resolve(&first, descriptor).unwrap();
        assert_eq!(cache.get_or_resolve(&first, descriptor).unwrap(), a);
        let b = cache.get_or_resolve(&second, descriptor).unwrap();
        assert!(b.binds(&second));
        assert!(!b.binds(&first));
        assert_eq!(cache.len(), 1);

        cache.invalidate(descriptor.stable_id);
        assert!(cache.is_empty());
    }
}
