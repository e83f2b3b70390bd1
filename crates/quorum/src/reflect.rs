//! Structural reflection.
//!
//! Objects that cross between realms are only ever seen through
//! [`Reflect`]: a class description made of plain names, and invocation by
//! method slot with [`Value`] arguments. Nothing here compares type
//! identities; two realms agree on a method when its name and erased
//! parameter type names agree.

use crate::api::{ConfigManager, ProfileService, Service, ServiceManager};
use crate::error::InvokeError;
use crate::value::{OwnerRef, TypeRef, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one loaded copy of the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(Uuid);

impl RealmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RealmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A public method of a class: name plus erased parameter and return names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    name: String,
    params: Vec<String>,
    returns: String,
}

impl MethodInfo {
    pub fn new(name: &str, params: &[&str], returns: &str) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            returns: returns.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn returns(&self) -> &str {
        &self.returns
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether this method has `name` and exactly these erased parameters.
    pub fn matches<S: AsRef<str>>(&self, name: &str, params: &[S]) -> bool {
        self.name == name
            && self.params.len() == params.len()
            && self
                .params
                .iter()
                .zip(params)
                .all(|(own, other)| own == other.as_ref())
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.params.join(","), self.returns)
    }
}

/// Runtime description of a concrete class in one realm.
///
/// Methods are listed in slot order; a slot is the index used by
/// [`Reflect::invoke`].
#[derive(Debug, Clone)]
pub struct ClassInfo {
    name: String,
    realm: RealmId,
    interfaces: Vec<String>,
    methods: Vec<MethodInfo>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>, realm: RealmId) -> Self {
        Self {
            name: name.into(),
            realm,
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Add an implemented interface name.
    pub fn implementing(mut self, interface: &str) -> Self {
        if !self.implements(interface) {
            self.interfaces.push(interface.to_string());
        }
        self
    }

    /// Append methods after the existing slots.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = MethodInfo>) -> Self {
        self.methods.extend(methods);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn realm(&self) -> RealmId {
        self.realm
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn method(&self, slot: usize) -> Option<&MethodInfo> {
        self.methods.get(slot)
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    /// Whether `other` describes the same class: same name, same realm.
    pub fn same_class(&self, other: &ClassInfo) -> bool {
        self.name == other.name && self.realm == other.realm
    }
}

/// An object that can be called structurally from another realm.
///
/// The `into_*` conversions are the same-realm fast path: an object that
/// already implements the local trait hands itself out directly instead of
/// being wrapped in a forwarding proxy.
pub trait Reflect: Send + Sync {
    fn class(&self) -> &ClassInfo;

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError>;

    fn into_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        None
    }

    fn into_profile_service(self: Arc<Self>) -> Option<Arc<dyn ProfileService>> {
        None
    }

    fn into_service_manager(self: Arc<Self>) -> Option<Arc<dyn ServiceManager>> {
        None
    }

    fn into_config_manager(self: Arc<Self>) -> Option<Arc<dyn ConfigManager>> {
        None
    }
}

/// Shared handle to a reflectable object, possibly from another realm.
pub type ObjectRef = Arc<dyn Reflect>;

/// Whether two handles point at the same object.
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Short identity fingerprint for logs, `@<hex address>`.
pub fn fingerprint(object: &ObjectRef) -> String {
    format!("@{:x}", Arc::as_ptr(object) as *const () as usize)
}

/// One incoming call: the selected method and its arguments.
///
/// Construction checks the slot and the argument count; the typed
/// accessors check argument shapes.
pub struct Call<'a> {
    method: &'a MethodInfo,
    args: &'a [Value],
}

impl<'a> Call<'a> {
    pub fn new(class: &'a ClassInfo, slot: usize, args: &'a [Value]) -> Result<Self, InvokeError> {
        let method = class.method(slot).ok_or_else(|| InvokeError::NoSuchSlot {
            class: class.name().to_string(),
            slot,
        })?;
        if method.arity() != args.len() {
            return Err(InvokeError::Arity {
                method: method.to_string(),
                expected: method.arity(),
                found: args.len(),
            });
        }
        Ok(Self { method, args })
    }

    pub fn name(&self) -> &str {
        self.method.name()
    }

    pub fn method(&self) -> &MethodInfo {
        self.method
    }

    fn arg(&self, index: usize) -> Result<&'a Value, InvokeError> {
        self.args.get(index).ok_or(InvokeError::UnexpectedValue {
            expected: "argument",
            found: "nothing",
        })
    }

    pub fn text(&self, index: usize) -> Result<&'a str, InvokeError> {
        match self.arg(index)? {
            Value::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn uuid(&self, index: usize) -> Result<Uuid, InvokeError> {
        match self.arg(index)? {
            Value::Uuid(id) => Ok(*id),
            other => Err(other.mismatch("uuid")),
        }
    }

    pub fn owner(&self, index: usize) -> Result<&'a OwnerRef, InvokeError> {
        match self.arg(index)? {
            Value::Owner(owner) => Ok(owner),
            other => Err(other.mismatch("owner")),
        }
    }

    pub fn type_ref(&self, index: usize) -> Result<&'a TypeRef, InvokeError> {
        match self.arg(index)? {
            Value::Type(type_ref) => Ok(type_ref),
            other => Err(other.mismatch("type")),
        }
    }

    pub fn object(&self, index: usize) -> Result<&'a ObjectRef, InvokeError> {
        match self.arg(index)? {
            Value::Object(object) => Ok(object),
            other => Err(other.mismatch("object")),
        }
    }

    /// Error for a method this dispatcher does not serve.
    pub fn unsupported(&self, class: &ClassInfo) -> InvokeError {
        InvokeError::Raised {
            kind: "Unsupported".to_string(),
            message: format!("{} does not implement {}", class.name(), self.method),
        }
    }
}
