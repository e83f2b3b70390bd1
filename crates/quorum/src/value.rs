//! Values that cross the bridge.
//!
//! Plain data is carried by value. Services and other behaviour-bearing
//! objects are carried as [`ObjectRef`]s and adapted by the receiving side.
//! Owners and type references are carried as-is: their identity is what
//! the other realm needs.

use crate::error::{InvokeError, LinkageError};
use crate::reflect::{ClassInfo, ObjectRef, RealmId};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// A consuming context, e.g. one plugin of the host.
pub trait Owner: Send + Sync {
    /// Stable display name.
    fn name(&self) -> &str;

    /// Directory for the owner's configuration files, if it has one.
    fn data_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// Simple owner with a name and an optional data directory.
#[derive(Debug, Clone)]
pub struct NamedOwner {
    name: String,
    data_dir: Option<PathBuf>,
}

impl NamedOwner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_dir: None,
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}

impl Owner for NamedOwner {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone()
    }
}

/// Identity of an owner allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(usize);

/// Shared owner handle. Equality and hashing follow the allocation, not the
/// name.
#[derive(Clone)]
pub struct OwnerRef(Arc<dyn Owner>);

impl OwnerRef {
    pub fn new(owner: impl Owner + 'static) -> Self {
        Self(Arc::new(owner))
    }

    pub fn from_arc(owner: Arc<dyn Owner>) -> Self {
        Self(owner)
    }

    /// Owner with just a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(NamedOwner::new(name))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.0.data_dir()
    }

    pub fn id(&self) -> OwnerId {
        OwnerId(Arc::as_ptr(&self.0) as *const () as usize)
    }
}

impl PartialEq for OwnerRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for OwnerRef {}

impl Hash for OwnerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerRef({}@{:x})", self.name(), self.id().0)
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type as named in one realm.
///
/// Checking it against a class from another realm is a linkage error: the
/// realm that owns the type cannot see the other realm's definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    realm: RealmId,
    name: String,
}

impl TypeRef {
    pub fn new(realm: RealmId, name: impl Into<String>) -> Self {
        Self {
            realm,
            name: name.into(),
        }
    }

    pub fn realm(&self) -> RealmId {
        self.realm
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether instances of `class` are assignable to this type.
    pub fn is_instance(&self, class: &ClassInfo) -> Result<bool, LinkageError> {
        if class.realm() != self.realm {
            return Err(LinkageError {
                type_name: self.name.clone(),
                type_realm: self.realm,
                class_name: class.name().to_string(),
                class_realm: class.realm(),
            });
        }
        Ok(class.name() == self.name || class.implements(&self.name))
    }
}

/// A deferred result; resolves on the realm that produced it.
pub struct PendingValue(BoxFuture<'static, Result<Value, InvokeError>>);

impl PendingValue {
    pub fn new(future: impl Future<Output = Result<Value, InvokeError>> + Send + 'static) -> Self {
        Self(Box::pin(future))
    }

    pub fn into_future(self) -> BoxFuture<'static, Result<Value, InvokeError>> {
        self.0
    }
}

impl fmt::Debug for PendingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingValue(..)")
    }
}

/// Argument or result of a reflective call.
pub enum Value {
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    Text(String),
    Uuid(Uuid),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Owner(OwnerRef),
    Type(TypeRef),
    Executor(tokio::runtime::Handle),
    Object(ObjectRef),
    Pending(PendingValue),
}

impl Value {
    /// Short shape name used in errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Owner(_) => "owner",
            Value::Type(_) => "type",
            Value::Executor(_) => "executor",
            Value::Object(_) => "object",
            Value::Pending(_) => "pending",
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> InvokeError {
        InvokeError::UnexpectedValue {
            expected,
            found: self.kind(),
        }
    }

    pub fn from_option<T>(value: Option<T>, wrap: impl FnOnce(T) -> Value) -> Value {
        value.map_or(Value::Null, wrap)
    }

    pub fn into_unit(self) -> Result<(), InvokeError> {
        match self {
            Value::Unit | Value::Null => Ok(()),
            other => Err(other.mismatch("unit")),
        }
    }

    pub fn into_bool(self) -> Result<bool, InvokeError> {
        match self {
            Value::Bool(value) => Ok(value),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_text(self) -> Result<String, InvokeError> {
        match self {
            Value::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_optional_text(self) -> Result<Option<String>, InvokeError> {
        match self {
            Value::Null => Ok(None),
            other => other.into_text().map(Some),
        }
    }

    pub fn into_optional_uuid(self) -> Result<Option<Uuid>, InvokeError> {
        match self {
            Value::Null => Ok(None),
            Value::Uuid(id) => Ok(Some(id)),
            other => Err(other.mismatch("uuid")),
        }
    }

    pub fn into_optional_owner(self) -> Result<Option<OwnerRef>, InvokeError> {
        match self {
            Value::Null => Ok(None),
            Value::Owner(owner) => Ok(Some(owner)),
            other => Err(other.mismatch("owner")),
        }
    }

    pub fn into_optional_executor(self) -> Result<Option<tokio::runtime::Handle>, InvokeError> {
        match self {
            Value::Null => Ok(None),
            Value::Executor(handle) => Ok(Some(handle)),
            other => Err(other.mismatch("executor")),
        }
    }

    pub fn into_object(self) -> Result<ObjectRef, InvokeError> {
        match self {
            Value::Object(object) => Ok(object),
            other => Err(other.mismatch("object")),
        }
    }

    pub fn into_optional_object(self) -> Result<Option<ObjectRef>, InvokeError> {
        match self {
            Value::Null => Ok(None),
            other => other.into_object().map(Some),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>, InvokeError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn into_map(self) -> Result<BTreeMap<String, Value>, InvokeError> {
        match self {
            Value::Map(entries) => Ok(entries),
            other => Err(other.mismatch("map")),
        }
    }

    pub fn into_pending(self) -> Result<PendingValue, InvokeError> {
        match self {
            Value::Pending(pending) => Ok(pending),
            other => Err(other.mismatch("pending")),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Unit => f.write_str("Unit"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Int(value) => write!(f, "Int({value})"),
            Value::Text(text) => write!(f, "Text({text:?})"),
            Value::Uuid(id) => write!(f, "Uuid({id})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Value::Owner(owner) => write!(f, "Owner({owner:?})"),
            Value::Type(type_ref) => write!(f, "Type({})", type_ref.name()),
            Value::Executor(_) => f.write_str("Executor(..)"),
            Value::Object(object) => write!(f, "Object({})", object.class().name()),
            Value::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<OwnerRef> for Value {
    fn from(owner: OwnerRef) -> Self {
        Value::Owner(owner)
    }
}

impl From<TypeRef> for Value {
    fn from(type_ref: TypeRef) -> Self {
        Value::Type(type_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_identity_is_the_allocation() {
        let a = OwnerRef::named("PluginA");
        let same = a.clone();
        let twin = OwnerRef::named("PluginA");

        assert_eq!(a, same);
        assert_ne!(a, twin);
        assert_eq!(a.name(), twin.name());
        assert_eq!(a.to_string(), "PluginA");
    }

    #[test]
    fn test_named_owner_data_dir() {
        let owner = OwnerRef::new(NamedOwner::new("PluginA").with_data_dir("/tmp/plugin-a"));
        assert_eq!(owner.data_dir(), Some(PathBuf::from("/tmp/plugin-a")));
        assert!(OwnerRef::named("PluginB").data_dir().is_none());
    }

    #[test]
    fn test_type_ref_across_realms_is_a_linkage_error() {
        let here = RealmId::new();
        let there = RealmId::new();
        let class = ClassInfo::new("MojangService", here).implementing("ProfileService");

        assert_eq!(TypeRef::new(here, "ProfileService").is_instance(&class), Ok(true));
        assert_eq!(TypeRef::new(here, "MojangService").is_instance(&class), Ok(true));
        assert_eq!(TypeRef::new(here, "ConfigManager").is_instance(&class), Ok(false));
        assert!(TypeRef::new(there, "ProfileService").is_instance(&class).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from("x").into_text().unwrap(), "x");
        assert_eq!(Value::Null.into_optional_text().unwrap(), None);
        assert!(Value::Bool(true).into_text().is_err());
        assert_eq!(
            Value::Int(1).into_bool().unwrap_err(),
            InvokeError::UnexpectedValue {
                expected: "bool",
                found: "int"
            }
        );
        assert!(Value::Unit.into_unit().is_ok());
        assert_eq!(Value::from_option(Some(true), Value::Bool).into_bool(), Ok(true));
    }

    #[tokio::test]
    async fn test_pending_value_resolves() {
        let pending = PendingValue::new(async { Ok(Value::from("done")) });
        let value = pending.into_future().await.unwrap();
        assert_eq!(value.into_text().unwrap(), "done");
    }
}
