//! The process-wide rendezvous.
//!
//! Every realm reaches the same [`Anchor`] through a [`PropertyStore`]
//! entry that no single realm owns. The anchor holds the published leader,
//! its metadata, the follower registry and the election lock. This module is
//! the only code that touches the raw store entry.
//!
//! The lock entry is created once and survives [`Anchor::clear_all`].

use crate::bootstrap::LeaderFactory;
use crate::error::StoreError;
use crate::reflect::{same_object, ObjectRef, Reflect};
use crate::value::{OwnerId, OwnerRef};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// Store key of the anchor entry.
pub const ANCHOR_KEY: &str = "quorum.anchor.v1";

/// Anchor entry keys.
pub mod keys {
    pub const LEADER: &str = "quorum.leader";
    pub const PROTOCOL: &str = "quorum.protocol";
    pub const LEADER_OWNER: &str = "quorum.leaderOwner";
    pub const LEADER_OWNER_REF: &str = "quorum.leaderOwnerRef";
    pub const LEADER_CLASS: &str = "quorum.leaderClass";
    pub const LEADER_SERVICE_MANAGER: &str = "quorum.leaderServiceManager";
    pub const PROVIDER_FACTORY: &str = "quorum.providerFactory";
    pub const FOLLOWERS: &str = "quorum.followers";
    pub const LOCK: &str = "quorum.lock";

    /// Fields that identify the published leader.
    pub const LEADER_FIELDS: &[&str] = &[
        LEADER,
        LEADER_SERVICE_MANAGER,
        LEADER_OWNER,
        LEADER_OWNER_REF,
        LEADER_CLASS,
        PROTOCOL,
    ];
}

/// Value stored in the process-wide store.
pub type StoredValue = Arc<dyn Any + Send + Sync>;

/// Process-wide key-value store reachable from every realm.
///
/// Hosts that reload plugin images supply a store that outlives them.
pub trait PropertyStore: Send + Sync {
    /// Atomically replace the value under `key` with `update(current)` and
    /// return the new value.
    fn compute(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<StoredValue>) -> StoredValue,
    ) -> Result<StoredValue, StoreError>;

    fn remove(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;
}

/// In-process [`PropertyStore`].
#[derive(Default)]
pub struct ProcessStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl ProcessStore {
    /// A private store, e.g. for an isolated test process.
    pub fn new() -> Self {
        Self::default()
    }

    /// The store shared by everything in this process.
    pub fn global() -> Arc<ProcessStore> {
        static GLOBAL: OnceLock<Arc<ProcessStore>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ProcessStore::new())).clone()
    }

    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: StoredValue) {
        self.entries.lock().insert(key.to_string(), value);
    }
}

impl PropertyStore for ProcessStore {
    fn compute(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<StoredValue>) -> StoredValue,
    ) -> Result<StoredValue, StoreError> {
        let mut entries = self.entries.lock();
        let next = update(entries.get(key).cloned());
        entries.insert(key.to_string(), next.clone());
        Ok(next)
    }

    fn remove(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.entries.lock().remove(key))
    }
}

/// One anchor entry.
#[derive(Clone)]
pub enum AnchorValue {
    Object(ObjectRef),
    Int(i64),
    Text(String),
    Owner(OwnerRef),
    Factory(Arc<dyn LeaderFactory>),
    Followers(Arc<FollowerRegistry>),
    Lock(Arc<ReentrantMutex<()>>),
}

impl fmt::Debug for AnchorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorValue::Object(object) => write!(f, "Object({})", object.class().name()),
            AnchorValue::Int(value) => write!(f, "Int({value})"),
            AnchorValue::Text(text) => write!(f, "Text({text:?})"),
            AnchorValue::Owner(owner) => write!(f, "Owner({owner:?})"),
            AnchorValue::Factory(_) => f.write_str("Factory(..)"),
            AnchorValue::Followers(followers) => write!(f, "Followers({})", followers.len()),
            AnchorValue::Lock(_) => f.write_str("Lock"),
        }
    }
}

/// Plain map shape an older or foreign participant may have left in the
/// store. Its entries are copied into a fresh [`AnchorMap`].
pub type PlainAnchorMap = HashMap<String, AnchorValue>;

/// Concurrent anchor container.
#[derive(Default)]
pub struct AnchorMap {
    entries: RwLock<HashMap<String, AnchorValue>>,
}

impl AnchorMap {
    fn from_plain(plain: &PlainAnchorMap) -> Self {
        Self {
            entries: RwLock::new(plain.clone()),
        }
    }

    fn lock_handle(&self) -> Arc<ReentrantMutex<()>> {
        if let Some(AnchorValue::Lock(lock)) = self.entries.read().get(keys::LOCK) {
            return lock.clone();
        }
        let mut entries = self.entries.write();
        match entries.get(keys::LOCK) {
            Some(AnchorValue::Lock(lock)) => lock.clone(),
            _ => {
                let lock = Arc::new(ReentrantMutex::new(()));
                entries.insert(keys::LOCK.to_string(), AnchorValue::Lock(lock.clone()));
                lock
            }
        }
    }
}

/// Handle to the shared anchor.
#[derive(Clone)]
pub struct Anchor {
    map: Arc<AnchorMap>,
    lock: Arc<ReentrantMutex<()>>,
}

impl Anchor {
    /// Reach the anchor in `store`, creating it on first use.
    pub fn open(store: &dyn PropertyStore) -> Result<Self, StoreError> {
        let stored = store.compute(ANCHOR_KEY, &mut |existing| {
            let map = match existing.map(|value| value.downcast::<AnchorMap>()) {
                Some(Ok(map)) => map,
                Some(Err(foreign)) => match foreign.downcast_ref::<PlainAnchorMap>() {
                    Some(plain) => {
                        debug!(entries = plain.len(), "Migrating plain anchor map");
                        Arc::new(AnchorMap::from_plain(plain))
                    }
                    None => {
                        debug!("Replacing foreign value under the anchor key");
                        Arc::new(AnchorMap::default())
                    }
                },
                None => Arc::new(AnchorMap::default()),
            };
            map.lock_handle();
            let stored: StoredValue = map;
            stored
        })?;

        let map = stored
            .downcast::<AnchorMap>()
            .map_err(|_| StoreError::Unavailable("anchor entry has a foreign shape".to_string()))?;
        let lock = map.lock_handle();
        Ok(Self { map, lock })
    }

    /// Whether both handles reach the same anchor.
    pub fn same_anchor(&self, other: &Anchor) -> bool {
        Arc::ptr_eq(&self.map, &other.map)
    }

    /// Take the election lock. Reentrant.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    pub fn get(&self, key: &str) -> Option<AnchorValue> {
        self.map.entries.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: AnchorValue) {
        self.map.entries.write().insert(key.to_string(), value);
    }

    /// Insert unless present; returns the value now stored.
    pub fn set_if_absent(&self, key: &str, value: AnchorValue) -> AnchorValue {
        self.map
            .entries
            .write()
            .entry(key.to_string())
            .or_insert(value)
            .clone()
    }

    pub fn remove(&self, key: &str) -> Option<AnchorValue> {
        self.map.entries.write().remove(key)
    }

    /// Entry keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn leader(&self) -> Option<ObjectRef> {
        match self.get(keys::LEADER) {
            Some(AnchorValue::Object(leader)) => Some(leader),
            _ => None,
        }
    }

    /// Whether `object` is the published leader.
    pub fn is_leader(&self, object: &ObjectRef) -> bool {
        self.leader()
            .is_some_and(|leader| same_object(&leader, object))
    }

    pub fn protocol(&self) -> Option<i64> {
        match self.get(keys::PROTOCOL) {
            Some(AnchorValue::Int(protocol)) => Some(protocol),
            _ => None,
        }
    }

    pub fn leader_owner_name(&self) -> Option<String> {
        match self.get(keys::LEADER_OWNER) {
            Some(AnchorValue::Text(name)) => Some(name),
            _ => None,
        }
    }

    pub fn leader_owner(&self) -> Option<OwnerRef> {
        match self.get(keys::LEADER_OWNER_REF) {
            Some(AnchorValue::Owner(owner)) => Some(owner),
            _ => None,
        }
    }

    pub fn leader_class(&self) -> Option<String> {
        match self.get(keys::LEADER_CLASS) {
            Some(AnchorValue::Text(name)) => Some(name),
            _ => None,
        }
    }

    pub fn leader_service_manager(&self) -> Option<ObjectRef> {
        match self.get(keys::LEADER_SERVICE_MANAGER) {
            Some(AnchorValue::Object(manager)) => Some(manager),
            _ => None,
        }
    }

    pub fn provider_factory(&self) -> Option<Arc<dyn LeaderFactory>> {
        match self.get(keys::PROVIDER_FACTORY) {
            Some(AnchorValue::Factory(factory)) => Some(factory),
            _ => None,
        }
    }

    /// The follower registry, created on first use.
    pub fn followers(&self) -> Arc<FollowerRegistry> {
        let fresh = AnchorValue::Followers(Arc::new(FollowerRegistry::default()));
        match self.set_if_absent(keys::FOLLOWERS, fresh) {
            AnchorValue::Followers(followers) => followers,
            _ => {
                let followers = Arc::new(FollowerRegistry::default());
                self.set(keys::FOLLOWERS, AnchorValue::Followers(followers.clone()));
                followers
            }
        }
    }

    /// Remove the leader-identifying fields; followers stay registered.
    pub fn clear_leader(&self) {
        let mut entries = self.map.entries.write();
        for key in keys::LEADER_FIELDS {
            entries.remove(*key);
        }
    }

    /// Remove every entry except the lock.
    pub fn clear_all(&self) {
        self.map
            .entries
            .write()
            .retain(|key, _| key.as_str() == keys::LOCK);
    }
}

struct FollowerEntry {
    owner: OwnerRef,
    bridge: Weak<dyn Reflect>,
}

/// Followers keyed by owner identity, holding their bridges weakly.
///
/// Entries whose bridge has been dropped count as absent and are pruned on
/// read.
#[derive(Default)]
pub struct FollowerRegistry {
    entries: Mutex<HashMap<OwnerId, FollowerEntry>>,
}

impl FollowerRegistry {
    pub fn register(&self, owner: &OwnerRef, bridge: &ObjectRef) {
        self.entries.lock().insert(
            owner.id(),
            FollowerEntry {
                owner: owner.clone(),
                bridge: Arc::downgrade(bridge),
            },
        );
    }

    /// Returns whether a live entry was removed.
    pub fn unregister(&self, owner: &OwnerRef) -> bool {
        self.entries
            .lock()
            .remove(&owner.id())
            .is_some_and(|entry| entry.bridge.strong_count() > 0)
    }

    /// Owners with a live bridge.
    pub fn owners(&self) -> Vec<OwnerRef> {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.bridge.strong_count() > 0);
        let mut owners: Vec<OwnerRef> = entries.values().map(|entry| entry.owner.clone()).collect();
        owners.sort_by(|a, b| a.name().cmp(b.name()));
        owners
    }

    pub fn contains(&self, owner: &OwnerRef) -> bool {
        self.owners().contains(owner)
    }

    /// Number of live followers.
    pub fn len(&self) -> usize {
        self.owners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvokeError;
    use crate::reflect::{ClassInfo, RealmId};
    use crate::value::Value;

    struct Stub {
        class: ClassInfo,
    }

    impl Reflect for Stub {
        fn class(&self) -> &ClassInfo {
            &self.class
        }

        fn invoke(&self, _slot: usize, _args: &[Value]) -> Result<Value, InvokeError> {
            Ok(Value::Unit)
        }
    }

    fn stub() -> ObjectRef {
        Arc::new(Stub {
            class: ClassInfo::new("Stub", RealmId::new()),
        })
    }

    struct FailingStore;

    impl PropertyStore for FailingStore {
        fn compute(
            &self,
            _key: &str,
            _update: &mut dyn FnMut(Option<StoredValue>) -> StoredValue,
        ) -> Result<StoredValue, StoreError> {
            Err(StoreError::Unavailable("denied".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<Option<StoredValue>, StoreError> {
            Err(StoreError::Unavailable("denied".to_string()))
        }
    }

    #[test]
    fn test_open_is_shared_and_creates_lock() {
        let store = ProcessStore::new();
        let a = Anchor::open(&store).unwrap();
        let b = Anchor::open(&store).unwrap();

        assert!(a.same_anchor(&b));
        assert!(Arc::ptr_eq(&a.lock, &b.lock));
        assert_eq!(a.keys(), vec![keys::LOCK.to_string()]);
    }

    #[test]
    fn test_lock_is_reentrant() {
        let store = ProcessStore::new();
        let anchor = Anchor::open(&store).unwrap();
        let _outer = anchor.lock();
        let _inner = anchor.lock();
    }

    #[test]
    fn test_plain_map_is_migrated() {
        let store = ProcessStore::new();
        let mut plain = PlainAnchorMap::new();
        plain.insert(keys::PROTOCOL.to_string(), AnchorValue::Int(4));
        store.insert(ANCHOR_KEY, Arc::new(plain));

        let anchor = Anchor::open(&store).unwrap();
        assert_eq!(anchor.protocol(), Some(4));
        assert!(anchor.get(keys::LOCK).is_some());
        assert!(store.get(ANCHOR_KEY).unwrap().downcast::<AnchorMap>().is_ok());
    }

    #[test]
    fn test_foreign_value_is_replaced() {
        let store = ProcessStore::new();
        store.insert(ANCHOR_KEY, Arc::new("not an anchor".to_string()));

        let anchor = Anchor::open(&store).unwrap();
        assert_eq!(anchor.keys(), vec![keys::LOCK.to_string()]);
    }

    #[test]
    fn test_unreachable_store() {
        assert!(Anchor::open(&FailingStore).is_err());
    }

    #[test]
    fn test_clear_leader_and_clear_all() {
        let store = ProcessStore::new();
        let anchor = Anchor::open(&store).unwrap();
        let leader = stub();

        anchor.set(keys::LEADER, AnchorValue::Object(leader.clone()));
        anchor.set(keys::PROTOCOL, AnchorValue::Int(1));
        anchor.set(keys::LEADER_OWNER, AnchorValue::Text("PluginA".to_string()));
        let followers = anchor.followers();
        assert!(anchor.is_leader(&leader));

        anchor.clear_leader();
        assert!(anchor.leader().is_none());
        assert!(anchor.protocol().is_none());
        assert!(Arc::ptr_eq(&followers, &anchor.followers()));

        let lock_before = anchor.lock.clone();
        anchor.clear_all();
        assert_eq!(anchor.keys(), vec![keys::LOCK.to_string()]);
        assert!(Arc::ptr_eq(&lock_before, &Anchor::open(&store).unwrap().lock));
    }

    #[test]
    fn test_followers_are_weak() {
        let registry = FollowerRegistry::default();
        let kept_owner = OwnerRef::named("Kept");
        let dropped_owner = OwnerRef::named("Dropped");

        let kept = stub();
        registry.register(&kept_owner, &kept);
        {
            let dropped = stub();
            registry.register(&dropped_owner, &dropped);
            assert_eq!(registry.len(), 2);
        }

        assert_eq!(registry.owners(), vec![kept_owner.clone()]);
        assert!(!registry.contains(&dropped_owner));
        assert!(registry.unregister(&kept_owner));
        assert!(registry.is_empty());
    }
}
