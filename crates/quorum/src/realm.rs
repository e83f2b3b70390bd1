//! Realms: independently loaded copies of the library.

use crate::anchor::{Anchor, ProcessStore, PropertyStore};
use crate::error::StoreError;
use crate::reflect::RealmId;
use crate::settings::Settings;
use crate::value::TypeRef;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// One loaded copy of the library: its identity, its packaged settings and
/// the process-wide store it meets other copies in.
pub struct Realm {
    id: RealmId,
    settings: Settings,
    store: Arc<dyn PropertyStore>,
}

impl Realm {
    pub fn new(settings: Settings, store: Arc<dyn PropertyStore>) -> Arc<Self> {
        Arc::new(Self {
            id: RealmId::new(),
            settings,
            store,
        })
    }

    /// The realm of this copy, with packaged settings and the process store.
    /// Settings are read once, on first use.
    pub fn local() -> Arc<Realm> {
        static LOCAL: OnceLock<Arc<Realm>> = OnceLock::new();
        LOCAL
            .get_or_init(|| Realm::new(Settings::packaged(), ProcessStore::global()))
            .clone()
    }

    pub fn id(&self) -> RealmId {
        self.id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn protocol_version(&self) -> u32 {
        self.settings.protocol_version
    }

    /// Open the shared anchor through this realm's store.
    pub fn anchor(&self) -> Result<Anchor, StoreError> {
        Anchor::open(self.store.as_ref())
    }

    /// A type as named by this realm.
    pub fn type_ref(&self, name: &str) -> TypeRef {
        TypeRef::new(self.id, name)
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("id", &self.id)
            .field("protocol_version", &self.settings.protocol_version)
            .finish_non_exhaustive()
    }
}
