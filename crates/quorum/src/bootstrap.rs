//! Leader election.
//!
//! The first realm to initialise publishes a leader in the anchor; later
//! realms with the same protocol version become followers that forward
//! every call to it. A realm with a different protocol version never
//! bridges: it runs its own isolated leader.

use crate::anchor::{keys, Anchor, AnchorValue};
use crate::api::LibraryApi;
use crate::bridge::{BridgedApi, LeaderLink};
use crate::error::BridgeResult;
use crate::logging::BootstrapLogger;
use crate::realm::Realm;
use crate::reflect::{fingerprint, ObjectRef};
use crate::value::OwnerRef;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How an instance obtained from the entry point relates to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns the shared runtime and is published in the anchor.
    Leader,
    /// Forwards to the published leader.
    Follower,
    /// Owns a private runtime and is not published.
    Isolated,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => write!(f, "leader"),
            Role::Follower => write!(f, "follower"),
            Role::Isolated => write!(f, "isolated"),
        }
    }
}

/// Builds a leader in the calling realm.
pub trait LeaderFactory: Send + Sync {
    fn create_leader(&self, realm: &Arc<Realm>, owner: &OwnerRef) -> BridgeResult<Arc<dyn LibraryApi>>;
}

impl<F> LeaderFactory for F
where
    F: Fn(&Arc<Realm>, &OwnerRef) -> BridgeResult<Arc<dyn LibraryApi>> + Send + Sync,
{
    fn create_leader(&self, realm: &Arc<Realm>, owner: &OwnerRef) -> BridgeResult<Arc<dyn LibraryApi>> {
        self(realm, owner)
    }
}

/// Anchor contents as seen by one realm, for host diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorSnapshot {
    pub leader_owner: Option<String>,
    pub leader_class: Option<String>,
    pub protocol: Option<i64>,
    pub leader_fingerprint: Option<String>,
    pub has_service_manager: bool,
    pub followers: Vec<String>,
}

/// Election entry points for one realm.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    realm: Arc<Realm>,
}

impl Bootstrap {
    pub fn new(realm: Arc<Realm>) -> Self {
        Self { realm }
    }

    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }

    fn local_protocol(&self) -> i64 {
        i64::from(self.realm.protocol_version())
    }

    /// Become the leader, a follower of the published leader, or an
    /// isolated leader when the published one speaks another protocol or
    /// the anchor cannot be reached.
    pub fn init(
        &self,
        owner: &OwnerRef,
        factory: Arc<dyn LeaderFactory>,
        verbose: bool,
    ) -> BridgeResult<Arc<dyn LibraryApi>> {
        let log = BootstrapLogger::new(verbose, owner.name());

        let anchor = match self.realm.anchor() {
            Ok(anchor) => anchor,
            Err(err) => {
                log.warn(format_args!("Anchor unavailable ({err}). Falling back to isolated mode."));
                return factory.create_leader(&self.realm, owner);
            }
        };

        let _guard = anchor.lock();
        anchor.set_if_absent(keys::PROVIDER_FACTORY, AnchorValue::Factory(factory.clone()));

        let local = self.local_protocol();
        if let Some(leader) = anchor.leader() {
            let published = anchor.protocol().unwrap_or(-1);
            if published != local {
                log.warn(format_args!(
                    "Protocol mismatch (leader={published}, local={local}). Falling back to isolated mode."
                ));
                return factory.create_leader(&self.realm, owner);
            }

            let bridge = BridgedApi::new(LeaderLink::new(self.clone(), owner.clone(), factory, verbose));
            let registered: ObjectRef = bridge.clone();
            let followers = anchor.followers();
            followers.register(owner, &registered);

            log.info(format_args!(
                "Connected as follower. leader_owner={} leader={} protocol={local} followers={}",
                anchor.leader_owner_name().as_deref().unwrap_or("<unknown>"),
                fingerprint(&leader),
                followers.len()
            ));
            return Ok(bridge);
        }

        let leader = factory.create_leader(&self.realm, owner)?;
        let published = self.publish_leader_state(&anchor, owner, &leader, &factory);
        log.info(format_args!(
            "Elected as leader. leader={} protocol={local}",
            fingerprint(&published)
        ));
        Ok(leader)
    }

    /// The published leader if it is compatible, otherwise a new leader
    /// elected in this realm for `caller`.
    pub fn ensure_leader(
        &self,
        caller: &OwnerRef,
        factory: &Arc<dyn LeaderFactory>,
        verbose: bool,
    ) -> BridgeResult<ObjectRef> {
        let anchor = self.realm.anchor()?;
        let _guard = anchor.lock();

        if let Some(leader) = anchor.leader() {
            if anchor.protocol() == Some(self.local_protocol()) {
                return Ok(leader);
            }
        }

        BootstrapLogger::new(verbose, caller.name()).warn(format_args!(
            "No compatible leader found. Electing a new leader in the caller's realm."
        ));
        let leader = factory.create_leader(&self.realm, caller)?;
        Ok(self.publish_leader_state(&anchor, caller, &leader, factory))
    }

    /// Write every leader field. Callers hold the anchor lock.
    fn publish_leader_state(
        &self,
        anchor: &Anchor,
        owner: &OwnerRef,
        leader: &Arc<dyn LibraryApi>,
        factory: &Arc<dyn LeaderFactory>,
    ) -> ObjectRef {
        let object: ObjectRef = leader.clone();
        anchor.set(keys::LEADER, AnchorValue::Object(object.clone()));
        anchor.set(keys::PROTOCOL, AnchorValue::Int(self.local_protocol()));
        anchor.set(keys::LEADER_OWNER, AnchorValue::Text(owner.name().to_string()));
        anchor.set(keys::LEADER_OWNER_REF, AnchorValue::Owner(owner.clone()));
        anchor.set(keys::LEADER_CLASS, AnchorValue::Text(object.class().name().to_string()));
        anchor.set(keys::PROVIDER_FACTORY, AnchorValue::Factory(factory.clone()));

        match leader.service_manager() {
            Ok(manager) => {
                let manager: ObjectRef = manager;
                anchor.set(keys::LEADER_SERVICE_MANAGER, AnchorValue::Object(manager));
            }
            Err(err) => {
                anchor.remove(keys::LEADER_SERVICE_MANAGER);
                debug!(error = %err, "Leader service manager not cached");
            }
        }
        object
    }

    /// The service manager cached for `leader`, if `leader` is still the
    /// published one.
    pub(crate) fn cached_service_manager(&self, leader: &ObjectRef) -> Option<ObjectRef> {
        let anchor = self.realm.anchor().ok()?;
        let _guard = anchor.lock();
        if anchor.is_leader(leader) {
            anchor.leader_service_manager()
        } else {
            None
        }
    }

    /// Remove `owner`'s follower entry. Returns whether one was live.
    pub(crate) fn detach_follower(&self, owner: &OwnerRef) -> BridgeResult<bool> {
        let anchor = self.realm.anchor()?;
        let _guard = anchor.lock();
        Ok(anchor.followers().unregister(owner))
    }

    pub fn snapshot(&self) -> BridgeResult<AnchorSnapshot> {
        let anchor = self.realm.anchor()?;
        let _guard = anchor.lock();
        Ok(AnchorSnapshot {
            leader_owner: anchor.leader_owner_name(),
            leader_class: anchor.leader_class(),
            protocol: anchor.protocol(),
            leader_fingerprint: anchor.leader().as_ref().map(fingerprint),
            has_service_manager: anchor.leader_service_manager().is_some(),
            followers: anchor
                .followers()
                .owners()
                .iter()
                .map(|owner| owner.name().to_string())
                .collect(),
        })
    }
}
