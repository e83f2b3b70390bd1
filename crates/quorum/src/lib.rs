//! # quorum
//!
//! Leader election and a stable-id bridge for independently loaded copies
//! of one library sharing a process.
//!
//! This crate provides:
//! - A process-wide anchor where the first copy publishes itself as leader
//! - Follower bridges that forward every call to the current leader by
//!   stable method id, resolved structurally against the leader's class
//! - Proxies and field-by-field copies so callers only ever see local types
//! - The leader's shared runtime: worker pool, HTTP client and caches
//! - A service registry, per-owner configuration files and profile lookups
//!
//! ## Protocol versions
//!
//! Copies only bridge when their packaged protocol versions are equal. A
//! copy that finds an incompatible leader runs an isolated leader of its
//! own and never touches the published one.
//!
//! ## Failover
//!
//! Followers re-read the anchor before every call. When the leader steps
//! down while followers remain, the next call elects a new leader in the
//! caller's realm.

pub mod anchor;
pub mod api;
pub mod bootstrap;
pub mod bridge;
pub mod error;
pub mod library;
pub mod logging;
pub mod realm;
pub mod reflect;
pub mod resolver;
pub mod runtime;
pub mod service;
pub mod settings;
pub mod skeleton;
pub mod value;

/// The bridge contract generated from the `#[bridge_api]` traits in `api`.
pub mod contract {
    pub use quorum_contract::MethodDescriptor;

    include!(concat!(env!("OUT_DIR"), "/bridge_contract.rs"));
}

pub use anchor::{Anchor, ProcessStore, PropertyStore};
pub use api::{
    ConfigManager, ConfigSnapshot, LibraryApi, ProfileService, Service, ServiceManager, SkinData,
};
pub use bootstrap::{AnchorSnapshot, Bootstrap, LeaderFactory, Role};
pub use error::{BridgeError, BridgeResult, InvokeError};
pub use library::{Library, LibraryFactory};
pub use realm::Realm;
pub use reflect::{ObjectRef, Reflect};
pub use settings::Settings;
pub use value::{NamedOwner, Owner, OwnerRef, TypeRef};

use std::sync::Arc;

/// The library for `owner` in this copy: the published leader's bridge, a
/// newly elected leader, or an isolated leader. `verbose` enables election
/// diagnostics.
pub fn instance(owner: &OwnerRef, verbose: bool) -> BridgeResult<Arc<dyn LibraryApi>> {
    Bootstrap::new(Realm::local()).init(owner, Arc::new(LibraryFactory::default()), verbose)
}
