//! Integration tests for the generated bridge contract.
//!
//! Every stable id in the contract must resolve on the classes that serve
//! its namespace, on the leader side and on the follower side alike.

use quorum::contract::{ids, lookup, METHODS};
use quorum::resolver::{load_descriptor, resolve};
use quorum::{
    Bootstrap, BridgeError, LibraryApi, LibraryFactory, ObjectRef, OwnerRef, ProcessStore, Realm,
    Reflect, Settings,
};
use std::collections::HashSet;
use std::sync::Arc;

// ==============================================================================
// Test Fixture Helpers
// ==============================================================================

/// Objects serving each namespace, leader side first.
fn servers() -> Vec<(&'static str, Vec<ObjectRef>)> {
    let store = Arc::new(ProcessStore::new());
    let leader_realm = Realm::new(Settings::default(), store.clone());
    let follower_realm = Realm::new(Settings::default(), store);
    let owner = OwnerRef::named("PluginA");

    let leader = Bootstrap::new(leader_realm)
        .init(&owner, Arc::new(LibraryFactory::default()), false)
        .unwrap();
    let follower = Bootstrap::new(follower_realm)
        .init(&OwnerRef::named("PluginB"), Arc::new(LibraryFactory::default()), false)
        .unwrap();

    let leader_library: ObjectRef = leader.clone();
    let follower_library: ObjectRef = follower.clone();
    let leader_profiles: ObjectRef = leader.profile_service(&owner).unwrap();
    let follower_profiles: ObjectRef = follower.profile_service(&owner).unwrap();
    let leader_manager: ObjectRef = leader.service_manager().unwrap();
    let follower_manager: ObjectRef = follower.service_manager().unwrap();
    let leader_configs: ObjectRef = leader.config_manager().unwrap();
    let follower_configs: ObjectRef = follower.config_manager().unwrap();

    let libraries = vec![leader_library, follower_library];
    let profiles = vec![leader_profiles, follower_profiles];
    let managers = vec![leader_manager, follower_manager];
    let configs = vec![leader_configs, follower_configs];

    let mut services = libraries.clone();
    services.extend(profiles.iter().cloned());

    vec![
        ("library", libraries),
        ("service", services),
        ("service_manager", managers),
        ("config_manager", configs),
        ("profile_service", profiles),
    ]
}

// ==============================================================================
// Contract Table
// ==============================================================================

#[test]
fn test_contract_is_sorted_and_unique() {
    let mut seen = HashSet::new();
    for method in METHODS {
        assert!(seen.insert(method.stable_id), "duplicate id {}", method.stable_id);
        assert_eq!(lookup(method.stable_id), Some(method));
    }

    let keys: Vec<_> = METHODS.iter().map(|m| (m.namespace, m.stable_id)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert!(lookup("nope#missing()").is_none());
}

#[test]
fn test_explicit_and_derived_ids() {
    assert_eq!(ids::library::SHUTDOWN, "LIB_API_SHUTDOWN");
    assert_eq!(ids::service::SERVICE_NAME, "service#service_name()");
    assert_eq!(
        ids::service_manager::SERVICE_FOR_OWNER__OWNERREF__TYPEREF,
        "service_manager#service_for_owner(OwnerRef,TypeRef)"
    );

    let descriptor = load_descriptor(ids::config_manager::CREATE_CONFIG__OWNERREF__STR).unwrap();
    assert_eq!(descriptor.parameter_type_names, ["OwnerRef", "str"]);
    assert_eq!(descriptor.return_type_name, "ConfigSnapshot");
    assert!(matches!(
        load_descriptor("LIB_API_UNKNOWN"),
        Err(BridgeError::UnknownContractId(_))
    ));
}

// ==============================================================================
// Resolution
// ==============================================================================

#[test]
fn test_every_id_resolves_on_its_servers() {
    let servers = servers();
    let namespaces: HashSet<_> = METHODS.iter().map(|m| m.namespace).collect();
    for namespace in &namespaces {
        assert!(
            servers.iter().any(|(served, _)| served == namespace),
            "no server for namespace {namespace}"
        );
    }

    for method in METHODS {
        for (namespace, objects) in &servers {
            if *namespace != method.namespace {
                continue;
            }
            for object in objects {
                let first = resolve(object.class(), method).unwrap_or_else(|e| panic!("{e}"));
                let again = resolve(object.class(), method).unwrap();
                assert_eq!(first, again);

                let slot = &object.class().methods()[first.slot()];
                assert_eq!(slot.name(), method.declaring_name);
                assert_eq!(slot.returns(), method.return_type_name);
            }
        }
    }
}
