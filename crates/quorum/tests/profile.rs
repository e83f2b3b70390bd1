//! Integration tests for profile lookups through the follower bridge.

use async_trait::async_trait;
use quorum::service::{Profile, ProfileSource};
use quorum::{
    Bootstrap, BridgeError, BridgeResult, LibraryApi, LibraryFactory, OwnerRef, ProcessStore,
    ProfileService, Realm, Service, Settings, SkinData,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// ==============================================================================
// Test Fixture Helpers
// ==============================================================================

const NOTCH: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";

fn notch() -> Profile {
    Profile {
        id: Uuid::parse_str(NOTCH).unwrap(),
        name: "Notch".to_string(),
        skin: Some(SkinData {
            value: "dGV4dHVyZXM=".to_string(),
            signature: None,
        }),
    }
}

/// Knows one profile; fails for the name "boom".
#[derive(Default)]
struct FakeSource {
    calls: AtomicUsize,
}

#[async_trait]
impl ProfileSource for FakeSource {
    async fn profile_by_id(&self, id: Uuid) -> BridgeResult<Option<Profile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(notch()).filter(|profile| profile.id == id))
    }

    async fn profile_by_name(&self, name: &str) -> BridgeResult<Option<Profile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if name == "boom" {
            return Err(BridgeError::Profile("upstream unavailable".to_string()));
        }
        Ok(Some(notch()).filter(|profile| profile.name.eq_ignore_ascii_case(name)))
    }
}

fn start(source: Arc<FakeSource>) -> (Arc<dyn LibraryApi>, Arc<dyn LibraryApi>) {
    let store = Arc::new(ProcessStore::new());
    let factory = Arc::new(LibraryFactory::with_profile_source(source));

    let leader = Bootstrap::new(Realm::new(Settings::default(), store.clone()))
        .init(&OwnerRef::named("PluginA"), factory.clone(), false)
        .unwrap();
    let follower = Bootstrap::new(Realm::new(Settings::default(), store))
        .init(&OwnerRef::named("PluginB"), factory, false)
        .unwrap();
    (leader, follower)
}

// ==============================================================================
// Lookups
// ==============================================================================

#[tokio::test]
async fn test_follower_lookups_run_on_leader() {
    let source = Arc::new(FakeSource::default());
    let (leader, follower) = start(source.clone());
    let plugin_b = OwnerRef::named("PluginB");

    let profiles = follower.profile_service(&plugin_b).unwrap();
    assert_eq!(profiles.service_name().unwrap(), "ProfileService_PluginB");
    assert_eq!(profiles.bound_owner().unwrap(), Some(plugin_b.clone()));
    assert!(profiles.executor().unwrap().is_some());

    let id = Uuid::parse_str(NOTCH).unwrap();
    assert_eq!(profiles.id_of("notch").await.unwrap(), Some(id));
    assert_eq!(profiles.name_of(id).await.unwrap().as_deref(), Some("Notch"));
    assert_eq!(profiles.skin_of(id).await.unwrap(), notch().skin);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    assert_eq!(profiles.id_of("jeb_").await.unwrap(), None);

    let registered = leader.service_manager().unwrap();
    assert!(registered
        .service("ProfileService_PluginB")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_profile_service_is_shared_per_owner() {
    let (leader, follower) = start(Arc::new(FakeSource::default()));
    let plugin_b = OwnerRef::named("PluginB");

    follower.profile_service(&plugin_b).unwrap();
    follower.profile_service(&plugin_b).unwrap();
    leader.profile_service(&plugin_b).unwrap();

    assert_eq!(leader.service_manager().unwrap().all_services().unwrap().len(), 1);
}

#[tokio::test]
async fn test_lookup_failure_crosses_the_bridge() {
    let (_leader, follower) = start(Arc::new(FakeSource::default()));
    let profiles = follower
        .profile_service(&OwnerRef::named("PluginB"))
        .unwrap();

    let err = profiles.id_of("boom").await.unwrap_err();
    match err {
        BridgeError::Invocation { source, .. } => assert_eq!(source.kind(), Some("Profile")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_lookups_fail_after_leader_shutdown() {
    let (leader, _follower) = start(Arc::new(FakeSource::default()));
    let profiles = leader.profile_service(&OwnerRef::named("PluginA")).unwrap();

    leader.shutdown().unwrap();
    let err = profiles.name_of(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Closed(_)), "{err}");
}
