//! Owner-bound profile lookups over the leader's shared runtime.

use crate::api::{ProfileService, Service, SkinData};
use crate::error::{BridgeError, BridgeResult, InvokeError};
use crate::reflect::{Call, ClassInfo, RealmId, Reflect};
use crate::runtime::{ProfileCache, SharedRuntime};
use crate::settings::ProfileEndpoints;
use crate::skeleton;
use crate::value::{OwnerRef, Value};
use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Property carrying the signed skin textures.
const TEXTURES_PROPERTY: &str = "textures";

/// A player profile as returned by a [`ProfileSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub skin: Option<SkinData>,
}

/// Where profiles come from. `Ok(None)` means the profile does not exist or
/// the source declined to answer.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profile_by_id(&self, id: Uuid) -> BridgeResult<Option<Profile>>;

    async fn profile_by_name(&self, name: &str) -> BridgeResult<Option<Profile>>;
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: String,
    name: String,
    #[serde(default)]
    properties: Vec<PropertyResponse>,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    name: String,
    value: String,
    signature: Option<String>,
}

impl ProfileResponse {
    fn into_profile(self) -> BridgeResult<Profile> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| BridgeError::Profile(format!("invalid profile id '{}': {e}", self.id)))?;
        let skin = self
            .properties
            .into_iter()
            .find(|property| property.name == TEXTURES_PROPERTY)
            .map(|property| SkinData {
                value: property.value,
                signature: property.signature,
            });
        Ok(Profile {
            id,
            name: self.name,
            skin,
        })
    }
}

/// Mojang-style session and profile endpoints over the shared HTTP client.
pub struct MojangProfileSource {
    http: reqwest::Client,
    endpoints: ProfileEndpoints,
}

impl MojangProfileSource {
    pub fn new(http: reqwest::Client, endpoints: ProfileEndpoints) -> Self {
        Self { http, endpoints }
    }

    async fn fetch(&self, url: Url) -> BridgeResult<Option<Profile>> {
        let response = self.http.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(url = %url, "Profile lookup rate limited");
                return Ok(None);
            }
            status => {
                debug!(url = %url, status = %status, "Profile not found");
                return Ok(None);
            }
        }
        let body: ProfileResponse = response.json().await?;
        body.into_profile().map(Some)
    }
}

#[async_trait]
impl ProfileSource for MojangProfileSource {
    async fn profile_by_id(&self, id: Uuid) -> BridgeResult<Option<Profile>> {
        let mut url = endpoint(&self.endpoints.session_url, &id.simple().to_string())?;
        url.query_pairs_mut().append_pair("unsigned", "false");
        self.fetch(url).await
    }

    async fn profile_by_name(&self, name: &str) -> BridgeResult<Option<Profile>> {
        self.fetch(endpoint(&self.endpoints.profile_url, name)?).await
    }
}

/// `base` with `segment` appended as one escaped path segment.
fn endpoint(base: &str, segment: &str) -> BridgeResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| BridgeError::Profile(format!("invalid profile endpoint '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| BridgeError::Profile(format!("profile endpoint '{base}' has no path")))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

fn remember(cache: &ProfileCache, profile: &Profile) {
    cache.put_profile(profile.id, &profile.name);
    if let Some(skin) = &profile.skin {
        cache.put_skin(profile.id, skin.clone());
    }
}

/// The leader's profile service for one owner.
///
/// Cache hits complete immediately; misses are fetched on the shared worker
/// pool and cached in both directions.
pub struct ProfileServiceImpl {
    class: ClassInfo,
    owner: OwnerRef,
    runtime: Arc<SharedRuntime>,
    source: Arc<dyn ProfileSource>,
}

impl ProfileServiceImpl {
    pub fn new(
        realm: RealmId,
        owner: OwnerRef,
        runtime: Arc<SharedRuntime>,
        source: Arc<dyn ProfileSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            class: skeleton::profile_service_class("ProfileServiceImpl", realm),
            owner,
            runtime,
            source,
        })
    }

    fn lookup<T, F, Fut>(&self, cached: Option<T>, fetch: F) -> BoxFuture<'static, BridgeResult<Option<T>>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn ProfileSource>, Arc<ProfileCache>) -> Fut,
        Fut: std::future::Future<Output = BridgeResult<Option<T>>> + Send + 'static,
    {
        if let Some(value) = cached {
            return future::ready(Ok(Some(value))).boxed();
        }
        let task = fetch(self.source.clone(), self.runtime.profiles().clone());
        self.runtime.spawn(task)
    }
}

impl Service for ProfileServiceImpl {
    fn service_name(&self) -> BridgeResult<String> {
        Ok(format!("ProfileService_{}", self.owner.name()))
    }

    fn bound_owner(&self) -> BridgeResult<Option<OwnerRef>> {
        Ok(Some(self.owner.clone()))
    }

    fn executor(&self) -> BridgeResult<Option<Handle>> {
        Ok(Some(self.runtime.handle().clone()))
    }
}

impl ProfileService for ProfileServiceImpl {
    fn name_of(&self, id: Uuid) -> BoxFuture<'static, BridgeResult<Option<String>>> {
        let cached = self.runtime.profiles().name(&id);
        self.lookup(cached, move |source, cache| async move {
            let profile = source.profile_by_id(id).await?;
            if let Some(profile) = &profile {
                remember(&cache, profile);
            }
            Ok(profile.map(|profile| profile.name))
        })
    }

    fn id_of(&self, name: &str) -> BoxFuture<'static, BridgeResult<Option<Uuid>>> {
        if name.trim().is_empty() {
            return future::ready(Ok(None)).boxed();
        }
        let cached = self.runtime.profiles().id(name);
        let name = name.to_string();
        self.lookup(cached, move |source, cache| async move {
            let profile = source.profile_by_name(&name).await?;
            if let Some(profile) = &profile {
                remember(&cache, profile);
            }
            Ok(profile.map(|profile| profile.id))
        })
    }

    fn skin_of(&self, id: Uuid) -> BoxFuture<'static, BridgeResult<Option<SkinData>>> {
        let cached = self.runtime.profiles().skin(&id);
        self.lookup(cached, move |source, cache| async move {
            let profile = source.profile_by_id(id).await?;
            if let Some(profile) = &profile {
                remember(&cache, profile);
            }
            Ok(profile.and_then(|profile| profile.skin))
        })
    }
}

impl Reflect for ProfileServiceImpl {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use futures::executor::block_on;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOTCH: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    fn notch() -> Profile {
        Profile {
            id: Uuid::parse_str(NOTCH).unwrap(),
            name: "Notch".to_string(),
            skin: Some(SkinData {
                value: "dGV4dHVyZXM=".to_string(),
                signature: Some("c2ln".to_string()),
            }),
        }
    }

    #[async_trait]
    impl ProfileSource for CountingSource {
        async fn profile_by_id(&self, id: Uuid) -> BridgeResult<Option<Profile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(notch()).filter(|profile| profile.id == id))
        }

        async fn profile_by_name(&self, name: &str) -> BridgeResult<Option<Profile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(notch()).filter(|profile| profile.name.eq_ignore_ascii_case(name)))
        }
    }

    fn service(source: Arc<CountingSource>) -> Arc<ProfileServiceImpl> {
        let runtime = Arc::new(SharedRuntime::new(&Settings::default()).unwrap());
        ProfileServiceImpl::new(RealmId::new(), OwnerRef::named("PluginA"), runtime, source)
    }

    #[test]
    fn test_service_identity() {
        let service = service(Arc::new(CountingSource::default()));
        assert_eq!(service.service_name().unwrap(), "ProfileService_PluginA");
        assert_eq!(service.bound_owner().unwrap().unwrap().name(), "PluginA");
        assert!(service.executor().unwrap().is_some());
    }

    #[test]
    fn test_lookups_are_cached_both_ways() {
        let source = Arc::new(CountingSource::default());
        let service = service(source.clone());
        let id = Uuid::parse_str(NOTCH).unwrap();

        assert_eq!(block_on(service.id_of("notch")).unwrap(), Some(id));
        assert_eq!(block_on(service.name_of(id)).unwrap().as_deref(), Some("Notch"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let skin = block_on(service.skin_of(id)).unwrap().unwrap();
        assert_eq!(skin.signature.as_deref(), Some("c2ln"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let other = Uuid::new_v4();
        assert_eq!(block_on(service.skin_of(other)).unwrap(), None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_misses_are_not_cached() {
        let source = Arc::new(CountingSource::default());
        let service = service(source.clone());

        assert_eq!(block_on(service.id_of("jeb_")).unwrap(), None);
        assert_eq!(block_on(service.id_of("jeb_")).unwrap(), None);
        assert_eq!(block_on(service.id_of("  ")).unwrap(), None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    fn source_for(server: &MockServer) -> MojangProfileSource {
        MojangProfileSource::new(
            reqwest::Client::new(),
            ProfileEndpoints {
                session_url: format!("{}/session/", server.uri()),
                profile_url: format!("{}/users/", server.uri()),
            },
        )
    }

    #[tokio::test]
    async fn test_mojang_source_reads_textures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/069a79f444e94726a5befca90e38aaf5"))
            .and(query_param("unsigned", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "069a79f444e94726a5befca90e38aaf5",
                "name": "Notch",
                "properties": [
                    { "name": "textures", "value": "dGV4dHVyZXM=", "signature": "c2ln" }
                ]
            })))
            .mount(&server)
            .await;

        let profile = source_for(&server)
            .profile_by_id(Uuid::parse_str(NOTCH).unwrap())
            .await
            .unwrap();
        assert_eq!(profile, Some(notch()));
    }

    #[tokio::test]
    async fn test_mojang_source_by_name_without_properties() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/Notch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "069a79f444e94726a5befca90e38aaf5",
                "name": "Notch"
            })))
            .mount(&server)
            .await;

        let profile = source_for(&server)
            .profile_by_name("Notch")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.id, Uuid::parse_str(NOTCH).unwrap());
        assert_eq!(profile.skin, None);
    }

    #[tokio::test]
    async fn test_mojang_source_missing_and_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/nobody"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = source_for(&server);
        assert_eq!(source.profile_by_name("nobody").await.unwrap(), None);
        assert_eq!(source.profile_by_name("busy").await.unwrap(), None);
    }

    #[test]
    fn test_names_are_escaped_as_one_segment() {
        let url = endpoint("https://api.example.com/users/profiles/", "a/b?c#d").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/users/profiles/a%2Fb%3Fc%23d");

        let url = endpoint("https://api.example.com/users", "Notch").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/users/Notch");

        let err = endpoint("not a url", "Notch").unwrap_err();
        assert_eq!(err.kind(), "Profile");
    }

    #[tokio::test]
    async fn test_mojang_source_keeps_odd_names_in_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "069a79f444e94726a5befca90e38aaf5",
                "name": "Notch"
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        assert_eq!(source.profile_by_name("a/b").await.unwrap(), None);
        assert_eq!(source.profile_by_name("a?b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mojang_source_rejects_bad_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "not-a-uuid",
                "name": "broken"
            })))
            .mount(&server)
            .await;

        let err = source_for(&server).profile_by_name("broken").await.unwrap_err();
        assert_eq!(err.kind(), "Profile");
    }
}
