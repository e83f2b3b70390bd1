use crate::api::{Service, SkinData};
use crate::error::BridgeResult;
use futures::future::BoxFuture;
use quorum_macros::bridge_api;
use uuid::Uuid;

/// Player profile lookups. Results resolve on the leader's worker pool.
#[bridge_api(namespace = "profile_service")]
pub trait ProfileService: Service {
    #[bridge]
    fn name_of(&self, id: Uuid) -> BoxFuture<'static, BridgeResult<Option<String>>>;

    #[bridge]
    fn id_of(&self, name: &str) -> BoxFuture<'static, BridgeResult<Option<Uuid>>>;

    #[bridge]
    fn skin_of(&self, id: Uuid) -> BoxFuture<'static, BridgeResult<Option<SkinData>>>;
}
