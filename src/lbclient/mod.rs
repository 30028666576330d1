//! The external-LB API is modeled as a trait with no real HTTP-backed
//! implementation supplied; a real client would implement `PoolClient`
//! against the DC/OS EdgeLB API.

mod fake;
mod types;

pub use fake::FakePoolClient;
pub use types::{
    Backend, BackendService, ElbListener, Frontend, FrontendEndpoint, Haproxy, LinkBackend, Pool,
    PoolMetadata,
};

use async_trait::async_trait;

use crate::errors::{Error, Result};

/// CRUD surface over external pool objects. `Get*` methods return
/// `Err(Error::NotFound(_))` rather than `Option`, so a single error match in
/// the translator handles both "genuinely gone" and "transient failure".
#[async_trait]
pub trait PoolClient: Send + Sync {
    async fn get_pool(&self, name: &str) -> Result<Pool>;
    async fn create_pool(&self, pool: &Pool) -> Result<()>;
    async fn update_pool(&self, pool: &Pool) -> Result<()>;
    async fn delete_pool(&self, name: &str) -> Result<()>;
    async fn get_pool_metadata(&self, name: &str) -> Result<PoolMetadata>;
    /// The namespace-group this client's pools are created in, used to
    /// populate `Pool::namespace_group` on creation.
    fn pool_group(&self) -> &str;
}

/// Wraps a `PoolClient` call with the external-LB deadline. Every translator
/// call into the collaborator goes through this rather than calling the
/// trait method bare.
pub async fn with_deadline<T, F>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(std::time::Duration::from_secs(10), fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::ExternalTransient(
            "external-LB call exceeded 10s deadline".to_string(),
        )),
    }
}
