use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Looks up an identity id in the external directory.
    async fn verify(&self, identity_id: &str) -> Result<bool>;
}

/// Placeholder until the directory service exposes a real lookup endpoint;
/// it reports every well-formed id as existing.
pub struct StubIdentity;

#[async_trait]
impl IdentityApi for StubIdentity {
    async fn verify(&self, _identity_id: &str) -> Result<bool> {
        Ok(true)
    }
}
