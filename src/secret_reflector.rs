//! Reflects Kubernetes TLS secrets onto the external platform's secret store
//! so the external LB can terminate TLS with them. No real DC/OS secret-store
//! client is implemented; this is a collaborator trait with a fake for tests.

use async_trait::async_trait;

use crate::errors::Result;

#[async_trait]
pub trait SecretReflector: Send + Sync {
    /// Ensures the named Kubernetes secret's material is present at the
    /// returned external-platform path. Idempotent: reflecting the same
    /// secret twice returns the same path without resubmitting anything the
    /// store already has.
    async fn reflect(&self, namespace: &str, name: &str) -> Result<String>;
}

pub struct FakeSecretReflector {
    prefix: String,
}

impl FakeSecretReflector {
    pub fn new(prefix: impl Into<String>) -> Self {
        FakeSecretReflector {
            prefix: prefix.into(),
        }
    }
}

impl Default for FakeSecretReflector {
    fn default() -> Self {
        FakeSecretReflector::new("secret")
    }
}

#[async_trait]
impl SecretReflector for FakeSecretReflector {
    async fn reflect(&self, namespace: &str, name: &str) -> Result<String> {
        Ok(format!("{}/{namespace}/{name}", self.prefix))
    }
}
