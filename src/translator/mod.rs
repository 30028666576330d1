//! The core: maps a Kubernetes resource + its parsed spec into the desired
//! external pool object, diffs it against the observed pool, and applies it.

mod ingress;
mod merge;
mod service;
mod status;

pub use service::{ServicePort, ServiceResourceInput};
pub use ingress::{IngressBackendRef, IngressResourceInput, IngressRule, IngressTls};
pub use status::StatusSnapshot;

use crate::cache::ResourceCache;
use crate::defaults::HOST_NETWORK;
use crate::errors::{Error, Result};
use crate::lbclient::{with_deadline, Haproxy, Pool, PoolClient};
use crate::poolspec::{CreationStrategy, PoolSpec};
use crate::secret_reflector::SecretReflector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorEvent {
    pub severity: EventSeverity,
    pub reason: &'static str,
    pub message: String,
}

pub struct TranslationOutcome {
    pub status: Option<StatusSnapshot>,
    pub events: Vec<TranslatorEvent>,
}

impl TranslationOutcome {
    fn empty() -> Self {
        TranslationOutcome {
            status: None,
            events: Vec::new(),
        }
    }
}

struct DesiredObjects {
    haproxy: Haproxy,
    secrets: Vec<String>,
    virtual_network: Option<String>,
}

/// Resource-agnostic owner identity, threaded through naming and merge.
#[derive(Debug, Clone)]
pub struct Owner<'a> {
    pub cluster: &'a str,
    pub namespace: &'a str,
    pub resource: &'a str,
}

/// Entry point for a Service of type LoadBalancer.
pub async fn translate_service(
    owner: Owner<'_>,
    input: &ServiceResourceInput,
    spec: &PoolSpec,
    cache: &dyn ResourceCache,
    pool_client: &dyn PoolClient,
    has_existing_status: bool,
) -> Result<TranslationOutcome> {
    if spec.translation_paused {
        return Ok(TranslationOutcome {
            status: None,
            events: vec![TranslatorEvent {
                severity: EventSeverity::Normal,
                reason: "TranslationPaused",
                message: "translation is paused for this resource".to_string(),
            }],
        });
    }

    let desired = service::desired_objects(&owner, input, spec);
    translate_common(owner, spec, desired, cache, pool_client, has_existing_status).await
}

/// Entry point for an Ingress of the `edgelb` class.
pub async fn translate_ingress(
    owner: Owner<'_>,
    input: &IngressResourceInput,
    spec: &PoolSpec,
    cache: &dyn ResourceCache,
    secret_reflector: &dyn SecretReflector,
    pool_client: &dyn PoolClient,
    has_existing_status: bool,
) -> Result<TranslationOutcome> {
    if spec.translation_paused {
        return Ok(TranslationOutcome {
            status: None,
            events: vec![TranslatorEvent {
                severity: EventSeverity::Normal,
                reason: "TranslationPaused",
                message: "translation is paused for this resource".to_string(),
            }],
        });
    }

    let (desired, mut events) =
        ingress::desired_objects(&owner, input, spec, cache, secret_reflector).await?;

    let mut outcome = translate_common(owner, spec, desired, cache, pool_client, has_existing_status).await?;
    events.append(&mut outcome.events);
    outcome.events = events;
    Ok(outcome)
}

async fn translate_common(
    owner: Owner<'_>,
    spec: &PoolSpec,
    desired: DesiredObjects,
    cache: &dyn ResourceCache,
    pool_client: &dyn PoolClient,
    has_existing_status: bool,
) -> Result<TranslationOutcome> {
    let resolved = resolve_cloud_provider_config(&owner, spec, cache).await?;
    let spec = &resolved;

    let found = match with_deadline(pool_client.get_pool(&spec.name)).await {
        Ok(pool) => Some(pool),
        Err(Error::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let pool = match found {
        None => match create_branch(spec, &desired, pool_client, has_existing_status).await? {
            Some(pool) => pool,
            None => return Ok(TranslationOutcome::empty()),
        },
        Some(observed) => {
            match update_branch(&owner, spec, &desired, observed, pool_client).await? {
                Some(pool) => pool,
                None => return Ok(TranslationOutcome::empty()),
            }
        }
    };

    let snapshot = status::synthesize(&owner, pool_client, &pool.name).await;
    Ok(TranslationOutcome {
        status: snapshot,
        events: Vec::new(),
    })
}

/// Resolves `cloud_provider_config_ref`, if set, into `cloud_provider_config`
/// by reading the referenced key out of a ConfigMap in the owner's
/// namespace. Takes precedence over an inline `cloud_provider_config` when
/// both are present.
async fn resolve_cloud_provider_config(
    owner: &Owner<'_>,
    spec: &PoolSpec,
    cache: &dyn ResourceCache,
) -> Result<PoolSpec> {
    let mut resolved = spec.clone();
    if let Some(cref) = &spec.cloud_provider_config_ref {
        let data = cache
            .get_configmap_data(owner.namespace, &cref.name)
            .await
            .ok_or_else(|| {
                Error::ConfigResolution(format!(
                    "configmap {}/{} referenced by cloudProviderConfigRef not found",
                    owner.namespace, cref.name
                ))
            })?;
        let value = data.get(&cref.key).cloned().ok_or_else(|| {
            Error::ConfigResolution(format!(
                "configmap {}/{} has no key {:?}",
                owner.namespace, cref.name, cref.key
            ))
        })?;
        resolved.cloud_provider_config = Some(value);
    }
    Ok(resolved)
}

async fn create_branch(
    spec: &PoolSpec,
    desired: &DesiredObjects,
    pool_client: &dyn PoolClient,
    has_existing_status: bool,
) -> Result<Option<Pool>> {
    match spec.creation_strategy {
        CreationStrategy::Never => {
            return Err(Error::ExternalTransient(format!(
                "pool {} does not exist and creationStrategy is Never",
                spec.name
            )))
        }
        CreationStrategy::Once if has_existing_status => {
            return Err(Error::ExternalTransient(format!(
                "pool {} was once present and creationStrategy is Once; refusing to recreate",
                spec.name
            )))
        }
        _ => {}
    }

    let pool = Pool {
        name: spec.name.clone(),
        namespace_group: pool_client.pool_group().to_string(),
        role: spec.role.clone(),
        cpus: spec.cpus,
        mem: spec.mem,
        count: spec.size,
        virtual_networks: desired.virtual_network.clone().into_iter().collect(),
        constraints: Vec::new(),
        cloud_provider_config: spec.cloud_provider_config.clone(),
        secrets: desired.secrets.clone(),
        haproxy: desired.haproxy.clone(),
    };

    with_deadline(pool_client.create_pool(&pool)).await?;
    Ok(Some(pool))
}

async fn update_branch(
    owner: &Owner<'_>,
    spec: &PoolSpec,
    desired: &DesiredObjects,
    observed: Pool,
    pool_client: &dyn PoolClient,
) -> Result<Option<Pool>> {
    let merged = merge::merge(owner, spec, desired, observed);

    if !merged.changed {
        return Ok(Some(merged.pool));
    }

    if merged.pool.haproxy.backends.is_empty() && merged.pool.haproxy.frontends.is_empty() {
        with_deadline(pool_client.delete_pool(&merged.pool.name)).await?;
        return Ok(None);
    }

    with_deadline(pool_client.update_pool(&merged.pool)).await?;
    Ok(Some(merged.pool))
}

pub(crate) fn virtual_network_entry(spec: &PoolSpec) -> Option<String> {
    if spec.network == HOST_NETWORK {
        None
    } else {
        Some(spec.network.clone())
    }
}
