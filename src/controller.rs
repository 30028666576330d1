use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{Api, Patch, PatchParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType, Recorder, Reporter},
        watcher::Config as WatcherConfig,
    },
    Resource, ResourceExt,
};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{debug, error, field, info, instrument, warn, Span};

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::lbclient::PoolClient;
use crate::poolspec;
use crate::secret_reflector::SecretReflector;
use crate::translator::{
    self, IngressBackendRef, IngressResourceInput, IngressRule, IngressTls, Owner,
    ServicePort, ServiceResourceInput, TranslatorEvent,
};
use crate::{telemetry, Metrics, INGRESS_CLASS_ANNOTATION};

/// Shared across both watched kinds' reconcilers and the admission server.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    pub metrics: Metrics,
    pub config: Arc<Config>,
    pub pool_client: Arc<dyn PoolClient>,
    pub secret_reflector: Arc<dyn SecretReflector>,
}

impl Context {
    fn recorder(&self) -> Recorder {
        let reporter: Reporter = self.config.ingress_class_name.clone().into();
        Recorder::new(self.client.clone(), reporter)
    }
}

#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
        }
    }
}

/// State shared between the controllers and the metrics/health web server.
#[derive(Clone, Default)]
pub struct State {
    diagnostics: Arc<RwLock<Diagnostics>>,
    registry: prometheus::Registry,
}

impl State {
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    pub fn create_context(
        &self,
        client: Client,
        config: Arc<Config>,
        pool_client: Arc<dyn PoolClient>,
        secret_reflector: Arc<dyn SecretReflector>,
    ) -> Arc<Context> {
        let metrics = Metrics::default();
        self.registry
            .register(Box::new(metrics.reconcile.runs.clone()))
            .ok();
        self.registry
            .register(Box::new(metrics.reconcile.failures.clone()))
            .ok();
        self.registry
            .register(Box::new(metrics.reconcile.duration.clone()))
            .ok();
        Arc::new(Context {
            client,
            metrics,
            diagnostics: self.diagnostics.clone(),
            config,
            pool_client,
            secret_reflector,
        })
    }
}

fn requeue_with_backoff(error: &Error) -> Action {
    if !error.is_retriable() {
        return Action::await_change();
    }
    let jitter = rand::thread_rng().gen_range(0..60);
    Action::requeue(Duration::from_secs(30 + jitter))
}

async fn emit_event(
    ctx: &Context,
    object_ref: k8s_openapi::api::core::v1::ObjectReference,
    event: TranslatorEvent,
) {
    let recorder = ctx.recorder();
    let type_ = match event.severity {
        translator::EventSeverity::Normal => EventType::Normal,
        translator::EventSeverity::Warning => EventType::Warning,
    };
    if let Err(e) = recorder
        .publish(
            &Event {
                type_,
                reason: event.reason.to_string(),
                note: Some(event.message),
                action: "Translate".to_string(),
                secondary: None,
            },
            &object_ref,
        )
        .await
    {
        warn!(error = %e, "failed to publish event");
    }
}

fn service_ports(service: &Service) -> Vec<ServicePort> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.clone())
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.protocol.as_deref().unwrap_or("TCP") == "TCP")
        .filter_map(|p| {
            Some(ServicePort {
                port: u16::try_from(p.port).ok()?,
                node_port: u16::try_from(p.node_port?).ok()?,
            })
        })
        .collect()
}

#[instrument(skip(svc, ctx), fields(trace_id))]
async fn reconcile_service(svc: Arc<Service>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    let _timer = ctx.metrics.reconcile.count_and_measure("Service");

    let ns = svc.namespace().unwrap_or_default();
    let name = svc.name_any();
    let object_ref = svc.object_ref(&());

    let is_loadbalancer = svc
        .spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .map(|t| t == "LoadBalancer")
        .unwrap_or(false);

    if !is_loadbalancer || svc.meta().deletion_timestamp.is_some() {
        debug!(%name, %ns, "service out of scope or being deleted");
        return Ok(Action::await_change());
    }

    let annotations = svc.annotations().clone().into_iter().collect();
    let spec = match poolspec::parse_from_annotations(&annotations, &ctx.config.cluster_name, &ns, &name)
        .map_err(Error::from)
        .and_then(|(spec, _)| poolspec::validate(&spec).map(|_| spec).map_err(Error::from))
    {
        Ok(spec) => spec,
        Err(e) => {
            if let Some(reason) = e.event_reason() {
                emit_event(
                    &ctx,
                    object_ref,
                    TranslatorEvent {
                        severity: translator::EventSeverity::Warning,
                        reason,
                        message: e.to_string(),
                    },
                )
                .await;
            }
            ctx.metrics.reconcile.set_failure("Service", &e);
            return Ok(requeue_with_backoff(&e));
        }
    };

    let has_existing_status = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| !ingress.is_empty())
        .unwrap_or(false);

    let input = ServiceResourceInput {
        ports: service_ports(&svc),
    };
    let owner = Owner {
        cluster: &ctx.config.cluster_name,
        namespace: &ns,
        resource: &name,
    };

    let cache = crate::cache::KubeResourceCache::new(ctx.client.clone());
    let outcome = translator::translate_service(
        owner,
        &input,
        &spec,
        &cache,
        ctx.pool_client.as_ref(),
        has_existing_status,
    )
    .await;

    match outcome {
        Ok(outcome) => {
            for event in outcome.events {
                emit_event(&ctx, object_ref.clone(), event).await;
            }
            if let Some(status) = outcome.status {
                write_service_status(&ctx, &ns, &name, &status).await?;
            }
            Ok(Action::requeue(Duration::from_secs(ctx.config.resync_period_seconds)))
        }
        Err(e) => {
            if let Some(reason) = e.event_reason() {
                emit_event(
                    &ctx,
                    object_ref,
                    TranslatorEvent {
                        severity: translator::EventSeverity::Warning,
                        reason,
                        message: e.to_string(),
                    },
                )
                .await;
            }
            ctx.metrics.reconcile.set_failure("Service", &e);
            Ok(requeue_with_backoff(&e))
        }
    }
}

async fn write_service_status(
    ctx: &Context,
    ns: &str,
    name: &str,
    status: &translator::StatusSnapshot,
) -> Result<()> {
    let api: Api<Service> = Api::namespaced(ctx.client.clone(), ns);
    let ingress_entries = status_to_ingress_entries(status);
    let patch = json!({ "status": { "loadBalancer": { "ingress": ingress_entries } } });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

fn status_to_ingress_entries(status: &translator::StatusSnapshot) -> Vec<serde_json::Value> {
    let mut entries = Vec::new();
    for hostname in &status.hostnames {
        entries.push(json!({ "hostname": hostname }));
    }
    for ip in status.private_ips.iter().chain(status.public_ips.iter()) {
        entries.push(json!({ "ip": ip }));
    }
    entries
}

fn ingress_input(ingress: &Ingress) -> IngressResourceInput {
    let spec = ingress.spec.clone().unwrap_or_default();
    let default_backend = spec.default_backend.and_then(|b| {
        let svc = b.service?;
        Some(IngressBackendRef {
            service: svc.name,
            port: svc
                .port
                .and_then(|p| p.number.map(|n| n.to_string()).or(p.name))
                .unwrap_or_default(),
        })
    });

    let mut rules = Vec::new();
    for rule in spec.rules.unwrap_or_default() {
        let host = rule.host.clone();
        for path in rule.http.map(|h| h.paths).unwrap_or_default() {
            if let Some(svc) = path.backend.service {
                rules.push(IngressRule {
                    host: host.clone(),
                    path: Some(path.path.unwrap_or_default()),
                    backend: IngressBackendRef {
                        service: svc.name,
                        port: svc
                            .port
                            .and_then(|p| p.number.map(|n| n.to_string()).or(p.name))
                            .unwrap_or_default(),
                    },
                });
            }
        }
    }

    let tls = spec
        .tls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.secret_name)
        .map(|secret_name| IngressTls { secret_name })
        .collect();

    IngressResourceInput {
        default_backend,
        rules,
        tls,
    }
}

#[instrument(skip(ing, ctx), fields(trace_id))]
async fn reconcile_ingress(ing: Arc<Ingress>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    let _timer = ctx.metrics.reconcile.count_and_measure("Ingress");

    let ns = ing.namespace().unwrap_or_default();
    let name = ing.name_any();
    let object_ref = ing.object_ref(&());

    let in_scope = ing
        .annotations()
        .get(INGRESS_CLASS_ANNOTATION)
        .map(|c| c == ctx.config.ingress_class_name.as_str())
        .unwrap_or(false);

    if !in_scope || ing.meta().deletion_timestamp.is_some() {
        debug!(%name, %ns, "ingress out of scope or being deleted");
        return Ok(Action::await_change());
    }

    let annotations = ing.annotations().clone().into_iter().collect();
    let spec = match poolspec::parse_from_annotations(&annotations, &ctx.config.cluster_name, &ns, &name)
        .map_err(Error::from)
        .and_then(|(spec, _)| poolspec::validate(&spec).map(|_| spec).map_err(Error::from))
    {
        Ok(spec) => spec,
        Err(e) => {
            if let Some(reason) = e.event_reason() {
                emit_event(
                    &ctx,
                    object_ref,
                    TranslatorEvent {
                        severity: translator::EventSeverity::Warning,
                        reason,
                        message: e.to_string(),
                    },
                )
                .await;
            }
            ctx.metrics.reconcile.set_failure("Ingress", &e);
            return Ok(requeue_with_backoff(&e));
        }
    };

    let has_existing_status = ing
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| !ingress.is_empty())
        .unwrap_or(false);

    let input = ingress_input(&ing);
    let owner = Owner {
        cluster: &ctx.config.cluster_name,
        namespace: &ns,
        resource: &name,
    };

    let outcome = translator::translate_ingress(
        owner,
        &input,
        &spec,
        &crate::cache::KubeResourceCache::new(ctx.client.clone()),
        ctx.secret_reflector.as_ref(),
        ctx.pool_client.as_ref(),
        has_existing_status,
    )
    .await;

    match outcome {
        Ok(outcome) => {
            for event in outcome.events {
                emit_event(&ctx, object_ref.clone(), event).await;
            }
            if let Some(status) = outcome.status {
                write_ingress_status(&ctx, &ns, &name, &status).await?;
            }
            Ok(Action::requeue(Duration::from_secs(ctx.config.resync_period_seconds)))
        }
        Err(e) => {
            if let Some(reason) = e.event_reason() {
                emit_event(
                    &ctx,
                    object_ref,
                    TranslatorEvent {
                        severity: translator::EventSeverity::Warning,
                        reason,
                        message: e.to_string(),
                    },
                )
                .await;
            }
            ctx.metrics.reconcile.set_failure("Ingress", &e);
            Ok(requeue_with_backoff(&e))
        }
    }
}

async fn write_ingress_status(
    ctx: &Context,
    ns: &str,
    name: &str,
    status: &translator::StatusSnapshot,
) -> Result<()> {
    let api: Api<Ingress> = Api::namespaced(ctx.client.clone(), ns);
    let ingress_entries = status_to_ingress_entries(status);
    let patch = json!({ "status": { "loadBalancer": { "ingress": ingress_entries } } });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

pub(crate) fn error_policy_service(_svc: Arc<Service>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(error = %error, "service reconcile failed");
    ctx.metrics.reconcile.set_failure("Service", error);
    requeue_with_backoff(error)
}

pub(crate) fn error_policy_ingress(_ing: Arc<Ingress>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(error = %error, "ingress reconcile failed");
    ctx.metrics.reconcile.set_failure("Ingress", error);
    requeue_with_backoff(error)
}

/// Runs both `Controller` instances (Service, Ingress) to completion, i.e.
/// until shutdown via SIGINT/SIGTERM.
pub async fn run(client: Client, ctx: Arc<Context>) {
    let services = Api::<Service>::all(client.clone());
    let ingresses = Api::<Ingress>::all(client.clone());

    let resync = Duration::from_secs(ctx.config.resync_period_seconds);

    let service_controller = Controller::new(services, WatcherConfig::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile_service, error_policy_service, ctx.clone())
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()));

    let ingress_controller = Controller::new(ingresses, WatcherConfig::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile_ingress, error_policy_ingress, ctx.clone())
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()));

    info!(resync_seconds = resync.as_secs(), "starting reconciliation loops");
    tokio::join!(service_controller, ingress_controller);
}
