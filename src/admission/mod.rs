//! HTTPS admission webhook validating and defaulting `Service` and `Ingress`
//! resources ahead of the informer. Failure-policy is `Ignore`: admission is
//! best-effort, reconciliation is authoritative.

mod patch;

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse, Responder};
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    DynamicObject, TypeMeta,
};
use kube::ResourceExt;
use tracing::{debug, instrument, warn, Span};

use crate::config::Config;
use crate::poolspec;
use crate::telemetry;
use crate::INGRESS_CLASS_ANNOTATION;

fn type_meta() -> TypeMeta {
    TypeMeta {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
    }
}

fn review(request: AdmissionRequest<DynamicObject>, response: AdmissionResponse) -> AdmissionReview<DynamicObject> {
    AdmissionReview {
        types: type_meta(),
        request: Some(request),
        response: Some(response),
    }
}

fn in_scope(request: &AdmissionRequest<DynamicObject>) -> bool {
    match request.kind.kind.as_str() {
        "Service" => request
            .object
            .as_ref()
            .and_then(|svc| svc.data.get("spec"))
            .and_then(|spec| spec.get("type"))
            .and_then(|t| t.as_str())
            .map(|t| t == "LoadBalancer")
            .unwrap_or(false),
        "Ingress" => request
            .object
            .as_ref()
            .map(|obj| {
                obj.annotations()
                    .get(INGRESS_CLASS_ANNOTATION)
                    .map(|c| c == "edgelb")
                    .unwrap_or(false)
            })
            .unwrap_or(false),
        _ => false,
    }
}

fn owner_triple(cluster: &str, object: &DynamicObject) -> (String, String, String) {
    (
        cluster.to_string(),
        object.metadata.namespace.clone().unwrap_or_default(),
        object.metadata.name.clone().unwrap_or_default(),
    )
}

/// `POST /admissionrequests`. Handles both Service and Ingress review
/// objects, distinguished at runtime by `request.kind.kind`.
#[instrument(skip(body, config), fields(trace_id))]
#[post("/admissionrequests")]
async fn admit(
    body: web::Json<AdmissionReview<DynamicObject>>,
    config: web::Data<Arc<Config>>,
) -> impl Responder {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", tracing::field::display(&trace_id));

    let request: AdmissionRequest<DynamicObject> = match body.into_inner().try_into() {
        Ok(request) => request,
        Err(_) => return HttpResponse::BadRequest().body("expected AdmissionRequest"),
    };

    if !in_scope(&request) {
        debug!(kind = %request.kind.kind, "resource outside controller purview, allowing unchanged");
        return HttpResponse::Ok().json(review(request.clone(), AdmissionResponse::from(&request)));
    }

    let object = match &request.object {
        Some(object) => object.clone(),
        None => return HttpResponse::BadRequest().body("expected object body"),
    };

    let (cluster, namespace, name) = owner_triple(&config.cluster_name, &object);
    let annotations: BTreeMap<String, String> = object.annotations().clone().into_iter().collect();

    let spec = match poolspec::parse_from_annotations(&annotations, &cluster, &namespace, &name) {
        Ok((spec, _source)) => spec,
        Err(e) => {
            let response = AdmissionResponse::from(&request).deny(e.to_string());
            return HttpResponse::Ok().json(review(request, response));
        }
    };

    if let Err(e) = poolspec::validate(&spec) {
        let response = AdmissionResponse::from(&request).deny(e.to_string());
        return HttpResponse::Ok().json(review(request, response));
    }

    if request.operation == kube::core::admission::Operation::Update {
        if let Some(old_object) = &request.old_object {
            if in_scope_object(&request.kind.kind, old_object) {
                let old_annotations: BTreeMap<String, String> =
                    old_object.annotations().clone().into_iter().collect();
                match poolspec::parse_from_annotations(&old_annotations, &cluster, &namespace, &name) {
                    Ok((previous, _)) => {
                        if let Err(e) = poolspec::validate_transition(&previous, &spec) {
                            let response = AdmissionResponse::from(&request).deny(e.to_string());
                            return HttpResponse::Ok().json(review(request, response));
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "previous generation's spec failed to parse; skipping transition check");
                    }
                }
            }
        }
    }

    let mutated = patch::apply_defaulted_spec(&object, &spec);
    let response = match patch::compute_patch(&object, &mutated) {
        Some(json_patch) => match AdmissionResponse::from(&request).with_patch(json_patch) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "failed to attach admission patch");
                AdmissionResponse::from(&request)
            }
        },
        None => AdmissionResponse::from(&request),
    };

    HttpResponse::Ok().json(review(request, response))
}

fn in_scope_object(kind: &str, object: &DynamicObject) -> bool {
    match kind {
        "Service" => object
            .data
            .get("spec")
            .and_then(|spec| spec.get("type"))
            .and_then(|t| t.as_str())
            .map(|t| t == "LoadBalancer")
            .unwrap_or(false),
        "Ingress" => object
            .annotations()
            .get(INGRESS_CLASS_ANNOTATION)
            .map(|c| c == "edgelb")
            .unwrap_or(false),
        _ => false,
    }
}

#[get("/healthz")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(admit).service(health);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_object(json: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json).expect("valid DynamicObject JSON")
    }

    #[test]
    fn service_without_loadbalancer_type_is_out_of_scope() {
        let object = dynamic_object(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web", "namespace": "ns"},
            "spec": {"type": "ClusterIP"},
        }));
        assert!(!in_scope_object("Service", &object));
    }

    #[test]
    fn loadbalancer_service_is_in_scope() {
        let object = dynamic_object(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web", "namespace": "ns"},
            "spec": {"type": "LoadBalancer"},
        }));
        assert!(in_scope_object("Service", &object));
    }

    #[test]
    fn ingress_without_edgelb_class_is_out_of_scope() {
        let object = dynamic_object(serde_json::json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {"name": "ing", "namespace": "ns"},
        }));
        assert!(!in_scope_object("Ingress", &object));
    }
}
