/// Expose all controller components used by main
pub mod controller;
pub use crate::controller::*;

pub mod admission;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod errors;
pub mod lbclient;
pub mod naming;
pub mod poolspec;
pub mod retry;
pub mod secret_reflector;
/// Log and trace integrations
pub mod telemetry;
pub mod translator;

mod metrics;
pub use metrics::Metrics;

pub use errors::{Error, Result};

/// The ingress class this controller reconciles by default; overridable via `--ingress-class-name`.
pub const DEFAULT_INGRESS_CLASS: &str = "edgelb";

/// Annotation carrying the structured pool-spec YAML body.
pub const DKLB_CONFIG_ANNOTATION: &str = "kubernetes.dcos.io/dklb-config";

/// Legacy discrete-annotation prefix, kept for backward compatibility with pre-YAML configs.
pub const LEGACY_ANNOTATION_PREFIX: &str = "kubernetes.dcos.io/edgelb-pool-";

/// Kubernetes' own ingress-class annotation, consulted to determine whether an Ingress is in scope.
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
