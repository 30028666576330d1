use thiserror::Error;

/// Crate-level error taxonomy. Every variant maps onto one of the error classes
/// from the reconciliation design: `NotFound` is a control-flow branch, never
/// surfaced to users; `Validation` and `BackendResolution` are user-caused and
/// not retried on their own; `ExternalTransient` and `StatusRead` are retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Finalizer error: {0}")]
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("SerializationError: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YamlSerializationError: {0}")]
    YamlSerializationError(#[from] serde_yaml::Error),

    #[error("pool-spec is invalid: {0}")]
    Validation(#[from] crate::poolspec::PoolSpecError),

    #[error("pool name is not resolvable: {0}")]
    NamingError(#[from] crate::naming::NamingError),

    #[error("backend could not be resolved: {0}")]
    BackendResolution(String),

    #[error("cloud-provider config could not be resolved: {0}")]
    ConfigResolution(String),

    #[error("external-LB pool not found: {0}")]
    NotFound(String),

    #[error("external-LB request failed: {0}")]
    ExternalTransient(String),

    #[error("could not read pool status: {0}")]
    StatusRead(String),

    #[error("admission request was malformed: {0}")]
    AdmissionError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Lowercased variant name, used as a metrics label and as the basis for
    /// the Kubernetes event reason chosen by the reconciler.
    pub fn metric_label(&self) -> String {
        match self {
            Error::KubeError(_) => "kube_error",
            Error::FinalizerError(_) => "finalizer_error",
            Error::SerializationError(_) => "serialization_error",
            Error::YamlSerializationError(_) => "serialization_error",
            Error::Validation(_) => "invalid_annotations",
            Error::NamingError(_) => "invalid_annotations",
            Error::BackendResolution(_) => "invalid_backend_service",
            Error::ConfigResolution(_) => "invalid_annotations",
            Error::NotFound(_) => "not_found",
            Error::ExternalTransient(_) => "translation_error",
            Error::StatusRead(_) => "status_read_error",
            Error::AdmissionError(_) => "admission_error",
        }
        .to_string()
    }

    /// The Kubernetes event reason this error should be reported under, if any.
    /// `NotFound` and `StatusRead` never reach the event recorder: the former is
    /// a control-flow branch, the latter is logged and swallowed.
    pub fn event_reason(&self) -> Option<&'static str> {
        match self {
            Error::Validation(_) | Error::NamingError(_) => Some("InvalidAnnotations"),
            Error::BackendResolution(_) => Some("InvalidBackendService"),
            Error::ConfigResolution(_) => Some("InvalidAnnotations"),
            Error::ExternalTransient(_) | Error::KubeError(_) => Some("TranslationError"),
            Error::SerializationError(_) | Error::YamlSerializationError(_) => {
                Some("InvalidAnnotations")
            }
            Error::NotFound(_) | Error::StatusRead(_) | Error::AdmissionError(_) => None,
            Error::FinalizerError(_) => Some("TranslationError"),
        }
    }

    /// Whether the reconciler should requeue this error with backoff rather than
    /// waiting for the next resource change.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::ExternalTransient(_) | Error::KubeError(_) | Error::FinalizerError(_)
        )
    }
}
