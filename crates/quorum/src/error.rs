//! Error types for the quorum runtime.

use crate::reflect::RealmId;
use thiserror::Error;

/// Errors surfaced by the public API.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The local contract has no entry for the requested stable id.
    #[error("No bridge contract entry for stable id '{0}'")]
    UnknownContractId(String),

    /// No method on the target class matches the descriptor.
    #[error("Cannot resolve '{stable_id}' ({signature}) on {class}")]
    MethodNotFound {
        stable_id: String,
        signature: String,
        class: String,
    },

    /// A forwarded call failed on the first attempt and on the retry.
    #[error("Failed invoking leader contract id '{stable_id}': {source}")]
    Invocation {
        stable_id: String,
        #[source]
        source: InvokeError,
    },

    /// A forwarded call returned a value of the wrong shape.
    #[error("Unexpected result for contract id '{stable_id}': {source}")]
    Adaptation {
        stable_id: String,
        #[source]
        source: InvokeError,
    },

    /// The owner already has a bound service with this name and implementation.
    #[error("Owner '{owner}' already has a registered service '{service}'")]
    DuplicateRegistration { owner: String, service: String },

    /// The process-wide property store could not be reached.
    #[error("Anchor unavailable: {0}")]
    AnchorUnavailable(#[from] StoreError),

    /// The leader has been shut down.
    #[error("{0} is shut down")]
    Closed(String),

    /// Building or driving the shared worker pool failed.
    #[error("Shared runtime error: {0}")]
    Runtime(String),

    /// A profile lookup failed.
    #[error("Profile lookup failed: {0}")]
    Profile(String),

    /// Invalid configuration request or content.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BridgeError {
    /// Short variant name; carried across the bridge with the message.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::UnknownContractId(_) => "UnknownContractId",
            BridgeError::MethodNotFound { .. } => "MethodNotFound",
            BridgeError::Invocation { .. } => "Invocation",
            BridgeError::Adaptation { .. } => "Adaptation",
            BridgeError::DuplicateRegistration { .. } => "DuplicateRegistration",
            BridgeError::AnchorUnavailable(_) => "AnchorUnavailable",
            BridgeError::Closed(_) => "Closed",
            BridgeError::Runtime(_) => "Runtime",
            BridgeError::Profile(_) => "Profile",
            BridgeError::Config(_) => "Config",
            BridgeError::Http(_) => "Http",
            BridgeError::Io(_) => "Io",
            BridgeError::Json(_) => "Json",
            BridgeError::Toml(_) => "Toml",
        }
    }

    /// Whether this is a duplicate registration, raised locally or by the
    /// leader behind a bridge.
    pub fn is_duplicate_registration(&self) -> bool {
        match self {
            BridgeError::DuplicateRegistration { .. } => true,
            BridgeError::Invocation { source, .. } => source.kind() == Some("DuplicateRegistration"),
            _ => false,
        }
    }
}

/// Result type for quorum operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Failure of one reflective call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The slot does not exist on the target class.
    #[error("{class} has no method in slot {slot}")]
    NoSuchSlot { class: String, slot: usize },

    /// A call handle was used against a class it was not resolved on.
    #[error("handle resolved on {expected} used on {found}")]
    ClassMismatch { expected: String, found: String },

    /// Wrong number of arguments.
    #[error("{method} takes {expected} argument(s), got {found}")]
    Arity {
        method: String,
        expected: usize,
        found: usize,
    },

    /// An argument or result had the wrong shape.
    #[error("expected {expected}, got {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },

    /// The target was shut down.
    #[error("{class} is shut down")]
    Closed { class: String },

    /// The target raised an error.
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },
}

impl InvokeError {
    /// Kind of a raised error.
    pub fn kind(&self) -> Option<&str> {
        match self {
            InvokeError::Raised { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl From<BridgeError> for InvokeError {
    fn from(err: BridgeError) -> Self {
        if let BridgeError::Invocation { source, .. } = &err {
            if let InvokeError::Raised { kind, message } = source {
                return InvokeError::Raised {
                    kind: kind.clone(),
                    message: message.clone(),
                };
            }
        }
        InvokeError::Raised {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// A type check between a type and a class from different realms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("type {type_name} from realm {type_realm} cannot be checked against {class_name} from realm {class_realm}")]
pub struct LinkageError {
    pub type_name: String,
    pub type_realm: RealmId,
    pub class_name: String,
    pub class_realm: RealmId,
}

/// Errors of the process-wide property store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be read or written.
    #[error("property store is unavailable: {0}")]
    Unavailable(String),
}
