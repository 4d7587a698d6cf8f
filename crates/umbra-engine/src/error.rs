//! Mirroring error types.
//!
//! Every error is fatal to the session it occurs in. Nothing is retried; the
//! caller fixes the schema or bridge setup and wraps again from scratch.

use umbra_sdk::{BridgeError, CallbackSlot};

use crate::config::ConfigError;

/// Result type for engine operations
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors raised while synthesizing classes or wrapping foreign graphs.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// A bridge callback was used before it was installed
    #[error("Bridge callback '{0}' was never installed")]
    MissingBridgeCallback(CallbackSlot),

    /// A foreign value's shape does not match its declared type
    #[error("Schema mismatch on {object}: {detail}")]
    SchemaMismatch {
        /// Printable form of the offending foreign object
        object: String,
        /// What did not match
        detail: String,
    },

    /// No accessor can be generated for the declared type
    #[error("Unsupported type '{type_name}' for property '{property}' of class '{class}'")]
    UnsupportedPropertyType {
        /// Class being synthesized
        class: String,
        /// Property name
        property: String,
        /// Declared type
        type_name: String,
    },

    /// Two synthesis requests for one class were not serialized
    #[error("Class '{0}' was defined twice concurrently")]
    DuplicateDefinitionRace(String),

    /// A bridge callback failed
    #[error("Bridge call failed on {object}: {source}")]
    Bridge {
        /// Printable form of the foreign object being accessed
        object: String,
        /// Underlying bridge error
        #[source]
        source: BridgeError,
    },

    /// A mirror type names a class that was never defined
    #[error("Mirror class '{0}' is not defined")]
    UnknownClass(String),

    /// A name is already used by another kind of class
    #[error("Class '{name}' is already defined as {existing}, cannot redefine as {requested}")]
    DefinitionConflict {
        /// Qualified class name
        name: String,
        /// Kind already registered
        existing: &'static str,
        /// Kind requested
        requested: &'static str,
    },

    /// The schema itself is malformed
    #[error("Invalid schema for class '{class}': {detail}")]
    InvalidSchema {
        /// Class being synthesized
        class: String,
        /// What is wrong
        detail: String,
    },

    /// Method or property lookup failed on a mirror class
    #[error("Class '{class}' has no member '{member}'")]
    UnknownMember {
        /// Class name
        class: String,
        /// Requested member
        member: String,
    },

    /// An adapter was invoked with the wrong method or arity
    #[error("Adapter '{class}' mismatch: {detail}")]
    AdapterMismatch {
        /// Adapter class name
        class: String,
        /// What did not match
        detail: String,
    },

    /// A handle does not refer to a slot of the expected kind
    #[error("Handle {0} does not refer to a {1}")]
    InvalidHandle(usize, &'static str),

    /// The session manager was set up with an unusable configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A wrap session was aborted
    #[error("A problem occurred when wrapping the foreign object ({object}). {hint}")]
    Session {
        /// Printable form of the root foreign object
        object: String,
        /// Suspected schema cause
        hint: String,
        /// Underlying error
        #[source]
        source: Box<MirrorError>,
    },
}

impl MirrorError {
    /// Wrap a bridge failure, lifting a missing callback to its own kind
    pub fn bridge(object: impl Into<String>, source: BridgeError) -> Self {
        match source {
            BridgeError::MissingCallback { slot } => MirrorError::MissingBridgeCallback(slot),
            source => MirrorError::Bridge {
                object: object.into(),
                source,
            },
        }
    }

    /// The innermost error, looking through session wrappers
    pub fn root_cause(&self) -> &MirrorError {
        match self {
            MirrorError::Session { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
