//! Error types for the bridge contract

use std::fmt;

/// Result type for bridge calls
pub type BridgeResult<T> = Result<T, BridgeError>;

/// The five callback slots of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSlot {
    /// `identify(ref) -> id`
    Identify,
    /// `describe(ref) -> string`
    Describe,
    /// `enumerate-elements(ref) -> [ref]`
    EnumerateElements,
    /// `get-attribute(ref, name) -> value`
    GetAttribute,
    /// `set-attribute(ref, name, value) -> ack`
    SetAttribute,
}

impl CallbackSlot {
    /// All slots, in contract order
    pub const ALL: [CallbackSlot; 5] = [
        CallbackSlot::Identify,
        CallbackSlot::Describe,
        CallbackSlot::EnumerateElements,
        CallbackSlot::GetAttribute,
        CallbackSlot::SetAttribute,
    ];

    /// Contract name of the slot
    pub const fn name(self) -> &'static str {
        match self {
            CallbackSlot::Identify => "identify",
            CallbackSlot::Describe => "describe",
            CallbackSlot::EnumerateElements => "enumerate-elements",
            CallbackSlot::GetAttribute => "get-attribute",
            CallbackSlot::SetAttribute => "set-attribute",
        }
    }
}

impl fmt::Display for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bridge error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// A callback was used before the foreign runtime installed it
    #[error("Bridge callback '{slot}' was never installed")]
    MissingCallback {
        /// Slot that was empty
        slot: CallbackSlot,
    },

    /// A callback slot was installed twice
    #[error("Bridge callback '{slot}' is already installed")]
    AlreadyInstalled {
        /// Slot that was already filled
        slot: CallbackSlot,
    },

    /// Type mismatch on the foreign side
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// `enumerate-elements` on something that is not array-shaped
    #[error("Foreign object {0:#x} is not array-shaped")]
    NotEnumerable(u64),

    /// The handle no longer refers to a live foreign object
    #[error("Foreign reference {0:#x} is no longer live")]
    StaleReference(u64),

    /// Attribute lookup failed
    #[error("Foreign object has no attribute '{0}'")]
    MissingAttribute(String),

    /// Any other failure reported by a callback
    #[error("{0}")]
    Callback(String),
}

impl From<String> for BridgeError {
    fn from(s: String) -> Self {
        BridgeError::Callback(s)
    }
}

impl From<&str> for BridgeError {
    fn from(s: &str) -> Self {
        BridgeError::Callback(s.to_string())
    }
}
