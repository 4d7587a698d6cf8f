//! AttributeBridge trait: the foreign runtime contract
//!
//! The mirroring engine reaches the foreign runtime only through these five
//! operations. Any runtime that can identify, describe, enumerate, read and
//! write attributes of its objects can be mirrored without engine changes.
//!
//! Implementations must be safe to call from several threads at once if
//! more than one wrap session runs concurrently. The engine does not
//! serialize bridge calls across sessions.

use std::sync::Arc;

use crate::error::BridgeResult;
use crate::value::{ForeignId, ForeignRef, ForeignValue};

/// Narrow callback interface into the foreign runtime.
pub trait AttributeBridge: Send + Sync {
    /// Numeric identity of the object, stable while it is alive
    fn identify(&self, reference: ForeignRef) -> BridgeResult<ForeignId>;

    /// Printable form of the object (diagnostics only)
    fn describe(&self, reference: ForeignRef) -> BridgeResult<String>;

    /// Ordered element references of an array-shaped object
    fn enumerate_elements(&self, reference: ForeignRef) -> BridgeResult<Vec<ForeignRef>>;

    /// Read a named attribute
    fn get_attribute(&self, reference: ForeignRef, name: &str) -> BridgeResult<ForeignValue>;

    /// Write a named attribute
    fn set_attribute(
        &self,
        reference: ForeignRef,
        name: &str,
        value: ForeignValue,
    ) -> BridgeResult<()>;
}

/// Bridge whose writes are acknowledged and dropped.
///
/// Reads forward to the wrapped bridge. Used for mirrors of shared,
/// immutable facts.
#[derive(Clone)]
pub struct ReadOnlyBridge {
    inner: Arc<dyn AttributeBridge>,
}

impl ReadOnlyBridge {
    /// Wrap a bridge, discarding its writes
    pub fn new(inner: Arc<dyn AttributeBridge>) -> Self {
        Self { inner }
    }

    /// The bridge reads are forwarded to
    pub fn inner(&self) -> &Arc<dyn AttributeBridge> {
        &self.inner
    }
}

impl AttributeBridge for ReadOnlyBridge {
    fn identify(&self, reference: ForeignRef) -> BridgeResult<ForeignId> {
        self.inner.identify(reference)
    }

    fn describe(&self, reference: ForeignRef) -> BridgeResult<String> {
        self.inner.describe(reference)
    }

    fn enumerate_elements(&self, reference: ForeignRef) -> BridgeResult<Vec<ForeignRef>> {
        self.inner.enumerate_elements(reference)
    }

    fn get_attribute(&self, reference: ForeignRef, name: &str) -> BridgeResult<ForeignValue> {
        self.inner.get_attribute(reference, name)
    }

    fn set_attribute(
        &self,
        _reference: ForeignRef,
        _name: &str,
        _value: ForeignValue,
    ) -> BridgeResult<()> {
        Ok(())
    }
}
