//! Write-once bridge callback slots
//!
//! `BridgeCallbacks` is the bridge a foreign runtime fills in at startup by
//! handing over five closures. Each slot accepts exactly one install; reads
//! after that are lock-free. Using a slot that was never filled fails with
//! `BridgeError::MissingCallback` rather than panicking, so a half-installed
//! bridge surfaces as an ordinary session error.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::bridge::AttributeBridge;
use crate::error::{BridgeError, BridgeResult, CallbackSlot};
use crate::value::{ForeignId, ForeignRef, ForeignValue};

/// `identify` callback
pub type IdentifyFn = Arc<dyn Fn(ForeignRef) -> BridgeResult<ForeignId> + Send + Sync>;
/// `describe` callback
pub type DescribeFn = Arc<dyn Fn(ForeignRef) -> BridgeResult<String> + Send + Sync>;
/// `enumerate-elements` callback
pub type EnumerateFn = Arc<dyn Fn(ForeignRef) -> BridgeResult<Vec<ForeignRef>> + Send + Sync>;
/// `get-attribute` callback
pub type GetAttributeFn =
    Arc<dyn Fn(ForeignRef, &str) -> BridgeResult<ForeignValue> + Send + Sync>;
/// `set-attribute` callback
pub type SetAttributeFn =
    Arc<dyn Fn(ForeignRef, &str, ForeignValue) -> BridgeResult<()> + Send + Sync>;

/// Contents of the set-attribute slot
#[derive(Clone)]
enum SetterSlot {
    Forward(SetAttributeFn),
    /// Sentinel: acknowledge and drop every write
    Noop,
}

/// Five write-once callback slots implementing `AttributeBridge`.
#[derive(Default)]
pub struct BridgeCallbacks {
    identify: OnceCell<IdentifyFn>,
    describe: OnceCell<DescribeFn>,
    enumerate: OnceCell<EnumerateFn>,
    get_attribute: OnceCell<GetAttributeFn>,
    set_attribute: OnceCell<SetterSlot>,
}

fn install<T>(cell: &OnceCell<T>, slot: CallbackSlot, value: T) -> BridgeResult<()> {
    cell.set(value)
        .map_err(|_| BridgeError::AlreadyInstalled { slot })
}

fn installed<T>(cell: &OnceCell<T>, slot: CallbackSlot) -> BridgeResult<&T> {
    cell.get().ok_or(BridgeError::MissingCallback { slot })
}

impl BridgeCallbacks {
    /// Create an empty set of slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the `identify` callback
    pub fn install_identify(
        &self,
        f: impl Fn(ForeignRef) -> BridgeResult<ForeignId> + Send + Sync + 'static,
    ) -> BridgeResult<()> {
        let f: IdentifyFn = Arc::new(f);
        install(&self.identify, CallbackSlot::Identify, f)
    }

    /// Install the `describe` callback
    pub fn install_describe(
        &self,
        f: impl Fn(ForeignRef) -> BridgeResult<String> + Send + Sync + 'static,
    ) -> BridgeResult<()> {
        let f: DescribeFn = Arc::new(f);
        install(&self.describe, CallbackSlot::Describe, f)
    }

    /// Install the `enumerate-elements` callback
    pub fn install_enumerate_elements(
        &self,
        f: impl Fn(ForeignRef) -> BridgeResult<Vec<ForeignRef>> + Send + Sync + 'static,
    ) -> BridgeResult<()> {
        let f: EnumerateFn = Arc::new(f);
        install(&self.enumerate, CallbackSlot::EnumerateElements, f)
    }

    /// Install the `get-attribute` callback
    pub fn install_get_attribute(
        &self,
        f: impl Fn(ForeignRef, &str) -> BridgeResult<ForeignValue> + Send + Sync + 'static,
    ) -> BridgeResult<()> {
        let f: GetAttributeFn = Arc::new(f);
        install(&self.get_attribute, CallbackSlot::GetAttribute, f)
    }

    /// Install the `set-attribute` callback
    pub fn install_set_attribute(
        &self,
        f: impl Fn(ForeignRef, &str, ForeignValue) -> BridgeResult<()> + Send + Sync + 'static,
    ) -> BridgeResult<()> {
        let f: SetAttributeFn = Arc::new(f);
        install(&self.set_attribute, CallbackSlot::SetAttribute, SetterSlot::Forward(f))
    }

    /// Fill the `set-attribute` slot with the no-op sentinel
    pub fn install_noop_setter(&self) -> BridgeResult<()> {
        install(&self.set_attribute, CallbackSlot::SetAttribute, SetterSlot::Noop)
    }

    /// Install all five callbacks from another bridge
    pub fn install_from(&self, bridge: Arc<dyn AttributeBridge>) -> BridgeResult<()> {
        let b = bridge.clone();
        self.install_identify(move |r| b.identify(r))?;
        let b = bridge.clone();
        self.install_describe(move |r| b.describe(r))?;
        let b = bridge.clone();
        self.install_enumerate_elements(move |r| b.enumerate_elements(r))?;
        let b = bridge.clone();
        self.install_get_attribute(move |r, name| b.get_attribute(r, name))?;
        self.install_set_attribute(move |r, name, value| bridge.set_attribute(r, name, value))
    }

    /// Whether the setter slot holds the no-op sentinel
    pub fn is_read_only(&self) -> bool {
        matches!(self.set_attribute.get(), Some(SetterSlot::Noop))
    }

    /// Slots that have not been installed yet
    pub fn missing(&self) -> Vec<CallbackSlot> {
        CallbackSlot::ALL
            .into_iter()
            .filter(|slot| !self.is_installed(*slot))
            .collect()
    }

    /// Check whether all five slots are filled
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    fn is_installed(&self, slot: CallbackSlot) -> bool {
        match slot {
            CallbackSlot::Identify => self.identify.get().is_some(),
            CallbackSlot::Describe => self.describe.get().is_some(),
            CallbackSlot::EnumerateElements => self.enumerate.get().is_some(),
            CallbackSlot::GetAttribute => self.get_attribute.get().is_some(),
            CallbackSlot::SetAttribute => self.set_attribute.get().is_some(),
        }
    }
}

impl std::fmt::Debug for BridgeCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeCallbacks")
            .field("missing", &self.missing())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl AttributeBridge for BridgeCallbacks {
    fn identify(&self, reference: ForeignRef) -> BridgeResult<ForeignId> {
        let f = installed(&self.identify, CallbackSlot::Identify)?;
        f(reference)
    }

    fn describe(&self, reference: ForeignRef) -> BridgeResult<String> {
        let f = installed(&self.describe, CallbackSlot::Describe)?;
        f(reference)
    }

    fn enumerate_elements(&self, reference: ForeignRef) -> BridgeResult<Vec<ForeignRef>> {
        let f = installed(&self.enumerate, CallbackSlot::EnumerateElements)?;
        f(reference)
    }

    fn get_attribute(&self, reference: ForeignRef, name: &str) -> BridgeResult<ForeignValue> {
        let f = installed(&self.get_attribute, CallbackSlot::GetAttribute)?;
        f(reference, name)
    }

    fn set_attribute(
        &self,
        reference: ForeignRef,
        name: &str,
        value: ForeignValue,
    ) -> BridgeResult<()> {
        match installed(&self.set_attribute, CallbackSlot::SetAttribute)? {
            SetterSlot::Forward(f) => f(reference, name, value),
            SetterSlot::Noop => Ok(()),
        }
    }
}
