//! Umbra SDK - the foreign runtime side of the mirroring contract
//!
//! This crate holds the types a foreign runtime integration needs in order
//! to be mirrored by `umbra-engine`, without depending on the engine:
//!
//! - `ForeignRef` / `ForeignId` / `ForeignValue`: handles, identities and
//!   values crossing the boundary
//! - `AttributeBridge`: the five-operation callback contract
//! - `BridgeCallbacks`: write-once closure slots implementing the contract
//! - `ReadOnlyBridge`: a bridge whose writes are no-ops
//! - `InMemoryRuntime`: a reference foreign heap
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use umbra_sdk::{BridgeCallbacks, ForeignId};
//!
//! let callbacks = Arc::new(BridgeCallbacks::new());
//! callbacks.install_identify(|r| Ok(ForeignId::new(r.to_bits())))?;
//! callbacks.install_describe(|r| Ok(format!("object {:#x}", r.to_bits())))?;
//! // ... enumerate-elements, get-attribute, set-attribute
//! ```

#![warn(missing_docs)]

pub mod bridge;
pub mod callbacks;
pub mod error;
pub mod memory;
pub mod value;

pub use bridge::{AttributeBridge, ReadOnlyBridge};
pub use callbacks::{
    BridgeCallbacks, DescribeFn, EnumerateFn, GetAttributeFn, IdentifyFn, SetAttributeFn,
};
pub use error::{BridgeError, BridgeResult, CallbackSlot};
pub use memory::InMemoryRuntime;
pub use value::{ForeignId, ForeignRef, ForeignValue};
