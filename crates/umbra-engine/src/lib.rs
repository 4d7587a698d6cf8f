//! Umbra Engine - mirroring foreign object graphs into native mirrors
//!
//! The engine reaches the foreign runtime only through an
//! `umbra_sdk::AttributeBridge`. From a declarative schema it synthesizes
//! mirror classes, then wraps foreign objects (possibly cyclic, possibly
//! shared) into an arena of mirror instances, one per foreign id per
//! session.
//!
//! # Architecture
//!
//! - `schema`: property descriptors, native types and type refinement
//! - `class` / `adapter`: synthesized mirror and single-method adapter classes
//! - `registry`: the process-wide class registry
//! - `arena` / `identity`: per-session mirror storage and identity map
//! - `wrap`: the recursive graph wrapper and the refresh pass
//! - `graph`: accessors, setters and resync over a wrapped graph
//! - `session`: session lifecycle and failure reporting
//! - `policy` / `config`: write policy switch and configuration
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use umbra_engine::{
//!     ClassKind, MirrorClassRegistry, MirrorConfig, MirrorSchema, NativeType, SessionManager,
//! };
//!
//! let registry = Arc::new(MirrorClassRegistry::default());
//! registry.define_mirror_class(
//!     "Lesson",
//!     &MirrorSchema::new().property("getSubject", NativeType::Str),
//!     ClassKind::Entity,
//! )?;
//! let manager = SessionManager::new(bridge, registry, MirrorConfig::default())?;
//! let graph = manager.wrap_problem("Lesson", lesson_ref)?;
//! let subject: String = graph.get_as(graph.root_handle().unwrap(), "getSubject")?;
//! ```

#![warn(missing_docs)]

pub mod adapter;
pub mod arena;
pub mod class;
pub mod config;
pub mod error;
pub mod graph;
pub mod identity;
pub mod policy;
pub mod registry;
pub mod schema;
pub mod session;
pub mod value;
pub mod wrap;

pub use adapter::{AdapterClass, AdapterContract, AdapterFn, AdapterInstance};
pub use arena::{MirrorArena, MirrorInstance, MirrorSequence};
pub use class::{
    setter_name_for, ClassId, Member, MirrorClass, MirrorClassBuilder, PropertyAccessor,
    DESCRIBE_METHOD, FOREIGN_REF_METHOD,
};
pub use config::{ConfigError, MirrorConfig, DEFAULT_CLASS_PREFIX};
pub use error::{MirrorError, MirrorResult};
pub use graph::MirrorGraph;
pub use identity::IdentityMap;
pub use policy::{PolicySwitch, WritePolicy};
pub use registry::{sanitize_class_name, MirrorClassRegistry};
pub use schema::{refine, ClassKind, MetadataTag, MirrorSchema, NativeType, PropertyDescriptor};
pub use session::{SessionId, SessionManager, WrapMode};
pub use value::{FromMirror, Handle, Value};
pub use wrap::{GraphWrapper, RefreshReport};

pub use umbra_sdk;
