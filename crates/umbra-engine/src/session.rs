//! Session lifecycle
//!
//! A session is one top-level wrap: a fresh identity map and arena, the
//! wrap itself, and optionally the refresh pass over a fork of that map.
//! Sessions share only the class registry and the policy switch, so any
//! number may run on separate threads against a thread-safe bridge.
//!
//! A failed session is abandoned. The caller gets `MirrorError::Session`
//! and nothing built so far is kept.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, debug_span, warn};
use umbra_sdk::{AttributeBridge, ForeignRef, ReadOnlyBridge};

use crate::arena::MirrorArena;
use crate::config::{ConfigError, MirrorConfig};
use crate::error::{MirrorError, MirrorResult};
use crate::graph::MirrorGraph;
use crate::identity::IdentityMap;
use crate::policy::{PolicySwitch, WritePolicy};
use crate::registry::MirrorClassRegistry;
use crate::schema::NativeType;
use crate::wrap::{GraphWrapper, RefreshReport};

/// Identifier of one wrap session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Raw id
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Which bridge a graph's setters write through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Mutable problem: setters reach the foreign runtime
    Problem,
    /// Shared immutable fact: setters only update the mirror
    Fact,
}

/// Runs wrap sessions against one bridge and one class registry.
pub struct SessionManager {
    bridge: Arc<dyn AttributeBridge>,
    read_only: Arc<dyn AttributeBridge>,
    registry: Arc<MirrorClassRegistry>,
    config: MirrorConfig,
    policy: PolicySwitch,
    next_session: AtomicU64,
}

impl SessionManager {
    /// Create a manager. The policy switch starts at `config.write_policy`.
    ///
    /// The configuration is validated and its `class-prefix` must be the
    /// prefix `registry` qualifies names with.
    pub fn new(
        bridge: Arc<dyn AttributeBridge>,
        registry: Arc<MirrorClassRegistry>,
        config: MirrorConfig,
    ) -> MirrorResult<Self> {
        config.validate()?;
        if registry.prefix() != config.class_prefix.as_str() {
            return Err(ConfigError::Invalid(format!(
                "class-prefix '{}' does not match the registry prefix '{}'",
                config.class_prefix,
                registry.prefix()
            ))
            .into());
        }
        let read_only: Arc<dyn AttributeBridge> = Arc::new(ReadOnlyBridge::new(bridge.clone()));
        Ok(Self {
            bridge,
            read_only,
            registry,
            policy: PolicySwitch::new(config.write_policy),
            config,
            next_session: AtomicU64::new(0),
        })
    }

    /// Create a manager with a fresh registry built from `config`
    pub fn with_config(
        bridge: Arc<dyn AttributeBridge>,
        config: MirrorConfig,
    ) -> MirrorResult<Self> {
        let registry = Arc::new(MirrorClassRegistry::from_config(&config));
        Self::new(bridge, registry, config)
    }

    /// Class registry
    pub fn registry(&self) -> &Arc<MirrorClassRegistry> {
        &self.registry
    }

    /// Configuration this manager was created with
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The write policy switch shared by every graph of this manager
    pub fn policy(&self) -> &PolicySwitch {
        &self.policy
    }

    /// Change the write policy, returning the previous one
    pub fn set_write_policy(&self, policy: WritePolicy) -> WritePolicy {
        let previous = self.policy.set(policy);
        debug!(from = ?previous, to = ?policy, "write policy changed");
        previous
    }

    /// Wrap a mutable problem rooted at `reference`
    pub fn wrap_problem(&self, class: &str, reference: ForeignRef) -> MirrorResult<MirrorGraph> {
        self.wrap_graph(&NativeType::Mirror(class.to_string()), Some(reference), WrapMode::Problem)
    }

    /// Wrap a shared fact rooted at `reference`; its setters never reach
    /// the foreign runtime
    pub fn wrap_fact(&self, class: &str, reference: ForeignRef) -> MirrorResult<MirrorGraph> {
        self.wrap_graph(&NativeType::Mirror(class.to_string()), Some(reference), WrapMode::Fact)
    }

    /// Run one wrap session
    pub fn wrap_graph(
        &self,
        target: &NativeType,
        reference: Option<ForeignRef>,
        mode: WrapMode,
    ) -> MirrorResult<MirrorGraph> {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed) + 1);
        let span = debug_span!("wrap_session", session = session.get(), mode = ?mode);
        let _enter = span.enter();

        let bridge = match mode {
            WrapMode::Problem => Arc::clone(&self.bridge),
            WrapMode::Fact => Arc::clone(&self.read_only),
        };
        let mut arena = MirrorArena::new();
        let mut ids = IdentityMap::new();
        let wrapper = GraphWrapper::new(bridge.as_ref(), &self.registry);

        let mut refreshed = IdentityMap::new();
        let outcome = wrapper
            .wrap(target, reference, &mut arena, &mut ids)
            .and_then(|root| {
                if self.config.refresh_after_wrap {
                    let mut fork = ids.fork();
                    let report = wrapper.refresh(&root, &mut arena, &mut fork)?;
                    refreshed = fork.without(&ids);
                    log_refresh(&report);
                }
                Ok(root)
            });

        match outcome {
            Ok(root) => {
                debug!(mirrors = ids.len(), slots = arena.len(), "wrapped graph");
                Ok(MirrorGraph {
                    session,
                    mode,
                    arena,
                    ids,
                    refreshed,
                    root,
                    bridge,
                    policy: self.policy.clone(),
                })
            }
            Err(error) => {
                let object = reference
                    .map(|r| wrapper.printable(r))
                    .unwrap_or_else(|| "null".to_string());
                Err(abort(object, error))
            }
        }
    }

    /// Run the refresh pass over an existing graph.
    ///
    /// The pass runs against a copy of the graph's arena and a fork of its
    /// identity map. Objects first seen by a refresh get mirrors that the
    /// graph's own map never learns about; they are kept in
    /// `MirrorGraph::refreshed_map` and reused by later passes.
    ///
    /// The graph is only updated when the whole pass succeeds. On failure
    /// it is left exactly as it was.
    pub fn refresh(&self, graph: &mut MirrorGraph) -> MirrorResult<RefreshReport> {
        let span = debug_span!("refresh", session = graph.session.get());
        let _enter = span.enter();

        let wrapper = GraphWrapper::new(graph.bridge.as_ref(), &self.registry);
        let mut staged = graph.arena.clone();
        let mut fork = graph.ids.fork_with(&graph.refreshed);
        let root = graph.root.clone();
        match wrapper.refresh(&root, &mut staged, &mut fork) {
            Ok(report) => {
                graph.arena = staged;
                graph.refreshed = fork.without(&graph.ids);
                log_refresh(&report);
                Ok(report)
            }
            Err(error) => {
                let object = match root.handle() {
                    Some(handle) => graph
                        .arena
                        .foreign_ref(handle)
                        .map(|r| wrapper.printable(r))
                        .unwrap_or_else(|_| format!("mirror {}", handle)),
                    None => "null".to_string(),
                };
                Err(abort(object, error))
            }
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("policy", &self.policy.get())
            .finish()
    }
}

fn log_refresh(report: &RefreshReport) {
    debug!(
        instances = report.instances,
        sequences = report.sequences,
        skipped = report.skipped,
        created = report.created,
        "refresh pass complete"
    );
}

fn abort(object: String, error: MirrorError) -> MirrorError {
    warn!(object = %object, error = %error, "wrap session aborted");
    MirrorError::Session {
        object,
        hint: hint_for(&error).to_string(),
        source: Box::new(error),
    }
}

/// Suspected schema cause of a failure
fn hint_for(error: &MirrorError) -> &'static str {
    match error.root_cause() {
        MirrorError::SchemaMismatch { .. } => {
            "Maybe a property was declared with an incorrect type (for example, a \
             collection type on a value that is not array-shaped, or a mirror type on a scalar)."
        }
        MirrorError::UnsupportedPropertyType { .. } => {
            "Maybe a property was declared with a type that has no mirror representation."
        }
        MirrorError::UnknownClass(_) => {
            "Maybe a mirror class referenced by the schema was never defined."
        }
        MirrorError::MissingBridgeCallback(_) => {
            "The foreign runtime did not install every bridge callback before wrapping."
        }
        MirrorError::Bridge { .. } => {
            "The foreign runtime failed while one of its objects was being read."
        }
        _ => "Check the schema and bridge setup, then wrap again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_looks_through_sessions() {
        let inner = MirrorError::UnknownClass("X".to_string());
        let wrapped = abort("root".to_string(), inner);
        assert!(hint_for(&wrapped).contains("never defined"));
        match wrapped {
            MirrorError::Session { object, hint, .. } => {
                assert_eq!(object, "root");
                assert!(hint.contains("never defined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_session_ids_are_fresh() {
        let manager = SessionManager::new(
            Arc::new(umbra_sdk::InMemoryRuntime::new()),
            Arc::new(MirrorClassRegistry::default()),
            MirrorConfig::default(),
        )
        .unwrap();
        let a = manager.wrap_graph(&NativeType::Object, None, WrapMode::Problem).unwrap();
        let b = manager.wrap_graph(&NativeType::Object, None, WrapMode::Problem).unwrap();
        assert_ne!(a.session(), b.session());
        assert!(a.root().is_null());
    }

    #[test]
    fn test_prefix_must_match_registry() {
        let config = MirrorConfig {
            class_prefix: "org.acme".to_string(),
            ..MirrorConfig::default()
        };
        let err = SessionManager::new(
            Arc::new(umbra_sdk::InMemoryRuntime::new()),
            Arc::new(MirrorClassRegistry::default()),
            config.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, MirrorError::Config(ConfigError::Invalid(_))));

        let bridge = Arc::new(umbra_sdk::InMemoryRuntime::new());
        let manager = SessionManager::with_config(bridge, config).unwrap();
        assert_eq!(manager.registry().prefix(), "org.acme");
    }
}
