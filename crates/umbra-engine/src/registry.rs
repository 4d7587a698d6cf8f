//! Process-wide class registry
//!
//! The registry is created once by the embedder and shared through `Arc`.
//! It owns every synthesized mirror and adapter class for its lifetime.
//! Definition under a given qualified name holds that name's map entry for
//! the whole synthesis, so concurrent requests for one name serialize and
//! exactly one of them synthesizes. Lookups never block on unrelated names.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::adapter::{AdapterClass, AdapterContract, AdapterFn};
use crate::class::{ClassId, MirrorClass, MirrorClassBuilder};
use crate::config::{MirrorConfig, DEFAULT_CLASS_PREFIX};
use crate::error::{MirrorError, MirrorResult};
use crate::schema::{ClassKind, MirrorSchema};
use crate::value::Value;

/// Suffix of every qualified class name
const GENERATED_SUFFIX: &str = "GeneratedClass";

#[derive(Debug, Clone)]
enum ClassDefinition {
    Mirror(Arc<MirrorClass>),
    Adapter(Arc<AdapterClass>),
}

impl ClassDefinition {
    fn family(&self) -> &'static str {
        match self {
            ClassDefinition::Mirror(_) => "a mirror class",
            ClassDefinition::Adapter(_) => "an adapter class",
        }
    }
}

/// Registry of synthesized classes
pub struct MirrorClassRegistry {
    prefix: String,
    by_name: DashMap<String, ClassDefinition>,
    by_id: DashMap<ClassId, String>,
    /// Foreign class identifier -> qualified name of the last class defined for it
    aliases: RwLock<FxHashMap<String, String>>,
    /// How many times each unique name was composed
    composed: Mutex<FxHashMap<String, usize>>,
    next_id: AtomicU32,
    synthesized: AtomicUsize,
}

impl MirrorClassRegistry {
    /// Create an empty registry using `prefix` for qualified names
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            by_name: DashMap::new(),
            by_id: DashMap::new(),
            aliases: RwLock::new(FxHashMap::default()),
            composed: Mutex::new(FxHashMap::default()),
            next_id: AtomicU32::new(1),
            synthesized: AtomicUsize::new(0),
        }
    }

    /// Create an empty registry using the configured `class-prefix`
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.class_prefix.clone())
    }

    /// Package prefix of qualified names
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Qualified name for a simple class name
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}.{}", self.prefix, name, GENERATED_SUFFIX)
    }

    /// Define a mirror class, or return the cached one.
    ///
    /// A cached class is returned as is, whatever `schema` and `kind` say.
    pub fn define_mirror_class(
        &self,
        name: &str,
        schema: &MirrorSchema,
        kind: ClassKind,
    ) -> MirrorResult<Arc<MirrorClass>> {
        let qualified = self.qualify(name);
        match self.by_name.entry(qualified.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                ClassDefinition::Mirror(class) => Ok(Arc::clone(class)),
                other => Err(MirrorError::DefinitionConflict {
                    name: qualified,
                    existing: other.family(),
                    requested: "a mirror class",
                }),
            },
            Entry::Vacant(entry) => {
                let id = self.allocate_id();
                let class = MirrorClassBuilder::new(id, name, qualified.clone())
                    .kind(kind)
                    .synthesize(schema)?;
                self.claim_id(id, &qualified)?;
                let class = Arc::new(class);
                entry.insert(ClassDefinition::Mirror(Arc::clone(&class)));
                self.synthesized.fetch_add(1, Ordering::Relaxed);
                debug!(
                    class = %qualified,
                    id = id.get(),
                    fields = class.field_count(),
                    "synthesized mirror class"
                );
                Ok(class)
            }
        }
    }

    /// Define an adapter class, or return the cached one.
    ///
    /// A cached adapter keeps the callable it was first defined with. A
    /// different contract under the same name is an `AdapterMismatch`.
    pub fn define_adapter_class(
        &self,
        name: &str,
        contract: AdapterContract,
        callable: impl Fn(&[Value]) -> MirrorResult<Value> + Send + Sync + 'static,
    ) -> MirrorResult<Arc<AdapterClass>> {
        let qualified = self.qualify(name);
        match self.by_name.entry(qualified.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                ClassDefinition::Adapter(class) if *class.contract() == contract => {
                    Ok(Arc::clone(class))
                }
                ClassDefinition::Adapter(class) => Err(MirrorError::AdapterMismatch {
                    class: qualified,
                    detail: format!(
                        "already defined for {}.{}/{}",
                        class.contract().interface,
                        class.contract().method,
                        class.contract().arity
                    ),
                }),
                other => Err(MirrorError::DefinitionConflict {
                    name: qualified,
                    existing: other.family(),
                    requested: "an adapter class",
                }),
            },
            Entry::Vacant(entry) => {
                if contract.method.is_empty() {
                    return Err(MirrorError::InvalidSchema {
                        class: qualified,
                        detail: "adapter contract has no method name".to_string(),
                    });
                }
                let id = self.allocate_id();
                self.claim_id(id, &qualified)?;
                let callable: AdapterFn = Arc::new(callable);
                let class = Arc::new(AdapterClass::new(id, qualified.clone(), contract, callable));
                entry.insert(ClassDefinition::Adapter(Arc::clone(&class)));
                self.synthesized.fetch_add(1, Ordering::Relaxed);
                debug!(
                    class = %qualified,
                    id = id.get(),
                    method = %class.contract().method,
                    "synthesized adapter class"
                );
                Ok(class)
            }
        }
    }

    /// Look up a mirror class by simple name
    pub fn mirror_class(&self, name: &str) -> MirrorResult<Arc<MirrorClass>> {
        let qualified = self.qualify(name);
        match self.by_name.get(&qualified).as_deref() {
            Some(ClassDefinition::Mirror(class)) => Ok(Arc::clone(class)),
            _ => Err(MirrorError::UnknownClass(qualified)),
        }
    }

    /// Look up an adapter class by simple name
    pub fn adapter_class(&self, name: &str) -> MirrorResult<Arc<AdapterClass>> {
        let qualified = self.qualify(name);
        match self.by_name.get(&qualified).as_deref() {
            Some(ClassDefinition::Adapter(class)) => Ok(Arc::clone(class)),
            _ => Err(MirrorError::UnknownClass(qualified)),
        }
    }

    /// Qualified name of the class with this id
    pub fn name_of(&self, id: ClassId) -> Option<String> {
        self.by_id.get(&id).map(|entry| entry.value().clone())
    }

    /// Check if a simple name is defined (either family)
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&self.qualify(name))
    }

    /// Number of defined classes
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if no class is defined
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Synthesis work performed so far (cache hits are not counted)
    pub fn synthesis_count(&self) -> usize {
        self.synthesized.load(Ordering::Relaxed)
    }

    /// Compose a unique, legal simple class name for a foreign class
    /// identifier such as `module.Outer.Inner`.
    ///
    /// The second and later compositions of one identifier get a `$$N`
    /// suffix, so redefining a foreign class never collides with the class
    /// synthesized for its earlier definition.
    pub fn compose_unique_name(&self, identifier: &str) -> String {
        let base = sanitize_class_name(identifier);
        let mut composed = self.composed.lock();
        let count = composed.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            format!("{}$${}", base, count)
        } else {
            base
        }
    }

    /// Record `name` as the class last defined for a foreign class identifier
    pub fn register_alias(&self, identifier: impl Into<String>, name: &str) {
        let qualified = self.qualify(name);
        self.aliases.write().insert(identifier.into(), qualified);
    }

    /// Qualified name of the class last defined for a foreign class identifier
    pub fn resolve_alias(&self, identifier: &str) -> Option<String> {
        self.aliases.read().get(identifier).cloned()
    }

    fn allocate_id(&self) -> ClassId {
        ClassId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn claim_id(&self, id: ClassId, qualified: &str) -> MirrorResult<()> {
        match self.by_id.entry(id) {
            Entry::Occupied(_) => Err(MirrorError::DuplicateDefinitionRace(qualified.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(qualified.to_string());
                Ok(())
            }
        }
    }
}

impl Default for MirrorClassRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_PREFIX)
    }
}

impl std::fmt::Debug for MirrorClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorClassRegistry")
            .field("prefix", &self.prefix)
            .field("classes", &self.by_name.len())
            .field("synthesized", &self.synthesis_count())
            .finish()
    }
}

/// Turn a dotted identifier into a legal class name.
///
/// Characters other than ASCII alphanumerics, `_` and `$` become `_`; a
/// segment that is empty or starts with a digit gets a leading `_`.
pub fn sanitize_class_name(identifier: &str) -> String {
    identifier
        .split('.')
        .map(|segment| {
            let mut out: String = segment
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
                .collect();
            if out.chars().next().map_or(true, |c| c.is_ascii_digit()) {
                out.insert(0, '_');
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NativeType;

    #[test]
    fn test_qualified_names() {
        let registry = MirrorClassRegistry::default();
        assert_eq!(registry.qualify("Lesson"), "umbra.generated.Lesson.GeneratedClass");
        let custom = MirrorClassRegistry::new("org.example");
        assert_eq!(custom.qualify("Lesson"), "org.example.Lesson.GeneratedClass");
    }

    #[test]
    fn test_define_is_idempotent() {
        let registry = MirrorClassRegistry::default();
        let schema = MirrorSchema::new().property("getId", NativeType::Int);
        let first = registry.define_mirror_class("Lesson", &schema, ClassKind::Entity).unwrap();
        let second = registry.define_mirror_class("Lesson", &schema, ClassKind::Entity).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.synthesis_count(), 1);
        assert_eq!(registry.name_of(first.id()).as_deref(), Some(first.qualified_name()));
    }

    #[test]
    fn test_failed_synthesis_leaves_name_free() {
        let registry = MirrorClassRegistry::default();
        let bad = MirrorSchema::new().property("getWhen", NativeType::Named("datetime".into()));
        assert!(registry.define_mirror_class("Slot", &bad, ClassKind::Fact).is_err());
        assert!(!registry.contains("Slot"));
        assert_eq!(registry.synthesis_count(), 0);

        let good = MirrorSchema::new().property("getWhen", NativeType::Str);
        assert!(registry.define_mirror_class("Slot", &good, ClassKind::Fact).is_ok());
    }

    #[test]
    fn test_family_conflict() {
        let registry = MirrorClassRegistry::default();
        registry
            .define_mirror_class("Thing", &MirrorSchema::new(), ClassKind::Fact)
            .unwrap();
        let err = registry
            .define_adapter_class("Thing", AdapterContract::new("Supplier", "get", 0), |_| {
                Ok(Value::Null)
            })
            .unwrap_err();
        assert!(matches!(err, MirrorError::DefinitionConflict { .. }));
        assert!(matches!(
            registry.adapter_class("Thing"),
            Err(MirrorError::UnknownClass(_))
        ));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_class_name("my module.Outer-Inner"), "my_module.Outer_Inner");
        assert_eq!(sanitize_class_name("pkg.1st"), "pkg._1st");
        assert_eq!(sanitize_class_name("a..b"), "a._.b");
    }

    #[test]
    fn test_compose_unique_name() {
        let registry = MirrorClassRegistry::default();
        assert_eq!(registry.compose_unique_name("app.Lesson"), "app.Lesson");
        assert_eq!(registry.compose_unique_name("app.Lesson"), "app.Lesson$$2");
        assert_eq!(registry.compose_unique_name("app.Lesson"), "app.Lesson$$3");
        assert_eq!(registry.compose_unique_name("app.Room"), "app.Room");
    }

    #[test]
    fn test_alias_tracks_last_definition() {
        let registry = MirrorClassRegistry::default();
        registry.register_alias("app.Lesson", "app.Lesson");
        registry.register_alias("app.Lesson", "app.Lesson$$2");
        assert_eq!(
            registry.resolve_alias("app.Lesson").as_deref(),
            Some("umbra.generated.app.Lesson$$2.GeneratedClass")
        );
        assert_eq!(registry.resolve_alias("app.Room"), None);
    }
}
