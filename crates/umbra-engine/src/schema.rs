//! Declarative mirror schema
//!
//! A schema is the ordered list of `(name, declared type, tags)` triples a
//! foreign-side introspection step derives from a foreign class. The engine
//! treats it as validated input and builds one mirror class per schema.
//!
//! Declared types are optional, since the foreign runtime is dynamically
//! typed. `refine` turns a declared type plus its tags into the type the
//! synthesizer actually generates a field for.

use serde::{Deserialize, Serialize};

/// Native type of a mirror property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeType {
    /// Boolean
    Bool,
    /// 64-bit integer
    Int,
    /// Double precision float
    Float,
    /// String
    Str,
    /// Any scalar with a total order (ids, keys)
    Orderable,
    /// Generic object reference, held without mirroring
    Object,
    /// Mirror of another synthesized class, by simple name
    Mirror(String),
    /// Fixed-length array
    Array(Box<NativeType>),
    /// Collection
    List(Box<NativeType>),
    /// A declared type with no generation rule
    Named(String),
}

impl NativeType {
    /// Generic array of object references
    pub fn reference_array() -> Self {
        NativeType::Array(Box::new(NativeType::Object))
    }

    /// Whether values of this type have an ordering
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            NativeType::Bool
                | NativeType::Int
                | NativeType::Float
                | NativeType::Str
                | NativeType::Orderable
        )
    }

    /// Whether this is an array or collection shape
    pub fn is_sequence(&self) -> bool {
        matches!(self, NativeType::Array(_) | NativeType::List(_))
    }

    /// Element type of a sequence shape
    pub fn element(&self) -> Option<&NativeType> {
        match self {
            NativeType::Array(elem) | NativeType::List(elem) => Some(elem),
            _ => None,
        }
    }

    /// Whether foreign values of this type must be recursively wrapped
    pub fn needs_wrap(&self) -> bool {
        matches!(self, NativeType::Mirror(_)) || self.is_sequence()
    }

    /// First type reachable from this one that has no generation rule
    pub fn unsupported(&self) -> Option<&NativeType> {
        match self {
            NativeType::Named(_) => Some(self),
            NativeType::Array(elem) | NativeType::List(elem) => elem.unsupported(),
            _ => None,
        }
    }

    /// Display name
    pub fn type_name(&self) -> String {
        match self {
            NativeType::Bool => "bool".to_string(),
            NativeType::Int => "int".to_string(),
            NativeType::Float => "float".to_string(),
            NativeType::Str => "str".to_string(),
            NativeType::Orderable => "orderable".to_string(),
            NativeType::Object => "object".to_string(),
            NativeType::Mirror(name) => name.clone(),
            NativeType::Array(elem) => format!("{}[]", elem.type_name()),
            NativeType::List(elem) => format!("list[{}]", elem.type_name()),
            NativeType::Named(name) => name.clone(),
        }
    }
}

/// Metadata attached to a property by the foreign class definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataTag {
    /// Ordering / identifier key
    PlanningId,
    /// Variable the external engine may change
    PlanningVariable {
        /// Value range providers feeding this variable
        #[serde(default)]
        value_range_provider_refs: Vec<String>,
    },
    /// Homogeneous collection of entities
    EntityCollectionProperty,
    /// Homogeneous collection of facts
    FactCollectionProperty,
    /// Provides candidate values for variables
    ValueRangeProvider {
        /// Provider id
        id: String,
    },
    /// Score holder
    PlanningScore,
    /// Anything else, carried through as decoration
    Custom(String),
}

impl MetadataTag {
    /// Marks an ordering/identifier key
    pub fn is_ordering_key(&self) -> bool {
        matches!(self, MetadataTag::PlanningId)
    }

    /// Marks a homogeneous collection
    pub fn is_homogeneous_collection(&self) -> bool {
        matches!(
            self,
            MetadataTag::EntityCollectionProperty | MetadataTag::FactCollectionProperty
        )
    }

    /// Annotation name attached to the generated getter
    pub fn annotation(&self) -> &str {
        match self {
            MetadataTag::PlanningId => "PlanningId",
            MetadataTag::PlanningVariable { .. } => "PlanningVariable",
            MetadataTag::EntityCollectionProperty => "PlanningEntityCollectionProperty",
            MetadataTag::FactCollectionProperty => "ProblemFactCollectionProperty",
            MetadataTag::ValueRangeProvider { .. } => "ValueRangeProvider",
            MetadataTag::PlanningScore => "PlanningScore",
            MetadataTag::Custom(name) => name,
        }
    }
}

/// Role a synthesized class plays for the external engine.
///
/// Decorative only: it selects class-level annotations and never changes
/// which fields or accessors are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// Planning entity
    Entity,
    /// Problem fact
    Fact,
    /// Planning solution
    Solution,
}

impl ClassKind {
    /// Class-level annotations for this role
    pub fn annotations(self) -> &'static [&'static str] {
        match self {
            ClassKind::Entity => &["PlanningEntity"],
            ClassKind::Fact => &[],
            ClassKind::Solution => &["PlanningSolution"],
        }
    }
}

/// One schema entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property (getter) name
    pub name: String,
    /// Declared type, if the foreign side knows it
    #[serde(default)]
    pub declared_type: Option<NativeType>,
    /// Metadata tags
    #[serde(default)]
    pub tags: Vec<MetadataTag>,
}

impl PropertyDescriptor {
    /// Create a descriptor
    pub fn new(name: impl Into<String>, declared_type: Option<NativeType>) -> Self {
        Self {
            name: name.into(),
            declared_type,
            tags: Vec::new(),
        }
    }

    /// Add a tag
    pub fn tag(mut self, tag: MetadataTag) -> Self {
        self.tags.push(tag);
        self
    }
}

/// Ordered property list describing one class shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorSchema {
    properties: Vec<PropertyDescriptor>,
}

impl MirrorSchema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property with a declared type and no tags
    pub fn property(self, name: impl Into<String>, declared_type: NativeType) -> Self {
        self.with(PropertyDescriptor::new(name, Some(declared_type)))
    }

    /// Add a fully described property
    pub fn with(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(descriptor);
        self
    }

    /// Parse a schema handed over as JSON by the introspection step
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Properties in declaration order
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the schema has no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl FromIterator<PropertyDescriptor> for MirrorSchema {
    fn from_iter<I: IntoIterator<Item = PropertyDescriptor>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}

/// Refine a declared type according to its tags.
///
/// Tags apply in order, each one seeing the type the previous produced.
/// An ordering key that cannot be ordered becomes `Orderable`; a homogeneous
/// collection that is not sequence-shaped becomes a reference array. An
/// unknown declared type defaults to `Object`.
pub fn refine(declared: Option<&NativeType>, tags: &[MetadataTag]) -> NativeType {
    let mut native = declared.cloned().unwrap_or(NativeType::Object);
    for tag in tags {
        if tag.is_ordering_key() && !native.is_orderable() {
            native = NativeType::Orderable;
        } else if tag.is_homogeneous_collection() && !native.is_sequence() {
            native = NativeType::reference_array();
        }
    }
    native
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refine_defaults_to_object() {
        assert_eq!(refine(None, &[]), NativeType::Object);
        assert_eq!(refine(Some(&NativeType::Int), &[]), NativeType::Int);
    }

    #[test]
    fn test_refine_ordering_key() {
        let tags = [MetadataTag::PlanningId];
        assert_eq!(refine(None, &tags), NativeType::Orderable);
        assert_eq!(
            refine(Some(&NativeType::Mirror("Room".into())), &tags),
            NativeType::Orderable
        );
        // Already orderable types are kept
        assert_eq!(refine(Some(&NativeType::Str), &tags), NativeType::Str);
    }

    #[test]
    fn test_refine_collection() {
        let tags = [MetadataTag::FactCollectionProperty];
        assert_eq!(refine(None, &tags), NativeType::reference_array());
        assert_eq!(
            refine(Some(&NativeType::Mirror("Room".into())), &tags),
            NativeType::reference_array()
        );
        let list = NativeType::List(Box::new(NativeType::Mirror("Room".into())));
        assert_eq!(refine(Some(&list), &tags), list);
    }

    #[test]
    fn test_unsupported_reaches_through_sequences() {
        let t = NativeType::Array(Box::new(NativeType::Named("complex".into())));
        assert_eq!(t.unsupported(), Some(&NativeType::Named("complex".into())));
        assert_eq!(NativeType::Int.unsupported(), None);
    }

    #[test]
    fn test_schema_from_json() {
        let json = r#"[
            {"name": "getId", "declared_type": "int", "tags": ["planning_id"]},
            {"name": "getRoom", "declared_type": {"mirror": "Room"},
             "tags": [{"planning_variable": {"value_range_provider_refs": ["rooms"]}}]},
            {"name": "getTags"}
        ]"#;
        let schema = MirrorSchema::from_json(json).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.properties()[0].declared_type, Some(NativeType::Int));
        assert_eq!(
            schema.properties()[1].declared_type,
            Some(NativeType::Mirror("Room".into()))
        );
        assert_eq!(schema.properties()[2].declared_type, None);
        assert!(schema.properties()[2].tags.is_empty());
    }

    #[test]
    fn test_type_names() {
        let t = NativeType::List(Box::new(NativeType::Array(Box::new(NativeType::Int))));
        assert_eq!(t.type_name(), "list[int[]]");
    }
}
