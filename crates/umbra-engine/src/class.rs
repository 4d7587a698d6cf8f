//! Mirror class synthesis
//!
//! A `MirrorClass` is the native shape generated for one schema: one field
//! per property, a getter for each, a setter for getters following the
//! `getX` convention, plus the identity method and the string-conversion
//! method every mirror carries.
//!
//! Classes are plain data. Instances live in a `MirrorArena` and hold one
//! `Value` per field; the class tells the graph which field a member name
//! resolves to.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{MirrorError, MirrorResult};
use crate::schema::{refine, ClassKind, MetadataTag, MirrorSchema, NativeType};

/// Method returning the held foreign reference
pub const FOREIGN_REF_METHOD: &str = "__foreign_ref";

/// Method returning the foreign object's printable form
pub const DESCRIBE_METHOD: &str = "to_string";

/// Process-unique class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    /// Create from a raw id
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw id
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Generated field and accessors for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccessor {
    /// Field slot in the instance
    pub index: usize,
    /// Getter name (also the foreign attribute name)
    pub getter: String,
    /// Paired setter, when the getter follows the naming convention
    pub setter: Option<String>,
    /// Type as declared by the schema
    pub declared_type: Option<NativeType>,
    /// Type after refinement
    pub native_type: NativeType,
    /// Metadata tags
    pub tags: Vec<MetadataTag>,
}

impl PropertyAccessor {
    /// Annotations carried by the generated getter
    pub fn annotations(&self) -> Vec<&str> {
        self.tags.iter().map(MetadataTag::annotation).collect()
    }

    /// Whether this property is tagged as an ordering key
    pub fn is_ordering_key(&self) -> bool {
        self.tags.iter().any(MetadataTag::is_ordering_key)
    }
}

/// What a member name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    /// Getter of the property at this field index
    Getter(usize),
    /// Setter of the property at this field index
    Setter(usize),
    /// Identity method
    ForeignRef,
    /// String-conversion method
    Describe,
}

/// A synthesized mirror class.
#[derive(Debug)]
pub struct MirrorClass {
    id: ClassId,
    name: String,
    qualified_name: String,
    kind: ClassKind,
    properties: Vec<PropertyAccessor>,
    members: FxHashMap<String, Member>,
}

impl MirrorClass {
    /// Class id
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Simple name, as requested
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Role for the external engine
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Class-level annotations
    pub fn annotations(&self) -> &'static [&'static str] {
        self.kind.annotations()
    }

    /// Properties in schema order
    pub fn properties(&self) -> &[PropertyAccessor] {
        &self.properties
    }

    /// Number of native fields per instance
    pub fn field_count(&self) -> usize {
        self.properties.len()
    }

    /// Property by getter name
    pub fn property(&self, getter: &str) -> Option<&PropertyAccessor> {
        match self.members.get(getter) {
            Some(Member::Getter(index)) => self.properties.get(*index),
            _ => None,
        }
    }

    /// Resolve a member name
    pub fn member(&self, name: &str) -> Option<Member> {
        self.members.get(name).copied()
    }

    /// Resolve a member name or fail with `UnknownMember`
    pub fn resolve(&self, name: &str) -> MirrorResult<Member> {
        self.member(name).ok_or_else(|| MirrorError::UnknownMember {
            class: self.qualified_name.clone(),
            member: name.to_string(),
        })
    }

    /// Getter names, in schema order
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.getter.as_str())
    }
}

/// Setter paired with a getter, if the getter follows the `getX` convention
pub fn setter_name_for(getter: &str) -> Option<String> {
    match getter.strip_prefix("get") {
        Some(rest) if !rest.is_empty() => Some(format!("set{}", rest)),
        _ => None,
    }
}

/// Builds a `MirrorClass` from a schema.
pub struct MirrorClassBuilder {
    id: ClassId,
    name: String,
    qualified_name: String,
    kind: ClassKind,
}

impl MirrorClassBuilder {
    /// Create a builder for a class with an already allocated id
    pub fn new(id: ClassId, name: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind: ClassKind::Fact,
        }
    }

    /// Set the class role
    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    /// Generate fields and accessors for every schema entry
    pub fn synthesize(self, schema: &MirrorSchema) -> MirrorResult<MirrorClass> {
        let mut properties = Vec::with_capacity(schema.len());
        let mut members = FxHashMap::default();
        members.insert(FOREIGN_REF_METHOD.to_string(), Member::ForeignRef);
        members.insert(DESCRIBE_METHOD.to_string(), Member::Describe);

        for (index, descriptor) in schema.properties().iter().enumerate() {
            if descriptor.name.is_empty() {
                return Err(self.invalid(format!("property #{} has an empty name", index)));
            }

            let native_type = refine(descriptor.declared_type.as_ref(), &descriptor.tags);
            if let Some(bad) = native_type.unsupported() {
                return Err(MirrorError::UnsupportedPropertyType {
                    class: self.qualified_name.clone(),
                    property: descriptor.name.clone(),
                    type_name: bad.type_name(),
                });
            }

            let setter = setter_name_for(&descriptor.name);
            self.add_member(&mut members, &descriptor.name, Member::Getter(index))?;
            if let Some(setter) = &setter {
                self.add_member(&mut members, setter, Member::Setter(index))?;
            }

            properties.push(PropertyAccessor {
                index,
                getter: descriptor.name.clone(),
                setter,
                declared_type: descriptor.declared_type.clone(),
                native_type,
                tags: descriptor.tags.clone(),
            });
        }

        Ok(MirrorClass {
            id: self.id,
            name: self.name,
            qualified_name: self.qualified_name,
            kind: self.kind,
            properties,
            members,
        })
    }

    fn add_member(
        &self,
        members: &mut FxHashMap<String, Member>,
        name: &str,
        member: Member,
    ) -> MirrorResult<()> {
        if members.insert(name.to_string(), member).is_some() {
            return Err(self.invalid(format!("member '{}' is defined more than once", name)));
        }
        Ok(())
    }

    fn invalid(&self, detail: String) -> MirrorError {
        MirrorError::InvalidSchema {
            class: self.qualified_name.clone(),
            detail,
        }
    }
}
