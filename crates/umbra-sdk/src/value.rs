//! Foreign handles and values
//!
//! A `ForeignRef` is an opaque 64-bit handle minted by the foreign runtime.
//! It carries no structure: everything about the object behind it is
//! discovered through the `AttributeBridge`. A `ForeignId` is the numeric
//! identity reported by `identify`, stable only while the foreign object is
//! alive. Ids may be handed out again after the object is reclaimed; handles
//! are whatever the runtime says they are.

use std::fmt;

/// Opaque handle to an object living in the foreign runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ForeignRef(u64);

impl ForeignRef {
    /// Create from raw handle bits (as minted by the foreign runtime)
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get raw handle bits
    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ForeignRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignRef({:#x})", self.0)
    }
}

/// Numeric identity of a foreign object.
///
/// Stable for the lifetime of the object, not unique across time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignId(u64);

impl ForeignId {
    /// Wrap a raw id
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ForeignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value crossing the bridge.
///
/// Scalars arrive already converted by the foreign side. Anything with
/// structure of its own arrives as a `Ref` and has to be wrapped.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ForeignValue {
    /// Foreign null / none
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer (the bridge narrows foreign integers to 64 bits)
    Int(i64),
    /// Double precision float
    Float(f64),
    /// String
    Str(String),
    /// Reference to a foreign object
    Ref(ForeignRef),
}

impl ForeignValue {
    /// Check if value is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, ForeignValue::Null)
    }

    /// Check if value is a reference
    #[inline]
    pub fn is_ref(&self) -> bool {
        matches!(self, ForeignValue::Ref(_))
    }

    /// Extract the reference, if any
    pub fn as_ref(&self) -> Option<ForeignRef> {
        match self {
            ForeignValue::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ForeignValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ForeignValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract float value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ForeignValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ForeignValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get type name for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            ForeignValue::Null => "null",
            ForeignValue::Bool(_) => "bool",
            ForeignValue::Int(_) => "int",
            ForeignValue::Float(_) => "float",
            ForeignValue::Str(_) => "str",
            ForeignValue::Ref(_) => "reference",
        }
    }
}

impl From<bool> for ForeignValue {
    fn from(b: bool) -> Self {
        ForeignValue::Bool(b)
    }
}

impl From<i64> for ForeignValue {
    fn from(i: i64) -> Self {
        ForeignValue::Int(i)
    }
}

impl From<f64> for ForeignValue {
    fn from(f: f64) -> Self {
        ForeignValue::Float(f)
    }
}

impl From<&str> for ForeignValue {
    fn from(s: &str) -> Self {
        ForeignValue::Str(s.to_string())
    }
}

impl From<String> for ForeignValue {
    fn from(s: String) -> Self {
        ForeignValue::Str(s)
    }
}

impl From<ForeignRef> for ForeignValue {
    fn from(r: ForeignRef) -> Self {
        ForeignValue::Ref(r)
    }
}
