//! Native values held by mirror fields
//!
//! Scalars are stored inline. Mirrors and sequences are `Handle`s into the
//! session's `MirrorArena`, so a cyclic foreign graph becomes an acyclic
//! set of indices rather than a cycle of owning pointers.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use umbra_sdk::{ForeignRef, ForeignValue};

use crate::error::{MirrorError, MirrorResult};

/// Index of a slot in a `MirrorArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Handle for slot `index`, if it fits the handle width
    pub(crate) fn from_index(index: usize) -> MirrorResult<Self> {
        u32::try_from(index)
            .map(Self)
            .map_err(|_| MirrorError::InvalidHandle(index, "slot within arena capacity"))
    }

    /// Slot index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A native value.
#[derive(Clone, Default)]
pub enum Value {
    /// Null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// Foreign object held without a mirror (generic object properties)
    Foreign(ForeignRef),
    /// Mirror instance in the session arena
    Mirror(Handle),
    /// Mirror sequence in the session arena
    Sequence(Handle),
    /// Any native value, passed through adapters untouched
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary native value for adapter passthrough
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    /// Borrow an opaque payload as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Check if value is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Arena handle of a mirror instance
    pub fn as_mirror(&self) -> Option<Handle> {
        match self {
            Value::Mirror(h) => Some(*h),
            _ => None,
        }
    }

    /// Arena handle of a mirror sequence
    pub fn as_sequence(&self) -> Option<Handle> {
        match self {
            Value::Sequence(h) => Some(*h),
            _ => None,
        }
    }

    /// Arena handle of either kind
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Value::Mirror(h) | Value::Sequence(h) => Some(*h),
            _ => None,
        }
    }

    /// Convert a foreign scalar. References are kept unmirrored.
    pub fn from_foreign(value: &ForeignValue) -> Self {
        match value {
            ForeignValue::Null => Value::Null,
            ForeignValue::Bool(b) => Value::Bool(*b),
            ForeignValue::Int(i) => Value::Int(*i),
            ForeignValue::Float(f) => Value::Float(*f),
            ForeignValue::Str(s) => Value::Str(s.clone()),
            ForeignValue::Ref(r) => Value::Foreign(*r),
        }
    }

    /// Foreign form of a value that needs no arena lookup.
    ///
    /// Returns `None` for mirrors, sequences and opaque payloads.
    pub fn to_foreign_scalar(&self) -> Option<ForeignValue> {
        match self {
            Value::Null => Some(ForeignValue::Null),
            Value::Bool(b) => Some(ForeignValue::Bool(*b)),
            Value::Int(i) => Some(ForeignValue::Int(*i)),
            Value::Float(f) => Some(ForeignValue::Float(*f)),
            Value::Str(s) => Some(ForeignValue::Str(s.clone())),
            Value::Foreign(r) => Some(ForeignValue::Ref(*r)),
            Value::Mirror(_) | Value::Sequence(_) | Value::Opaque(_) => None,
        }
    }

    /// Get type name for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Foreign(_) => "foreign",
            Value::Mirror(_) => "mirror",
            Value::Sequence(_) => "sequence",
            Value::Opaque(_) => "opaque",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::Foreign(_) => 4,
            Value::Mirror(_) => 5,
            Value::Sequence(_) => 6,
            Value::Opaque(_) => 7,
        }
    }

    /// Total order used for ordering keys.
    ///
    /// Values of different kinds order by kind (null first). Ints and floats
    /// compare numerically with each other; NaN sorts after every number.
    pub fn cmp_orderable(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Foreign(a), Value::Foreign(b)) => a.to_bits().cmp(&b.to_bits()),
            (Value::Mirror(a), Value::Mirror(b)) | (Value::Sequence(a), Value::Sequence(b)) => {
                a.cmp(b)
            }
            (Value::Opaque(a), Value::Opaque(b)) => {
                (Arc::as_ptr(a) as *const () as usize).cmp(&(Arc::as_ptr(b) as *const () as usize))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Foreign(r) => write!(f, "Foreign({:?})", r),
            Value::Mirror(h) => write!(f, "Mirror({})", h),
            Value::Sequence(h) => write!(f, "Sequence({})", h),
            Value::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Foreign(a), Value::Foreign(b)) => a == b,
            (Value::Mirror(a), Value::Mirror(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Typed extraction from a mirror field.
pub trait FromMirror: Sized {
    /// Expected type name for diagnostics
    const TYPE_NAME: &'static str;

    /// Extract, or `None` if the value has another shape
    fn from_mirror(value: &Value) -> Option<Self>;
}

impl FromMirror for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_mirror(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromMirror for f64 {
    const TYPE_NAME: &'static str = "float";

    fn from_mirror(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromMirror for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_mirror(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromMirror for String {
    const TYPE_NAME: &'static str = "str";

    fn from_mirror(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orderable_mixed_numbers() {
        assert_eq!(Value::Int(2).cmp_orderable(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(3.0).cmp_orderable(&Value::Int(3)), Ordering::Equal);
        assert_eq!(
            Value::Float(f64::NAN).cmp_orderable(&Value::Float(1e300)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_orderable_across_kinds() {
        assert_eq!(Value::Null.cmp_orderable(&Value::Bool(false)), Ordering::Less);
        assert_eq!(Value::Str("a".into()).cmp_orderable(&Value::Int(99)), Ordering::Greater);
        let mut keys = vec![Value::from("b"), Value::Int(10), Value::Null, Value::from("a")];
        keys.sort_by(|a, b| a.cmp_orderable(b));
        assert_eq!(
            keys,
            vec![Value::Null, Value::Int(10), Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn test_opaque_identity() {
        let v = Value::opaque(42u32);
        assert_eq!(v.downcast_ref::<u32>(), Some(&42));
        assert_eq!(v.downcast_ref::<i64>(), None);
        assert_eq!(v, v.clone());
        assert_ne!(v, Value::opaque(42u32));
    }

    #[test]
    fn test_from_mirror() {
        assert_eq!(f64::from_mirror(&Value::Int(3)), Some(3.0));
        assert_eq!(i64::from_mirror(&Value::Float(3.0)), None);
        assert_eq!(String::from_mirror(&Value::from("x")), Some("x".to_string()));
        assert_eq!(bool::from_mirror(&Value::Null), None);
    }

    #[test]
    fn test_foreign_scalar_conversion() {
        let r = ForeignRef::from_bits(9);
        assert_eq!(Value::from_foreign(&ForeignValue::Ref(r)), Value::Foreign(r));
        assert_eq!(Value::Foreign(r).to_foreign_scalar(), Some(ForeignValue::Ref(r)));
        assert_eq!(Value::Mirror(Handle::new(0)).to_foreign_scalar(), None);
    }

    #[test]
    fn test_handle_from_index() {
        assert_eq!(Handle::from_index(7).unwrap(), Handle::new(7));
        assert_eq!(Handle::from_index(u32::MAX as usize).unwrap().index(), u32::MAX as usize);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_handle_from_index_out_of_range() {
        let index = u32::MAX as usize + 1;
        assert!(matches!(
            Handle::from_index(index),
            Err(MirrorError::InvalidHandle(i, _)) if i == index
        ));
    }
}
