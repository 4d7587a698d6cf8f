//! Session-owned storage for mirror instances and sequences
//!
//! Construction is two-phase: a slot is reserved (and registered in the
//! identity map by the caller) before any field or element is populated.
//! Until populated, fields and elements read as `Value::Null`.

use std::sync::Arc;

use umbra_sdk::{ForeignId, ForeignRef};

use crate::class::MirrorClass;
use crate::error::{MirrorError, MirrorResult};
use crate::schema::NativeType;
use crate::value::{Handle, Value};

/// A mirror of one foreign object.
#[derive(Debug, Clone)]
pub struct MirrorInstance {
    class: Arc<MirrorClass>,
    foreign: ForeignRef,
    id: ForeignId,
    fields: Vec<Value>,
    /// Fields written locally and not yet pushed
    dirty: Vec<bool>,
}

impl MirrorInstance {
    /// Class of this instance
    pub fn class(&self) -> &Arc<MirrorClass> {
        &self.class
    }

    /// Held foreign reference
    pub fn foreign_ref(&self) -> ForeignRef {
        self.foreign
    }

    /// Foreign id at wrap time
    pub fn foreign_id(&self) -> ForeignId {
        self.id
    }

    /// Field values in schema order
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Field value by index
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Check if a field has a pending local write
    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty.get(index).copied().unwrap_or(false)
    }

    /// Indices of fields with pending local writes
    pub fn dirty_fields(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty
            .iter()
            .enumerate()
            .filter_map(|(index, dirty)| dirty.then_some(index))
    }

    pub(crate) fn store(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = value;
        }
    }

    pub(crate) fn mark(&mut self, index: usize, dirty: bool) {
        if let Some(slot) = self.dirty.get_mut(index) {
            *slot = dirty;
        }
    }
}

/// A native sequence mirroring one array-shaped foreign object.
#[derive(Debug, Clone)]
pub struct MirrorSequence {
    foreign: ForeignRef,
    id: ForeignId,
    element: NativeType,
    items: Vec<Value>,
}

impl MirrorSequence {
    /// Held foreign reference
    pub fn foreign_ref(&self) -> ForeignRef {
        self.foreign
    }

    /// Foreign id at wrap time
    pub fn foreign_id(&self) -> ForeignId {
        self.id
    }

    /// Declared element type
    pub fn element_type(&self) -> &NativeType {
        &self.element
    }

    /// Elements in foreign order
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn store(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.items.get_mut(index) {
            *slot = value;
        }
    }

    pub(crate) fn replace_items(&mut self, items: Vec<Value>) {
        self.items = items;
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Instance(MirrorInstance),
    Sequence(MirrorSequence),
}

/// Arena of all mirrors built for one graph.
///
/// `Clone` copies every slot; the refresh pass runs against such a copy
/// and the graph adopts it only when the whole pass succeeds.
#[derive(Debug, Clone, Default)]
pub struct MirrorArena {
    slots: Vec<Slot>,
}

impl MirrorArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an instance with every field null
    pub fn reserve_instance(
        &mut self,
        class: Arc<MirrorClass>,
        foreign: ForeignRef,
        id: ForeignId,
    ) -> MirrorResult<Handle> {
        let field_count = class.field_count();
        self.push(Slot::Instance(MirrorInstance {
            class,
            foreign,
            id,
            fields: vec![Value::Null; field_count],
            dirty: vec![false; field_count],
        }))
    }

    /// Reserve a sequence of `len` null elements
    pub fn reserve_sequence(
        &mut self,
        foreign: ForeignRef,
        id: ForeignId,
        element: NativeType,
        len: usize,
    ) -> MirrorResult<Handle> {
        self.push(Slot::Sequence(MirrorSequence {
            foreign,
            id,
            element,
            items: vec![Value::Null; len],
        }))
    }

    fn push(&mut self, slot: Slot) -> MirrorResult<Handle> {
        let handle = Handle::from_index(self.slots.len())?;
        self.slots.push(slot);
        Ok(handle)
    }

    /// The value referring to a slot (`Mirror` or `Sequence`)
    pub fn value_of(&self, handle: Handle) -> MirrorResult<Value> {
        match self.slots.get(handle.index()) {
            Some(Slot::Instance(_)) => Ok(Value::Mirror(handle)),
            Some(Slot::Sequence(_)) => Ok(Value::Sequence(handle)),
            None => Err(MirrorError::InvalidHandle(handle.index(), "mirror slot")),
        }
    }

    /// Borrow an instance
    pub fn instance(&self, handle: Handle) -> MirrorResult<&MirrorInstance> {
        match self.slots.get(handle.index()) {
            Some(Slot::Instance(instance)) => Ok(instance),
            _ => Err(MirrorError::InvalidHandle(handle.index(), "mirror instance")),
        }
    }

    /// Mutably borrow an instance
    pub fn instance_mut(&mut self, handle: Handle) -> MirrorResult<&mut MirrorInstance> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Instance(instance)) => Ok(instance),
            _ => Err(MirrorError::InvalidHandle(handle.index(), "mirror instance")),
        }
    }

    /// Borrow a sequence
    pub fn sequence(&self, handle: Handle) -> MirrorResult<&MirrorSequence> {
        match self.slots.get(handle.index()) {
            Some(Slot::Sequence(sequence)) => Ok(sequence),
            _ => Err(MirrorError::InvalidHandle(handle.index(), "mirror sequence")),
        }
    }

    /// Mutably borrow a sequence
    pub fn sequence_mut(&mut self, handle: Handle) -> MirrorResult<&mut MirrorSequence> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Sequence(sequence)) => Ok(sequence),
            _ => Err(MirrorError::InvalidHandle(handle.index(), "mirror sequence")),
        }
    }

    /// Foreign reference held by any slot
    pub fn foreign_ref(&self, handle: Handle) -> MirrorResult<ForeignRef> {
        match self.slots.get(handle.index()) {
            Some(Slot::Instance(instance)) => Ok(instance.foreign),
            Some(Slot::Sequence(sequence)) => Ok(sequence.foreign),
            None => Err(MirrorError::InvalidHandle(handle.index(), "mirror slot")),
        }
    }

    /// Handles of every instance, in allocation order
    pub fn instance_handles(&self) -> impl Iterator<Item = Handle> + '_ {
        // Every slot index was checked by `push`
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Instance(_) => Handle::from_index(index).ok(),
            Slot::Sequence(_) => None,
        })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassId, MirrorClassBuilder};
    use crate::schema::{ClassKind, MirrorSchema};

    fn class() -> Arc<MirrorClass> {
        let schema = MirrorSchema::new()
            .property("getA", NativeType::Int)
            .property("getB", NativeType::Str);
        Arc::new(
            MirrorClassBuilder::new(ClassId::new(1), "T", "t.T.GeneratedClass")
                .kind(ClassKind::Fact)
                .synthesize(&schema)
                .unwrap(),
        )
    }

    #[test]
    fn test_reserved_slots_start_null() {
        let mut arena = MirrorArena::new();
        let h = arena
            .reserve_instance(class(), ForeignRef::from_bits(1), ForeignId::new(1))
            .unwrap();
        let instance = arena.instance(h).unwrap();
        assert_eq!(instance.fields(), &[Value::Null, Value::Null]);
        assert_eq!(instance.dirty_fields().count(), 0);

        let s = arena
            .reserve_sequence(ForeignRef::from_bits(2), ForeignId::new(2), NativeType::Int, 3)
            .unwrap();
        assert_eq!(arena.sequence(s).unwrap().len(), 3);
        assert_eq!(arena.value_of(s).unwrap(), Value::Sequence(s));
        assert_eq!(arena.value_of(h).unwrap(), Value::Mirror(h));
    }

    #[test]
    fn test_kind_checked_access() {
        let mut arena = MirrorArena::new();
        let h = arena
            .reserve_instance(class(), ForeignRef::from_bits(1), ForeignId::new(1))
            .unwrap();
        assert!(matches!(arena.sequence(h), Err(MirrorError::InvalidHandle(0, _))));
        assert!(matches!(
            arena.instance(Handle::new(5)),
            Err(MirrorError::InvalidHandle(5, _))
        ));
    }

    #[test]
    fn test_store_and_mark() {
        let mut arena = MirrorArena::new();
        let h = arena
            .reserve_instance(class(), ForeignRef::from_bits(1), ForeignId::new(1))
            .unwrap();
        let instance = arena.instance_mut(h).unwrap();
        instance.store(1, Value::from("x"));
        instance.mark(1, true);
        assert_eq!(instance.field(1), Some(&Value::from("x")));
        assert_eq!(instance.dirty_fields().collect::<Vec<_>>(), vec![1]);
    }
}
