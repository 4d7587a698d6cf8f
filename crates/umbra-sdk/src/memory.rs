//! In-memory foreign runtime
//!
//! A small object heap implementing `AttributeBridge`, for tests, benches
//! and for embedders who want to exercise mirroring without a real foreign
//! runtime. It models the two properties of real runtimes the engine cares
//! about:
//!
//! - handles are minted fresh for every allocation and never reused;
//! - ids are stable while an object is live, and an id can be handed to a
//!   new object after the old one is released.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::bridge::AttributeBridge;
use crate::error::{BridgeError, BridgeResult};
use crate::value::{ForeignId, ForeignRef, ForeignValue};

#[derive(Debug)]
struct HeapObject {
    id: ForeignId,
    type_name: String,
    attributes: FxHashMap<String, ForeignValue>,
    /// Present only for array-shaped objects
    elements: Option<Vec<ForeignRef>>,
}

#[derive(Debug, Default)]
struct Heap {
    next_handle: u64,
    next_id: u64,
    objects: FxHashMap<u64, HeapObject>,
}

impl Heap {
    fn alloc(
        &mut self,
        id: ForeignId,
        type_name: &str,
        elements: Option<Vec<ForeignRef>>,
    ) -> ForeignRef {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.objects.insert(
            handle,
            HeapObject {
                id,
                type_name: type_name.to_string(),
                attributes: FxHashMap::default(),
                elements,
            },
        );
        ForeignRef::from_bits(handle)
    }

    fn fresh_id(&mut self) -> ForeignId {
        self.next_id += 1;
        ForeignId::new(self.next_id)
    }

    fn object(&self, reference: ForeignRef) -> BridgeResult<&HeapObject> {
        self.objects
            .get(&reference.to_bits())
            .ok_or(BridgeError::StaleReference(reference.to_bits()))
    }

    fn object_mut(&mut self, reference: ForeignRef) -> BridgeResult<&mut HeapObject> {
        self.objects
            .get_mut(&reference.to_bits())
            .ok_or(BridgeError::StaleReference(reference.to_bits()))
    }
}

/// Mutex-guarded in-memory object heap.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    heap: Mutex<Heap>,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl InMemoryRuntime {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a plain object of the given foreign type
    pub fn alloc_object(&self, type_name: &str) -> ForeignRef {
        let mut heap = self.heap.lock();
        let id = heap.fresh_id();
        heap.alloc(id, type_name, None)
    }

    /// Allocate a plain object under a chosen id (models id reuse)
    pub fn alloc_object_with_id(&self, type_name: &str, id: ForeignId) -> ForeignRef {
        self.heap.lock().alloc(id, type_name, None)
    }

    /// Allocate an array-shaped object holding the given elements
    pub fn alloc_array(&self, elements: Vec<ForeignRef>) -> ForeignRef {
        let mut heap = self.heap.lock();
        let id = heap.fresh_id();
        heap.alloc(id, "list", Some(elements))
    }

    /// Write an attribute from the foreign side (not counted as a bridge call)
    pub fn put(&self, reference: ForeignRef, name: &str, value: impl Into<ForeignValue>) {
        if let Ok(object) = self.heap.lock().object_mut(reference) {
            object.attributes.insert(name.to_string(), value.into());
        }
    }

    /// Read an attribute from the foreign side (not counted as a bridge call)
    pub fn peek(&self, reference: ForeignRef, name: &str) -> Option<ForeignValue> {
        let heap = self.heap.lock();
        heap.object(reference)
            .ok()
            .and_then(|object| object.attributes.get(name).cloned())
    }

    /// Replace the elements of an array-shaped object
    pub fn set_elements(&self, reference: ForeignRef, elements: Vec<ForeignRef>) {
        if let Ok(object) = self.heap.lock().object_mut(reference) {
            object.elements = Some(elements);
        }
    }

    /// Reclaim an object. Its handle goes stale; its id becomes reusable.
    pub fn release(&self, reference: ForeignRef) -> bool {
        self.heap.lock().objects.remove(&reference.to_bits()).is_some()
    }

    /// Number of live objects
    pub fn live_objects(&self) -> usize {
        self.heap.lock().objects.len()
    }

    /// `get-attribute` calls served so far
    pub fn get_attribute_calls(&self) -> usize {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// `set-attribute` calls served so far
    pub fn set_attribute_calls(&self) -> usize {
        self.set_calls.load(Ordering::Relaxed)
    }
}

impl AttributeBridge for InMemoryRuntime {
    fn identify(&self, reference: ForeignRef) -> BridgeResult<ForeignId> {
        Ok(self.heap.lock().object(reference)?.id)
    }

    fn describe(&self, reference: ForeignRef) -> BridgeResult<String> {
        let heap = self.heap.lock();
        let object = heap.object(reference)?;
        match object.attributes.get("name") {
            Some(ForeignValue::Str(name)) => Ok(format!("{}({})", object.type_name, name)),
            _ => Ok(format!("{}{}", object.type_name, object.id)),
        }
    }

    fn enumerate_elements(&self, reference: ForeignRef) -> BridgeResult<Vec<ForeignRef>> {
        let heap = self.heap.lock();
        heap.object(reference)?
            .elements
            .clone()
            .ok_or(BridgeError::NotEnumerable(reference.to_bits()))
    }

    fn get_attribute(&self, reference: ForeignRef, name: &str) -> BridgeResult<ForeignValue> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let heap = self.heap.lock();
        heap.object(reference)?
            .attributes
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::MissingAttribute(name.to_string()))
    }

    fn set_attribute(
        &self,
        reference: ForeignRef,
        name: &str,
        value: ForeignValue,
    ) -> BridgeResult<()> {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
        self.heap
            .lock()
            .object_mut(reference)?
            .attributes
            .insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_attributes() {
        let rt = InMemoryRuntime::new();
        let a = rt.alloc_object("Lesson");
        rt.put(a, "name", "math");
        rt.put(a, "weight", 3i64);

        assert_eq!(rt.get_attribute(a, "weight").unwrap(), ForeignValue::Int(3));
        assert_eq!(rt.describe(a).unwrap(), "Lesson(math)");
        assert!(matches!(
            rt.get_attribute(a, "missing"),
            Err(BridgeError::MissingAttribute(_))
        ));
        assert_eq!(rt.get_attribute_calls(), 2);
    }

    #[test]
    fn test_arrays_enumerate() {
        let rt = InMemoryRuntime::new();
        let x = rt.alloc_object("X");
        let y = rt.alloc_object("Y");
        let list = rt.alloc_array(vec![x, y, x]);

        assert_eq!(rt.enumerate_elements(list).unwrap(), vec![x, y, x]);
        assert_eq!(
            rt.enumerate_elements(x),
            Err(BridgeError::NotEnumerable(x.to_bits()))
        );
    }

    #[test]
    fn test_release_allows_id_reuse() {
        let rt = InMemoryRuntime::new();
        let old = rt.alloc_object("Score");
        let id = rt.identify(old).unwrap();
        assert!(rt.release(old));
        assert!(matches!(rt.identify(old), Err(BridgeError::StaleReference(_))));

        let new = rt.alloc_object_with_id("Score", id);
        assert_ne!(old, new);
        assert_eq!(rt.identify(new).unwrap(), id);
        assert_eq!(rt.live_objects(), 1);
    }

    #[test]
    fn test_set_attribute_counts() {
        let rt = InMemoryRuntime::new();
        let a = rt.alloc_object("A");
        rt.set_attribute(a, "getValue", ForeignValue::Int(5)).unwrap();
        assert_eq!(rt.peek(a, "getValue"), Some(ForeignValue::Int(5)));
        assert_eq!(rt.set_attribute_calls(), 1);
    }
}
