//! Graph wrapper
//!
//! Converts foreign references into arena slots, memoized by foreign id.
//! Slots are registered in the identity map before they are populated, so
//! a property that leads back to an object already being wrapped resolves
//! to that object's slot and the walk terminates on cyclic graphs.
//! Population runs off an explicit worklist, so stack depth does not grow
//! with the length of a reference chain.
//!
//! The same machinery drives the refresh pass, which re-reads an already
//! wrapped graph against a forked identity map.

use rustc_hash::FxHashSet;
use tracing::trace;
use umbra_sdk::{AttributeBridge, BridgeError, ForeignId, ForeignRef, ForeignValue};

use crate::arena::MirrorArena;
use crate::error::{MirrorError, MirrorResult};
use crate::identity::IdentityMap;
use crate::registry::MirrorClassRegistry;
use crate::schema::NativeType;
use crate::value::{Handle, Value};

/// Summary of one refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Instances re-read
    pub instances: usize,
    /// Sequences re-enumerated
    pub sequences: usize,
    /// Fields skipped because of pending local writes
    pub skipped: usize,
    /// Slots created for foreign objects first seen during the pass
    pub created: usize,
}

/// A reserved slot waiting for its fields or elements
enum Populate {
    Instance(Handle),
    Sequence(Handle, Vec<ForeignRef>),
}

/// Wraps foreign values through a bridge, using classes from a registry.
pub struct GraphWrapper<'a> {
    bridge: &'a dyn AttributeBridge,
    registry: &'a MirrorClassRegistry,
}

impl<'a> GraphWrapper<'a> {
    /// Create a wrapper
    pub fn new(bridge: &'a dyn AttributeBridge, registry: &'a MirrorClassRegistry) -> Self {
        Self { bridge, registry }
    }

    /// Wrap a foreign reference as `target`.
    ///
    /// `None` wraps to `Value::Null` without touching `ids`. A reference
    /// whose id is already in `ids` resolves to the registered slot.
    pub fn wrap(
        &self,
        target: &NativeType,
        reference: Option<ForeignRef>,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
    ) -> MirrorResult<Value> {
        let mut work = Vec::new();
        let value = self.resolve(target, reference, arena, ids, &mut work)?;
        self.populate(arena, ids, &mut work)?;
        Ok(value)
    }

    /// Convert a value read from `owner.property` to `target`.
    ///
    /// Scalars pass through as the bridge converted them (ints widen to
    /// floats). References are wrapped when `target` is a mirror or
    /// sequence type and held unmirrored when it is `Object`.
    pub fn convert(
        &self,
        target: &NativeType,
        raw: ForeignValue,
        owner: ForeignRef,
        property: &str,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
    ) -> MirrorResult<Value> {
        let mut work = Vec::new();
        let value = self.convert_into(target, raw, owner, property, arena, ids, &mut work)?;
        self.populate(arena, ids, &mut work)?;
        Ok(value)
    }

    /// Value of `reference` as `target`.
    ///
    /// A foreign object seen for the first time gets a reserved slot,
    /// registered in `ids` and queued on `work` for population.
    fn resolve(
        &self,
        target: &NativeType,
        reference: Option<ForeignRef>,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
        work: &mut Vec<Populate>,
    ) -> MirrorResult<Value> {
        let Some(reference) = reference else {
            return Ok(Value::Null);
        };
        if !target.needs_wrap() {
            return match target {
                NativeType::Object => Ok(Value::Foreign(reference)),
                other => Err(self.mismatch(
                    reference,
                    format!(
                        "a foreign object cannot populate a {} value",
                        other.type_name()
                    ),
                )),
            };
        }

        let id = self
            .bridge
            .identify(reference)
            .map_err(|e| self.fail(reference, e))?;
        if let Some(handle) = ids.get(id) {
            return arena.value_of(handle);
        }

        match target {
            NativeType::Mirror(class_name) => {
                let class = self.registry.mirror_class(class_name)?;
                let handle = arena.reserve_instance(class.clone(), reference, id)?;
                ids.register(id, handle);
                trace!(
                    class = class.name(),
                    id = id.get(),
                    slot = handle.index(),
                    "wrapping instance"
                );
                work.push(Populate::Instance(handle));
                Ok(Value::Mirror(handle))
            }
            sequence => {
                let elements = self.enumerate(sequence, reference)?;
                let element = sequence.element().cloned().unwrap_or(NativeType::Object);
                let handle = arena.reserve_sequence(reference, id, element, elements.len())?;
                ids.register(id, handle);
                trace!(
                    id = id.get(),
                    slot = handle.index(),
                    len = elements.len(),
                    "wrapping sequence"
                );
                work.push(Populate::Sequence(handle, elements));
                Ok(Value::Sequence(handle))
            }
        }
    }

    /// Fill every queued slot, queueing the slots that its values reserve.
    fn populate(
        &self,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
        work: &mut Vec<Populate>,
    ) -> MirrorResult<()> {
        while let Some(next) = work.pop() {
            match next {
                Populate::Instance(handle) => {
                    let (class, reference) = {
                        let instance = arena.instance(handle)?;
                        (instance.class().clone(), instance.foreign_ref())
                    };
                    for accessor in class.properties() {
                        let raw = self
                            .bridge
                            .get_attribute(reference, &accessor.getter)
                            .map_err(|e| self.fail(reference, e))?;
                        let value = self.convert_into(
                            &accessor.native_type,
                            raw,
                            reference,
                            &accessor.getter,
                            arena,
                            ids,
                            work,
                        )?;
                        arena.instance_mut(handle)?.store(accessor.index, value);
                    }
                }
                Populate::Sequence(handle, elements) => {
                    let element = arena.sequence(handle)?.element_type().clone();
                    for (index, item) in elements.into_iter().enumerate() {
                        let value = self.resolve(&element, Some(item), arena, ids, work)?;
                        arena.sequence_mut(handle)?.store(index, value);
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn convert_into(
        &self,
        target: &NativeType,
        raw: ForeignValue,
        owner: ForeignRef,
        property: &str,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
        work: &mut Vec<Populate>,
    ) -> MirrorResult<Value> {
        match (target, raw) {
            (_, ForeignValue::Null) => Ok(Value::Null),
            (target, ForeignValue::Ref(r)) if target.needs_wrap() => {
                self.resolve(target, Some(r), arena, ids, work)
            }
            (NativeType::Object, raw) => Ok(Value::from_foreign(&raw)),
            (NativeType::Orderable, raw) if !raw.is_ref() => Ok(Value::from_foreign(&raw)),
            (NativeType::Bool, ForeignValue::Bool(b)) => Ok(Value::Bool(b)),
            (NativeType::Int, ForeignValue::Int(i)) => Ok(Value::Int(i)),
            (NativeType::Float, ForeignValue::Float(f)) => Ok(Value::Float(f)),
            (NativeType::Float, ForeignValue::Int(i)) => Ok(Value::Float(i as f64)),
            (NativeType::Str, ForeignValue::Str(s)) => Ok(Value::Str(s)),
            (target, raw) => Err(self.mismatch(
                owner,
                format!(
                    "property '{}' is declared {} but the foreign value is a {}",
                    property,
                    target.type_name(),
                    raw.type_name()
                ),
            )),
        }
    }

    /// Re-read every slot reachable from `root`.
    ///
    /// Each slot is visited once. Fields with pending local writes keep
    /// their local value. Foreign objects met for the first time are
    /// wrapped into new slots registered only in `ids`.
    pub fn refresh(
        &self,
        root: &Value,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
    ) -> MirrorResult<RefreshReport> {
        let mut report = RefreshReport::default();
        let existing = arena.len();
        let mut visited = FxHashSet::default();
        let mut pending: Vec<Handle> = root.handle().into_iter().collect();

        while let Some(handle) = pending.pop() {
            // Slots created by this pass were just read from the foreign side
            if handle.index() >= existing || !visited.insert(handle) {
                continue;
            }
            match arena.value_of(handle)? {
                Value::Mirror(_) => {
                    self.refresh_instance(handle, arena, ids, &mut pending, &mut report)?;
                    report.instances += 1;
                }
                _ => {
                    self.refresh_sequence(handle, arena, ids, &mut pending)?;
                    report.sequences += 1;
                }
            }
        }

        report.created = arena.len() - existing;
        Ok(report)
    }

    fn refresh_instance(
        &self,
        handle: Handle,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
        pending: &mut Vec<Handle>,
        report: &mut RefreshReport,
    ) -> MirrorResult<()> {
        let (class, reference) = {
            let instance = arena.instance(handle)?;
            (instance.class().clone(), instance.foreign_ref())
        };
        for accessor in class.properties() {
            if arena.instance(handle)?.is_dirty(accessor.index) {
                report.skipped += 1;
                continue;
            }
            let raw = self
                .bridge
                .get_attribute(reference, &accessor.getter)
                .map_err(|e| self.fail(reference, e))?;
            let value =
                self.convert(&accessor.native_type, raw, reference, &accessor.getter, arena, ids)?;
            pending.extend(value.handle());
            arena.instance_mut(handle)?.store(accessor.index, value);
        }
        Ok(())
    }

    fn refresh_sequence(
        &self,
        handle: Handle,
        arena: &mut MirrorArena,
        ids: &mut IdentityMap,
        pending: &mut Vec<Handle>,
    ) -> MirrorResult<()> {
        let (reference, element) = {
            let sequence = arena.sequence(handle)?;
            (sequence.foreign_ref(), sequence.element_type().clone())
        };
        let shape = NativeType::List(Box::new(element.clone()));
        let elements = self.enumerate(&shape, reference)?;
        let mut items = Vec::with_capacity(elements.len());
        for item in elements {
            let value = self.wrap(&element, Some(item), arena, ids)?;
            pending.extend(value.handle());
            items.push(value);
        }
        arena.sequence_mut(handle)?.replace_items(items);
        Ok(())
    }

    fn enumerate(
        &self,
        target: &NativeType,
        reference: ForeignRef,
    ) -> MirrorResult<Vec<ForeignRef>> {
        self.bridge
            .enumerate_elements(reference)
            .map_err(|e| match e {
                BridgeError::NotEnumerable(_) => self.mismatch(
                    reference,
                    format!(
                        "declared {} but the foreign value is not array-shaped",
                        target.type_name()
                    ),
                ),
                other => self.fail(reference, other),
            })
    }

    /// Printable form of a foreign object, for diagnostics
    pub fn printable(&self, reference: ForeignRef) -> String {
        self.bridge
            .describe(reference)
            .unwrap_or_else(|_| format!("{:?}", reference))
    }

    fn fail(&self, reference: ForeignRef, error: BridgeError) -> MirrorError {
        MirrorError::bridge(self.printable(reference), error)
    }

    fn mismatch(&self, reference: ForeignRef, detail: String) -> MirrorError {
        MirrorError::SchemaMismatch {
            object: self.printable(reference),
            detail,
        }
    }
}
