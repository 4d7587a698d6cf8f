//! Wrapped mirror graphs
//!
//! A `MirrorGraph` is what one wrap session produces: the arena of mirrors,
//! the identity map they were registered in, the root value, and the bridge
//! and policy switch its setters use. This is the surface the external
//! engine programs against.

use std::sync::Arc;

use tracing::trace;
use umbra_sdk::{AttributeBridge, ForeignId, ForeignRef, ForeignValue};

use crate::arena::{MirrorArena, MirrorInstance};
use crate::class::Member;
use crate::error::{MirrorError, MirrorResult};
use crate::identity::IdentityMap;
use crate::policy::{PolicySwitch, WritePolicy};
use crate::schema::NativeType;
use crate::session::{SessionId, WrapMode};
use crate::value::{FromMirror, Handle, Value};

/// The native graph mirroring one top-level foreign object.
pub struct MirrorGraph {
    pub(crate) session: SessionId,
    pub(crate) mode: WrapMode,
    pub(crate) arena: MirrorArena,
    pub(crate) ids: IdentityMap,
    /// Objects first mirrored by a refresh pass, reused by later passes
    pub(crate) refreshed: IdentityMap,
    pub(crate) root: Value,
    pub(crate) bridge: Arc<dyn AttributeBridge>,
    pub(crate) policy: PolicySwitch,
}

impl MirrorGraph {
    /// Session that produced this graph
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Whether setters talk to the foreign runtime
    pub fn mode(&self) -> WrapMode {
        self.mode
    }

    /// Root value (null when the wrapped reference was null)
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Root instance handle
    pub fn root_handle(&self) -> Option<Handle> {
        self.root.handle()
    }

    /// The arena holding every mirror of this graph
    pub fn arena(&self) -> &MirrorArena {
        &self.arena
    }

    /// The identity map filled by the initial wrap
    pub fn identity_map(&self) -> &IdentityMap {
        &self.ids
    }

    /// Mirrors created by refresh passes for objects the wrap never saw.
    ///
    /// These are kept apart from `identity_map` and reused by every later
    /// refresh of this graph.
    pub fn refreshed_map(&self) -> &IdentityMap {
        &self.refreshed
    }

    /// Current write policy
    pub fn policy(&self) -> WritePolicy {
        self.policy.get()
    }

    /// Mirror registered for a foreign id
    pub fn lookup(&self, id: ForeignId) -> Option<Value> {
        self.ids
            .get(id)
            .and_then(|handle| self.arena.value_of(handle).ok())
    }

    /// Borrow an instance
    pub fn instance(&self, handle: Handle) -> MirrorResult<&MirrorInstance> {
        self.arena.instance(handle)
    }

    /// Elements of a sequence
    pub fn sequence(&self, handle: Handle) -> MirrorResult<&[Value]> {
        Ok(self.arena.sequence(handle)?.items())
    }

    /// Call a getter
    pub fn get(&self, handle: Handle, getter: &str) -> MirrorResult<&Value> {
        let instance = self.arena.instance(handle)?;
        match instance.class().resolve(getter)? {
            Member::Getter(index) => instance
                .field(index)
                .ok_or(MirrorError::InvalidHandle(handle.index(), "populated instance")),
            _ => Err(MirrorError::UnknownMember {
                class: instance.class().qualified_name().to_string(),
                member: format!("getter {}", getter),
            }),
        }
    }

    /// Call a getter and extract a typed value
    pub fn get_as<T: FromMirror>(&self, handle: Handle, getter: &str) -> MirrorResult<T> {
        let value = self.get(handle, getter)?;
        T::from_mirror(value).ok_or_else(|| MirrorError::SchemaMismatch {
            object: self.printable(handle),
            detail: format!(
                "'{}' holds a {} value, not {}",
                getter,
                value.type_name(),
                T::TYPE_NAME
            ),
        })
    }

    /// Call a setter.
    ///
    /// The local field is always updated. Under `push` the value is then
    /// written through `set-attribute` under the property's getter name;
    /// under `local-only` the field stays pending until `resync`.
    pub fn set(&mut self, handle: Handle, setter: &str, value: Value) -> MirrorResult<()> {
        let (index, property, native_type, reference) = {
            let instance = self.arena.instance(handle)?;
            let class = instance.class();
            let index = match class.resolve(setter)? {
                Member::Setter(index) => index,
                _ => {
                    return Err(MirrorError::UnknownMember {
                        class: class.qualified_name().to_string(),
                        member: format!("setter {}", setter),
                    })
                }
            };
            let accessor = &class.properties()[index];
            (
                index,
                accessor.getter.clone(),
                accessor.native_type.clone(),
                instance.foreign_ref(),
            )
        };
        self.check_assignable(handle, &native_type, &property, &value)?;

        let instance = self.arena.instance_mut(handle)?;
        instance.store(index, value.clone());
        instance.mark(index, true);

        match self.policy.get() {
            WritePolicy::LocalOnly => {
                trace!(slot = handle.index(), property = %property, "local write");
                Ok(())
            }
            WritePolicy::Push => {
                self.push(reference, &property, &value)?;
                self.arena.instance_mut(handle)?.mark(index, false);
                Ok(())
            }
        }
    }

    /// Dispatch a member call by name.
    ///
    /// Getters, the identity method and the string-conversion method take
    /// no arguments; setters take one and return null.
    pub fn invoke(&mut self, handle: Handle, member: &str, args: &[Value]) -> MirrorResult<Value> {
        let resolved = self.arena.instance(handle)?.class().resolve(member)?;
        let arity = match resolved {
            Member::Setter(_) => 1,
            _ => 0,
        };
        if args.len() != arity {
            return Err(MirrorError::SchemaMismatch {
                object: self.printable(handle),
                detail: format!(
                    "'{}' takes {} argument(s), got {}",
                    member,
                    arity,
                    args.len()
                ),
            });
        }
        match resolved {
            Member::Getter(_) => self.get(handle, member).cloned(),
            Member::Setter(_) => {
                self.set(handle, member, args[0].clone())?;
                Ok(Value::Null)
            }
            Member::ForeignRef => Ok(Value::Foreign(self.foreign_ref(handle)?)),
            Member::Describe => Ok(Value::Str(self.describe(handle)?)),
        }
    }

    /// Foreign reference held by a mirror or sequence
    pub fn foreign_ref(&self, handle: Handle) -> MirrorResult<ForeignRef> {
        self.arena.foreign_ref(handle)
    }

    /// Printable form, delegated to the foreign runtime
    pub fn describe(&self, handle: Handle) -> MirrorResult<String> {
        let reference = self.arena.foreign_ref(handle)?;
        self.bridge
            .describe(reference)
            .map_err(|e| MirrorError::bridge(format!("{:?}", reference), e))
    }

    /// Push every pending local write through `set-attribute`.
    ///
    /// Returns the number of writes pushed. On failure the remaining fields,
    /// including the one that failed, stay pending.
    pub fn resync(&mut self) -> MirrorResult<usize> {
        let pending: Vec<(Handle, usize)> = self
            .arena
            .instance_handles()
            .filter_map(|handle| self.arena.instance(handle).ok().map(|i| (handle, i)))
            .flat_map(|(handle, instance)| {
                instance.dirty_fields().map(move |index| (handle, index))
            })
            .collect();

        let mut pushed = 0;
        for (handle, index) in pending {
            let (reference, property, value) = {
                let instance = self.arena.instance(handle)?;
                (
                    instance.foreign_ref(),
                    instance.class().properties()[index].getter.clone(),
                    instance.fields()[index].clone(),
                )
            };
            self.push(reference, &property, &value)?;
            self.arena.instance_mut(handle)?.mark(index, false);
            pushed += 1;
        }
        Ok(pushed)
    }

    /// Number of fields with pending local writes
    pub fn pending_writes(&self) -> usize {
        self.arena
            .instance_handles()
            .filter_map(|handle| self.arena.instance(handle).ok())
            .map(|instance| instance.dirty_fields().count())
            .sum()
    }

    /// Foreign form of a native value
    pub fn to_foreign(&self, value: &Value) -> MirrorResult<ForeignValue> {
        if let Some(scalar) = value.to_foreign_scalar() {
            return Ok(scalar);
        }
        match value {
            Value::Mirror(handle) | Value::Sequence(handle) => {
                Ok(ForeignValue::Ref(self.arena.foreign_ref(*handle)?))
            }
            other => Err(MirrorError::SchemaMismatch {
                object: "native value".to_string(),
                detail: format!("{} values cannot cross the bridge", other.type_name()),
            }),
        }
    }

    fn push(&self, reference: ForeignRef, property: &str, value: &Value) -> MirrorResult<()> {
        let foreign = self.to_foreign(value)?;
        trace!(property = %property, value = foreign.type_name(), "pushing write");
        self.bridge
            .set_attribute(reference, property, foreign)
            .map_err(|e| MirrorError::bridge(self.describe_ref(reference), e))
    }

    fn check_assignable(
        &self,
        handle: Handle,
        target: &NativeType,
        property: &str,
        value: &Value,
    ) -> MirrorResult<()> {
        let ok = match (target, value) {
            (_, Value::Null) => true,
            (NativeType::Bool, Value::Bool(_))
            | (NativeType::Int, Value::Int(_))
            | (NativeType::Float, Value::Float(_) | Value::Int(_))
            | (NativeType::Str, Value::Str(_)) => true,
            (NativeType::Orderable, v) => {
                v.to_foreign_scalar().is_some() && !matches!(v, Value::Foreign(_))
            }
            (NativeType::Object, v) => !matches!(v, Value::Opaque(_)),
            (NativeType::Mirror(class), Value::Mirror(h)) => self
                .arena
                .instance(*h)
                .map(|instance| instance.class().name() == class.as_str())
                .unwrap_or(false),
            (NativeType::Array(_) | NativeType::List(_), Value::Sequence(h)) => {
                self.arena.sequence(*h).is_ok()
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(MirrorError::SchemaMismatch {
                object: self.printable(handle),
                detail: format!(
                    "cannot assign a {} value to '{}' declared {}",
                    value.type_name(),
                    property,
                    target.type_name()
                ),
            })
        }
    }

    fn printable(&self, handle: Handle) -> String {
        self.describe(handle)
            .unwrap_or_else(|_| format!("mirror {}", handle))
    }

    fn describe_ref(&self, reference: ForeignRef) -> String {
        self.bridge
            .describe(reference)
            .unwrap_or_else(|_| format!("{:?}", reference))
    }
}

impl std::fmt::Debug for MirrorGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorGraph")
            .field("session", &self.session)
            .field("mode", &self.mode)
            .field("root", &self.root)
            .field("slots", &self.arena.len())
            .field("mirrors", &self.ids.len())
            .field("refreshed", &self.refreshed.len())
            .finish()
    }
}
