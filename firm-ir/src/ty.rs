//! Entity & type model (§3): linker-visible objects and the types that
//! describe them.
//!
//! Kept free of any dependency on [`crate::graph`] — a method entity
//! only records which graph implements it by id, so `ty` and `graph`
//! can be built and tested independently, mirroring how `fuel_tx`'s
//! field/type definitions don't reach back into `fuel_vm`'s
//! interpreter state.

use std::collections::HashMap;

use firm_asm::EntityRef;
use firm_types::Mode;

/// A stable handle into a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// The raw arena index, for the textual format's `TYPENR` tokens
    /// (§6) — not meaningful across different `TypeTable`s.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Reconstructs a `TypeId` from a raw arena index, e.g. while
    /// parsing the textual format's `typegraph` section.
    pub fn from_index(index: u32) -> Self {
        TypeId(index)
    }
}

/// A stable handle into an [`EntityTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Converts to the crate-local reference `firm-asm` attribute
    /// payloads carry (they cannot name `EntityId` directly since
    /// `firm-asm` does not depend on `firm-ir`).
    pub fn as_ref(self) -> EntityRef {
        EntityRef(self.0)
    }

    /// Recovers an `EntityId` from a `firm-asm` attribute's
    /// [`EntityRef`], resolved against whichever [`EntityTable`]
    /// produced it.
    pub fn from_ref(r: EntityRef) -> Self {
        EntityId(r.0)
    }
}

/// Calling convention tag carried by a method type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// The target's default convention.
    Default,
    /// The C calling convention.
    C,
    /// A register-heavy "fast" convention.
    Fast,
}

/// A struct/class/union field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name, for diagnostics and the textual format.
    pub name: String,
    /// Field type.
    pub ty: TypeId,
    /// Byte offset within the aggregate.
    pub offset: u32,
}

/// A method (function) type: ordered parameter and result type lists,
/// a calling convention, and variadicity (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodType {
    /// Parameter types, in order.
    pub params: Vec<TypeId>,
    /// Result types, in order.
    pub results: Vec<TypeId>,
    /// Calling convention.
    pub calling_convention: CallingConvention,
    /// `true` if this method accepts a variable tail of arguments.
    pub variadic: bool,
}

impl MethodType {
    /// Rewrites every doubleword parameter and result into an ordered
    /// pair of word-width entries, per §4.10's "Method-type rewriting".
    ///
    /// `is_doubleword` identifies which types in `types` are
    /// doubleword-width; `halve` maps such a type to its
    /// `(low, high)` word-width pair, already ordered for the target's
    /// endianness (the caller picks the order since that's an
    /// endianness decision, not a type-table concern).
    pub fn rewrite_doubleword(
        &self,
        is_doubleword: impl Fn(TypeId) -> bool,
        halve: impl Fn(TypeId) -> (TypeId, TypeId),
    ) -> MethodType {
        let expand = |list: &[TypeId]| -> Vec<TypeId> {
            let mut out = Vec::with_capacity(list.len());
            for &t in list {
                if is_doubleword(t) {
                    let (low, high) = halve(t);
                    out.push(low);
                    out.push(high);
                } else {
                    out.push(t);
                }
            }
            out
        };
        MethodType {
            params: expand(&self.params),
            results: expand(&self.results),
            calling_convention: self.calling_convention,
            variadic: self.variadic,
        }
    }
}

/// A type (§3): classes, unions, structs, arrays, methods (with
/// calling convention and variadicity), pointers, primitives,
/// enumerations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A class with fields and, conceptually, a vtable (not modeled
    /// here — out of the core's scope).
    Class { name: String, fields: Vec<Field> },
    /// A union: all members share the same storage.
    Union { name: String, members: Vec<Field> },
    /// A struct with ordered, offset-assigned fields.
    Struct { name: String, fields: Vec<Field> },
    /// A fixed-length array of a uniform element type.
    Array { element: TypeId, length: u32 },
    /// A function signature.
    Method(MethodType),
    /// A pointer to a pointee type.
    Pointer { pointee: TypeId },
    /// A primitive value type, carrying its mode.
    Primitive(Mode),
    /// An enumeration over an underlying integer type.
    Enumeration {
        name: String,
        underlying: TypeId,
        variants: Vec<(String, i128)>,
    },
}

/// What kind of linker-visible object an [`Entity`] is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// A function; `graph` names the entity id of the graph that
    /// implements it, if a body exists (declarations have `None`).
    Method { lowered_type: Option<TypeId> },
    /// A global variable.
    Global,
    /// A struct/class/union field (duplicated from the owning type's
    /// field list for name-based lookup).
    Field,
    /// A method parameter, with its (possibly lowering-renumbered)
    /// frame-slot parameter number and, once lowered, the mode of its
    /// low half (§4.10: "the entity also records the low-half mode for
    /// later calling-convention fix-up").
    Parameter {
        number: u32,
        low_half_mode: Option<Mode>,
    },
}

/// A linker-visible object: a method, global, field, or parameter
/// (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// The entity's name (mangled or source, at the core's discretion).
    pub name: String,
    /// This entity's type.
    pub ty: TypeId,
    /// What kind of entity this is and kind-specific data.
    pub kind: EntityKind,
}

/// The process-wide (or per-compilation-unit) table of types and
/// entities.
///
/// Grounded on `fuel-types`'s small owning-collection pattern, adapted
/// from single-value newtypes to a pair of append-only arenas since
/// types and entities form a mutually-referential graph of their own
/// (a method type names its param/result types; a method entity names
/// its type).
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<Type>,
    entities: Vec<Entity>,
    by_name: HashMap<String, EntityId>,
}

impl TypeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a type, returning its id. Types are not deduplicated by
    /// structural equality — callers that want sharing should cache
    /// the `TypeId` themselves (mirrors the tarval/type interning note
    /// in §5: process-wide tables are read-mostly after population,
    /// not a hash-consing service).
    pub fn add_type(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// Borrows a type.
    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// Mutably borrows a type, used by double-word lowering to install
    /// a method's lowered form.
    pub fn ty_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0 as usize]
    }

    /// Registers a new entity, returning its id.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.by_name.insert(entity.name.clone(), id);
        self.entities.push(entity);
        id
    }

    /// Borrows an entity.
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0 as usize]
    }

    /// Mutably borrows an entity.
    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0 as usize]
    }

    /// Looks up an entity by name.
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    /// Resolves a `firm-asm` attribute's [`EntityRef`] to a concrete
    /// entity, failing if it is out of range.
    pub fn resolve(&self, r: EntityRef) -> Option<&Entity> {
        self.entities.get(r.0 as usize)
    }

    /// Iterates every registered type along with its id, in arena
    /// order — used by the textual format's `typegraph` writer (§6).
    pub fn types_iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32), ty))
    }

    /// Iterates every registered entity along with its id, in arena
    /// order — used by the textual format's `typegraph` writer (§6).
    pub fn entities_iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, entity)| (EntityId(i as u32), entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firm_types::{Mode, Signedness};

    #[test]
    fn method_type_doubleword_rewrite_preserves_order() {
        let mut table = TypeTable::new();
        let word = table.add_type(Type::Primitive(
            Mode::new_int("Iu32", 32, Signedness::Unsigned, 32).unwrap(),
        ));
        let dword = table.add_type(Type::Primitive(
            Mode::new_int("Iu64", 64, Signedness::Unsigned, 64).unwrap(),
        ));
        let method = MethodType {
            params: vec![dword, word],
            results: vec![dword],
            calling_convention: CallingConvention::Default,
            variadic: false,
        };
        let lowered = method.rewrite_doubleword(|t| t == dword, |_| (word, word));
        assert_eq!(lowered.params, vec![word, word, word]);
        assert_eq!(lowered.results, vec![word, word]);
    }

    #[test]
    fn entity_round_trips_through_ref() {
        let mut table = TypeTable::new();
        let ty = table.add_type(Type::Primitive(Mode::boolean()));
        let id = table.add_entity(Entity {
            name: "flag".into(),
            ty,
            kind: EntityKind::Global,
        });
        assert_eq!(table.resolve(id.as_ref()).unwrap().name, "flag");
        assert_eq!(table.find_entity("flag"), Some(id));
    }
}
