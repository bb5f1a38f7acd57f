//! Object header and type descriptor (spec.md §3 "Object header", "Type
//! descriptor").
//!
//! Every heap-allocated value is stored in one of the heap's typed arenas
//! (see [`crate::heap`]); [`ObjectRef`] is the handle a `Value::Object`
//! carries. Rather than threading a raw free-list pointer through the
//! header the way a C heap would, each arena owns its own free list of
//! slot indices (idiomatic for a safe Rust arena) — the header still
//! carries everything spec.md asks callers to reason about: liveness,
//! the mark bit, the type descriptor, and a cached hash.

use std::fmt;

/// An index into one of the heap's arenas, paired with a generation counter.
///
/// The generation is bumped every time a slot is freed and reused, so a
/// stale [`ObjectRef`] kept around past a collection that reclaimed it is
/// detected (as an internal error) instead of silently aliasing whatever
/// object now occupies that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaIndex {
    pub index: u32,
    pub generation: u32,
}

/// A handle to a heap object. The variant identifies which arena it lives
/// in, standing in for spec.md's "pointer to a type descriptor" in the
/// common case where the concrete Rust type already determines the kind
/// (spec.md §9 Design Notes explicitly allows "the type tag can select a
/// variant whose methods are known statically" as an alternative to a
/// stored vtable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Plain(ArenaIndex),
    String(ArenaIndex),
    Array(ArenaIndex),
    Function(ArenaIndex),
    Executable(ArenaIndex),
    Module(ArenaIndex),
    Error(ArenaIndex),
    TypeDescriptor(ArenaIndex),
}

impl ObjectRef {
    pub fn arena_index(&self) -> ArenaIndex {
        match self {
            ObjectRef::Plain(i)
            | ObjectRef::String(i)
            | ObjectRef::Array(i)
            | ObjectRef::Function(i)
            | ObjectRef::Executable(i)
            | ObjectRef::Module(i)
            | ObjectRef::Error(i)
            | ObjectRef::TypeDescriptor(i) => *i,
        }
    }

    pub fn static_type_name(&self) -> &'static str {
        match self {
            ObjectRef::Plain(_) => "object",
            ObjectRef::String(_) => "string",
            ObjectRef::Array(_) => "array",
            ObjectRef::Function(_) => "function",
            ObjectRef::Executable(_) => "executable",
            ObjectRef::Module(_) => "module",
            ObjectRef::Error(_) => "error",
            ObjectRef::TypeDescriptor(_) => "type",
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} #{}>", self.static_type_name(), self.arena_index().index)
    }
}

/// Liveness state of a heap cell, tracked independently of the mark bit so
/// the sweep phase can distinguish "already free" from "just collected"
/// (spec.md invariant: "every other cell is on a free-list with state
/// `dead`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Alive,
    Dead,
}

/// Common prefix embedded in every heap object (spec.md §3 "Object header").
#[derive(Debug, Clone, Copy)]
pub struct ObjectHeader {
    pub state: CellState,
    pub marked: bool,
    pub type_desc: ObjectRef,
    pub hash_cache: Option<u64>,
}

impl ObjectHeader {
    pub fn new(type_desc: ObjectRef) -> Self {
        ObjectHeader {
            state: CellState::Alive,
            marked: false,
            type_desc,
            hash_cache: None,
        }
    }
}

/// Function-pointer table a [`TypeDescriptor`] carries (spec.md §3, §4.1).
///
/// `visit` appends every `ObjectRef` directly reachable from `obj` onto
/// `worklist` for the collector's transitive trace; `finalize` runs right
/// before a dead cell is returned to its arena's free list.
pub type FinalizeFn = fn(ObjectRef, &mut crate::heap::Heap);
pub type ToStringFn = fn(ObjectRef, &crate::heap::Heap) -> String;
pub type HashFn = fn(ObjectRef, &crate::heap::Heap) -> u64;
pub type VisitFn = fn(ObjectRef, &crate::heap::Heap, &mut Vec<ObjectRef>);

/// Per-type object carrying size, display name and lifecycle hooks
/// (spec.md §3 "Type descriptor"). Type descriptors are themselves heap
/// objects, rooted by [`crate::istate::InterpreterState`] (spec.md §4.1
/// root enumeration doesn't call these out by name but they must survive
/// collection for the VM to keep dispatching through them).
pub struct TypeDescriptor {
    pub header: ObjectHeader,
    pub size_hint: usize,
    pub raw_name: &'static str,
    pub interned_name: Option<ObjectRef>,
    pub base: Option<ObjectRef>,
    pub finalize: FinalizeFn,
    pub to_string: ToStringFn,
    pub hash: HashFn,
    pub visit: VisitFn,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("raw_name", &self.raw_name)
            .field("size_hint", &self.size_hint)
            .finish()
    }
}

fn noop_finalize(_obj: ObjectRef, _heap: &mut crate::heap::Heap) {}

fn noop_visit(_obj: ObjectRef, _heap: &crate::heap::Heap, _worklist: &mut Vec<ObjectRef>) {}

impl TypeDescriptor {
    /// A descriptor with the no-op lifecycle hooks, used as a placeholder
    /// for the `TypeDescriptor` kind's own self-describing descriptor
    /// (type descriptors don't reference other objects besides their own
    /// interned name and optional base, handled specially by the collector).
    pub fn bare(size_hint: usize, raw_name: &'static str) -> Self {
        TypeDescriptor {
            header: ObjectHeader::new(ObjectRef::TypeDescriptor(ArenaIndex {
                index: 0,
                generation: 0,
            })),
            size_hint,
            raw_name,
            interned_name: None,
            base: None,
            finalize: noop_finalize,
            to_string: |obj, _heap| format!("{obj}"),
            hash: |obj, _heap| {
                let idx = obj.arena_index();
                (idx.index as u64) ^ ((idx.generation as u64) << 32)
            },
            visit: noop_visit,
        }
    }
}
