//! The managed heap (spec.md §3 "Managed heap", §4.1).
//!
//! Rather than one block-carved byte arena with a threaded free list
//! (grounded in `examples/other_examples/901fd022_salewski-oxischeme__src-heap.rs.rs`,
//! whose `Arena<T>` this module's [`arena::Arena`] is a direct descendant
//! of), object kinds are segregated into one typed [`arena::Arena`] per
//! Rust type. Each arena is its own size class, which is the same memory
//! argument spec.md makes for size-classed cells, fewer moving parts to
//! get right without ever invoking the compiler.

mod arena;
mod collector;

use arena::Arena;

use crate::array_obj::ArrayObj;
use crate::error_obj::ErrorObj;
use crate::executable::Executable;
use crate::function_obj::FunctionObj;
use crate::module::ModuleObj;
use crate::object::{ArenaIndex, ObjectHeader, ObjectRef, TypeDescriptor};
use crate::plain_obj::PlainObj;
use crate::property_map::PropertyMap;
use crate::string_obj::{StringInterner, StringObj};
use crate::value::Value;

/// Well-known type descriptors allocated once at heap construction, mirroring
/// spec.md's "canonical true/false objects" style of interpreter-owned
/// singletons — here applied to the type metadata every other object's
/// header points at.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownTypes {
    pub plain: ObjectRef,
    pub string: ObjectRef,
    pub array: ObjectRef,
    pub function: ObjectRef,
    pub executable: ObjectRef,
    pub module: ObjectRef,
    pub error: ObjectRef,
    pub type_desc: ObjectRef,
}

/// Default bytes-allocated threshold that triggers a collection (spec.md
/// §4.1 default: 4 MiB).
pub const DEFAULT_GC_THRESHOLD_BYTES: usize = 4 * 1024 * 1024;

pub struct Heap {
    plain: Arena<PlainObj>,
    strings: Arena<StringObj>,
    arrays: Arena<ArrayObj>,
    functions: Arena<FunctionObj>,
    executables: Arena<Executable>,
    modules: Arena<ModuleObj>,
    errors: Arena<ErrorObj>,
    type_descriptors: Arena<TypeDescriptor>,
    pub interner: StringInterner,
    pub well_known: WellKnownTypes,
    bytes_allocated: usize,
    gc_threshold: usize,
    collections_run: u64,
}

/// Rough per-object byte estimate used to decide when to collect; not
/// exact (Rust's allocator overhead isn't visible here), same spirit as
/// spec.md's "approximate bytes allocated since last collection" counter.
fn size_estimate<T>() -> usize {
    std::mem::size_of::<T>() + 16
}

fn content_hash(s: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

impl Heap {
    pub fn new(gc_threshold: usize) -> Self {
        let mut type_descriptors: Arena<TypeDescriptor> = Arena::new();
        let alloc_bare = |arena: &mut Arena<TypeDescriptor>, name: &'static str| -> ObjectRef {
            let idx = arena.alloc(TypeDescriptor::bare(0, name));
            ObjectRef::TypeDescriptor(idx)
        };
        let plain = alloc_bare(&mut type_descriptors, "object");
        let string = alloc_bare(&mut type_descriptors, "string");
        let array = alloc_bare(&mut type_descriptors, "array");
        let function = alloc_bare(&mut type_descriptors, "function");
        let executable = alloc_bare(&mut type_descriptors, "executable");
        let module = alloc_bare(&mut type_descriptors, "module");
        let error = alloc_bare(&mut type_descriptors, "error");
        let type_desc = alloc_bare(&mut type_descriptors, "type");

        Heap {
            plain: Arena::new(),
            strings: Arena::new(),
            arrays: Arena::new(),
            functions: Arena::new(),
            executables: Arena::new(),
            modules: Arena::new(),
            errors: Arena::new(),
            type_descriptors,
            interner: StringInterner::new(),
            well_known: WellKnownTypes {
                plain,
                string,
                array,
                function,
                executable,
                module,
                error,
                type_desc,
            },
            bytes_allocated: 0,
            gc_threshold,
            collections_run: 0,
        }
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated >= self.gc_threshold
    }

    pub fn collections_run(&self) -> u64 {
        self.collections_run
    }

    fn charge(&mut self, bytes: usize) {
        self.bytes_allocated += bytes;
    }

    // --- allocation -----------------------------------------------------

    pub fn alloc_plain(&mut self) -> ObjectRef {
        let header = ObjectHeader::new(self.well_known.plain);
        let idx = self.plain.alloc(PlainObj::new(header));
        self.charge(size_estimate::<PlainObj>());
        ObjectRef::Plain(idx)
    }

    /// Allocates a flat string, interning it if an equal-content string
    /// isn't already interned. Returns the canonical `ObjectRef` either way
    /// (spec.md §4.2 "at most one flat string object per distinct byte
    /// sequence").
    pub fn intern_string(&mut self, contents: &str) -> ObjectRef {
        if let Some(existing) = self.interner.lookup(contents) {
            return existing;
        }
        let header = ObjectHeader::new(self.well_known.string);
        let idx = self.strings.alloc(StringObj::new_flat(header, contents.to_string()));
        let object_ref = ObjectRef::String(idx);
        self.charge(size_estimate::<StringObj>() + contents.len());
        self.interner.record(contents.to_string(), object_ref);
        object_ref
    }

    /// Allocates a rope node joining two existing string objects without
    /// copying their bytes (spec.md §4.2 "concatenation is O(1)").
    pub fn alloc_rope(&mut self, left: ObjectRef, right: ObjectRef) -> ObjectRef {
        let left_len = self.string_len(left).unwrap_or(0);
        let right_len = self.string_len(right).unwrap_or(0);
        let header = ObjectHeader::new(self.well_known.string);
        let idx = self
            .strings
            .alloc(StringObj::new_rope(header, left, right, left_len + right_len));
        self.charge(size_estimate::<StringObj>());
        ObjectRef::String(idx)
    }

    pub fn alloc_array(&mut self) -> ObjectRef {
        let header = ObjectHeader::new(self.well_known.array);
        let idx = self.arrays.alloc(ArrayObj::new(header));
        self.charge(size_estimate::<ArrayObj>());
        ObjectRef::Array(idx)
    }

    pub fn alloc_function(&mut self, function: FunctionObj) -> ObjectRef {
        self.charge(size_estimate::<FunctionObj>());
        ObjectRef::Function(self.functions.alloc(function))
    }

    pub fn alloc_executable(&mut self, executable: Executable) -> ObjectRef {
        self.charge(size_estimate::<Executable>());
        ObjectRef::Executable(self.executables.alloc(executable))
    }

    pub fn alloc_module(&mut self, resolved_path: String) -> ObjectRef {
        let header = ObjectHeader::new(self.well_known.module);
        let idx = self.modules.alloc(ModuleObj::new(header, resolved_path));
        self.charge(size_estimate::<ModuleObj>());
        ObjectRef::Module(idx)
    }

    pub fn alloc_error(&mut self, kind_label: &'static str, message: String) -> ObjectRef {
        let header = ObjectHeader::new(self.well_known.error);
        let idx = self.errors.alloc(ErrorObj::new(header, kind_label, message));
        self.charge(size_estimate::<ErrorObj>());
        ObjectRef::Error(idx)
    }

    // --- accessors --------------------------------------------------------

    pub fn plain(&self, idx: ArenaIndex) -> Option<&PlainObj> {
        self.plain.get(idx)
    }
    pub fn plain_mut(&mut self, idx: ArenaIndex) -> Option<&mut PlainObj> {
        self.plain.get_mut(idx)
    }
    pub fn string(&self, idx: ArenaIndex) -> Option<&StringObj> {
        self.strings.get(idx)
    }
    pub fn array(&self, idx: ArenaIndex) -> Option<&ArrayObj> {
        self.arrays.get(idx)
    }
    pub fn array_mut(&mut self, idx: ArenaIndex) -> Option<&mut ArrayObj> {
        self.arrays.get_mut(idx)
    }
    pub fn function(&self, idx: ArenaIndex) -> Option<&FunctionObj> {
        self.functions.get(idx)
    }
    pub fn executable(&self, idx: ArenaIndex) -> Option<&Executable> {
        self.executables.get(idx)
    }
    pub fn module(&self, idx: ArenaIndex) -> Option<&ModuleObj> {
        self.modules.get(idx)
    }
    pub fn module_mut(&mut self, idx: ArenaIndex) -> Option<&mut ModuleObj> {
        self.modules.get_mut(idx)
    }
    pub fn error(&self, idx: ArenaIndex) -> Option<&ErrorObj> {
        self.errors.get(idx)
    }
    pub fn type_descriptor(&self, idx: ArenaIndex) -> Option<&TypeDescriptor> {
        self.type_descriptors.get(idx)
    }

    /// Flattens a rope string in place, re-interning its contents, and
    /// returns the (now-flat) contents. Called whenever code needs to read
    /// a string's bytes (concatenation itself stays lazy).
    pub fn flatten_string(&mut self, object_ref: ObjectRef) -> Option<String> {
        let idx = match object_ref {
            ObjectRef::String(i) => i,
            _ => return None,
        };
        let flattened = match self.strings.get(idx)? {
            StringObj::Flat { bytes, .. } => return Some(bytes.clone()),
            StringObj::Rope { left, right, .. } => {
                let (left, right) = (*left, *right);
                let mut buf = String::new();
                self.collect_rope_bytes(left, &mut buf);
                self.collect_rope_bytes(right, &mut buf);
                buf
            }
        };
        if let Some(existing) = self.interner.lookup(&flattened) {
            // An equal flat string already exists; repoint this node's
            // slot to behave like that one by overwriting in place so
            // existing `ObjectRef`s to the rope node keep working.
            let header = *self.strings.get(idx)?.header();
            if let Some(slot) = self.strings.get_mut(idx) {
                *slot = StringObj::new_flat(header, flattened.clone());
            }
            let _ = existing;
            return Some(flattened);
        }
        let header = *self.strings.get(idx)?.header();
        if let Some(slot) = self.strings.get_mut(idx) {
            *slot = StringObj::new_flat(header, flattened.clone());
        }
        self.interner.record(flattened.clone(), object_ref);
        Some(flattened)
    }

    fn collect_rope_bytes(&mut self, object_ref: ObjectRef, out: &mut String) {
        if let Some(s) = self.flatten_string(object_ref) {
            out.push_str(&s);
        }
    }

    /// Hashes a string's *content* (not its arena index), caching the
    /// result in the object's header so repeated property-map probes don't
    /// re-walk rope nodes or re-hash bytes (spec.md §3 "cached hash").
    /// This is the hash every property-map lookup keyed by a string must
    /// use, so two distinct interned copies of equal content (which cannot
    /// happen once interned, but may transiently during construction)
    /// still probe the same bucket.
    pub fn hash_string_content(&mut self, object_ref: ObjectRef) -> u64 {
        if let ObjectRef::String(idx) = object_ref {
            if let Some(s) = self.strings.get(idx) {
                if let Some(cached) = s.header().hash_cache {
                    return cached;
                }
            }
        }
        let contents = self.flatten_string(object_ref).unwrap_or_default();
        let hash = content_hash(&contents);
        if let ObjectRef::String(idx) = object_ref {
            if let Some(s) = self.strings.get_mut(idx) {
                s.header_mut().hash_cache = Some(hash);
            }
        }
        hash
    }

    pub fn string_len(&self, object_ref: ObjectRef) -> Option<usize> {
        match object_ref {
            ObjectRef::String(idx) => self.strings.get(idx).map(|s| s.len()),
            _ => None,
        }
    }

    /// Container-emptiness half of truthiness (spec.md §4.3); primitives
    /// are handled by `Value::primitive_truthy`.
    pub fn is_falsy_object(&self, object_ref: ObjectRef) -> bool {
        match object_ref {
            ObjectRef::String(idx) => self.strings.get(idx).map(|s| s.is_empty()).unwrap_or(false),
            ObjectRef::Array(idx) => self.arrays.get(idx).map(|a| a.is_empty()).unwrap_or(false),
            _ => false,
        }
    }

    pub fn properties_of(&self, object_ref: ObjectRef) -> Option<&PropertyMap> {
        match object_ref {
            ObjectRef::Plain(idx) => self.plain.get(idx).map(|o| &o.properties),
            ObjectRef::Module(idx) => self.modules.get(idx).map(|m| &m.globals),
            _ => None,
        }
    }

    pub fn properties_of_mut(&mut self, object_ref: ObjectRef) -> Option<&mut PropertyMap> {
        match object_ref {
            ObjectRef::Plain(idx) => self.plain.get_mut(idx).map(|o| &mut o.properties),
            ObjectRef::Module(idx) => self.modules.get_mut(idx).map(|m| &mut m.globals),
            _ => None,
        }
    }

    /// Renders a value for `print`/string conversion, resolving object
    /// contents structurally (spec.md §4.3 "to_string").
    pub fn to_display_string(&mut self, value: Value) -> String {
        match value {
            Value::None => "none".to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Object(obj) => self.object_to_display_string(obj),
        }
    }

    fn object_to_display_string(&mut self, object_ref: ObjectRef) -> String {
        match object_ref {
            ObjectRef::String(_) => self.flatten_string(object_ref).unwrap_or_default(),
            ObjectRef::Array(idx) => {
                let elements: Vec<Value> = self.arrays.get(idx).map(|a| a.as_slice().to_vec()).unwrap_or_default();
                let parts: Vec<String> = elements.into_iter().map(|v| self.to_display_string(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            ObjectRef::Plain(idx) => {
                let entries = self
                    .plain
                    .get(idx)
                    .map(|o| o.properties.iter_in_insertion_order())
                    .unwrap_or_default();
                let mut parts = Vec::new();
                for (key, value) in entries {
                    let key_str = self.flatten_string(key).unwrap_or_default();
                    let value_str = self.to_display_string(value);
                    parts.push(format!("{key_str}: {value_str}"));
                }
                format!("{{{}}}", parts.join(", "))
            }
            ObjectRef::Function(idx) => self
                .functions
                .get(idx)
                .map(|f| format!("<function {}>", f.display_name()))
                .unwrap_or_else(|| "<function>".to_string()),
            ObjectRef::Error(idx) => self
                .errors
                .get(idx)
                .map(|e| e.report())
                .unwrap_or_else(|| "<error>".to_string()),
            ObjectRef::Module(idx) => self
                .modules
                .get(idx)
                .map(|m| format!("<module '{}'>", m.resolved_path))
                .unwrap_or_else(|| "<module>".to_string()),
            ObjectRef::Executable(idx) => self
                .executables
                .get(idx)
                .map(|e| format!("<executable {}>", e.name))
                .unwrap_or_else(|| "<executable>".to_string()),
            ObjectRef::TypeDescriptor(idx) => self
                .type_descriptors
                .get(idx)
                .map(|t| format!("<type {}>", t.raw_name))
                .unwrap_or_else(|| "<type>".to_string()),
        }
    }

    /// Runs a full mark-sweep collection rooted at `roots`, reclaiming
    /// every unreachable object across every arena (spec.md §4.1).
    pub fn collect(&mut self, roots: &[ObjectRef]) {
        collector::collect(self, roots);
        self.bytes_allocated = 0;
        self.collections_run += 1;
    }

    pub(crate) fn arenas_mut(
        &mut self,
    ) -> (
        &mut Arena<PlainObj>,
        &mut Arena<StringObj>,
        &mut Arena<ArrayObj>,
        &mut Arena<FunctionObj>,
        &mut Arena<Executable>,
        &mut Arena<ModuleObj>,
        &mut Arena<ErrorObj>,
        &mut Arena<TypeDescriptor>,
    ) {
        (
            &mut self.plain,
            &mut self.strings,
            &mut self.arrays,
            &mut self.functions,
            &mut self.executables,
            &mut self.modules,
            &mut self.errors,
            &mut self.type_descriptors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_content_addressed() {
        let mut heap = Heap::new(DEFAULT_GC_THRESHOLD_BYTES);
        let a = heap.intern_string("hello");
        let b = heap.intern_string("hello");
        assert_eq!(a, b);
        let c = heap.intern_string("world");
        assert_ne!(a, c);
    }

    #[test]
    fn rope_flattens_and_reinterns() {
        let mut heap = Heap::new(DEFAULT_GC_THRESHOLD_BYTES);
        let left = heap.intern_string("foo");
        let right = heap.intern_string("bar");
        let rope = heap.alloc_rope(left, right);
        assert_eq!(heap.string_len(rope), Some(6));
        let flat = heap.flatten_string(rope).unwrap();
        assert_eq!(flat, "foobar");
        assert_eq!(heap.interner.lookup("foobar"), Some(rope));
    }

    #[test]
    fn collect_reclaims_unreachable_array() {
        let mut heap = Heap::new(DEFAULT_GC_THRESHOLD_BYTES);
        let kept = heap.alloc_array();
        let _garbage = heap.alloc_array();
        heap.collect(&[kept]);
        assert!(matches!(kept, ObjectRef::Array(idx) if heap.array(idx).is_some()));
    }
}
