//! Module object and the interpreter-wide module cache (spec.md §3
//! "Module", §4.6 "Modules").

use hashbrown::HashMap;

use crate::object::{ObjectHeader, ObjectRef};
use crate::property_map::PropertyMap;
use crate::value::Value;

/// A loaded module: its own global-variable namespace plus the resolved
/// path it was loaded from (used as the cache key so `import`-ing the same
/// path twice returns the same module object rather than re-executing it).
///
/// Globals are addressable two ways: `global_slots`, a flat vector sized to
/// the owning executable's `global_slot_count` for statically-resolved
/// `LOAD_GLOBAL_BY_INDEX`/`STORE_GLOBAL_BY_INDEX`, and `globals`, a
/// property map keyed by interned name for the dynamic by-name path (also
/// what `to_string`/introspection walks).
pub struct ModuleObj {
    pub header: ObjectHeader,
    pub resolved_path: String,
    pub global_slots: Vec<Value>,
    pub globals: PropertyMap,
}

impl ModuleObj {
    pub fn new(header: ObjectHeader, resolved_path: String) -> Self {
        ModuleObj {
            header,
            resolved_path,
            global_slots: Vec::new(),
            globals: PropertyMap::new(),
        }
    }

    pub fn ensure_slot_capacity(&mut self, count: usize) {
        if self.global_slots.len() < count {
            self.global_slots.resize(count, Value::Undefined);
        }
    }
}

/// Maps a resolved module path to its already-loaded module object and the
/// value its top-level code produced, so re-importing the same path is a
/// cache hit (returning the same exported value, without re-running the
/// module's top-level statements) rather than a re-execution.
#[derive(Default)]
pub struct ModuleCache {
    by_path: HashMap<String, (ObjectRef, Value)>,
}

impl ModuleCache {
    pub fn new() -> Self {
        ModuleCache {
            by_path: HashMap::new(),
        }
    }

    pub fn get(&self, resolved_path: &str) -> Option<(ObjectRef, Value)> {
        self.by_path.get(resolved_path).copied()
    }

    pub fn insert(&mut self, resolved_path: String, module: ObjectRef, exported: Value) {
        self.by_path.insert(resolved_path, (module, exported));
    }
}
