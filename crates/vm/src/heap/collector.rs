//! The mark-sweep trace itself (spec.md §4.1 "Garbage collection").
//!
//! Traversal is a plain worklist walk matching
//! `examples/other_examples/901fd022_salewski-oxischeme__src-heap.rs.rs`'s
//! mark phase; rather than going through `TypeDescriptor`'s stored
//! `VisitFn` (spec.md's per-type table), children are read directly by
//! matching on `ObjectRef`'s variant — the "type tag selects a variant
//! whose methods are known statically" alternative spec.md's Design Notes
//! call out explicitly.

use crate::object::ObjectRef;
use crate::string_obj::StringObj;
use crate::value::Value;

use super::Heap;

pub(crate) fn collect(heap: &mut Heap, roots: &[ObjectRef]) {
    let mut worklist: Vec<ObjectRef> = roots.to_vec();
    while let Some(obj) = worklist.pop() {
        if mark(heap, obj) {
            push_children(heap, obj, &mut worklist);
        }
    }
    sweep(heap);
}

fn mark(heap: &mut Heap, obj: ObjectRef) -> bool {
    let (plain, strings, arrays, functions, executables, modules, errors, type_descriptors) =
        heap.arenas_mut();
    match obj {
        ObjectRef::Plain(i) => plain.mark(i),
        ObjectRef::String(i) => strings.mark(i),
        ObjectRef::Array(i) => arrays.mark(i),
        ObjectRef::Function(i) => functions.mark(i),
        ObjectRef::Executable(i) => executables.mark(i),
        ObjectRef::Module(i) => modules.mark(i),
        ObjectRef::Error(i) => errors.mark(i),
        ObjectRef::TypeDescriptor(i) => type_descriptors.mark(i),
    }
}

fn push_children(heap: &Heap, obj: ObjectRef, worklist: &mut Vec<ObjectRef>) {
    match obj {
        ObjectRef::Plain(i) => {
            if let Some(o) = heap.plain(i) {
                worklist.push(o.header.type_desc);
                for (key, value) in o.properties.iter_in_insertion_order() {
                    worklist.push(key);
                    if let Value::Object(r) = value {
                        worklist.push(r);
                    }
                }
            }
        }
        ObjectRef::String(i) => {
            if let Some(s) = heap.string(i) {
                worklist.push(s.header().type_desc);
                if let StringObj::Rope { left, right, .. } = s {
                    worklist.push(*left);
                    worklist.push(*right);
                }
            }
        }
        ObjectRef::Array(i) => {
            if let Some(a) = heap.array(i) {
                worklist.push(a.header.type_desc);
                for value in a.as_slice() {
                    if let Value::Object(r) = value {
                        worklist.push(*r);
                    }
                }
            }
        }
        ObjectRef::Function(i) => {
            if let Some(f) = heap.function(i) {
                worklist.push(f.header().type_desc);
                match f {
                    crate::function_obj::FunctionObj::User {
                        executable, module, ..
                    } => {
                        worklist.push(*executable);
                        worklist.push(*module);
                    }
                    crate::function_obj::FunctionObj::Native { .. } => {}
                    crate::function_obj::FunctionObj::Bound {
                        function, receiver, ..
                    } => {
                        worklist.push(*function);
                        if let Value::Object(r) = receiver {
                            worklist.push(*r);
                        }
                    }
                }
            }
        }
        ObjectRef::Executable(i) => {
            if let Some(e) = heap.executable(i) {
                worklist.push(e.header.type_desc);
                for c in &e.constants {
                    if let Value::Object(r) = c {
                        worklist.push(*r);
                    }
                }
                for id in &e.identifiers {
                    worklist.push(*id);
                }
                for nested in &e.nested_executables {
                    worklist.push(*nested);
                }
            }
        }
        ObjectRef::Module(i) => {
            if let Some(m) = heap.module(i) {
                worklist.push(m.header.type_desc);
                for (key, value) in m.globals.iter_in_insertion_order() {
                    worklist.push(key);
                    if let Value::Object(r) = value {
                        worklist.push(r);
                    }
                }
                for value in &m.global_slots {
                    if let Value::Object(r) = value {
                        worklist.push(*r);
                    }
                }
            }
        }
        ObjectRef::Error(i) => {
            if let Some(e) = heap.error(i) {
                worklist.push(e.header.type_desc);
            }
        }
        ObjectRef::TypeDescriptor(i) => {
            if let Some(t) = heap.type_descriptor(i) {
                worklist.push(t.header.type_desc);
                if let Some(name) = t.interned_name {
                    worklist.push(name);
                }
                if let Some(base) = t.base {
                    worklist.push(base);
                }
            }
        }
    }
}

fn sweep(heap: &mut Heap) {
    let (plain, strings, arrays, functions, executables, modules, errors, type_descriptors) =
        heap.arenas_mut();
    plain.sweep();
    let freed_strings = strings.sweep();
    arrays.sweep();
    functions.sweep();
    executables.sweep();
    modules.sweep();
    errors.sweep();
    type_descriptors.sweep();

    for string in freed_strings {
        if let StringObj::Flat { bytes, .. } = string {
            heap.interner.remove(&bytes);
        }
    }
}
