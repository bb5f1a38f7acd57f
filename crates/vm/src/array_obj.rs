//! Dynamic array object (spec.md §3 "Array object").

use crate::error::{VmError, VmResult};
use crate::object::ObjectHeader;
use crate::value::Value;

/// A contiguous, growable array of `Value`. Capacity doubles on overflow,
/// matching spec.md's "doubling capacity" growth policy — never shrinks on
/// `pop`, same as the source runtime.
pub struct ArrayObj {
    pub header: ObjectHeader,
    elements: Vec<Value>,
}

impl ArrayObj {
    pub fn new(header: ObjectHeader) -> Self {
        ArrayObj {
            header,
            elements: Vec::new(),
        }
    }

    pub fn with_capacity(header: ObjectHeader, capacity: usize) -> Self {
        ArrayObj {
            header,
            elements: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.elements
    }

    pub fn push(&mut self, value: Value) {
        self.elements.push(value);
    }

    /// Removes and returns the last element. Decrements length before
    /// reading the slot (spec.md §9 resolves the original's off-by-one
    /// pop bug this way).
    pub fn pop(&mut self) -> VmResult<Value> {
        self.elements
            .pop()
            .ok_or_else(|| VmError::index("pop from empty array"))
    }

    pub fn get(&self, index: i64) -> VmResult<Value> {
        let idx = self.resolve_index(index)?;
        Ok(self.elements[idx])
    }

    pub fn set(&mut self, index: i64, value: Value) -> VmResult<()> {
        let idx = self.resolve_index(index)?;
        self.elements[idx] = value;
        Ok(())
    }

    /// Inserts `value` at `index`, shifting later elements right. Negative
    /// indices count from the end. `index == len` is out of bounds, matching
    /// `lu_array_length` rejecting it rather than treating it as an append.
    /// Bounds are checked against a signed range before any unsigned cast.
    pub fn insert(&mut self, index: i64, value: Value) -> VmResult<()> {
        let len = self.elements.len() as i64;
        let normalized = if index < 0 { index + len } else { index };
        if normalized < 0 || normalized >= len {
            return Err(VmError::index(format!(
                "insert index {index} out of bounds for array of length {len}"
            )));
        }
        self.elements.insert(normalized as usize, value);
        Ok(())
    }

    fn resolve_index(&self, index: i64) -> VmResult<usize> {
        let len = self.elements.len() as i64;
        let normalized = if index < 0 { index + len } else { index };
        if normalized < 0 || normalized >= len {
            return Err(VmError::index(format!(
                "array index {index} out of bounds for length {len}"
            )));
        }
        Ok(normalized as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ArenaIndex, ObjectRef};

    fn header() -> ObjectHeader {
        ObjectHeader::new(ObjectRef::TypeDescriptor(ArenaIndex {
            index: 0,
            generation: 0,
        }))
    }

    #[test]
    fn push_pop_order() {
        let mut arr = ArrayObj::new(header());
        arr.push(Value::Int(1));
        arr.push(Value::Int(2));
        assert!(matches!(arr.pop().unwrap(), Value::Int(2)));
        assert!(matches!(arr.pop().unwrap(), Value::Int(1)));
        assert!(arr.pop().is_err());
    }

    #[test]
    fn negative_index_get_set() {
        let mut arr = ArrayObj::new(header());
        arr.push(Value::Int(10));
        arr.push(Value::Int(20));
        assert!(matches!(arr.get(-1).unwrap(), Value::Int(20)));
        arr.set(-2, Value::Int(99)).unwrap();
        assert!(matches!(arr.get(0).unwrap(), Value::Int(99)));
    }

    #[test]
    fn insert_at_middle() {
        let mut arr = ArrayObj::new(header());
        arr.push(Value::Int(1));
        arr.push(Value::Int(3));
        arr.insert(1, Value::Int(2)).unwrap();
        let vals: Vec<i64> = arr.as_slice().iter().map(|v| v.as_int().unwrap()).collect();
        assert_eq!(vals, vec![1, 2, 3]);
    }

    #[test]
    fn insert_rejects_index_equal_to_length() {
        let mut arr = ArrayObj::new(header());
        arr.push(Value::Int(1));
        arr.push(Value::Int(2));
        assert!(arr.insert(2, Value::Int(3)).is_err());
        assert!(arr.insert(10, Value::Int(0)).is_err());
        assert_eq!(arr.len(), 2);
    }
}
