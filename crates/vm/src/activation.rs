//! Activation records: one per in-flight function call (spec.md §4.5
//! "Activation record").

use crate::object::ObjectRef;
use crate::register_pool::RegisterWindow;

pub struct ActivationRecord {
    pub executable: ObjectRef,
    pub module: ObjectRef,
    pub ip: usize,
    pub registers: RegisterWindow,
    /// Absolute (pool-wide, not window-relative) register index the return
    /// value gets written to, `None` for the outermost (entry) frame.
    pub return_register: Option<usize>,
}

impl ActivationRecord {
    pub fn new(
        executable: ObjectRef,
        module: ObjectRef,
        registers: RegisterWindow,
        return_register: Option<usize>,
    ) -> Self {
        ActivationRecord {
            executable,
            module,
            ip: 0,
            registers,
            return_register,
        }
    }
}
