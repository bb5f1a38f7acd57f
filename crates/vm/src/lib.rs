//! `luna-vm`: the register-based bytecode virtual machine, managed heap
//! and mark-sweep collector underlying the Luna scripting language.
//!
//! This crate has no sibling dependencies within the workspace; it
//! defines the value representation, object model and dispatch loop that
//! `luna-compiler`'s generator targets and `luna-cli` drives.

pub mod activation;
pub mod array_obj;
pub mod config;
pub mod error;
pub mod error_obj;
pub mod executable;
pub mod function_obj;
pub mod heap;
pub mod instruction;
pub mod istate;
pub mod jump_table;
pub mod module;
pub mod object;
pub mod op_code;
pub mod plain_obj;
pub mod property_map;
pub mod register_pool;
pub mod string_obj;
pub mod value;
pub mod vm;

pub use activation::ActivationRecord;
pub use array_obj::ArrayObj;
pub use config::ExecutionLimits;
pub use error::{VmError, VmResult};
pub use error_obj::ErrorObj;
pub use executable::{Executable, Span};
pub use function_obj::{FunctionObj, NativeFn, StatefulNativeFn};
pub use heap::Heap;
pub use instruction::Instruction;
pub use istate::InterpreterState;
pub use jump_table::{InstructionHandler, JumpTable, Step};
pub use module::{ModuleCache, ModuleObj};
pub use object::{ArenaIndex, ObjectHeader, ObjectRef, TypeDescriptor};
pub use op_code::OpCode;
pub use plain_obj::PlainObj;
pub use property_map::PropertyMap;
pub use register_pool::{RegisterPool, RegisterWindow};
pub use string_obj::{StringInterner, StringObj};
pub use value::Value;
pub use vm::Vm;
