// Lua Runtime
// A compact Lua VM implementation with bytecode compiler and GC

#[cfg(test)]
mod test;

pub(crate) mod branch;
pub mod compiler;
pub mod gc;
pub mod lib_registry;
pub mod lua_value;
pub mod lua_vm;
#[cfg(feature = "serde")]
pub mod serde;
pub mod stdlib;
pub use compiler::Compiler;
pub use gc::*;
pub use lib_registry::LibraryRegistry;
pub use lua_value::{Chunk, LuaFunction, LuaString, LuaTable, LuaValue};
pub use lua_vm::{Instruction, LuaResult, LuaVM, OpCode, SafeOption};
pub use stdlib::Stdlib;
use std::rc::Rc;

/// Result of a GC object constructor: a freshly allocated `LuaValue` of the
/// requested kind (table, string, function, userdata, ...).
pub type CreateResult = LuaValue;

/// Main entry point for executing Lua code: compiles and runs `source`
/// against a freshly created VM with the full standard library loaded.
pub fn execute(source: &str) -> LuaResult<Vec<LuaValue>> {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All)?;
    let chunk = vm.compile(source)?;
    vm.execute(Rc::new(chunk))
}

/// Execute Lua code with a caller-supplied VM instance (stdlib already loaded).
pub fn execute_with_vm(vm: &mut LuaVM, source: &str) -> LuaResult<Vec<LuaValue>> {
    let chunk = vm.compile(source)?;
    vm.execute(Rc::new(chunk))
}
