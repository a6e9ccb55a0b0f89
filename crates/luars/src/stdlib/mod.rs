// Lua 5.4 Standard Libraries Implementation

pub mod basic;
pub mod debug;
pub mod io;
pub mod math;
pub mod os;
pub mod package;
pub mod string;
pub mod table;
pub mod utf8;

/// Selects which standard library modules to install into a `LuaVM`.
///
/// Passed to `LuaVM::open_stdlib`/`LuaVM::open_stdlibs` so embedders can load
/// a minimal sandbox (e.g. just `Basic` and `Math`) instead of the full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdlib {
    Basic,
    String,
    Table,
    Math,
    Io,
    Os,
    Utf8,
    Package,
    Debug,
    All,
}
