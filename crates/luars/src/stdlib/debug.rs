// Debug library
// Implements: traceback, getinfo. The remaining reference functions (gethook,
// getlocal, getmetatable, getregistry, getupvalue, setlocal, setmetatable,
// setupvalue, sethook, setuservalue, upvalueid, upvaluejoin) are not exposed;
// this runtime has no debug hooks and no C-side uservalue slots to inspect.

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaError, LuaResult, LuaState};

pub fn create_debug_lib() -> LibraryModule {
    crate::lib_module!("debug", {
        "traceback" => debug_traceback,
        "getinfo" => debug_getinfo,
    })
}

/// debug.traceback([message [, level]]) - build a stack traceback string.
/// The `level` argument is accepted for compatibility but the underlying
/// traceback always starts from the caller's frame.
fn debug_traceback(l: &mut LuaState) -> LuaResult<usize> {
    let message = l.get_arg(1).filter(|v| !v.is_nil());

    let mut trace = String::new();
    if let Some(msg) = &message {
        if let Some(id) = msg.as_string_id() {
            if let Some(s) = l.vm_mut().object_pool.get_string(id) {
                trace.push_str(s.as_str());
            }
        } else if let Ok(s) = l.to_string(msg) {
            trace.push_str(&s);
        }
        trace.push('\n');
    }
    trace.push_str(&l.generate_traceback());

    let result = l.create_string(&trace);
    l.push_value(result)?;
    Ok(1)
}

/// debug.getinfo(f [, what]) - minimal activation record: `source`,
/// `currentline`, `what` ("Lua" or "C"), and `short_src`.
fn debug_getinfo(l: &mut LuaState) -> LuaResult<usize> {
    let Some(target) = l.get_arg(1) else {
        return Err(l.error("bad argument #1 to 'getinfo' (value expected)".to_string()));
    };

    let table = l.create_table(0, 4);
    let Some(table_id) = table.as_table_id() else {
        return Err(l.error("failed to create info table".to_string()));
    };

    let (what, source, line): (&str, String, i64) = match target.as_function_id() {
        Some(func_id) => match l.vm_mut().object_pool.get_function(func_id) {
            Some(func) => {
                let name = func
                    .chunk
                    .source_name
                    .clone()
                    .unwrap_or_else(|| "[string]".to_string());
                ("Lua", name, 0)
            }
            None => ("C", "[C]".to_string(), -1),
        },
        None => ("C", "[C]".to_string(), -1),
    };

    let what_key = l.create_string("what");
    let what_val = l.create_string(what);
    let source_key = l.create_string("source");
    let source_val = l.create_string(&source);
    let short_src_key = l.create_string("short_src");
    let short_src_val = l.create_string(&source);
    let currentline_key = l.create_string("currentline");

    let vm = l.vm_mut();
    let Some(table_ref) = vm.object_pool.get_table_mut(table_id) else {
        return Err(l.error("failed to create info table".to_string()));
    };
    table_ref.raw_set(what_key, what_val);
    table_ref.raw_set(source_key, source_val);
    table_ref.raw_set(short_src_key, short_src_val);
    table_ref.raw_set(currentline_key, LuaValue::integer(line));

    l.push_value(table)?;
    Ok(1)
}

/// Name a value's type for error messages.
pub fn objtypename(_l: &mut LuaState, v: &LuaValue) -> String {
    v.type_name().to_string()
}

/// `luaL_argerror`: "bad argument #n (extramsg)".
pub fn argerror(l: &mut LuaState, argnum: usize, extramsg: impl Into<String>) -> LuaError {
    l.error(format!("bad argument #{} ({})", argnum, extramsg.into()))
}

/// `luaL_typeerror`: "bad argument #n to 'fname' (expected got got)".
pub fn arg_typeerror(l: &mut LuaState, argnum: usize, expected: &str, got: &LuaValue) -> LuaError {
    let got_name = objtypename(l, got);
    argerror(l, argnum, format!("{} expected, got {}", expected, got_name))
}

/// `luaL_typeerror`-style message for calling a non-callable value.
pub fn typeerror(l: &mut LuaState, v: &LuaValue, what: &str) -> LuaError {
    let got_name = objtypename(l, v);
    l.error(format!("attempt to {} a {} value", what, got_name))
}
