// Variable declaration and name resolution (对齐lparser.c的变量相关函数)
//
// Local/upvalue bookkeeping lives here; the actual search through enclosing
// functions (including multi-level upvalue chaining) is implemented in
// helpers.rs, which already carries the scope-chain primitives shared with
// the rest of the emitter.
use super::expdesc::{ExpDesc, ExpKind};
use super::helpers;
use super::{Compiler, Local};

/// Declare a new local variable in the current function, without yet making
/// it visible to name resolution (对齐new_localvar). The caller must follow
/// up with `adjustlocalvars` once the variable should become visible - this
/// is what keeps `local a = a` resolving the outer `a` on the right-hand side.
pub(crate) fn new_localvar(c: &mut Compiler, name: String) -> Result<usize, String> {
    let mut scope = c.scope_chain.borrow_mut();
    if scope.locals.len() >= 200 {
        // MAXVARS
        return Err("too many local variables (limit is 200)".to_string());
    }

    let local = Local {
        name,
        depth: c.scope_depth,
        register: 0, // assigned by adjustlocalvars
        is_const: false,
        is_to_be_closed: false,
        needs_close: false,
    };

    scope.locals.push(local);
    Ok(scope.locals.len() - 1)
}

/// Activate the last `nvars` declared locals, assigning them consecutive
/// registers starting at the current active-variable count (对齐adjustlocalvars).
pub(crate) fn adjustlocalvars(c: &mut Compiler, nvars: usize) {
    let mut scope = c.scope_chain.borrow_mut();
    let total = scope.locals.len();
    let start = total.saturating_sub(nvars);
    for i in 0..nvars {
        if let Some(local) = scope.locals.get_mut(start + i) {
            local.register = c.nactvar as u32 + i as u32;
        }
    }
    drop(scope);
    c.nactvar += nvars;
}

/// Resolve a name: local, then upvalue (capturing through any number of
/// enclosing functions), then a global access through `_ENV` (对齐singlevar).
pub(crate) fn singlevar(c: &mut Compiler, name: &str, var: &mut ExpDesc) -> Result<(), String> {
    if let Some(local) = helpers::resolve_local(c, name) {
        var.kind = ExpKind::VLocal;
        var.var.ridx = local.register;
        return Ok(());
    }

    if let Some(idx) = helpers::resolve_upvalue_from_chain(c, name) {
        var.kind = ExpKind::VUpval;
        var.info = idx as u32;
        return Ok(());
    }

    // Not a local or upvalue anywhere in the enclosing chain: global access,
    // compiled as _ENV[name] (Lua 5.4's implicit-_ENV-upvalue design).
    let env_idx = helpers::resolve_upvalue_from_chain(c, "_ENV")
        .expect("_ENV must always be resolvable as an upvalue of the main chunk");
    let key = helpers::create_string_value(c, name);
    let const_idx = helpers::add_constant_dedup(c, key);

    var.kind = ExpKind::VIndexUp;
    var.ind.t = env_idx as u32;
    var.ind.idx = const_idx;
    Ok(())
}
