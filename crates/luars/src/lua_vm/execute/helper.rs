use crate::{
    Chunk, GcId, LuaResult, LuaValue, TableId,
    lua_value::{LUA_VNUMFLT, LUA_VNUMINT},
    lua_vm::LuaState,
};

use super::metamethod;

/// Build hidden arguments for vararg functions
/// Port of ltm.c:245-270 buildhiddenargs
///
/// Initial stack:  func arg1 ... argn extra1 ...
///                 ^ ci->func                    ^ L->top
/// Final stack: func nil ... nil extra1 ... func arg1 ... argn
///                                          ^ ci->func
pub fn buildhiddenargs(
    lua_state: &mut LuaState,
    frame_idx: usize,
    chunk: &Chunk,
    totalargs: usize,
    nfixparams: usize,
    _nextra: usize,
) -> LuaResult<usize> {
    let call_info = lua_state.get_call_info(frame_idx);
    let old_base = call_info.base;
    let func_pos = if old_base > 0 { old_base - 1 } else { 0 };
    let stack_top = lua_state.get_top();

    let stack = lua_state.stack_mut();
    let mut top = stack_top;

    // Step 1: Copy function to top (after all arguments)
    // setobjs2s(L, L->top.p++, ci->func.p);
    let func_src = stack[func_pos];
    stack[top] = func_src;
    top += 1;

    // Step 2: Copy fixed parameters to after copied function
    // for (i = 1; i <= nfixparams; i++)
    for i in 0..nfixparams {
        let src = stack[func_pos + 1 + i];
        stack[top] = src;
        top += 1;
        // Erase original parameter with nil (for GC)
        setnilvalue(&mut stack[func_pos + 1 + i]);
    }

    // Step 3: Update ci->func.p and ci->top.p
    // ci->func.p += totalargs + 1;
    // ci->top.p += totalargs + 1;
    let new_func_pos = func_pos + totalargs + 1;
    let new_base = new_func_pos + 1;

    let new_call_info_top = {
        let call_info = lua_state.get_call_info_mut(frame_idx);
        call_info.base = new_base;
        call_info.top += totalargs + 1;
        call_info.func_offset = new_base - func_pos; // Distance from new_base to original func
        call_info.top
    };

    // Ensure enough stack space for new base + registers
    let new_needed_size = new_base + chunk.max_stack_size;
    if new_needed_size > lua_state.stack_len() {
        lua_state.grow_stack(new_needed_size - lua_state.stack_len())?;
    }

    // Update lua_state.top to match call_info.top
    // This ensures that subsequent set_top calls preserve our data
    lua_state.set_top(new_call_info_top);

    Ok(new_base)
}

// ============ Type tag检查宏 (对应 Lua 的 ttis* 宏) ============

/// ttisinteger - 检查是否是整数 (最快的类型检查)
#[inline(always)]
pub fn ttisinteger(v: &LuaValue) -> bool {
    (*v).tt_ == LUA_VNUMINT
}

/// ttisfloat - 检查是否是浮点数
#[inline(always)]
pub fn ttisfloat(v: &LuaValue) -> bool {
    (*v).tt_ == LUA_VNUMFLT
}

/// ttisnumber - 检查是否是任意数字 (整数或浮点)
#[inline(always)]
pub fn ttisnumber(v: &LuaValue) -> bool {
    (*v).tt_ == LUA_VNUMINT || (*v).tt_ == LUA_VNUMFLT
}

// ============ 值访问宏 (对应 Lua 的 ivalue/fltvalue) ============

/// ivalue - 直接获取整数值 (调用前必须用 ttisinteger 检查)
#[inline(always)]
pub fn ivalue(v: &LuaValue) -> i64 {
    unsafe { (*v).value_.i }
}

/// fltvalue - 直接获取浮点值 (调用前必须用 ttisfloat 检查)
#[inline(always)]
pub fn fltvalue(v: &LuaValue) -> f64 {
    unsafe { (*v).value_.n }
}

/// setivalue - 设置整数值
#[inline(always)]
pub fn setivalue(v: &mut LuaValue, i: i64) {
    (*v).value_.i = i;
    (*v).tt_ = LUA_VNUMINT;
}

/// chgivalue - 只修改整数值，不修改类型标签（Lua的chgivalue宏）
/// 调用前必须确认类型已经是整数！
#[inline(always)]
pub fn chgivalue(v: &mut LuaValue, i: i64) {
    (*v).value_.i = i;
}

/// setfltvalue - 设置浮点值
#[inline(always)]
pub fn setfltvalue(v: &mut LuaValue, n: f64) {
    (*v).value_.n = n;
    (*v).tt_ = LUA_VNUMFLT;
}

/// chgfltvalue - 只修改浮点值，不修改类型标签
/// 调用前必须确认类型已经是浮点！
#[inline(always)]
pub fn chgfltvalue(v: &mut LuaValue, n: f64) {
    (*v).value_.n = n;
}

/// setbfvalue - 设置false
#[inline(always)]
pub fn setbfvalue(v: &mut LuaValue) {
    (*v) = LuaValue::boolean(false);
}

/// setbtvalue - 设置true
#[inline(always)]
pub fn setbtvalue(v: &mut LuaValue) {
    (*v) = LuaValue::boolean(true);
}

/// setnilvalue - 设置nil
#[inline(always)]
pub fn setnilvalue(v: &mut LuaValue) {
    *v = LuaValue::nil();
}

// ============ 类型转换辅助函数 ============

/// tointegerns - 尝试转换为整数 (不抛出错误)
/// 对应 Lua 的 tointegerns 宏
#[inline(always)]
pub fn tointegerns(v: &LuaValue, out: &mut i64) -> bool {
    if ttisinteger(v) {
        *out = ivalue(v);
        true
    } else {
        false
    }
}

/// tonumberns - 尝试转换为浮点数 (不抛出错误)
#[inline(always)]
pub fn tonumberns(v: &LuaValue, out: &mut f64) -> bool {
    if ttisfloat(v) {
        *out = fltvalue(v);
        true
    } else if ttisinteger(v) {
        *out = ivalue(v) as f64;
        true
    } else {
        false
    }
}

/// tonumber - 从LuaValue引用转换为浮点数 (用于常量)
#[inline(always)]
pub fn tonumber(v: &LuaValue, out: &mut f64) -> bool {
    if v.tt_ == LUA_VNUMFLT {
        unsafe {
            *out = v.value_.n;
        }
        true
    } else if v.tt_ == LUA_VNUMINT {
        unsafe {
            *out = v.value_.i as f64;
        }
        true
    } else {
        false
    }
}

/// tointeger - 从LuaValue引用获取整数 (用于常量)
#[inline(always)]
pub fn tointeger(v: &LuaValue, out: &mut i64) -> bool {
    if v.tt_ == LUA_VNUMINT {
        unsafe {
            *out = v.value_.i;
        }
        true
    } else {
        false
    }
}

/// Obtain the metatable value (itself a table) currently attached to `obj`,
/// whatever its kind (string/userdata/table). None if there is none.
fn get_metatable_value(lua_state: &mut LuaState, obj: &LuaValue) -> Option<LuaValue> {
    if obj.is_string() {
        return lua_state.vm_mut().string_mt;
    }
    if let Some(ud_id) = obj.as_userdata_id() {
        let mt = lua_state.vm_mut().object_pool.get_userdata(ud_id)?.get_metatable();
        return if mt.is_nil() { None } else { Some(mt) };
    }
    if let Some(table_id) = obj.as_table_id() {
        return lua_state.vm_mut().object_pool.get_table(table_id)?.get_metatable();
    }
    None
}

/// Lookup value from object's metatable `__index`, following nested `__index`
/// table chains and invoking function-valued `__index`.
/// Port of Lua 5.5's luaV_finishget (lvm.c), bounded like MAXTAGLOOP so a
/// cyclic `__index` chain can't loop forever.
pub fn lookup_from_metatable(
    lua_state: &mut LuaState,
    obj: &LuaValue,
    key: &LuaValue,
) -> Option<LuaValue> {
    const MAXTAGLOOP: usize = 100;
    let original = *obj;
    let mut current = *obj;

    for _ in 0..MAXTAGLOOP {
        if let Some(table_id) = current.as_table_id() {
            let vm = lua_state.vm_mut();
            let table = vm.object_pool.get_table(table_id)?;
            if let Some(v) = table.raw_get(key) {
                return Some(v);
            }
        }

        let mt_val = get_metatable_value(lua_state, &current)?;
        let mt_table_id = mt_val.as_table_id()?;
        let vm = lua_state.vm_mut();
        let index_key = vm.create_string("__index");
        let mt_table = vm.object_pool.get_table(mt_table_id)?;
        let index_value = mt_table.raw_get(&index_key)?;

        if index_value.is_function() {
            return metamethod::call_tm_res(lua_state, index_value, original, *key).ok();
        }

        if index_value.as_table_id().is_none() {
            // __index present but neither a table nor a function to call: stop.
            return None;
        }

        current = index_value;
    }

    None
}

/// Raw-set `key = value` on `table_id` and run the GC write barrier.
fn raw_set_and_barrier(
    lua_state: &mut LuaState,
    table_id: TableId,
    key: &LuaValue,
    value: LuaValue,
) -> LuaResult<()> {
    if let Some(table) = lua_state.vm_mut().object_pool.get_table_mut(table_id) {
        table.raw_set(key, value);
    }
    lua_state.gc_barrier_back(GcId::TableId(table_id));
    lua_state.check_gc()?;
    Ok(())
}

/// Outcome of consulting a metatable's `__newindex` field.
enum NewIndexAction {
    /// No `__newindex` entry at all.
    NoMetamethod,
    /// `__newindex` is neither a table nor a function.
    TypeError,
    /// `__newindex` was a function and has already been called.
    Call(LuaResult<()>),
    /// `__newindex` was a table: retry the store against it.
    Recurse(LuaValue),
}

fn resolve_newindex(
    lua_state: &mut LuaState,
    mt_table_id: TableId,
    current: LuaValue,
    key: LuaValue,
    value: LuaValue,
) -> NewIndexAction {
    let vm = lua_state.vm_mut();
    let newindex_key = vm.create_string("__newindex");
    let newindex_value = vm
        .object_pool
        .get_table(mt_table_id)
        .and_then(|t| t.raw_get(&newindex_key));

    match newindex_value {
        None => NewIndexAction::NoMetamethod,
        Some(nidx) if nidx.is_function() => {
            NewIndexAction::Call(metamethod::call_tm(lua_state, nidx, current, key, value))
        }
        Some(nidx) if nidx.as_table_id().is_some() => NewIndexAction::Recurse(nidx),
        Some(_) => NewIndexAction::TypeError,
    }
}

/// Store a value into `obj[key]`, consulting `__newindex` when a raw set
/// isn't directly applicable.
/// Port of Lua 5.5's luaV_finishset (lvm.c): a table with the key already
/// present, or with no metatable, is set directly; otherwise the
/// `__newindex` chain is followed (table recurse, function call) up to
/// MAXTAGLOOP times.
pub fn store_to_metatable(
    lua_state: &mut LuaState,
    obj: &LuaValue,
    key: &LuaValue,
    value: LuaValue,
) -> LuaResult<()> {
    const MAXTAGLOOP: usize = 100;
    let mut current = *obj;
    let key = *key;

    for _ in 0..MAXTAGLOOP {
        if let Some(table_id) = current.as_table_id() {
            let already_present = lua_state
                .vm_mut()
                .object_pool
                .get_table(table_id)
                .map(|t| t.raw_get(&key).is_some())
                .unwrap_or(false);

            if already_present {
                return raw_set_and_barrier(lua_state, table_id, &key, value);
            }

            let mt_table_id = lua_state
                .vm_mut()
                .object_pool
                .get_table(table_id)
                .and_then(|t| t.get_metatable())
                .and_then(|mt| mt.as_table_id());

            let mt_table_id = match mt_table_id {
                Some(id) => id,
                None => return raw_set_and_barrier(lua_state, table_id, &key, value),
            };

            match resolve_newindex(lua_state, mt_table_id, current, key, value) {
                NewIndexAction::NoMetamethod => {
                    return raw_set_and_barrier(lua_state, table_id, &key, value);
                }
                NewIndexAction::Call(result) => return result,
                NewIndexAction::Recurse(next) => current = next,
                NewIndexAction::TypeError => {
                    return Err(lua_state.error(
                        "attempt to index a non-table, non-function '__newindex' value"
                            .to_string(),
                    ));
                }
            }
        } else {
            let mt_table_id =
                get_metatable_value(lua_state, &current).and_then(|mt| mt.as_table_id());

            let mt_table_id = match mt_table_id {
                Some(id) => id,
                None => {
                    return Err(lua_state.error(format!(
                        "attempt to index a {} value",
                        current.type_name()
                    )));
                }
            };

            match resolve_newindex(lua_state, mt_table_id, current, key, value) {
                NewIndexAction::NoMetamethod | NewIndexAction::TypeError => {
                    return Err(lua_state.error(format!(
                        "attempt to index a {} value",
                        current.type_name()
                    )));
                }
                NewIndexAction::Call(result) => return result,
                NewIndexAction::Recurse(next) => current = next,
            }
        }
    }

    Err(lua_state.error("'__newindex' chain too long; possible loop".to_string()))
}
