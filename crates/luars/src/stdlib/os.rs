// OS library
// Implements: clock, date, difftime, execute, exit, getenv, remove, rename,
// setlocale, time, tmpname

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaResult, LuaState};
use chrono::{Datelike, Local, TimeZone, Timelike};

/// Fetch argument `n` (1-based) as an owned Rust string, if it's a Lua string.
fn string_arg(l: &mut LuaState, n: usize) -> Option<String> {
    let id = l.get_arg(n)?.as_string_id()?;
    l.vm_mut().object_pool.get_string(id).map(|s| s.as_str().to_string())
}

pub fn create_os_lib() -> LibraryModule {
    crate::lib_module!("os", {
        "clock" => os_clock,
        "time" => os_time,
        "date" => os_date,
        "difftime" => os_difftime,
        "execute" => os_execute,
        "exit" => os_exit,
        "getenv" => os_getenv,
        "remove" => os_remove,
        "rename" => os_rename,
        "setlocale" => os_setlocale,
        "tmpname" => os_tmpname,
    })
}

/// os.clock() - CPU time used by the process, in seconds, since an
/// unspecified but fixed starting point (here: the first call).
fn os_clock(l: &mut LuaState) -> LuaResult<usize> {
    use std::time::Instant;

    thread_local! {
        static START_TIME: std::cell::RefCell<Option<Instant>> = std::cell::RefCell::new(None);
    }

    let elapsed = START_TIME.with(|start| {
        let mut start_ref = start.borrow_mut();
        if start_ref.is_none() {
            *start_ref = Some(Instant::now());
        }
        start_ref.unwrap().elapsed().as_secs_f64()
    });

    l.push_value(LuaValue::float(elapsed))?;
    Ok(1)
}

/// os.time([table]) - current time, or the time described by a table with
/// `year`/`month`/`day`/`hour`/`min`/`sec` fields (hour/min/sec optional).
fn os_time(l: &mut LuaState) -> LuaResult<usize> {
    use std::time::SystemTime;

    let timestamp = match l.get_arg(1) {
        Some(table_val) if table_val.is_table() => time_from_table(l, &table_val)?,
        Some(v) if !v.is_nil() => {
            return Err(l.error("bad argument #1 to 'time' (table expected)".to_string()));
        }
        _ => SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    };

    l.push_value(LuaValue::integer(timestamp))?;
    Ok(1)
}

fn time_from_table(l: &mut LuaState, table_val: &LuaValue) -> LuaResult<i64> {
    let field = |l: &mut LuaState, name: &str| -> Option<i64> {
        let key = l.create_string(name);
        l.vm_mut()
            .table_get_with_meta(table_val, &key)
            .and_then(|v| v.as_integer())
    };

    let year = field(l, "year")
        .ok_or_else(|| l.error("field 'year' missing in date table".to_string()))?;
    let month = field(l, "month")
        .ok_or_else(|| l.error("field 'month' missing in date table".to_string()))?;
    let day =
        field(l, "day").ok_or_else(|| l.error("field 'day' missing in date table".to_string()))?;
    let hour = field(l, "hour").unwrap_or(12);
    let min = field(l, "min").unwrap_or(0);
    let sec = field(l, "sec").unwrap_or(0);

    chrono::Local
        .with_ymd_and_hms(
            year as i32,
            month as u32,
            day as u32,
            hour as u32,
            min as u32,
            sec as u32,
        )
        .single()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| l.error("time result cannot be represented".to_string()))
}

/// os.date([format [, time]]) - format a time value (default: now).
///
/// `format` starting with `!` formats in UTC; `*t`/`!*t` return a table of
/// fields instead of a string. Otherwise `format` is a strftime-style string
/// (default `"%c"`).
fn os_date(l: &mut LuaState) -> LuaResult<usize> {
    let format = string_arg(l, 1).unwrap_or_else(|| "%c".to_string());

    let timestamp = match l.get_arg(2).and_then(|v| v.as_integer()) {
        Some(t) => t,
        None => std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    };

    let utc = format.starts_with('!');
    let spec = if utc { &format[1..] } else { format.as_str() };

    let dt_utc = chrono::Utc
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| l.error("time value out of range".to_string()))?;

    if spec == "*t" {
        let table = if utc {
            date_table(l, dt_utc.naive_utc(), dt_utc.weekday().num_days_from_sunday())
        } else {
            let local = dt_utc.with_timezone(&Local);
            date_table(l, local.naive_local(), local.weekday().num_days_from_sunday())
        }?;
        l.push_value(table)?;
        return Ok(1);
    }

    let formatted = if utc {
        dt_utc.format(spec).to_string()
    } else {
        dt_utc.with_timezone(&Local).format(spec).to_string()
    };

    let result = l.create_string(&formatted);
    l.push_value(result)?;
    Ok(1)
}

fn date_table(
    l: &mut LuaState,
    naive: chrono::NaiveDateTime,
    weekday_from_sunday: u32,
) -> LuaResult<LuaValue> {
    let table = l.create_table(0, 8);
    let Some(table_id) = table.as_table_id() else {
        return Err(l.error("failed to create date table".to_string()));
    };

    let fields: [(LuaValue, i64); 8] = [
        (l.create_string("year"), naive.year() as i64),
        (l.create_string("month"), naive.month() as i64),
        (l.create_string("day"), naive.day() as i64),
        (l.create_string("hour"), naive.hour() as i64),
        (l.create_string("min"), naive.minute() as i64),
        (l.create_string("sec"), naive.second() as i64),
        (l.create_string("wday"), weekday_from_sunday as i64 + 1),
        (l.create_string("yday"), naive.ordinal() as i64),
    ];
    let isdst_key = l.create_string("isdst");

    let vm = l.vm_mut();
    let Some(table_ref) = vm.object_pool.get_table_mut(table_id) else {
        return Err(l.error("failed to create date table".to_string()));
    };
    for (key, value) in fields {
        table_ref.raw_set(key, LuaValue::integer(value));
    }
    table_ref.raw_set(isdst_key, LuaValue::boolean(false));

    Ok(table)
}

fn os_exit(_l: &mut LuaState) -> LuaResult<usize> {
    std::process::exit(0);
}

/// os.difftime(t2, t1) - difference in seconds between two time values.
fn os_difftime(l: &mut LuaState) -> LuaResult<usize> {
    let t2 = l
        .get_arg(1)
        .and_then(|v| v.as_number())
        .ok_or_else(|| l.error("bad argument #1 to 'difftime' (number expected)".to_string()))?;
    let t1 = l
        .get_arg(2)
        .and_then(|v| v.as_number())
        .ok_or_else(|| l.error("bad argument #2 to 'difftime' (number expected)".to_string()))?;

    l.push_value(LuaValue::float(t2 - t1))?;
    Ok(1)
}

/// os.execute([command]) - run a shell command via `sh -c`.
fn os_execute(l: &mut LuaState) -> LuaResult<usize> {
    use std::process::Command;

    let Some(cmd) = string_arg(l, 1) else {
        // os.execute() with no argument: report whether a shell is available.
        l.push_value(LuaValue::boolean(true))?;
        return Ok(1);
    };

    let output = Command::new("sh").arg("-c").arg(cmd.as_str()).output();

    match output {
        Ok(result) => {
            let exit_str = l.create_string("exit");
            l.push_value(LuaValue::boolean(result.status.success()))?;
            l.push_value(exit_str)?;
            l.push_value(LuaValue::integer(result.status.code().unwrap_or(-1) as i64))?;
            Ok(3)
        }
        Err(e) => {
            let err_msg = l.create_string(&e.to_string());
            l.push_value(LuaValue::nil())?;
            l.push_value(err_msg)?;
            Ok(2)
        }
    }
}

/// os.getenv(varname) - read an environment variable, or nil if unset.
fn os_getenv(l: &mut LuaState) -> LuaResult<usize> {
    let varname =
        string_arg(l, 1).ok_or_else(|| l.error("bad argument #1 to 'getenv' (string expected)".to_string()))?;

    match std::env::var(varname.as_str()) {
        Ok(value) => {
            let result = l.create_string(&value);
            l.push_value(result)?;
        }
        Err(_) => l.push_value(LuaValue::nil())?,
    }
    Ok(1)
}

/// os.remove(filename) - delete a file.
fn os_remove(l: &mut LuaState) -> LuaResult<usize> {
    let filename =
        string_arg(l, 1).ok_or_else(|| l.error("bad argument #1 to 'remove' (string expected)".to_string()))?;

    match std::fs::remove_file(filename.as_str()) {
        Ok(_) => {
            l.push_value(LuaValue::boolean(true))?;
            Ok(1)
        }
        Err(e) => {
            let err_msg = l.create_string(&e.to_string());
            l.push_value(LuaValue::nil())?;
            l.push_value(err_msg)?;
            Ok(2)
        }
    }
}

/// os.rename(oldname, newname) - rename/move a file.
fn os_rename(l: &mut LuaState) -> LuaResult<usize> {
    let oldname =
        string_arg(l, 1).ok_or_else(|| l.error("bad argument #1 to 'rename' (string expected)".to_string()))?;
    let newname =
        string_arg(l, 2).ok_or_else(|| l.error("bad argument #2 to 'rename' (string expected)".to_string()))?;

    match std::fs::rename(oldname.as_str(), newname.as_str()) {
        Ok(_) => {
            l.push_value(LuaValue::boolean(true))?;
            Ok(1)
        }
        Err(e) => {
            let err_msg = l.create_string(&e.to_string());
            l.push_value(LuaValue::nil())?;
            l.push_value(err_msg)?;
            Ok(2)
        }
    }
}

/// os.setlocale([locale [, category]]) - stub: only the "C" locale is
/// supported, matching the host's fixed formatting behavior.
fn os_setlocale(l: &mut LuaState) -> LuaResult<usize> {
    let requested = string_arg(l, 1);
    let supported = requested.as_deref().is_none_or(|s| s.is_empty() || s == "C");

    if supported {
        let result = l.create_string("C");
        l.push_value(result)?;
    } else {
        l.push_value(LuaValue::nil())?;
    }
    Ok(1)
}

/// os.tmpname() - generate a unique temporary file name.
fn os_tmpname(l: &mut LuaState) -> LuaResult<usize> {
    use std::time::SystemTime;

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let tmpname = format!("/tmp/lua_tmp_{}", timestamp);
    let result = l.create_string(&tmpname);
    l.push_value(result)?;
    Ok(1)
}
