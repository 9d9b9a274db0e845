//! One pooled JavaScript VM: a rquickjs runtime/context pair with the
//! Alfred globals installed.
//!
//! Globals persist across uses of a pooled VM. Callers re-evaluate the
//! full user source before every call so user-defined names are
//! refreshed, but no isolation is guaranteed for names a script does not
//! redefine.

use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Object, Runtime, Value};
use std::path::Path;

use crate::{Error, Result};

pub struct ScriptVm {
    _runtime: Runtime,
    context: Context,
}

impl ScriptVm {
    /// Create a VM and install the Alfred globals: the console shim and
    /// the key-value store bindings.
    pub fn new() -> Result<Self> {
        let runtime = Runtime::new().map_err(|e| Error::script("vm", e.to_string()))?;
        let context =
            Context::full(&runtime).map_err(|e| Error::script("vm", e.to_string()))?;

        context
            .with(|ctx| install_globals(&ctx))
            .map_err(|e| Error::script("vm", e.to_string()))?;

        Ok(Self {
            _runtime: runtime,
            context,
        })
    }

    /// Run a closure against the VM's context.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: for<'js> FnOnce(Ctx<'js>) -> R,
    {
        self.context.with(f)
    }
}

/// Render a pending JS error into a message; exceptions carry their
/// `message` property, everything else falls back to the error display.
pub(crate) fn js_error_message(ctx: &Ctx<'_>, err: &rquickjs::Error) -> String {
    if let rquickjs::Error::Exception = err {
        let caught = ctx.catch();
        if let Some(message) = caught
            .as_object()
            .and_then(|obj| obj.get::<_, String>("message").ok())
        {
            return message;
        }
        return stringify_value(ctx, &caught);
    }
    err.to_string()
}

fn install_globals(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let console = Object::new(ctx.clone())?;
    console.set("log", Function::new(ctx.clone(), console_log)?)?;
    console.set("info", Function::new(ctx.clone(), console_log)?)?;
    console.set("warn", Function::new(ctx.clone(), console_warn)?)?;
    console.set("error", Function::new(ctx.clone(), console_error)?)?;
    globals.set("console", console)?;

    globals.set("dbSet", Function::new(ctx.clone(), db_set)?)?;
    globals.set("dbGet", Function::new(ctx.clone(), db_get)?)?;
    globals.set("dbDelete", Function::new(ctx.clone(), db_delete)?)?;
    globals.set("dbLoadFile", Function::new(ctx.clone(), db_load_file)?)?;

    Ok(())
}

fn stringify_value<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    ctx.json_stringify(value.clone())
        .ok()
        .flatten()
        .and_then(|s| s.to_string().ok())
        .unwrap_or_else(|| format!("{value:?}"))
}

fn join_args<'js>(ctx: &Ctx<'js>, args: &Rest<Value<'js>>) -> String {
    args.iter()
        .map(|value| stringify_value(ctx, value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_log<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) {
    tracing::info!(target: "alfred::script", "{}", join_args(&ctx, &args));
}

fn console_warn<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) {
    tracing::warn!(target: "alfred::script", "{}", join_args(&ctx, &args));
}

fn console_error<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) {
    tracing::error!(target: "alfred::script", "{}", join_args(&ctx, &args));
}

fn db_set(key: String, value: String) {
    crate::kv::global().set(&key, &value);
}

fn db_get(ctx: Ctx<'_>, key: String) -> rquickjs::Result<Value<'_>> {
    use rquickjs::IntoJs;
    match crate::kv::global().get(&key) {
        Some(value) => value.into_js(&ctx),
        None => Ok(Value::new_undefined(ctx)),
    }
}

fn db_delete(key: String) {
    crate::kv::global().delete(&key);
}

fn db_load_file(ctx: Ctx<'_>, path: String) -> rquickjs::Result<String> {
    match crate::kv::global().load_file(Path::new(&path)) {
        Ok(count) => Ok(format!("file loaded, {count} key(s) written")),
        Err(e) => Err(rquickjs::Exception::throw_message(&ctx, &e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_evaluates_javascript() {
        let vm = ScriptVm::new().unwrap();
        let result: i32 = vm.with(|ctx| ctx.eval("40 + 2").unwrap());
        assert_eq!(result, 42);
    }

    #[test]
    fn db_bindings_are_installed() {
        let vm = ScriptVm::new().unwrap();
        vm.with(|ctx| {
            let _: rquickjs::Value = ctx.eval(r#"dbSet("vm-test-key", "vm-test-value")"#).unwrap();
            let value: String = ctx.eval(r#"dbGet("vm-test-key")"#).unwrap();
            assert_eq!(value, "vm-test-value");
            let missing: bool = ctx
                .eval(r#"dbGet("vm-test-absent") === undefined"#)
                .unwrap();
            assert!(missing);
            let _: rquickjs::Value = ctx.eval(r#"dbDelete("vm-test-key")"#).unwrap();
            let gone: bool = ctx.eval(r#"dbGet("vm-test-key") === undefined"#).unwrap();
            assert!(gone);
        });
    }

    #[test]
    fn db_bindings_throw_on_missing_arguments() {
        let vm = ScriptVm::new().unwrap();
        vm.with(|ctx| {
            let caught: bool = ctx
                .eval(r#"(function(){ try { dbSet("only-key"); return false; } catch (e) { return true; } })()"#)
                .unwrap();
            assert!(caught);
        });
    }

    #[test]
    fn db_load_file_throws_on_io_errors() {
        let vm = ScriptVm::new().unwrap();
        vm.with(|ctx| {
            let caught: bool = ctx
                .eval(r#"(function(){ try { dbLoadFile("/nope/missing.json"); return false; } catch (e) { return true; } })()"#)
                .unwrap();
            assert!(caught);
        });
    }

    #[test]
    fn globals_persist_across_evaluations() {
        // The documented reuse hazard: top-level names survive between
        // calls on the same VM.
        let vm = ScriptVm::new().unwrap();
        vm.with(|ctx| {
            let _: rquickjs::Value = ctx.eval("var leaked = 7;").unwrap();
        });
        let leaked: i32 = vm.with(|ctx| ctx.eval("leaked").unwrap());
        assert_eq!(leaked, 7);
    }
}
