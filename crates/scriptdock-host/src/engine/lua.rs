//! Lua 5.4 engine backed by a single long-lived `mlua` VM.
//!
//! The VM's `package.path` and its output functions are process-wide state
//! for every script. Both are mutated for the duration of one run only,
//! through [`SearchPathGuard`] and [`CaptureGuard`], whose `Drop` impls put
//! the previous values back whether the chunk returned or raised.
//! [`HooksGuard`] reinstalls the host's `print`, `io` and `os.exit` hooks
//! after every run, so a script that replaces them only affects itself.
//! `os.exit` raises a Lua error instead of terminating the process.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mlua::{Function, Lua, ObjectLike, Table, Value, Variadic};
use tracing::{debug, warn};

use super::{EngineFailure, Invocation, InvokeOutcome, ScriptEngine, SharedState};
use crate::bindings::{BindingValue, HostBindings};
use crate::error::{HostError, HostResult};

/// Maximum table nesting converted across the host boundary.
const MAX_BINDING_DEPTH: usize = 32;

/// Registry slot for the host hooks installed at start-up.
const HOOKS_KEY: &str = "scriptdock.hooks";

/// Registry slot for the file chosen with `io.output`; nil means routed stdout.
const DEFAULT_OUTPUT_KEY: &str = "scriptdock.default_output";

/// `io` fields owned by the host.
const IO_HOOKS: &[&str] = &["write", "output", "stdout", "stderr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Default)]
struct CapturedOutput {
    stdout: String,
    stderr: String,
}

/// Destination of everything the VM prints.
///
/// `None` passes writes through to the real process streams.
#[derive(Debug, Default)]
struct StreamRouter {
    capture: Mutex<Option<CapturedOutput>>,
}

impl StreamRouter {
    fn lock(&self) -> MutexGuard<'_, Option<CapturedOutput>> {
        self.capture.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, stream: Stream, text: &str) -> std::io::Result<()> {
        let mut capture = self.lock();
        if let Some(buffers) = capture.as_mut() {
            match stream {
                Stream::Stdout => buffers.stdout.push_str(text),
                Stream::Stderr => buffers.stderr.push_str(text),
            }
            return Ok(());
        }
        drop(capture);

        match stream {
            Stream::Stdout => std::io::stdout().lock().write_all(text.as_bytes()),
            Stream::Stderr => std::io::stderr().lock().write_all(text.as_bytes()),
        }
    }

    fn flush(&self, stream: Stream) -> std::io::Result<()> {
        if self.is_capturing() {
            return Ok(());
        }
        match stream {
            Stream::Stdout => std::io::stdout().flush(),
            Stream::Stderr => std::io::stderr().flush(),
        }
    }

    fn swap(&self, next: Option<CapturedOutput>) -> Option<CapturedOutput> {
        std::mem::replace(&mut *self.lock(), next)
    }

    fn is_capturing(&self) -> bool {
        self.lock().is_some()
    }
}

/// Redirects the router into fresh buffers until finished or dropped.
struct CaptureGuard<'a> {
    router: &'a StreamRouter,
    /// Routing to restore; `None` once restored.
    previous: Option<Option<CapturedOutput>>,
}

impl<'a> CaptureGuard<'a> {
    fn begin(router: &'a StreamRouter) -> Self {
        let previous = router.swap(Some(CapturedOutput::default()));
        Self {
            router,
            previous: Some(previous),
        }
    }

    /// Restore the previous routing and hand back what was captured.
    fn finish(mut self) -> CapturedOutput {
        let previous = self.previous.take().flatten();
        self.router.swap(previous).unwrap_or_default()
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.router.swap(previous);
        }
    }
}

/// Prepends a script directory to `package.path` for one run.
///
/// Modules first required during the run are evicted from `package.loaded`
/// on drop so an edited helper module is picked up by the next run.
struct SearchPathGuard<'lua> {
    lua: &'lua Lua,
    previous: String,
    loaded_before: HashSet<String>,
}

impl<'lua> SearchPathGuard<'lua> {
    fn push(lua: &'lua Lua, dir: &Path) -> mlua::Result<Self> {
        let package: Table = lua.globals().get("package")?;
        let previous: String = package.get("path")?;
        let loaded_before = loaded_modules(&package)?;

        let dir = dir.to_string_lossy();
        package.set("path", format!("{dir}/?.lua;{dir}/?/init.lua;{previous}"))?;

        Ok(Self {
            lua,
            previous,
            loaded_before,
        })
    }

    fn restore(&self) -> mlua::Result<()> {
        let package: Table = self.lua.globals().get("package")?;
        package.set("path", self.previous.as_str())?;

        let loaded: Table = package.get("loaded")?;
        for name in loaded_modules(&package)?.difference(&self.loaded_before) {
            debug!(module = %name, "Evicting module loaded by script");
            loaded.set(name.as_str(), Value::Nil)?;
        }
        Ok(())
    }
}

impl Drop for SearchPathGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "Failed to restore Lua search path");
        }
    }
}

fn loaded_modules(package: &Table) -> mlua::Result<HashSet<String>> {
    let loaded: Table = package.get("loaded")?;
    let mut names = HashSet::new();
    loaded.for_each(|key: Value, _: Value| {
        if let Value::String(s) = key {
            names.insert(s.to_string_lossy().into());
        }
        Ok(())
    })?;
    Ok(names)
}

/// The shipped [`ScriptEngine`]: Lua 5.4 via `mlua`.
pub struct LuaEngine {
    lua: Mutex<Lua>,
    router: Arc<StreamRouter>,
}

impl std::fmt::Debug for LuaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaEngine")
            .field("capturing", &self.router.is_capturing())
            .finish_non_exhaustive()
    }
}

impl LuaEngine {
    /// Create the VM and install the routed output functions.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::EngineInit`] if the VM cannot be prepared.
    pub fn new() -> HostResult<Self> {
        let lua = Lua::new();
        let router = Arc::new(StreamRouter::default());
        install_streams(&lua, &router).map_err(|e| HostError::EngineInit(e.to_string()))?;

        Ok(Self {
            lua: Mutex::new(lua),
            router,
        })
    }

    fn vm(&self) -> MutexGuard<'_, Lua> {
        self.lua.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScriptEngine for LuaEngine {
    fn name(&self) -> String {
        self.vm()
            .globals()
            .get::<String>("_VERSION")
            .unwrap_or_else(|_| "Lua".to_string())
    }

    fn validate(&self, chunk_name: &str, source: &str) -> Result<(), EngineFailure> {
        let lua = self.vm();
        lua.load(source)
            .set_name(format!("@{chunk_name}"))
            .into_function()
            .map(|_| ())
            .map_err(failure)
    }

    fn invoke(&self, invocation: Invocation<'_>) -> InvokeOutcome {
        let lua = self.vm();
        let capture = invocation
            .capture_output
            .then(|| CaptureGuard::begin(&self.router));

        let result = run_main_chunk(&lua, &invocation);

        let captured = capture.map(CaptureGuard::finish).unwrap_or_default();
        InvokeOutcome {
            result,
            stdout: captured.stdout,
            stderr: captured.stderr,
        }
    }

    fn shared_state(&self) -> SharedState {
        let lua = self.vm();
        let search_path = lua
            .globals()
            .get::<Table>("package")
            .and_then(|p| p.get::<String>("path"))
            .unwrap_or_default();
        SharedState {
            search_path,
            capturing: self.router.is_capturing(),
            hooks_intact: hooks_intact(&lua).unwrap_or(false),
        }
    }
}

fn failure(e: mlua::Error) -> EngineFailure {
    EngineFailure::from_trace(e.to_string())
}

fn run_main_chunk(lua: &Lua, invocation: &Invocation<'_>) -> Result<(), EngineFailure> {
    let dir = invocation
        .script_path
        .parent()
        .unwrap_or_else(|| Path::new("."));
    let _hooks = HooksGuard::new(lua);
    let _search_path = SearchPathGuard::push(lua, dir).map_err(failure)?;
    let env = build_namespace(lua, invocation).map_err(failure)?;

    lua.load(invocation.source)
        .set_name(format!("@{}", invocation.script_path.display()))
        .set_environment(env)
        .exec()
        .map_err(failure)
}

/// A fresh environment table: bindings, identity, then VM globals.
fn build_namespace(lua: &Lua, invocation: &Invocation<'_>) -> mlua::Result<Table> {
    let env = lua.create_table()?;
    install_bindings(lua, &env, invocation.bindings)?;

    let path = invocation.script_path.to_string_lossy();
    let name = invocation
        .script_path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    env.set("HOST_API_VERSION", invocation.bindings.version())?;
    env.set("SCRIPT_PATH", &*path)?;
    env.set("SCRIPT_NAME", &*name)?;
    env.set("IS_MAIN", true)?;

    let arg = lua.create_table()?;
    arg.set(0, &*path)?;
    env.set("arg", arg)?;

    let meta = lua.create_table()?;
    meta.set("__index", lua.globals())?;
    env.set_metatable(Some(meta));

    Ok(env)
}

fn install_bindings(lua: &Lua, env: &Table, bindings: &HostBindings) -> mlua::Result<()> {
    for (name, value) in bindings.iter() {
        env.set(name, to_lua(lua, value, 0)?)?;
    }
    Ok(())
}

fn to_lua(lua: &Lua, value: &BindingValue, depth: usize) -> mlua::Result<Value> {
    if depth > MAX_BINDING_DEPTH {
        return Err(mlua::Error::runtime("binding value nested too deeply"));
    }

    Ok(match value {
        BindingValue::Nil => Value::Nil,
        BindingValue::Bool(b) => Value::Boolean(*b),
        BindingValue::Number(n) => Value::Number(*n),
        BindingValue::Text(s) => Value::String(lua.create_string(s)?),
        BindingValue::Table(entries) => {
            let table = lua.create_table()?;
            for (key, item) in entries {
                table.set(key.as_str(), to_lua(lua, item, depth.saturating_add(1))?)?;
            }
            Value::Table(table)
        },
        BindingValue::Function(f) => {
            let f = Arc::clone(f);
            let function = lua.create_function(move |lua, args: Variadic<Value>| {
                let args = args
                    .into_iter()
                    .map(|v| from_lua(v, 0))
                    .collect::<mlua::Result<Vec<_>>>()?;
                let out = f(&args).map_err(mlua::Error::runtime)?;
                to_lua(lua, &out, 0)
            })?;
            Value::Function(function)
        },
    })
}

#[allow(clippy::cast_precision_loss)]
fn from_lua(value: Value, depth: usize) -> mlua::Result<BindingValue> {
    if depth > MAX_BINDING_DEPTH {
        return Err(mlua::Error::runtime("argument nested too deeply"));
    }

    Ok(match value {
        Value::Nil => BindingValue::Nil,
        Value::Boolean(b) => BindingValue::Bool(b),
        Value::Integer(i) => BindingValue::Number(i as f64),
        Value::Number(n) => BindingValue::Number(n),
        Value::String(s) => BindingValue::Text(s.to_string_lossy().into()),
        Value::Table(table) => {
            let mut entries = BTreeMap::new();
            table.for_each(|key: Value, item: Value| {
                let key = match key {
                    Value::String(s) => s.to_string_lossy().into(),
                    Value::Integer(i) => i.to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => return Ok(()),
                };
                entries.insert(key, from_lua(item, depth.saturating_add(1))?);
                Ok(())
            })?;
            BindingValue::Table(entries)
        },
        other => {
            return Err(mlua::Error::runtime(format!(
                "cannot pass a {} to a host function",
                other.type_name()
            )));
        },
    })
}

/// Render values the way Lua's `tostring` does.
fn stringify(lua: &Lua, value: Value) -> mlua::Result<String> {
    if let Value::String(s) = &value {
        return Ok(s.to_string_lossy().into());
    }
    let tostring: Function = lua.globals().get("tostring")?;
    let text: mlua::String = tostring.call(value)?;
    Ok(text.to_string_lossy().into())
}

/// Replace `print`, `io.write`, `io.output`, `io.stdout`, `io.stderr` and
/// `os.exit` with host versions, and record them in the registry so every
/// run can be followed by [`reinstall_hooks`].
fn install_streams(lua: &Lua, router: &Arc<StreamRouter>) -> mlua::Result<()> {
    let globals = lua.globals();
    let io: Table = globals.get("io")?;
    let os: Table = globals.get("os")?;

    let r = Arc::clone(router);
    let print = lua.create_function(move |lua, args: Variadic<Value>| {
        let mut line = String::new();
        for (i, value) in args.into_iter().enumerate() {
            if i > 0 {
                line.push('\t');
            }
            line.push_str(&stringify(lua, value)?);
        }
        line.push('\n');
        r.write(Stream::Stdout, &line).map_err(mlua::Error::external)
    })?;

    let stdout = stream_proxy(lua, router, Stream::Stdout)?;
    let stderr = stream_proxy(lua, router, Stream::Stderr)?;

    let r = Arc::clone(router);
    let write = lua.create_function(move |lua, args: Variadic<Value>| {
        match lua.named_registry_value::<Value>(DEFAULT_OUTPUT_KEY)? {
            Value::Nil => {
                for value in args {
                    r.write(Stream::Stdout, &stringify(lua, value)?)
                        .map_err(mlua::Error::external)?;
                }
                hooks(lua)?.get::<Value>("stdout")
            },
            file => write_to(file, args),
        }
    })?;

    let output = lua.create_function(|lua, file: Value| select_output(lua, file))?;

    let exit = lua.create_function(|_, code: Value| -> mlua::Result<()> {
        let code = match code {
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
            _ => String::new(),
        };
        Err(mlua::Error::runtime(format!(
            "os.exit({code}) is not available to scripts; return from the script or call error() instead"
        )))
    })?;

    let installed = lua.create_table()?;
    installed.set("print", print)?;
    installed.set("io", io.clone())?;
    installed.set("os", os.clone())?;
    installed.set("write", write)?;
    installed.set("output", output)?;
    installed.set("stdout", stdout)?;
    installed.set("stderr", stderr)?;
    installed.set("exit", exit)?;
    installed.set("open", io.get::<Function>("open")?)?;
    lua.set_named_registry_value(HOOKS_KEY, installed)?;

    reinstall_hooks(lua)
}

/// The table of host hooks recorded by [`install_streams`].
fn hooks(lua: &Lua) -> mlua::Result<Table> {
    lua.named_registry_value(HOOKS_KEY)
}

/// Put every host hook back in place and reset the default output.
fn reinstall_hooks(lua: &Lua) -> mlua::Result<()> {
    let installed = hooks(lua)?;
    let globals = lua.globals();
    let io: Table = installed.get("io")?;
    let os: Table = installed.get("os")?;

    globals.raw_set("print", installed.get::<Value>("print")?)?;
    globals.raw_set("io", io.clone())?;
    globals.raw_set("os", os.clone())?;
    for field in IO_HOOKS {
        io.raw_set(*field, installed.get::<Value>(*field)?)?;
    }
    os.raw_set("exit", installed.get::<Value>("exit")?)?;

    let loaded: Table = globals.get::<Table>("package")?.get("loaded")?;
    loaded.raw_set("io", io)?;
    loaded.raw_set("os", os)?;

    lua.set_named_registry_value(DEFAULT_OUTPUT_KEY, Value::Nil)
}

/// Whether every host hook is still the one [`install_streams`] recorded.
fn hooks_intact(lua: &Lua) -> mlua::Result<bool> {
    let installed = hooks(lua)?;
    let globals = lua.globals();
    let io: Value = globals.raw_get("io")?;
    let os: Value = globals.raw_get("os")?;
    if io != installed.get::<Value>("io")?
        || os != installed.get::<Value>("os")?
        || globals.raw_get::<Value>("print")? != installed.get::<Value>("print")?
    {
        return Ok(false);
    }

    let io: Table = installed.get("io")?;
    for field in IO_HOOKS {
        if io.raw_get::<Value>(*field)? != installed.get::<Value>(*field)? {
            return Ok(false);
        }
    }
    let os: Table = installed.get("os")?;
    Ok(os.raw_get::<Value>("exit")? == installed.get::<Value>("exit")?)
}

/// `io.output([file])`: with no argument, the current default output;
/// with a filename or file, make it the default for the rest of the run.
fn select_output(lua: &Lua, file: Value) -> mlua::Result<Value> {
    let chosen = match file {
        Value::Nil => {
            let current: Value = lua.named_registry_value(DEFAULT_OUTPUT_KEY)?;
            return if current.is_nil() {
                hooks(lua)?.get("stdout")
            } else {
                Ok(current)
            };
        },
        Value::String(name) => {
            let open: Function = hooks(lua)?.get("open")?;
            let (handle, err): (Value, Option<String>) = open.call((name, "w"))?;
            if handle.is_nil() {
                return Err(mlua::Error::runtime(
                    err.unwrap_or_else(|| "cannot open output file".to_string()),
                ));
            }
            handle
        },
        other => other,
    };

    // Selecting the routed stdout proxy again goes back to routing.
    let stored = if chosen == hooks(lua)?.get::<Value>("stdout")? {
        Value::Nil
    } else {
        chosen.clone()
    };
    lua.set_named_registry_value(DEFAULT_OUTPUT_KEY, stored)?;
    Ok(chosen)
}

fn write_to(file: Value, args: Variadic<Value>) -> mlua::Result<Value> {
    match file {
        Value::UserData(ud) => ud.call_method("write", args),
        Value::Table(t) => t.call_method("write", args),
        other => Err(mlua::Error::runtime(format!(
            "default output is a {}, not a file",
            other.type_name()
        ))),
    }
}

/// A file-like table with `write`, `flush` and `setvbuf` methods.
fn stream_proxy(lua: &Lua, router: &Arc<StreamRouter>, stream: Stream) -> mlua::Result<Table> {
    let proxy = lua.create_table()?;

    let r = Arc::clone(router);
    let write = lua.create_function(move |lua, (this, args): (Table, Variadic<Value>)| {
        for value in args {
            r.write(stream, &stringify(lua, value)?)
                .map_err(mlua::Error::external)?;
        }
        Ok(this)
    })?;

    let r = Arc::clone(router);
    let flush = lua.create_function(move |_, this: Table| {
        r.flush(stream).map_err(mlua::Error::external)?;
        Ok(this)
    })?;

    let setvbuf = lua.create_function(|_, _: Variadic<Value>| Ok(true))?;

    proxy.set("write", write)?;
    proxy.set("flush", flush)?;
    proxy.set("setvbuf", setvbuf)?;
    Ok(proxy)
}

/// Reinstalls the host hooks when a run ends, whatever the script did to
/// `print`, `io` or `os` through `_G` or the shared library tables.
struct HooksGuard<'lua> {
    lua: &'lua Lua,
}

impl<'lua> HooksGuard<'lua> {
    fn new(lua: &'lua Lua) -> Self {
        Self { lua }
    }
}

impl Drop for HooksGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = reinstall_hooks(self.lua) {
            warn!(error = %e, "Failed to reinstall Lua output hooks");
        }
    }
}
