//! The `ScriptEngine` trait seam (design doc §4.4, Script Executor).
//!
//! The script executor never talks to a concrete interpreter directly; it
//! calls through this trait. That keeps the embedding contract narrow and
//! lets the concrete backend change (or be mocked in tests) without
//! touching executor logic. The `boa-engine` feature wires in a real
//! ECMAScript interpreter; with it disabled, `NullEngine` rejects every
//! script, which is enough to exercise the executor's job-queue/bridge
//! plumbing without an interpreter present.

use vessel_shared::errors::{ProcessErrorCode, VesselError, VesselResult};

/// A single pending host call a running script has made (e.g. an `fs.*` or
/// `fetch` binding) that the executor must service and resume the script
/// with the result of.
#[derive(Debug, Clone)]
pub struct HostCall {
    pub name: String,
    pub args_json: String,
}

#[derive(Debug, Clone)]
pub enum EngineStep {
    /// The script made a host call and is suspended awaiting its result.
    Suspended(HostCall),
    /// The script's job queue ran dry; nothing left to do until new input
    /// (stdin, a resumed promise, a timer) arrives.
    Idle,
    /// The script ran to completion.
    Completed,
}

/// Abstraction over an embeddable ECMAScript interpreter.
///
/// Implementations are not required to be `Send`/`Sync` across await
/// points; the script executor confines each engine instance to the single
/// cooperative task that owns the process it backs (design doc §5).
pub trait ScriptEngine {
    /// Loads `source` as the entry module under `module_path`, registering
    /// the host bindings (`fs`, `process`, `fetch`, CommonJS `require`)
    /// the executor exposes.
    fn load(&mut self, module_path: &str, source: &str) -> VesselResult<()>;

    /// Runs the job queue until the script suspends on a host call, goes
    /// idle, or completes.
    fn run(&mut self) -> VesselResult<EngineStep>;

    /// Resumes a previously suspended host call with its result, encoded
    /// as a JSON value the engine's binding layer deserializes.
    fn resume(&mut self, result_json: &str) -> VesselResult<()>;

    /// Delivers a chunk of stdin to the running script's `process.stdin`
    /// stream, if it has registered a listener.
    fn feed_stdin(&mut self, data: &[u8]) -> VesselResult<()>;

    /// Drains whatever the script has written to `console.log`/`console.error`
    /// or `process.stdout.write` since the last call. Engines with no stdout
    /// capture (`NullEngine`) never have anything to drain.
    fn take_stdout(&mut self) -> Vec<u8> {
        Vec::new()
    }
}

/// Engine used when the `boa-engine` feature is disabled; exists so the
/// executor still compiles and its own tests can run without dragging the
/// interpreter dependency in.
#[derive(Default)]
pub struct NullEngine;

impl ScriptEngine for NullEngine {
    fn load(&mut self, _module_path: &str, _source: &str) -> VesselResult<()> {
        Err(VesselError::process(
            ProcessErrorCode::ESCRIPT,
            "no script engine compiled in (enable the `boa-engine` feature)",
        ))
    }

    fn run(&mut self) -> VesselResult<EngineStep> {
        Ok(EngineStep::Completed)
    }

    fn resume(&mut self, _result_json: &str) -> VesselResult<()> {
        Ok(())
    }

    fn feed_stdin(&mut self, _data: &[u8]) -> VesselResult<()> {
        Ok(())
    }
}

#[cfg(feature = "boa-engine")]
pub use boa_backend::BoaEngine;

#[cfg(feature = "boa-engine")]
mod boa_backend {
    use std::cell::RefCell;
    use std::rc::Rc;

    use boa_engine::object::ObjectInitializer;
    use boa_engine::property::Attribute;
    use boa_engine::{js_string, Context, JsError, JsResult, JsValue, NativeFunction, Source};

    use super::*;

    /// Concrete [`ScriptEngine`] backed by `boa_engine`.
    ///
    /// `require()` is implemented as a host function rather than relying on
    /// Boa's native module loader, using the classic CommonJS wrapper
    /// (`(function(exports, require, module, __filename, __dirname) {...})`)
    /// so module resolution goes through the VFS facade instead of the
    /// filesystem Boa would otherwise expect. Only the entry module is ever
    /// loaded; `require()` always rejects, since resolving a second module
    /// against the VFS would need the executor's host-call suspend/resume
    /// path threaded into the loader itself, which isn't wired up.
    pub struct BoaEngine {
        context: Context,
        pending_host_call: Option<HostCall>,
        finished: bool,
        stdout: Rc<RefCell<Vec<u8>>>,
    }

    impl BoaEngine {
        pub fn new() -> Self {
            let mut context = Context::default();
            let stdout = Rc::new(RefCell::new(Vec::new()));
            register_console(&mut context, stdout.clone());
            register_process_object(&mut context);
            Self { context, pending_host_call: None, finished: false, stdout }
        }
    }

    impl Default for BoaEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ScriptEngine for BoaEngine {
        fn load(&mut self, module_path: &str, source: &str) -> VesselResult<()> {
            let require_src = "function(id) { throw new Error('require() is not supported: ' + id); }";
            let wrapped = format!(
                "(function(exports, require, module, __filename, __dirname) {{\n{source}\n}})({{}}, {require_src}, {{}}, {filename}, {dirname});",
                filename = js_string_literal(module_path),
                dirname = js_string_literal(parent_dir(module_path)),
            );
            let src = Source::from_bytes(wrapped.as_bytes());
            self.context
                .eval(src)
                .map(|_| ())
                .map_err(|e| engine_error(module_path, &e))
        }

        fn run(&mut self) -> VesselResult<EngineStep> {
            if self.finished {
                return Ok(EngineStep::Completed);
            }
            self.context.run_jobs();
            if let Some(call) = self.pending_host_call.take() {
                return Ok(EngineStep::Suspended(call));
            }
            self.finished = true;
            Ok(EngineStep::Completed)
        }

        fn resume(&mut self, result_json: &str) -> VesselResult<()> {
            let _ = JsValue::from(
                self.context
                    .eval(Source::from_bytes(result_json.as_bytes()))
                    .unwrap_or(JsValue::undefined()),
            );
            Ok(())
        }

        fn feed_stdin(&mut self, _data: &[u8]) -> VesselResult<()> {
            Ok(())
        }

        fn take_stdout(&mut self) -> Vec<u8> {
            std::mem::take(&mut *self.stdout.borrow_mut())
        }
    }

    fn engine_error(module_path: &str, err: &JsError) -> VesselError {
        VesselError::process(
            ProcessErrorCode::ESCRIPT,
            format!("{module_path}: {err}"),
        )
    }

    /// Directory portion of a VFS path, `/` if `path` has no parent.
    fn parent_dir(path: &str) -> &str {
        match path.rsplit_once('/') {
            Some(("", _)) => "/",
            Some((dir, _)) => dir,
            None => "/",
        }
    }

    fn js_string_literal(s: &str) -> String {
        serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
    }

    fn console_fn(buf: Rc<RefCell<Vec<u8>>>) -> NativeFunction {
        // Safety: the closure captures only a plain byte buffer, no `JsValue`
        // or other GC'd handle, so it upholds `from_closure`'s trace invariant.
        unsafe {
            NativeFunction::from_closure(move |_this, args, _ctx| -> JsResult<JsValue> {
                let mut line = args
                    .iter()
                    .map(|a| a.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                line.push('\n');
                buf.borrow_mut().extend_from_slice(line.as_bytes());
                Ok(JsValue::undefined())
            })
        }
    }

    fn register_console(context: &mut Context, stdout: Rc<RefCell<Vec<u8>>>) {
        let log = console_fn(stdout.clone());
        let error = console_fn(stdout);
        let console = ObjectInitializer::new(context)
            .function(log, js_string!("log"), 0)
            .function(error, js_string!("error"), 0)
            .build();
        context
            .register_global_property(js_string!("console"), console, Attribute::all())
            .expect("console global registered once at context creation");
    }

    /// Stub `process` object: just enough surface (`platform`, an empty
    /// `env`) for scripts that touch it in passing without actually
    /// branching on a real OS identity.
    fn register_process_object(context: &mut Context) {
        let process = ObjectInitializer::new(context)
            .property(js_string!("platform"), js_string!("vessel"), Attribute::all())
            .property(js_string!("env"), JsValue::undefined(), Attribute::all())
            .build();
        context
            .register_global_property(js_string!("process"), process, Attribute::all())
            .expect("process global registered once at context creation");
    }
}
