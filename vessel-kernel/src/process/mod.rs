//! Process subsystem: registry, stdio plumbing, builtin commands, the shell
//! executor, and the script executor backed by the [`engine::ScriptEngine`]
//! seam.

pub mod builtins;
pub mod engine;
pub mod registry;
pub mod script;
pub mod shell;
pub mod stdio;
pub mod types;

pub use registry::ProcessRegistry;
pub use script::{run_script, ScriptContext};
pub use stdio::{ProcessStdio, StdioChannels, StdioHandle};
pub use types::{Pid, ProcessInfo, ProcessKind, ProcessStatus, SpawnOptions, TerminalSize};
