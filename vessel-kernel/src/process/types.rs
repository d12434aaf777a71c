//! Process subsystem data types (design doc §3, Process).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Pid(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessKind {
    /// A JS source file executed against the embedded script engine.
    Script,
    /// A builtin command resolved by the shell executor (`ls`, `cat`, `echo`, ...).
    Builtin,
    /// A POSIX-style shell pipeline composed of builtins and/or scripts.
    Shell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Running,
    Exited,
    Killed,
    Errored,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub parent_pid: Option<Pid>,
    pub kind: ProcessKind,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: String,
    pub env: std::collections::BTreeMap<String, String>,
    pub status: ProcessStatus,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ProcessInfo {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ProcessStatus::Exited | ProcessStatus::Killed | ProcessStatus::Errored
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct SpawnOptions {
    pub cwd: Option<String>,
    pub env: std::collections::BTreeMap<String, String>,
    pub parent_pid: Option<Pid>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}
