//! Per-process stdio channels.
//!
//! The distilled spec asked for stream-on-demand stdio; the redesign
//! decision recorded in the design doc replaces that with authoritative
//! bounded channels so a process that never reads its stdin can't let an
//! unbounded producer run the container out of memory. Writers observe
//! backpressure instead of buffering without limit.

use tokio::sync::mpsc;

use vessel_shared::errors::{ProcessErrorCode, VesselError, VesselResult};

const CHANNEL_CAPACITY: usize = 64;

pub struct StdioChannels {
    pub stdin_tx: mpsc::Sender<Vec<u8>>,
    pub stdin_rx: mpsc::Receiver<Vec<u8>>,
    pub stdout_tx: mpsc::Sender<Vec<u8>>,
    pub stdout_rx: mpsc::Receiver<Vec<u8>>,
    pub stderr_tx: mpsc::Sender<Vec<u8>>,
    pub stderr_rx: mpsc::Receiver<Vec<u8>>,
}

impl StdioChannels {
    pub fn new() -> Self {
        let (stdin_tx, stdin_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (stdout_tx, stdout_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (stderr_tx, stderr_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self { stdin_tx, stdin_rx, stdout_tx, stdout_rx, stderr_tx, stderr_rx }
    }

    /// Splits into the half the process body owns (stdin receiver plus the
    /// senders it writes output through) and the [`StdioHandle`] returned to
    /// the caller that spawned it (stdin writer plus output receivers).
    pub fn split(self) -> (ProcessStdio, StdioHandle) {
        let owned = ProcessStdio {
            stdin_rx: self.stdin_rx,
            stdout_tx: self.stdout_tx,
            stderr_tx: self.stderr_tx,
        };
        let handle = StdioHandle {
            stdin_tx: self.stdin_tx,
            stdout_rx: self.stdout_rx,
            stderr_rx: self.stderr_rx,
        };
        (owned, handle)
    }
}

impl Default for StdioChannels {
    fn default() -> Self {
        Self::new()
    }
}

/// The half of the stdio pipes a running process body reads/writes.
pub struct ProcessStdio {
    pub stdin_rx: mpsc::Receiver<Vec<u8>>,
    pub stdout_tx: mpsc::Sender<Vec<u8>>,
    pub stderr_tx: mpsc::Sender<Vec<u8>>,
}

/// Handle given to a process's caller: write stdin, read stdout/stderr.
pub struct StdioHandle {
    pub stdin_tx: mpsc::Sender<Vec<u8>>,
    pub stdout_rx: mpsc::Receiver<Vec<u8>>,
    pub stderr_rx: mpsc::Receiver<Vec<u8>>,
}

impl StdioHandle {
    pub async fn write_stdin(&self, data: Vec<u8>) -> VesselResult<()> {
        self.stdin_tx
            .send(data)
            .await
            .map_err(|_| VesselError::process(ProcessErrorCode::ETERM, "process stdin closed"))
    }
}
