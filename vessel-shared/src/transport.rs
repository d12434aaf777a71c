//! Transport mechanisms for the outer-client/inner-kernel bridge.
//!
//! The common case is [`Transport::InProcess`]: the kernel runs as a
//! background task inside the same OS process as the client, connected over
//! an in-memory duplex pipe. `Unix` and `Tcp` exist for the same reason the
//! teacher kept multiple transports around even though only one is used in
//! the hot path: they let a CLI or test harness attach to an already-running
//! kernel from a separate process, which is handy for inspection and for
//! driving the kernel from more than one language without re-embedding it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Transport mechanism for outer-client/inner-kernel communication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transport {
    /// In-memory duplex pipe; valid only within a single OS process.
    InProcess { id: u64 },

    /// Unix domain socket transport.
    Unix { socket_path: PathBuf },

    /// TCP loopback transport.
    Tcp { port: u16 },
}

impl Transport {
    pub fn in_process(id: u64) -> Self {
        Self::InProcess { id }
    }

    pub fn unix(socket_path: PathBuf) -> Self {
        Self::Unix { socket_path }
    }

    pub fn tcp(port: u16) -> Self {
        Self::Tcp { port }
    }

    /// URI representation, used for logging and for the `from_uri` round-trip.
    pub fn to_uri(&self) -> String {
        match self {
            Transport::InProcess { id } => format!("inprocess://{}", id),
            Transport::Unix { socket_path } => format!("unix://{}", socket_path.display()),
            Transport::Tcp { port } => format!("tcp://127.0.0.1:{}", port),
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, String> {
        if let Some(rest) = uri.strip_prefix("inprocess://") {
            let id = rest
                .parse::<u64>()
                .map_err(|e| format!("invalid in-process transport id in '{}': {}", uri, e))?;
            Ok(Self::in_process(id))
        } else if let Some(path) = uri.strip_prefix("unix://") {
            Ok(Self::unix(PathBuf::from(path)))
        } else if let Some(rest) = uri.strip_prefix("tcp://") {
            let port = rest
                .rsplit(':')
                .next()
                .ok_or_else(|| format!("invalid TCP URI '{}': missing port", uri))?
                .parse::<u16>()
                .map_err(|e| format!("invalid TCP port in '{}': {}", uri, e))?;
            Ok(Self::tcp(port))
        } else {
            Err(format!(
                "invalid transport URI '{}': expected inprocess://, unix://, or tcp://",
                uri
            ))
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trips() {
        for t in [
            Transport::in_process(7),
            Transport::unix(PathBuf::from("/tmp/vessel.sock")),
            Transport::tcp(9000),
        ] {
            let uri = t.to_uri();
            let parsed = Transport::from_uri(&uri).unwrap();
            assert_eq!(t, parsed);
        }
    }
}
