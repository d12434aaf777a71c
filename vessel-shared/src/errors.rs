//! Error taxonomy shared between the outer client and the inner kernel.
//!
//! Mirrors the four error families of the design doc (filesystem, process,
//! network, bridge) plus a configuration family for boot-time validation.
//! Each family carries the POSIX-flavoured code it corresponds to so callers
//! can match on `.code()` without string-parsing a message.

use thiserror::Error;

/// Top-level error type returned by every public vessel API.
#[derive(Debug, Error)]
pub enum VesselError {
    /// Filesystem operation failed; see [`FsErrorCode`] for the specific code.
    #[error("fs error: {code:?}: {message}")]
    Fs {
        code: FsErrorCode,
        message: String,
        path: Option<String>,
    },

    /// Process-subsystem error.
    #[error("process error: {code:?}: {message}")]
    Process { code: ProcessErrorCode, message: String },

    /// Virtual-network error.
    #[error("network error: {code:?}: {message}")]
    Network { code: NetworkErrorCode, message: String },

    /// RPC bridge error.
    #[error("bridge error: {code:?}: {message}")]
    Bridge { code: BridgeErrorCode, message: String },

    /// Configuration or validation error (user-fixable).
    #[error("config error: {0}")]
    Config(String),

    /// Catch-all for conditions that do not map onto a named taxonomy entry.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Filesystem error codes (design doc §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsErrorCode {
    ENOENT,
    EEXIST,
    EISDIR,
    ENOTDIR,
    ENOTEMPTY,
    EACCES,
    EBUSY,
    EIO,
}

/// Process error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessErrorCode {
    ESPAWN,
    ESCRIPT,
    ETERM,
    EMEMLIMIT,
}

/// Virtual-network error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorCode {
    EADDRINUSE,
    ENOSERVER,
    ETIMEOUT,
    EHANDLER,
}

/// RPC bridge error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeErrorCode {
    TIMEOUT,
    DISPOSED,
    PROTOCOL,
}

impl VesselError {
    pub fn fs(code: FsErrorCode, message: impl Into<String>) -> Self {
        Self::Fs { code, message: message.into(), path: None }
    }

    pub fn fs_at(code: FsErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fs { code, message: message.into(), path: Some(path.into()) }
    }

    pub fn process(code: ProcessErrorCode, message: impl Into<String>) -> Self {
        Self::Process { code, message: message.into() }
    }

    pub fn network(code: NetworkErrorCode, message: impl Into<String>) -> Self {
        Self::Network { code, message: message.into() }
    }

    pub fn bridge(code: BridgeErrorCode, message: impl Into<String>) -> Self {
        Self::Bridge { code, message: message.into() }
    }

    /// The POSIX-style short code, for clients that want to match on it
    /// without destructuring the enum (mirrors the outer API's `{code, message, path?}`
    /// typed-rejection shape from the design doc).
    pub fn short_code(&self) -> &'static str {
        match self {
            Self::Fs { code, .. } => match code {
                FsErrorCode::ENOENT => "ENOENT",
                FsErrorCode::EEXIST => "EEXIST",
                FsErrorCode::EISDIR => "EISDIR",
                FsErrorCode::ENOTDIR => "ENOTDIR",
                FsErrorCode::ENOTEMPTY => "ENOTEMPTY",
                FsErrorCode::EACCES => "EACCES",
                FsErrorCode::EBUSY => "EBUSY",
                FsErrorCode::EIO => "EIO",
            },
            Self::Process { code, .. } => match code {
                ProcessErrorCode::ESPAWN => "ESPAWN",
                ProcessErrorCode::ESCRIPT => "ESCRIPT",
                ProcessErrorCode::ETERM => "ETERM",
                ProcessErrorCode::EMEMLIMIT => "EMEMLIMIT",
            },
            Self::Network { code, .. } => match code {
                NetworkErrorCode::EADDRINUSE => "EADDRINUSE",
                NetworkErrorCode::ENOSERVER => "ENOSERVER",
                NetworkErrorCode::ETIMEOUT => "ETIMEOUT",
                NetworkErrorCode::EHANDLER => "EHANDLER",
            },
            Self::Bridge { code, .. } => match code {
                BridgeErrorCode::TIMEOUT => "TIMEOUT",
                BridgeErrorCode::DISPOSED => "DISPOSED",
                BridgeErrorCode::PROTOCOL => "PROTOCOL",
            },
            Self::Config(_) => "ECONFIG",
            Self::Internal(_) => "EINTERNAL",
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Fs { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VesselError {
    fn from(e: std::io::Error) -> Self {
        Self::fs(FsErrorCode::EIO, e.to_string())
    }
}

impl From<tonic::transport::Error> for VesselError {
    fn from(e: tonic::transport::Error) -> Self {
        Self::bridge(BridgeErrorCode::PROTOCOL, e.to_string())
    }
}

impl From<tonic::Status> for VesselError {
    fn from(status: tonic::Status) -> Self {
        use tonic::Code;
        match status.code() {
            Code::NotFound => Self::fs(FsErrorCode::ENOENT, status.message().to_string()),
            Code::AlreadyExists => Self::fs(FsErrorCode::EEXIST, status.message().to_string()),
            Code::DeadlineExceeded => {
                Self::bridge(BridgeErrorCode::TIMEOUT, status.message().to_string())
            }
            Code::Unavailable => {
                Self::bridge(BridgeErrorCode::DISPOSED, status.message().to_string())
            }
            Code::InvalidArgument => {
                Self::bridge(BridgeErrorCode::PROTOCOL, status.message().to_string())
            }
            _ => Self::Internal(status.message().to_string()),
        }
    }
}

/// Convert a [`VesselError`] into the [`tonic::Status`] the bridge server sends
/// back over the wire; the inverse of `From<tonic::Status>` above.
impl From<VesselError> for tonic::Status {
    fn from(e: VesselError) -> Self {
        use tonic::Code;
        let code = match &e {
            VesselError::Fs { code, .. } => match code {
                FsErrorCode::ENOENT => Code::NotFound,
                FsErrorCode::EEXIST => Code::AlreadyExists,
                FsErrorCode::EISDIR | FsErrorCode::ENOTDIR | FsErrorCode::ENOTEMPTY => {
                    Code::FailedPrecondition
                }
                FsErrorCode::EACCES => Code::PermissionDenied,
                FsErrorCode::EBUSY => Code::Unavailable,
                FsErrorCode::EIO => Code::Internal,
            },
            VesselError::Process { .. } => Code::Internal,
            VesselError::Network { code, .. } => match code {
                NetworkErrorCode::EADDRINUSE => Code::AlreadyExists,
                NetworkErrorCode::ENOSERVER => Code::NotFound,
                NetworkErrorCode::ETIMEOUT => Code::DeadlineExceeded,
                NetworkErrorCode::EHANDLER => Code::Internal,
            },
            VesselError::Bridge { code, .. } => match code {
                BridgeErrorCode::TIMEOUT => Code::DeadlineExceeded,
                BridgeErrorCode::DISPOSED => Code::Unavailable,
                BridgeErrorCode::PROTOCOL => Code::InvalidArgument,
            },
            VesselError::Config(_) => Code::InvalidArgument,
            VesselError::Internal(_) => Code::Internal,
        };
        tonic::Status::new(code, e.to_string())
    }
}

pub type VesselResult<T> = Result<T, VesselError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_code_round_trips_for_fs_errors() {
        let err = VesselError::fs_at(FsErrorCode::ENOENT, "/a/b", "missing");
        assert_eq!(err.short_code(), "ENOENT");
        assert_eq!(err.path(), Some("/a/b"));
    }

    #[test]
    fn status_conversion_preserves_not_found() {
        let err = VesselError::fs(FsErrorCode::ENOENT, "nope");
        let status: tonic::Status = err.into();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
