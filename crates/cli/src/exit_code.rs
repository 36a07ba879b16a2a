// Consistent exit codes for the gaia CLI.
//
//   0  = success
//   1  = general error
//   2  = usage error, or no payload found in the input
//   10 = server not reachable
//   11 = authentication error
//   12 = job or request rejected by the server
//   13 = network error or wait timeout

use std::process;

use crate::client::ClientError;
use crate::commands::NoPayloadFound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    ServerDown = 10,
    Auth = 11,
    Rejected = 12,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.downcast_ref::<NoPayloadFound>().is_some() {
                return Self::Usage;
            }
            if let Some(client_err) = cause.downcast_ref::<ClientError>() {
                return Self::from_client_error(client_err);
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::NotFound => Self::Usage,
                    _ => Self::Error,
                };
            }
        }
        Self::Error
    }

    pub fn from_client_error(err: &ClientError) -> Self {
        match err {
            ClientError::BadUrl { .. } => Self::Usage,
            ClientError::Unreachable { .. } => Self::ServerDown,
            ClientError::Timeout(_) | ClientError::WaitTimedOut { .. } => Self::Network,
            ClientError::Api { status: 401 | 403, .. } => Self::Auth,
            ClientError::Api { status: 400..=499, .. } => Self::Rejected,
            ClientError::Api { .. } | ClientError::Decode(_) => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
