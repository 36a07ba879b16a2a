// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use crate::client::ClientError;
use crate::commands::NoPayloadFound;
use crate::config::CliConfig;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Write a value to a provided writer (useful for testing).
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    print_stderr(format, "error", code, message, ANSI_RED);
}

/// Write a warning to stderr in the selected format.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_stderr(format, "warning", code, message, ANSI_YELLOW);
}

fn print_stderr(format: OutputFormat, label: &str, code: &str, message: &str, color: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(label, message, io::stderr().is_terminal(), color);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                label: {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error, config: &CliConfig) {
    let (code, message) = actionable_error(error, config);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error, config: &CliConfig) -> (&'static str, String) {
    for cause in error.chain() {
        if let Some(no_payload) = cause.downcast_ref::<NoPayloadFound>() {
            return ("NO_PAYLOAD", no_payload.to_string());
        }
        if let Some(client_err) = cause.downcast_ref::<ClientError>() {
            return client_error_message(client_err, config);
        }
    }
    ("ERROR", format!("{error:#}"))
}

fn client_error_message(error: &ClientError, config: &CliConfig) -> (&'static str, String) {
    match error {
        ClientError::BadUrl { .. } => (
            "BAD_SERVER_URL",
            format!("{error}. Fix server_url in ~/.gaia/config.toml or pass --server"),
        ),
        ClientError::Unreachable { .. } => (
            "SERVER_UNREACHABLE",
            format!(
                "Could not reach the orchestrator at {}. Is gaia-server running?",
                config.server_url
            ),
        ),
        ClientError::Timeout(_) => {
            ("NETWORK_TIMEOUT", format!("Request to {} timed out", config.server_url))
        }
        ClientError::WaitTimedOut { .. } => ("WAIT_TIMEOUT", error.to_string()),
        ClientError::Api { status: 401 | 403, .. } => (
            "AUTH_FAILURE",
            "Authentication failed. Set api_secret in ~/.gaia/config.toml or GAIA_API_SECRET"
                .to_string(),
        ),
        ClientError::Api { status: 404, message, .. } => ("NOT_FOUND", message.clone()),
        ClientError::Api { message, .. } => ("API_ERROR", message.clone()),
        ClientError::Decode(_) => ("BAD_RESPONSE", error.to_string()),
    }
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}
