//! Exit status decoding
//!
//! Turns a process [`ExitStatus`] into the uniform
//! `{exit_code, signaled, signal_name, signal_number}` shape. Platforms
//! without POSIX signals always report `signaled = false`.

use std::process::ExitStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    pub exit_code: i32,
    pub signaled: bool,
    pub signal_name: Option<String>,
    pub signal_number: Option<i32>,
}

impl ExitOutcome {
    /// A normal exit with the given code
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            signaled: false,
            signal_name: None,
            signal_number: None,
        }
    }

    /// Termination by signal; the exit code is the negated signal number
    pub fn signaled(signal_number: i32) -> Self {
        Self {
            exit_code: -signal_number,
            signaled: true,
            signal_name: Some(signal_name(signal_number)),
            signal_number: Some(signal_number),
        }
    }
}

#[cfg(unix)]
pub fn decode(status: ExitStatus) -> ExitOutcome {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => ExitOutcome::exited(code),
        (None, Some(signal)) => ExitOutcome::signaled(signal),
        (None, None) => ExitOutcome::exited(-1),
    }
}

#[cfg(not(unix))]
pub fn decode(status: ExitStatus) -> ExitOutcome {
    ExitOutcome::exited(status.code().unwrap_or(-1))
}

#[cfg(unix)]
fn signal_name(signal_number: i32) -> String {
    nix::sys::signal::Signal::try_from(signal_number)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{}", signal_number))
}

#[cfg(not(unix))]
fn signal_name(signal_number: i32) -> String {
    format!("SIG{}", signal_number)
}
