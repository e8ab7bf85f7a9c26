//! Diagnostic forwarding for messages raised inside the emulation core.
//!
//! Messages arrive pre-formatted with a severity and leave as `tracing` events. `Panic` and
//! `Fatal` do not return.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Error,
    Panic,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Error => "error",
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
        })
    }
}

#[track_caller]
pub fn forward(severity: Severity, component: &str, message: &str) {
    match severity {
        Severity::Debug => tracing::debug!(component, "{message}"),
        Severity::Info => tracing::info!(component, "{message}"),
        Severity::Error => tracing::error!(component, "{message}"),
        Severity::Panic | Severity::Fatal => {
            tracing::error!(component, %severity, "{message}");
            panic!("{component}: {severity}: {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_fatal_severities_return() {
        forward(Severity::Debug, "cpu0", "cr0 write");
        forward(Severity::Info, "cpu0", "model tigerlake");
        forward(Severity::Error, "cpu0", "bad msr read");
    }

    #[test]
    #[should_panic(expected = "cpu1: fatal: self-check failed")]
    fn fatal_panics_with_component() {
        forward(Severity::Fatal, "cpu1", "self-check failed");
    }
}
