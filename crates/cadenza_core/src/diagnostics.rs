//! Diagnostics Reporting
//!
//! Every recoverable problem inside the core is turned into a
//! [`Diagnostic`] and handed to the injected [`DiagnosticSink`]. The core
//! always continues best-effort afterwards; only the sink decides whether
//! a problem is silent, logged, or fatal.

use std::fmt;
use std::sync::Arc;

use cadenza_platform::BackendError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::DiagnosticsMode;

/// A problem observed while executing a request or handling a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Diagnostic {
    /// A native middleware call returned an error
    NativeCall { operation: String, error: String },

    /// A request referenced a missing object or event
    InvalidArgument { operation: String, detail: String },

    /// An event description is not loaded (yet); resolution is retried
    NotFound { guid: String },

    /// Live instance enumeration was truncated
    CapacityExceeded { count: usize, capacity: usize },

    /// An instance was registered as pending twice
    DuplicatePending { trigger: u32 },
}

impl Diagnostic {
    pub fn native_call(operation: &str, error: &BackendError) -> Self {
        Diagnostic::NativeCall {
            operation: operation.to_string(),
            error: error.to_string(),
        }
    }

    pub fn invalid_argument(operation: &str, detail: impl Into<String>) -> Self {
        Diagnostic::InvalidArgument {
            operation: operation.to_string(),
            detail: detail.into(),
        }
    }

    /// Whether a development build should treat this as an assertion failure
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Diagnostic::NativeCall { .. }
                | Diagnostic::CapacityExceeded { .. }
                | Diagnostic::DuplicatePending { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NativeCall { operation, error } => {
                write!(f, "native call {operation} failed: {error}")
            }
            Diagnostic::InvalidArgument { operation, detail } => {
                write!(f, "invalid argument in {operation}: {detail}")
            }
            Diagnostic::NotFound { guid } => write!(f, "event {guid} not loaded"),
            Diagnostic::CapacityExceeded { count, capacity } => write!(
                f,
                "instance count ({count}) exceeds enumeration capacity ({capacity})"
            ),
            Diagnostic::DuplicatePending { trigger } => {
                write!(f, "instance for trigger {trigger} already pending")
            }
        }
    }
}

/// Strategy receiving diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Drops every diagnostic
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl DiagnosticSink for SilentSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

/// Logs every diagnostic through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::InvalidArgument { .. } | Diagnostic::DuplicatePending { .. } => {
                error!("{}", diagnostic)
            }
            _ => warn!("{}", diagnostic),
        }
    }
}

/// Logs, then panics on programming errors
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictSink;

impl DiagnosticSink for StrictSink {
    fn report(&self, diagnostic: Diagnostic) {
        let fatal = diagnostic.is_programming_error();
        let message = diagnostic.to_string();
        LogSink.report(diagnostic);
        if fatal {
            panic!("{message}");
        }
    }
}

/// Forwards every diagnostic over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Diagnostic>,
}

impl ChannelSink {
    /// Create a sink and the receiver observing it
    pub fn new() -> (Self, Receiver<Diagnostic>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl DiagnosticSink for ChannelSink {
    fn report(&self, diagnostic: Diagnostic) {
        // Receiver gone means nobody is listening any more.
        let _ = self.sender.send(diagnostic);
    }
}

/// Build the sink selected by a diagnostics mode
pub fn sink_for(mode: DiagnosticsMode) -> Arc<dyn DiagnosticSink> {
    match mode {
        DiagnosticsMode::Silent => Arc::new(SilentSink),
        DiagnosticsMode::Log => Arc::new(LogSink),
        DiagnosticsMode::Strict => Arc::new(StrictSink),
    }
}
