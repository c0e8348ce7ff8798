//! Immutable Implementation Context
//!
//! The two middleware system handles, the diagnostics strategy and the
//! configuration, established once at initialization and passed by
//! reference into every operation. Nothing in the core reassigns them.

use std::sync::Arc;

use cadenza_platform::{BackendResult, LowLevelSystem, SimulatedStudio, StudioSystem};

use crate::config::ImplConfig;
use crate::diagnostics::{sink_for, Diagnostic, DiagnosticSink};

#[derive(Clone)]
pub struct ImplContext {
    studio: Arc<dyn StudioSystem>,
    low_level: Arc<dyn LowLevelSystem>,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: ImplConfig,
}

impl ImplContext {
    /// Create a context; the diagnostics sink follows `config.diagnostics`
    pub fn new(
        studio: Arc<dyn StudioSystem>,
        low_level: Arc<dyn LowLevelSystem>,
        config: ImplConfig,
    ) -> Self {
        Self {
            studio,
            low_level,
            diagnostics: sink_for(config.diagnostics),
            config,
        }
    }

    /// Create a context over a simulated backend serving both systems
    pub fn simulated(backend: Arc<SimulatedStudio>, config: ImplConfig) -> Self {
        Self::new(backend.clone(), backend, config)
    }

    /// Replace the diagnostics sink selected from the config
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn studio(&self) -> &dyn StudioSystem {
        self.studio.as_ref()
    }

    pub fn low_level(&self) -> &dyn LowLevelSystem {
        self.low_level.as_ref()
    }

    pub fn config(&self) -> &ImplConfig {
        &self.config
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }

    /// Record a failed native call and continue
    ///
    /// Returns the call's value on success, `None` after reporting a failure.
    pub fn check<T>(&self, operation: &'static str, result: BackendResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(Diagnostic::native_call(operation, &e));
                None
            }
        }
    }
}
