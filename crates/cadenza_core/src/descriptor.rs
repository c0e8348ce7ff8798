//! Event Descriptor Cache
//!
//! Lazily resolves a logical event's guid into the middleware's reusable
//! description handle. A successful lookup is memoized for the lifetime of
//! the logical event; a failed lookup leaves the cache empty so the next
//! request retries (banks may simply not be loaded yet).

use std::sync::OnceLock;

use cadenza_platform::{DescriptorHandle, Guid};
use tracing::debug;

use crate::context::ImplContext;
use crate::diagnostics::Diagnostic;

#[derive(Debug)]
pub struct DescriptorCache {
    guid: Guid,
    resolved: OnceLock<DescriptorHandle>,
}

impl DescriptorCache {
    pub fn new(guid: Guid) -> Self {
        Self {
            guid,
            resolved: OnceLock::new(),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// The cached handle, without attempting resolution
    pub fn cached(&self) -> Option<DescriptorHandle> {
        self.resolved.get().copied()
    }

    /// Return the cached handle, resolving it first if necessary
    pub fn resolve(&self, context: &ImplContext) -> Option<DescriptorHandle> {
        if let Some(handle) = self.resolved.get() {
            return Some(*handle);
        }

        match context.studio().event_by_guid(&self.guid) {
            Ok(handle) => {
                let handle = *self.resolved.get_or_init(|| handle);
                debug!(guid = %self.guid, %handle, "Event descriptor resolved");
                Some(handle)
            }
            Err(e) if e.is_not_found() => {
                context.report(Diagnostic::NotFound {
                    guid: self.guid.to_string(),
                });
                None
            }
            Err(e) => {
                context.report(Diagnostic::native_call("event_by_guid", &e));
                None
            }
        }
    }
}
