//! Internal Parameter Index Cache
//!
//! Objects drive a few engine-owned parameters on every instance they host.
//! Looking a parameter up by name is a string search on the description,
//! so the resulting index (or its absence) is cached per logical event and
//! purged together with the event.

use std::collections::HashMap;

use cadenza_platform::{DescriptorHandle, ParameterIndex};

use crate::context::ImplContext;
use crate::event::EventId;

/// Parameters the core sets on every instance on behalf of its object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalParameter {
    Occlusion,
    AbsoluteVelocity,
}

impl InternalParameter {
    pub const ALL: [InternalParameter; 2] =
        [InternalParameter::Occlusion, InternalParameter::AbsoluteVelocity];

    /// Parameter name as authored in the middleware project
    pub fn name(&self) -> &'static str {
        match self {
            InternalParameter::Occlusion => "occlusion",
            InternalParameter::AbsoluteVelocity => "absolute_velocity",
        }
    }
}

#[derive(Debug, Default)]
pub struct ParameterIndexCache {
    indexes: HashMap<EventId, HashMap<InternalParameter, Option<ParameterIndex>>>,
}

impl ParameterIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `parameter` on `descriptor`, `None` if it is not declared
    pub fn index(
        &mut self,
        context: &ImplContext,
        event: EventId,
        descriptor: DescriptorHandle,
        parameter: InternalParameter,
    ) -> Option<ParameterIndex> {
        let per_event = self.indexes.entry(event).or_default();
        if let Some(cached) = per_event.get(&parameter) {
            return *cached;
        }

        // A failed lookup is not cached
        let index = context.check(
            "parameter_index",
            context.studio().parameter_index(descriptor, parameter.name()),
        )?;
        per_event.insert(parameter, index);
        index
    }

    /// Drop every entry belonging to `event`
    pub fn purge_event(&mut self, event: EventId) {
        self.indexes.remove(&event);
    }

    pub fn contains_event(&self, event: EventId) -> bool {
        self.indexes.contains_key(&event)
    }
}
