//! Event Instance Management
//!
//! One [`EventInstance`] exists per triggered Start. All instances live in
//! an [`InstanceRegistry`], a generational arena; objects and the native
//! middleware refer to them only through [`InstanceKey`]s. The key is what
//! gets attached to the native instance as user data, so a notification
//! arriving after teardown finds either no user data or a stale key.

use std::sync::{Arc, Weak};

use cadenza_platform::InstanceHandle;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::context::ImplContext;
use crate::event::{Event, EventId, TriggerInstanceId};
use crate::object::ObjectId;
use crate::parameters::ParameterIndexCache;

/// Arena key of an event instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    index: u32,
    generation: u32,
}

impl InstanceKey {
    /// Pack into the native user-data word
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// Lifecycle state of an event instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    /// Created and configured, waiting for the owning object's next update
    Pending,
    /// Started by the owning object
    Active,
    /// Finished, failed or stopped; swept on the next object update
    ToBeRemoved,
}

/// One concrete occurrence of a logical event's Start action
#[derive(Debug)]
pub struct EventInstance {
    trigger_instance_id: TriggerInstanceId,
    event_id: EventId,
    event: Weak<Event>,
    object: ObjectId,
    native: Option<InstanceHandle>,
    state: InstanceState,
}

impl EventInstance {
    pub fn new(
        trigger_instance_id: TriggerInstanceId,
        event: &Arc<Event>,
        object: ObjectId,
    ) -> Self {
        Self {
            trigger_instance_id,
            event_id: event.id(),
            event: Arc::downgrade(event),
            object,
            native: None,
            state: InstanceState::Pending,
        }
    }

    pub fn trigger_instance_id(&self) -> TriggerInstanceId {
        self.trigger_instance_id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// The logical event, if it has not been destroyed
    pub fn event(&self) -> Option<Arc<Event>> {
        self.event.upgrade()
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn native(&self) -> Option<InstanceHandle> {
        self.native
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn is_to_be_removed(&self) -> bool {
        self.state == InstanceState::ToBeRemoved
    }

    /// Take ownership of the native handle
    ///
    /// Returns `false` (and keeps the existing handle) if one is already
    /// assigned.
    pub fn assign_native(&mut self, native: InstanceHandle) -> bool {
        if self.native.is_some() {
            return false;
        }
        self.native = Some(native);
        true
    }

    /// Pending -> Active
    pub fn mark_active(&mut self) -> bool {
        if self.state != InstanceState::Pending {
            return false;
        }
        self.state = InstanceState::Active;
        true
    }

    /// Terminal
    pub fn set_to_be_removed(&mut self) {
        self.state = InstanceState::ToBeRemoved;
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    instance: Option<EventInstance>,
}

/// Generational arena owning every event instance
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    parameters: ParameterIndexCache,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: EventInstance) -> InstanceKey {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.instance = Some(instance);
            return InstanceKey {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            instance: Some(instance),
        });
        InstanceKey {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, key: InstanceKey) -> Option<&EventInstance> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.instance.as_ref())
    }

    pub fn get_mut(&mut self, key: InstanceKey) -> Option<&mut EventInstance> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.instance.as_mut())
    }

    /// Remove an instance; its key is never valid again
    pub fn remove(&mut self, key: InstanceKey) -> Option<EventInstance> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        let instance = slot.instance.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Some(instance)
    }

    /// Remove an instance and tear down its native counterpart
    ///
    /// User data is cleared before the native release so that late
    /// notifications for the native instance resolve to nothing.
    pub fn destroy(&mut self, context: &ImplContext, key: InstanceKey) -> Option<EventInstance> {
        let instance = self.remove(key)?;
        if let Some(native) = instance.native() {
            context.check("set_user_data", context.studio().set_user_data(native, None));
            context.check("release", context.studio().release(native));
        }
        trace!(
            event_id = %instance.event_id(),
            trigger = %instance.trigger_instance_id(),
            "Event instance destroyed"
        );
        Some(instance)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceKey, &EventInstance)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.instance.as_ref().map(|instance| {
                (
                    InstanceKey {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    instance,
                )
            })
        })
    }

    pub fn parameters(&self) -> &ParameterIndexCache {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterIndexCache {
        &mut self.parameters
    }

    /// Drop the auxiliary bookkeeping kept for a destroyed logical event
    pub fn purge_event(&mut self, event: EventId) {
        self.parameters.purge_event(event);
    }
}
