//! Logical Events and Request Execution
//!
//! An [`Event`] is the configuration-time description of one triggerable
//! action (Start, Stop, Pause or Resume) bound to a middleware event by
//! guid. Executing it against an [`AudioObject`] turns the request into
//! live instances (Start) or acts on the ones already playing.

use std::fmt;
use std::sync::Arc;

use cadenza_platform::{CallbackMask, DescriptorHandle, Guid, InstanceHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::ImplContext;
use crate::descriptor::DescriptorCache;
use crate::diagnostics::Diagnostic;
use crate::instance::{EventInstance, InstanceRegistry};
use crate::object::AudioObject;
use crate::parameters::InternalParameter;

/// Identity of a logical event
///
/// Shared by the Start, Stop, Pause and Resume triggers of one middleware
/// event; Stop matches instances by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u32);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration key of one [`Event`], unique per action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the trigger execution that caused a Start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerInstanceId(pub u32);

impl fmt::Display for TriggerInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What executing a logical event does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Outcome of [`Event::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// An instance was created and is owned by the object
    Success,
    /// Done; nothing for the caller to track
    SuccessDoNotTrack,
    Failure,
}

/// A logical event and the executor of its action
#[derive(Debug)]
pub struct Event {
    id: EventId,
    key: String,
    action: ActionType,
    has_programmer_sound: bool,
    descriptor: DescriptorCache,
}

impl Event {
    /// `key` names the event for programmer-sound table lookups
    pub fn new(id: EventId, key: impl Into<String>, guid: Guid, action: ActionType) -> Self {
        Self {
            id,
            key: key.into(),
            action,
            has_programmer_sound: false,
            descriptor: DescriptorCache::new(guid),
        }
    }

    pub fn with_programmer_sound(mut self) -> Self {
        self.has_programmer_sound = true;
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn guid(&self) -> Guid {
        self.descriptor.guid()
    }

    pub fn action(&self) -> ActionType {
        self.action
    }

    pub fn has_programmer_sound(&self) -> bool {
        self.has_programmer_sound
    }

    pub fn descriptor(&self) -> &DescriptorCache {
        &self.descriptor
    }

    /// Notification kinds the bridge is registered for on new instances
    pub fn callback_mask(&self) -> CallbackMask {
        if self.has_programmer_sound {
            CallbackMask::ALL
        } else {
            CallbackMask::LIFECYCLE
        }
    }

    /// Execute this event's action on `object`
    ///
    /// `None` stands for an invalid object and fails the request.
    pub fn execute(
        self: &Arc<Self>,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        object: Option<&mut AudioObject>,
        trigger_instance_id: TriggerInstanceId,
    ) -> RequestStatus {
        let Some(object) = object else {
            context.report(Diagnostic::invalid_argument(
                "execute",
                format!("invalid object passed to event {}", self.id),
            ));
            return RequestStatus::Failure;
        };

        match self.action {
            ActionType::Start => self.start(context, instances, object, trigger_instance_id),
            ActionType::Stop => {
                object.stop_instances_by_event(context, instances, self.id);
                RequestStatus::SuccessDoNotTrack
            }
            ActionType::Pause => self.set_paused(context, true),
            ActionType::Resume => self.set_paused(context, false),
        }
    }

    /// Unconditionally stop every instance of this event on `object`
    pub fn stop(
        &self,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        object: Option<&mut AudioObject>,
    ) {
        match object {
            Some(object) => object.stop_instances_by_event(context, instances, self.id),
            None => context.report(Diagnostic::invalid_argument(
                "stop",
                format!("invalid object passed to event {}", self.id),
            )),
        }
    }

    fn start(
        self: &Arc<Self>,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        object: &mut AudioObject,
        trigger_instance_id: TriggerInstanceId,
    ) -> RequestStatus {
        let mut instance = EventInstance::new(trigger_instance_id, self, object.id());

        let Some(descriptor) = self.descriptor.resolve(context) else {
            return RequestStatus::Failure;
        };
        let Some(native) = context.check(
            "create_instance",
            context.studio().create_instance(descriptor),
        ) else {
            return RequestStatus::Failure;
        };

        instance.assign_native(native);
        self.set_internal_parameters(context, instances, descriptor, native, object);

        let key = instances.insert(instance);
        let studio = context.studio();
        context.check("set_callback", studio.set_callback(native, self.callback_mask()));
        context.check("set_user_data", studio.set_user_data(native, Some(key.to_bits())));
        context.check(
            "set_3d_attributes",
            studio.set_3d_attributes(native, object.attributes()),
        );

        if !object.add_pending(context, key, trigger_instance_id) {
            instances.destroy(context, key);
            return RequestStatus::Failure;
        }

        debug!(
            event_id = %self.id,
            trigger = %trigger_instance_id,
            object = %object.id(),
            %native,
            "Event instance pending"
        );
        RequestStatus::Success
    }

    fn set_internal_parameters(
        &self,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        descriptor: DescriptorHandle,
        native: InstanceHandle,
        object: &AudioObject,
    ) {
        for parameter in InternalParameter::ALL {
            let Some(index) =
                instances
                    .parameters_mut()
                    .index(context, self.id, descriptor, parameter)
            else {
                continue;
            };
            context.check(
                "set_parameter_by_index",
                context.studio().set_parameter_by_index(
                    native,
                    index,
                    object.internal_parameter(parameter),
                ),
            );
        }
    }

    /// Pause or resume every live native instance of this event's description
    ///
    /// Enumeration is bounded by `instance_list_capacity`; instances beyond
    /// it are left untouched after reporting the overflow.
    fn set_paused(&self, context: &ImplContext, should_pause: bool) -> RequestStatus {
        let Some(descriptor) = self.descriptor.resolve(context) else {
            return RequestStatus::Failure;
        };

        let studio = context.studio();
        let capacity = context.config().instance_list_capacity;
        if let Some(count) = context.check("instance_count", studio.instance_count(descriptor)) {
            if count > capacity {
                context.report(Diagnostic::CapacityExceeded { count, capacity });
            }
        }

        let natives = context
            .check("instance_list", studio.instance_list(descriptor, capacity))
            .unwrap_or_default();
        let mut changed = 0;
        for native in natives.iter().take(capacity) {
            if context
                .check("set_paused", studio.set_paused(*native, should_pause))
                .is_some()
            {
                changed += 1;
            }
        }

        info!(
            event_id = %self.id,
            paused = should_pause,
            instances = changed,
            "Event instances {}",
            if should_pause { "paused" } else { "resumed" }
        );
        RequestStatus::SuccessDoNotTrack
    }
}
