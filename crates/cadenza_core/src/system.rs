//! Event System - Main Entry Point
//!
//! Owns the registered triggers, the objects and the instance registry,
//! and drives the middleware update once per frame. Triggers are keyed by
//! [`TriggerId`]; the Start and Stop triggers of one middleware event share
//! an [`EventId`] so that Stop finds what Start created.
//!
//! ```text
//! execute()/stop()  ──▶ Event ──▶ AudioObject.pending
//!                                      │
//! update():                            ▼
//!   1. studio.update(CallbackBridge)   instances marked ToBeRemoved
//!   2. object.update() per object      pending ─▶ active, sweep removed
//!   3. destroy instances orphaned by destroy_object()
//! ```
//!
//! Everything runs on the caller's thread. Requests must not be issued
//! while `update` is delivering notifications; the borrow rules enforce it.

use std::collections::HashMap;
use std::sync::Arc;

use cadenza_platform::SpatialAttributes;
use tracing::{debug, info};

use crate::callback::CallbackBridge;
use crate::context::ImplContext;
use crate::diagnostics::Diagnostic;
use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventId, RequestStatus, TriggerId, TriggerInstanceId};
use crate::instance::{EventInstance, InstanceKey, InstanceRegistry};
use crate::object::{AudioObject, ObjectId};

pub struct EventSystem {
    context: ImplContext,
    instances: InstanceRegistry,
    events: HashMap<TriggerId, Arc<Event>>,
    objects: HashMap<ObjectId, AudioObject>,
    orphans: Vec<InstanceKey>,
    next_object_id: u32,
}

impl EventSystem {
    pub fn new(context: ImplContext) -> Self {
        info!(backend = context.studio().name(), "Event system created");
        Self {
            context,
            instances: InstanceRegistry::new(),
            events: HashMap::new(),
            objects: HashMap::new(),
            orphans: Vec::new(),
            next_object_id: 1,
        }
    }

    pub fn context(&self) -> &ImplContext {
        &self.context
    }

    /// Register a logical event under `trigger`, replacing (and
    /// destroying) whatever was registered there before
    pub fn register_event(&mut self, trigger: TriggerId, event: Event) -> Arc<Event> {
        self.remove_event(trigger);
        let event = Arc::new(event);
        self.events.insert(trigger, Arc::clone(&event));
        event
    }

    /// Destroy a registered event and purge its bookkeeping
    ///
    /// Instances it already started keep playing; notifications that need
    /// the event (programmer sounds) become no-ops for them.
    pub fn destroy_event(&mut self, trigger: TriggerId) -> CoreResult<()> {
        if self.remove_event(trigger) {
            Ok(())
        } else {
            Err(CoreError::UnknownTrigger(trigger))
        }
    }

    fn remove_event(&mut self, trigger: TriggerId) -> bool {
        let Some(event) = self.events.remove(&trigger) else {
            return false;
        };
        self.instances.purge_event(event.id());
        debug!(%trigger, event_id = %event.id(), "Event destroyed");
        true
    }

    pub fn event(&self, trigger: TriggerId) -> Option<&Arc<Event>> {
        self.events.get(&trigger)
    }

    pub fn create_object(&mut self, name: impl Into<String>) -> ObjectId {
        let id = ObjectId(self.next_object_id);
        self.next_object_id += 1;
        let capacity = self.context.config().pending_capacity_hint;
        self.objects.insert(id, AudioObject::new(id, name, capacity));
        id
    }

    /// Destroy an object, stopping everything it hosts
    pub fn destroy_object(&mut self, id: ObjectId) -> bool {
        let Some(mut object) = self.objects.remove(&id) else {
            return false;
        };
        let keys = object.release_all(&self.context, &mut self.instances);
        debug!(object = %id, instances = keys.len(), "Object destroyed");
        self.orphans.extend(keys);
        true
    }

    pub fn object(&self, id: ObjectId) -> Option<&AudioObject> {
        self.objects.get(&id)
    }

    pub fn set_object_attributes(
        &mut self,
        id: ObjectId,
        attributes: SpatialAttributes,
    ) -> CoreResult<()> {
        let object = self.objects.get_mut(&id).ok_or(CoreError::UnknownObject(id))?;
        object.set_attributes(&self.context, &mut self.instances, attributes);
        Ok(())
    }

    pub fn set_object_occlusion(&mut self, id: ObjectId, occlusion: f32) -> CoreResult<()> {
        let object = self.objects.get_mut(&id).ok_or(CoreError::UnknownObject(id))?;
        object.set_occlusion(&self.context, &mut self.instances, occlusion);
        Ok(())
    }

    /// Execute a registered trigger on an object
    pub fn execute(
        &mut self,
        trigger: TriggerId,
        object: ObjectId,
        trigger_instance_id: TriggerInstanceId,
    ) -> RequestStatus {
        let Some(event) = self.events.get(&trigger).cloned() else {
            self.context.report(Diagnostic::invalid_argument(
                "execute",
                format!("unknown trigger {trigger}"),
            ));
            return RequestStatus::Failure;
        };

        event.execute(
            &self.context,
            &mut self.instances,
            self.objects.get_mut(&object),
            trigger_instance_id,
        )
    }

    /// Stop every instance of the trigger's logical event on an object
    pub fn stop(&mut self, trigger: TriggerId, object: ObjectId) {
        let Some(event) = self.events.get(&trigger) else {
            self.context.report(Diagnostic::invalid_argument(
                "stop",
                format!("unknown trigger {trigger}"),
            ));
            return;
        };

        event.stop(&self.context, &mut self.instances, self.objects.get_mut(&object));
    }

    /// Advance the middleware, deliver notifications, then sweep objects
    pub fn update(&mut self) -> CoreResult<()> {
        {
            let mut bridge = CallbackBridge::new(&self.context, &mut self.instances);
            self.context
                .studio()
                .update(&mut |notification| bridge.handle(notification))?;
        }

        for object in self.objects.values_mut() {
            object.update(&self.context, &mut self.instances);
        }

        for key in self.orphans.drain(..) {
            self.instances.destroy(&self.context, key);
        }
        Ok(())
    }

    pub fn instance(&self, key: InstanceKey) -> Option<&EventInstance> {
        self.instances.get(key)
    }

    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    /// Number of live event instances across all objects
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}
