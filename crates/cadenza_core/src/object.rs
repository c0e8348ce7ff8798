//! Audio Objects
//!
//! An object is an emitter in the world. It owns the keys of every event
//! instance it hosts, split into *pending* (created this frame, not yet
//! started) and *active* (started), and the spatial state applied to them.
//! Its `update` is the sweep that promotes pending instances and destroys
//! the ones marked for removal.

use std::fmt;

use cadenza_platform::{DescriptorHandle, InstanceHandle, SpatialAttributes, StopMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::ImplContext;
use crate::diagnostics::Diagnostic;
use crate::event::{EventId, TriggerInstanceId};
use crate::instance::{EventInstance, InstanceKey, InstanceRegistry, InstanceState};
use crate::parameters::InternalParameter;

/// Identity of an audio object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct AudioObject {
    id: ObjectId,
    name: String,
    attributes: SpatialAttributes,
    occlusion: f32,
    absolute_velocity: f32,
    pending: Vec<InstanceKey>,
    active: Vec<InstanceKey>,
}

impl AudioObject {
    pub fn new(id: ObjectId, name: impl Into<String>, capacity_hint: usize) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: SpatialAttributes::default(),
            occlusion: 0.0,
            absolute_velocity: 0.0,
            pending: Vec::with_capacity(capacity_hint),
            active: Vec::with_capacity(capacity_hint),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes applied to every new instance
    pub fn attributes(&self) -> &SpatialAttributes {
        &self.attributes
    }

    pub fn pending_instances(&self) -> &[InstanceKey] {
        &self.pending
    }

    pub fn active_instances(&self) -> &[InstanceKey] {
        &self.active
    }

    pub fn occlusion(&self) -> f32 {
        self.occlusion
    }

    pub fn absolute_velocity(&self) -> f32 {
        self.absolute_velocity
    }

    pub fn internal_parameter(&self, parameter: InternalParameter) -> f32 {
        match parameter {
            InternalParameter::Occlusion => self.occlusion,
            InternalParameter::AbsoluteVelocity => self.absolute_velocity,
        }
    }

    /// Pending then active keys
    pub fn instance_keys(&self) -> impl Iterator<Item = InstanceKey> + '_ {
        self.pending.iter().chain(self.active.iter()).copied()
    }

    /// Register a freshly started instance
    ///
    /// Returns `false` and reports a diagnostic if the key is already pending.
    pub fn add_pending(
        &mut self,
        context: &ImplContext,
        key: InstanceKey,
        trigger_instance_id: TriggerInstanceId,
    ) -> bool {
        if self.pending.contains(&key) {
            context.report(Diagnostic::DuplicatePending {
                trigger: trigger_instance_id.0,
            });
            return false;
        }
        self.pending.push(key);
        true
    }

    /// Move the object; live instances follow
    pub fn set_attributes(
        &mut self,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        attributes: SpatialAttributes,
    ) {
        self.attributes = attributes;
        self.absolute_velocity = attributes.velocity.length();

        for key in self.instance_keys() {
            if let Some(native) = instances.get(key).and_then(EventInstance::native) {
                context.check(
                    "set_3d_attributes",
                    context.studio().set_3d_attributes(native, &self.attributes),
                );
            }
        }
        self.apply_internal_parameter(context, instances, InternalParameter::AbsoluteVelocity);
    }

    /// Set occlusion in `0.0..=1.0`; live instances follow
    pub fn set_occlusion(
        &mut self,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        occlusion: f32,
    ) {
        self.occlusion = occlusion.clamp(0.0, 1.0);
        self.apply_internal_parameter(context, instances, InternalParameter::Occlusion);
    }

    fn apply_internal_parameter(
        &self,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        parameter: InternalParameter,
    ) {
        let value = self.internal_parameter(parameter);
        let targets: Vec<(EventId, DescriptorHandle, InstanceHandle)> = self
            .instance_keys()
            .filter_map(|key| {
                let instance = instances.get(key)?;
                let native = instance.native()?;
                let descriptor = instance.event()?.descriptor().cached()?;
                Some((instance.event_id(), descriptor, native))
            })
            .collect();

        for (event, descriptor, native) in targets {
            if let Some(index) = instances
                .parameters_mut()
                .index(context, event, descriptor, parameter)
            {
                context.check(
                    "set_parameter_by_index",
                    context.studio().set_parameter_by_index(native, index, value),
                );
            }
        }
    }

    /// Stop every instance of `event` hosted by this object
    ///
    /// Pending instances were never started and are marked for removal
    /// right away. Active ones get a native stop; the resulting `Stopped`
    /// notification marks them.
    pub fn stop_instances_by_event(
        &mut self,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
        event: EventId,
    ) {
        let mode = context.config().stop_mode;

        for key in &self.pending {
            if let Some(instance) = instances.get_mut(*key) {
                if instance.event_id() == event {
                    instance.set_to_be_removed();
                }
            }
        }

        for key in &self.active {
            let Some(instance) = instances.get(*key) else {
                continue;
            };
            if instance.event_id() != event || instance.is_to_be_removed() {
                continue;
            }
            if let Some(native) = instance.native() {
                context.check("stop", context.studio().stop(native, mode));
            }
        }
    }

    /// Start pending instances and destroy the ones marked for removal
    ///
    /// Returns the number of instances destroyed.
    pub fn update(&mut self, context: &ImplContext, instances: &mut InstanceRegistry) -> usize {
        for key in self.pending.drain(..) {
            let Some(instance) = instances.get_mut(key) else {
                continue;
            };
            if !instance.is_to_be_removed() {
                match instance.native() {
                    Some(native)
                        if context.check("start", context.studio().start(native)).is_some() =>
                    {
                        instance.mark_active();
                    }
                    _ => instance.set_to_be_removed(),
                }
            }
            self.active.push(key);
        }

        let finished: Vec<InstanceKey> = self
            .active
            .iter()
            .copied()
            .filter(|key| instances.get(*key).map_or(true, EventInstance::is_to_be_removed))
            .collect();
        if finished.is_empty() {
            return 0;
        }

        self.active.retain(|key| !finished.contains(key));
        for key in &finished {
            instances.destroy(context, *key);
        }
        debug!(object = %self.id, removed = finished.len(), "Swept finished instances");
        finished.len()
    }

    /// Stop and hand back every hosted instance, for object destruction
    ///
    /// The returned keys are marked for removal; the caller destroys them
    /// after the next middleware update so pending notifications still
    /// resolve.
    pub fn release_all(
        &mut self,
        context: &ImplContext,
        instances: &mut InstanceRegistry,
    ) -> Vec<InstanceKey> {
        let keys: Vec<InstanceKey> = self.pending.drain(..).chain(self.active.drain(..)).collect();

        for key in &keys {
            let Some(instance) = instances.get_mut(*key) else {
                continue;
            };
            if let (Some(native), InstanceState::Active) = (instance.native(), instance.state()) {
                context.check("stop", context.studio().stop(native, StopMode::Immediate));
            }
            instance.set_to_be_removed();
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImplConfig;
    use crate::diagnostics::ChannelSink;
    use crate::event::{ActionType, Event, RequestStatus};
    use cadenza_platform::{Guid, PlaybackState, SimulatedEvent, SimulatedStudio, StudioSystem, Vector3};
    use std::sync::Arc;

    const GUID: Guid = Guid::from_u128(0xd00d);

    struct Fixture {
        studio: Arc<SimulatedStudio>,
        context: ImplContext,
        instances: InstanceRegistry,
        object: AudioObject,
        start: Arc<Event>,
    }

    fn fixture(event: SimulatedEvent) -> Fixture {
        let studio = Arc::new(SimulatedStudio::new());
        studio.load_event(GUID, event);
        Fixture {
            context: ImplContext::simulated(studio.clone(), ImplConfig::shipping()),
            studio,
            instances: InstanceRegistry::new(),
            object: AudioObject::new(ObjectId(1), "player", 4),
            start: Arc::new(Event::new(EventId(3), "footstep", GUID, ActionType::Start)),
        }
    }

    fn start(f: &mut Fixture, trigger: u32) -> InstanceKey {
        let status = f.start.execute(
            &f.context,
            &mut f.instances,
            Some(&mut f.object),
            TriggerInstanceId(trigger),
        );
        assert_eq!(status, RequestStatus::Success);
        *f.object.pending_instances().last().unwrap()
    }

    #[test]
    fn test_duplicate_pending_rejected() {
        let (sink, receiver) = ChannelSink::new();
        let studio = Arc::new(SimulatedStudio::new());
        let context = ImplContext::simulated(studio, ImplConfig::default())
            .with_diagnostics(Arc::new(sink));
        let mut object = AudioObject::new(ObjectId(1), "player", 4);
        let key = InstanceKey::from_bits(9);

        assert!(object.add_pending(&context, key, TriggerInstanceId(1)));
        assert!(!object.add_pending(&context, key, TriggerInstanceId(1)));
        assert_eq!(object.pending_instances(), &[key]);
        assert_eq!(
            receiver.try_recv().unwrap(),
            Diagnostic::DuplicatePending { trigger: 1 }
        );
    }

    #[test]
    fn test_update_promotes_pending() {
        let mut f = fixture(SimulatedEvent::new());
        let key = start(&mut f, 1);

        assert_eq!(f.object.update(&f.context, &mut f.instances), 0);
        assert!(f.object.pending_instances().is_empty());
        assert_eq!(f.object.active_instances(), &[key]);

        let instance = f.instances.get(key).unwrap();
        assert_eq!(instance.state(), InstanceState::Active);
        assert_eq!(
            f.studio.playback_state(instance.native().unwrap()),
            Some(PlaybackState::Playing)
        );
    }

    #[test]
    fn test_update_sweeps_marked_instances() {
        let mut f = fixture(SimulatedEvent::new());
        let key = start(&mut f, 1);
        f.object.update(&f.context, &mut f.instances);
        let native = f.instances.get(key).unwrap().native().unwrap();

        f.instances.get_mut(key).unwrap().set_to_be_removed();
        assert_eq!(f.object.update(&f.context, &mut f.instances), 1);
        assert!(f.object.active_instances().is_empty());
        assert!(f.instances.get(key).is_none());
        assert!(f.studio.user_data(native).map_or(true, |d| d.is_none()));
    }

    #[test]
    fn test_stop_pending_marks_immediately() {
        let mut f = fixture(SimulatedEvent::new());
        let key = start(&mut f, 1);

        f.object
            .stop_instances_by_event(&f.context, &mut f.instances, EventId(3));
        assert!(f.instances.get(key).unwrap().is_to_be_removed());

        assert_eq!(f.object.update(&f.context, &mut f.instances), 1);
        assert!(f.instances.is_empty());
    }

    #[test]
    fn test_stop_active_requests_native_stop() {
        let mut f = fixture(SimulatedEvent::new());
        let key = start(&mut f, 1);
        let other = Arc::new(Event::new(EventId(4), "other", GUID, ActionType::Start));
        other.execute(&f.context, &mut f.instances, Some(&mut f.object), TriggerInstanceId(2));
        f.object.update(&f.context, &mut f.instances);

        f.object
            .stop_instances_by_event(&f.context, &mut f.instances, EventId(3));
        let native = f.instances.get(key).unwrap().native().unwrap();
        assert_eq!(f.studio.playback_state(native), Some(PlaybackState::Stopped));
        assert_eq!(f.object.active_instances().len(), 2);
    }

    #[test]
    fn test_failed_native_start_marks_instance() {
        let mut f = fixture(SimulatedEvent::new());
        let key = start(&mut f, 1);
        f.studio.fail_next("start", 1);

        f.object.update(&f.context, &mut f.instances);
        assert!(f.instances.get(key).unwrap().is_to_be_removed());
    }

    #[test]
    fn test_attributes_follow_object() {
        let mut f = fixture(SimulatedEvent::new().with_parameter("absolute_velocity"));
        let key = start(&mut f, 1);
        let native = f.instances.get(key).unwrap().native().unwrap();

        let attributes = SpatialAttributes {
            position: Vector3::new(1.0, 2.0, 3.0),
            velocity: Vector3::new(3.0, 0.0, 4.0),
            ..SpatialAttributes::default()
        };
        f.object.set_attributes(&f.context, &mut f.instances, attributes);

        assert_eq!(f.studio.attributes(native), Some(attributes));
        assert_eq!(f.object.absolute_velocity(), 5.0);
        assert_eq!(f.studio.parameter_value(native, "absolute_velocity"), Some(5.0));
    }

    #[test]
    fn test_occlusion_clamped_and_applied() {
        let mut f = fixture(SimulatedEvent::new().with_parameter("occlusion"));
        let key = start(&mut f, 1);
        let native = f.instances.get(key).unwrap().native().unwrap();

        f.object.set_occlusion(&f.context, &mut f.instances, 1.5);
        assert_eq!(f.object.occlusion(), 1.0);
        assert_eq!(f.studio.parameter_value(native, "occlusion"), Some(1.0));
    }

    #[test]
    fn test_release_all_hands_back_keys() {
        let mut f = fixture(SimulatedEvent::new());
        let first = start(&mut f, 1);
        f.object.update(&f.context, &mut f.instances);
        let second = start(&mut f, 2);

        let keys = f.object.release_all(&f.context, &mut f.instances);
        assert_eq!(keys, vec![second, first]);
        assert!(f.object.instance_keys().next().is_none());
        assert!(keys
            .iter()
            .all(|key| f.instances.get(*key).unwrap().is_to_be_removed()));
    }
}
