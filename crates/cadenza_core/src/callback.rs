//! Callback Bridge
//!
//! The single handler the middleware calls from inside its update. Resolves
//! the native instance to its [`EventInstance`] through the key stored as
//! user data and forwards the notification:
//!
//! ```text
//! StartFailed / Stopped        ──▶ instance.set_to_be_removed()
//! CreateProgrammerSound        ──▶ ProgrammerSoundProvider::create ──▶ out params
//! DestroyProgrammerSound       ──▶ ProgrammerSoundProvider::release
//! ```
//!
//! The bridge only borrows the instance registry. It cannot reach objects
//! or events mutably, so it cannot start or stop anything re-entrantly.

use cadenza_platform::{InstanceHandle, Notification, ProgrammerSoundProperties};
use tracing::{debug, trace};

use crate::context::ImplContext;
use crate::diagnostics::Diagnostic;
use crate::instance::{InstanceKey, InstanceRegistry};
use crate::programmer_sound::ProgrammerSoundProvider;

pub struct CallbackBridge<'a> {
    context: &'a ImplContext,
    instances: &'a mut InstanceRegistry,
}

impl<'a> CallbackBridge<'a> {
    pub fn new(context: &'a ImplContext, instances: &'a mut InstanceRegistry) -> Self {
        Self { context, instances }
    }

    /// Handle one notification
    pub fn handle(&mut self, notification: Notification<'_>) {
        match notification {
            Notification::StartFailed(native) | Notification::Stopped(native) => {
                self.on_lifecycle(native)
            }
            Notification::CreateProgrammerSound(native, properties) => {
                self.on_create_programmer_sound(native, properties)
            }
            Notification::DestroyProgrammerSound(native, properties) => {
                self.on_destroy_programmer_sound(native, properties)
            }
        }
    }

    /// Key of the live instance owning `native`, if any
    fn lookup(&self, native: InstanceHandle) -> Option<InstanceKey> {
        let bits = self
            .context
            .check("user_data", self.context.studio().user_data(native))
            .flatten()?;
        let key = InstanceKey::from_bits(bits);
        self.instances
            .get(key)
            .filter(|instance| instance.native() == Some(native))
            .map(|_| key)
    }

    fn on_lifecycle(&mut self, native: InstanceHandle) {
        let Some(instance) = self.lookup(native).and_then(|key| self.instances.get_mut(key)) else {
            trace!(%native, "Lifecycle notification without context");
            return;
        };

        instance.set_to_be_removed();
        debug!(
            event_id = %instance.event_id(),
            trigger = %instance.trigger_instance_id(),
            "Event instance marked for removal"
        );
    }

    fn on_create_programmer_sound(
        &mut self,
        native: InstanceHandle,
        properties: &mut ProgrammerSoundProperties,
    ) {
        let Some(event) = self
            .lookup(native)
            .and_then(|key| self.instances.get(key))
            .and_then(|instance| instance.event())
        else {
            trace!(%native, "Programmer sound requested without context");
            return;
        };

        if let Some(created) = ProgrammerSoundProvider::new(self.context).create(event.key()) {
            properties.sound = Some(created.sound);
            properties.subsound_index = created.subsound_index;
        }
    }

    /// Release the sound attached to `native`
    ///
    /// Needs both the instance and its event. A sound created before its
    /// event was destroyed is not released here and stays with the middleware.
    fn on_destroy_programmer_sound(
        &mut self,
        native: InstanceHandle,
        properties: &ProgrammerSoundProperties,
    ) {
        let valid = self
            .lookup(native)
            .and_then(|key| self.instances.get(key))
            .and_then(|instance| instance.event())
            .is_some();
        if !valid {
            trace!(%native, sound = ?properties.sound, "Programmer sound left unreleased");
            return;
        }

        match properties.sound {
            Some(sound) => {
                ProgrammerSoundProvider::new(self.context).release(sound);
            }
            None => self.context.report(Diagnostic::invalid_argument(
                "destroy_programmer_sound",
                format!("no sound attached to {native}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImplConfig;
    use crate::event::{ActionType, Event, EventId, TriggerInstanceId};
    use crate::instance::EventInstance;
    use crate::object::ObjectId;
    use cadenza_platform::{
        CreateSoundExInfo, Guid, SimulatedEvent, SimulatedStudio, SoundInfo, SoundMode,
        SoundSource, StudioSystem,
    };
    use std::sync::Arc;

    struct Fixture {
        studio: Arc<SimulatedStudio>,
        context: ImplContext,
        registry: InstanceRegistry,
        event: Arc<Event>,
    }

    fn fixture() -> Fixture {
        let studio = Arc::new(SimulatedStudio::new());
        studio.load_event(Guid::from_u128(5), SimulatedEvent::new());
        studio.register_sound(
            "vo_line",
            SoundInfo {
                source: SoundSource::Path("vo.bank".into()),
                mode: SoundMode::DEFAULT,
                exinfo: CreateSoundExInfo::default(),
                subsound_index: 1,
            },
        );
        let context = ImplContext::simulated(studio.clone(), ImplConfig::shipping());
        let event = Arc::new(
            Event::new(EventId(5), "vo_line", Guid::from_u128(5), ActionType::Start)
                .with_programmer_sound(),
        );
        Fixture {
            studio,
            context,
            registry: InstanceRegistry::new(),
            event,
        }
    }

    fn attach(f: &mut Fixture) -> (InstanceKey, InstanceHandle) {
        let descriptor = f.studio.event_by_guid(&Guid::from_u128(5)).unwrap();
        let native = f.studio.create_instance(descriptor).unwrap();
        let mut instance = EventInstance::new(TriggerInstanceId(1), &f.event, ObjectId(1));
        instance.assign_native(native);
        let key = f.registry.insert(instance);
        f.studio.set_user_data(native, Some(key.to_bits())).unwrap();
        (key, native)
    }

    #[test]
    fn test_stopped_marks_instance() {
        let mut f = fixture();
        let (key, native) = attach(&mut f);

        CallbackBridge::new(&f.context, &mut f.registry).handle(Notification::Stopped(native));
        assert!(f.registry.get(key).unwrap().is_to_be_removed());
    }

    #[test]
    fn test_start_failed_marks_instance() {
        let mut f = fixture();
        let (key, native) = attach(&mut f);

        CallbackBridge::new(&f.context, &mut f.registry).handle(Notification::StartFailed(native));
        assert!(f.registry.get(key).unwrap().is_to_be_removed());
    }

    #[test]
    fn test_cleared_context_is_noop() {
        let mut f = fixture();
        let (key, native) = attach(&mut f);
        f.studio.set_user_data(native, None).unwrap();

        CallbackBridge::new(&f.context, &mut f.registry).handle(Notification::Stopped(native));
        assert!(!f.registry.get(key).unwrap().is_to_be_removed());
    }

    #[test]
    fn test_stale_key_is_noop() {
        let mut f = fixture();
        let (key, native) = attach(&mut f);
        f.registry.remove(key);

        CallbackBridge::new(&f.context, &mut f.registry).handle(Notification::Stopped(native));
        assert!(f.registry.is_empty());
    }

    #[test]
    fn test_programmer_sound_create_then_destroy() {
        let mut f = fixture();
        let (_, native) = attach(&mut f);
        let mut properties = ProgrammerSoundProperties::default();

        let mut bridge = CallbackBridge::new(&f.context, &mut f.registry);
        bridge.handle(Notification::CreateProgrammerSound(native, &mut properties));
        assert!(properties.sound.is_some());
        assert_eq!(properties.subsound_index, 1);
        assert_eq!(f.studio.live_sounds(), 1);

        bridge.handle(Notification::DestroyProgrammerSound(native, &properties));
        assert_eq!(f.studio.live_sounds(), 0);
    }

    #[test]
    fn test_programmer_sound_without_event_is_noop() {
        let mut f = fixture();
        let (_, native) = attach(&mut f);
        let event = std::mem::replace(
            &mut f.event,
            Arc::new(Event::new(EventId(6), "x", Guid::from_u128(6), ActionType::Start)),
        );
        drop(event);

        let mut properties = ProgrammerSoundProperties::default();
        CallbackBridge::new(&f.context, &mut f.registry)
            .handle(Notification::CreateProgrammerSound(native, &mut properties));
        assert!(properties.sound.is_none());
        assert_eq!(f.studio.live_sounds(), 0);
    }

    #[test]
    fn test_sound_outlives_destroyed_event() {
        let mut f = fixture();
        let (_, native) = attach(&mut f);
        let mut properties = ProgrammerSoundProperties::default();
        CallbackBridge::new(&f.context, &mut f.registry)
            .handle(Notification::CreateProgrammerSound(native, &mut properties));
        assert_eq!(f.studio.live_sounds(), 1);

        let event = std::mem::replace(
            &mut f.event,
            Arc::new(Event::new(EventId(6), "x", Guid::from_u128(6), ActionType::Start)),
        );
        drop(event);

        CallbackBridge::new(&f.context, &mut f.registry)
            .handle(Notification::DestroyProgrammerSound(native, &properties));
        assert!(properties.sound.is_some());
        assert_eq!(f.studio.live_sounds(), 1);
    }
}
