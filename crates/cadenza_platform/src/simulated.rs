//! Simulated Middleware Backend
//!
//! A fully in-memory implementation of [`StudioSystem`] and
//! [`LowLevelSystem`]. Banks are "loaded" by registering event
//! descriptions, instances play until [`SimulatedStudio::finish`] or a stop
//! request, and notifications are queued and delivered from `update()`
//! exactly like a real middleware update would.
//!
//! Used as the default backend for the host binary and as the test double
//! for the lifecycle core.

use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{BackendError, BackendResult};
use crate::traits::{LowLevelSystem, StudioSystem};
use crate::types::{
    CallbackMask, CreateSoundExInfo, DescriptorHandle, Guid, InstanceHandle, Notification,
    ParameterIndex, ProgrammerSoundProperties, SoundHandle, SoundInfo, SoundMode, SoundSource,
    SpatialAttributes, StopMode,
};

/// Authoring-side description of a simulated event
#[derive(Debug, Clone, Default)]
pub struct SimulatedEvent {
    /// Declared parameter names, index = position
    pub parameters: Vec<String>,
    /// Requests a programmer sound when it starts
    pub programmer_sound: bool,
    /// Every start attempt reports `StartFailed`
    pub fails_to_start: bool,
}

impl SimulatedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(name.into());
        self
    }

    pub fn with_programmer_sound(mut self) -> Self {
        self.programmer_sound = true;
        self
    }

    pub fn failing_to_start(mut self) -> Self {
        self.fails_to_start = true;
        self
    }
}

/// Playback state of a simulated instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Created,
    Playing,
    Stopped,
}

#[derive(Debug)]
struct SimInstance {
    descriptor: DescriptorHandle,
    state: PlaybackState,
    paused: bool,
    released: bool,
    attributes: SpatialAttributes,
    mask: CallbackMask,
    user_data: Option<u64>,
    parameters: HashMap<ParameterIndex, f32>,
    programmer_sound: Option<ProgrammerSoundProperties>,
}

#[derive(Debug)]
enum Queued {
    StartFailed(InstanceHandle),
    Stopped(InstanceHandle),
    CreateProgrammerSound(InstanceHandle),
    DestroyProgrammerSound(InstanceHandle, ProgrammerSoundProperties),
}

impl Queued {
    fn instance(&self) -> InstanceHandle {
        match self {
            Queued::StartFailed(h)
            | Queued::Stopped(h)
            | Queued::CreateProgrammerSound(h)
            | Queued::DestroyProgrammerSound(h, _) => *h,
        }
    }

    fn kind(&self) -> CallbackMask {
        match self {
            Queued::StartFailed(_) => CallbackMask::START_FAILED,
            Queued::Stopped(_) => CallbackMask::STOPPED,
            Queued::CreateProgrammerSound(_) => CallbackMask::CREATE_PROGRAMMER_SOUND,
            Queued::DestroyProgrammerSound(..) => CallbackMask::DESTROY_PROGRAMMER_SOUND,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    next_handle: u64,
    guids: HashMap<Guid, DescriptorHandle>,
    descriptors: HashMap<DescriptorHandle, SimulatedEvent>,
    instances: BTreeMap<InstanceHandle, SimInstance>,
    sounds: HashMap<SoundHandle, (SoundSource, SoundMode)>,
    sound_table: HashMap<String, SoundInfo>,
    queue: VecDeque<Queued>,
    injected_failures: HashMap<&'static str, usize>,
    guid_lookups: usize,
}

impl SimState {
    fn mint(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check(&mut self, operation: &'static str) -> BackendResult<()> {
        if let Some(remaining) = self.injected_failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BackendError::CallFailed(format!("injected failure in {operation}")));
            }
        }
        Ok(())
    }

    fn instance(&self, handle: InstanceHandle) -> BackendResult<&SimInstance> {
        self.instances
            .get(&handle)
            .ok_or(BackendError::InvalidHandle(handle.raw()))
    }

    fn instance_mut(&mut self, handle: InstanceHandle) -> BackendResult<&mut SimInstance> {
        self.instances
            .get_mut(&handle)
            .ok_or(BackendError::InvalidHandle(handle.raw()))
    }

    fn stop_playing(&mut self, handle: InstanceHandle) {
        let Some(instance) = self.instances.get_mut(&handle) else {
            return;
        };
        if instance.state != PlaybackState::Playing {
            return;
        }

        instance.state = PlaybackState::Stopped;
        instance.paused = false;
        let programmer_sound = instance.programmer_sound.take();

        if let Some(properties) = programmer_sound {
            self.queue
                .push_back(Queued::DestroyProgrammerSound(handle, properties));
        }
        self.queue.push_back(Queued::Stopped(handle));
    }
}

/// In-memory middleware backend
#[derive(Debug, Default)]
pub struct SimulatedStudio {
    state: Mutex<SimState>,
}

impl SimulatedStudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an event resolvable by guid, as if its bank finished loading
    pub fn load_event(&self, guid: Guid, event: SimulatedEvent) -> DescriptorHandle {
        let mut state = self.state.lock();
        if let Some(existing) = state.guids.get(&guid).copied() {
            state.descriptors.insert(existing, event);
            return existing;
        }

        let handle = DescriptorHandle::from_raw(state.mint());
        state.guids.insert(guid, handle);
        state.descriptors.insert(handle, event);
        debug!(%guid, %handle, "Simulated event loaded");
        handle
    }

    /// Forget an event, as if its bank was unloaded
    pub fn unload_event(&self, guid: &Guid) {
        let mut state = self.state.lock();
        if let Some(handle) = state.guids.remove(guid) {
            state.descriptors.remove(&handle);
        }
    }

    /// Register a programmer-sound source under `key`
    pub fn register_sound(&self, key: impl Into<String>, info: SoundInfo) {
        self.state.lock().sound_table.insert(key.into(), info);
    }

    /// Let a playing instance reach its natural end
    pub fn finish(&self, instance: InstanceHandle) {
        self.state.lock().stop_playing(instance);
    }

    /// Make the next `count` calls of `operation` fail
    ///
    /// `operation` is the trait method name, e.g. `"set_paused"`.
    pub fn fail_next(&self, operation: &'static str, count: usize) {
        *self
            .state
            .lock()
            .injected_failures
            .entry(operation)
            .or_default() += count;
    }

    /// Number of `event_by_guid` calls served so far
    pub fn guid_lookups(&self) -> usize {
        self.state.lock().guid_lookups
    }

    pub fn playback_state(&self, instance: InstanceHandle) -> Option<PlaybackState> {
        self.state.lock().instances.get(&instance).map(|i| i.state)
    }

    pub fn is_paused(&self, instance: InstanceHandle) -> Option<bool> {
        self.state.lock().instances.get(&instance).map(|i| i.paused)
    }

    pub fn attributes(&self, instance: InstanceHandle) -> Option<SpatialAttributes> {
        self.state.lock().instances.get(&instance).map(|i| i.attributes)
    }

    pub fn callback_mask(&self, instance: InstanceHandle) -> Option<CallbackMask> {
        self.state.lock().instances.get(&instance).map(|i| i.mask)
    }

    /// Current value of a named parameter on an instance
    pub fn parameter_value(&self, instance: InstanceHandle, name: &str) -> Option<f32> {
        let state = self.state.lock();
        let sim = state.instances.get(&instance)?;
        let event = state.descriptors.get(&sim.descriptor)?;
        let position = event.parameters.iter().position(|p| p == name)?;
        sim.parameters.get(&ParameterIndex(position as u16)).copied()
    }

    /// Programmer sound currently held by an instance
    pub fn programmer_sound(&self, instance: InstanceHandle) -> Option<ProgrammerSoundProperties> {
        self.state
            .lock()
            .instances
            .get(&instance)
            .and_then(|i| i.programmer_sound)
    }

    pub fn live_instances(&self) -> usize {
        self.state.lock().instances.len()
    }

    pub fn live_sounds(&self) -> usize {
        self.state.lock().sounds.len()
    }

    pub fn sound_mode(&self, sound: SoundHandle) -> Option<SoundMode> {
        self.state.lock().sounds.get(&sound).map(|(_, mode)| *mode)
    }
}

impl StudioSystem for SimulatedStudio {
    fn name(&self) -> &'static str {
        "Simulated"
    }

    fn event_by_guid(&self, guid: &Guid) -> BackendResult<DescriptorHandle> {
        let mut state = self.state.lock();
        state.check("event_by_guid")?;
        state.guid_lookups += 1;
        state
            .guids
            .get(guid)
            .copied()
            .ok_or_else(|| BackendError::EventNotFound(guid.to_string()))
    }

    fn create_instance(&self, descriptor: DescriptorHandle) -> BackendResult<InstanceHandle> {
        let mut state = self.state.lock();
        state.check("create_instance")?;
        if !state.descriptors.contains_key(&descriptor) {
            return Err(BackendError::InvalidHandle(descriptor.raw()));
        }

        let handle = InstanceHandle::from_raw(state.mint());
        state.instances.insert(
            handle,
            SimInstance {
                descriptor,
                state: PlaybackState::Created,
                paused: false,
                released: false,
                attributes: SpatialAttributes::default(),
                mask: CallbackMask::empty(),
                user_data: None,
                parameters: HashMap::new(),
                programmer_sound: None,
            },
        );
        trace!(%descriptor, instance = %handle, "Simulated instance created");
        Ok(handle)
    }

    fn parameter_index(
        &self,
        descriptor: DescriptorHandle,
        name: &str,
    ) -> BackendResult<Option<ParameterIndex>> {
        let mut state = self.state.lock();
        state.check("parameter_index")?;
        let event = state
            .descriptors
            .get(&descriptor)
            .ok_or(BackendError::InvalidHandle(descriptor.raw()))?;
        Ok(event
            .parameters
            .iter()
            .position(|p| p == name)
            .map(|i| ParameterIndex(i as u16)))
    }

    fn set_parameter_by_index(
        &self,
        instance: InstanceHandle,
        index: ParameterIndex,
        value: f32,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("set_parameter_by_index")?;
        state.instance_mut(instance)?.parameters.insert(index, value);
        Ok(())
    }

    fn set_3d_attributes(
        &self,
        instance: InstanceHandle,
        attributes: &SpatialAttributes,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("set_3d_attributes")?;
        state.instance_mut(instance)?.attributes = *attributes;
        Ok(())
    }

    fn set_callback(&self, instance: InstanceHandle, mask: CallbackMask) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("set_callback")?;
        state.instance_mut(instance)?.mask = mask;
        Ok(())
    }

    fn set_user_data(&self, instance: InstanceHandle, data: Option<u64>) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("set_user_data")?;
        state.instance_mut(instance)?.user_data = data;
        Ok(())
    }

    fn user_data(&self, instance: InstanceHandle) -> BackendResult<Option<u64>> {
        let mut state = self.state.lock();
        state.check("user_data")?;
        Ok(state.instance(instance)?.user_data)
    }

    fn instance_count(&self, descriptor: DescriptorHandle) -> BackendResult<usize> {
        let mut state = self.state.lock();
        state.check("instance_count")?;
        Ok(state
            .instances
            .values()
            .filter(|i| i.descriptor == descriptor)
            .count())
    }

    fn instance_list(
        &self,
        descriptor: DescriptorHandle,
        capacity: usize,
    ) -> BackendResult<Vec<InstanceHandle>> {
        let mut state = self.state.lock();
        state.check("instance_list")?;
        Ok(state
            .instances
            .iter()
            .filter(|(_, i)| i.descriptor == descriptor)
            .map(|(h, _)| *h)
            .take(capacity)
            .collect())
    }

    fn set_paused(&self, instance: InstanceHandle, paused: bool) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("set_paused")?;
        state.instance_mut(instance)?.paused = paused;
        Ok(())
    }

    fn start(&self, instance: InstanceHandle) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("start")?;
        let descriptor = state.instance(instance)?.descriptor;
        let (fails, programmer_sound) = state
            .descriptors
            .get(&descriptor)
            .map(|e| (e.fails_to_start, e.programmer_sound))
            .ok_or(BackendError::InvalidHandle(descriptor.raw()))?;

        if fails {
            state.queue.push_back(Queued::StartFailed(instance));
            return Ok(());
        }

        state.instance_mut(instance)?.state = PlaybackState::Playing;
        if programmer_sound {
            state.queue.push_back(Queued::CreateProgrammerSound(instance));
        }
        Ok(())
    }

    fn stop(&self, instance: InstanceHandle, mode: StopMode) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("stop")?;
        state.instance(instance)?;
        trace!(%instance, ?mode, "Simulated instance stopping");
        state.stop_playing(instance);
        Ok(())
    }

    fn release(&self, instance: InstanceHandle) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("release")?;
        let sim = state.instance_mut(instance)?;
        sim.released = true;
        let idle = sim.state != PlaybackState::Playing;
        if idle && state.queue.iter().all(|q| q.instance() != instance) {
            state.instances.remove(&instance);
        }
        Ok(())
    }

    fn sound_info(&self, key: &str) -> BackendResult<SoundInfo> {
        let mut state = self.state.lock();
        state.check("sound_info")?;
        state
            .sound_table
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::SoundNotFound(key.to_string()))
    }

    fn update(&self, handler: &mut dyn FnMut(Notification<'_>)) -> BackendResult<()> {
        let pending: Vec<Queued> = {
            let mut state = self.state.lock();
            state.check("update")?;
            state.queue.drain(..).collect()
        };

        // The lock is never held while the handler runs; handlers call back in.
        for queued in pending {
            let instance = queued.instance();
            let registered = self
                .state
                .lock()
                .instances
                .get(&instance)
                .map(|i| i.mask.contains(queued.kind()));
            if registered != Some(true) {
                trace!(%instance, "Notification dropped, not registered");
                continue;
            }

            match queued {
                Queued::StartFailed(h) => handler(Notification::StartFailed(h)),
                Queued::Stopped(h) => handler(Notification::Stopped(h)),
                Queued::CreateProgrammerSound(h) => {
                    let mut properties = ProgrammerSoundProperties::default();
                    handler(Notification::CreateProgrammerSound(h, &mut properties));
                    if properties.sound.is_some() {
                        if let Some(sim) = self.state.lock().instances.get_mut(&h) {
                            sim.programmer_sound = Some(properties);
                        }
                    }
                }
                Queued::DestroyProgrammerSound(h, properties) => {
                    handler(Notification::DestroyProgrammerSound(h, &properties))
                }
            }
        }

        let mut state = self.state.lock();
        state
            .instances
            .retain(|_, i| !(i.released && i.state != PlaybackState::Playing));
        Ok(())
    }
}

impl LowLevelSystem for SimulatedStudio {
    fn create_sound(
        &self,
        source: &SoundSource,
        mode: SoundMode,
        _exinfo: &CreateSoundExInfo,
    ) -> BackendResult<SoundHandle> {
        let mut state = self.state.lock();
        state.check("create_sound")?;
        let handle = SoundHandle::from_raw(state.mint());
        state.sounds.insert(handle, (source.clone(), mode));
        Ok(handle)
    }

    fn release_sound(&self, sound: SoundHandle) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check("release_sound")?;
        state
            .sounds
            .remove(&sound)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle(sound.raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guid(n: u128) -> Guid {
        Guid::from_u128(n)
    }

    #[test]
    fn test_unloaded_event_is_not_found() {
        let studio = SimulatedStudio::new();
        let err = studio.event_by_guid(&guid(1)).unwrap_err();
        assert!(err.is_not_found());

        studio.load_event(guid(1), SimulatedEvent::new());
        assert!(studio.event_by_guid(&guid(1)).is_ok());
        assert_eq!(studio.guid_lookups(), 2);
    }

    #[test]
    fn test_start_and_finish_notifies_stopped() {
        let studio = SimulatedStudio::new();
        let descriptor = studio.load_event(guid(1), SimulatedEvent::new());
        let instance = studio.create_instance(descriptor).unwrap();
        studio.set_callback(instance, CallbackMask::LIFECYCLE).unwrap();
        studio.start(instance).unwrap();
        assert_eq!(studio.playback_state(instance), Some(PlaybackState::Playing));

        studio.finish(instance);
        let mut seen = Vec::new();
        studio
            .update(&mut |n| seen.push((n.instance(), n.kind())))
            .unwrap();
        assert_eq!(seen, vec![(instance, CallbackMask::STOPPED)]);
    }

    #[test]
    fn test_unregistered_notifications_are_dropped() {
        let studio = SimulatedStudio::new();
        let descriptor = studio.load_event(guid(1), SimulatedEvent::new().failing_to_start());
        let instance = studio.create_instance(descriptor).unwrap();
        studio.set_callback(instance, CallbackMask::STOPPED).unwrap();
        studio.start(instance).unwrap();

        let mut count = 0;
        studio.update(&mut |_| count += 1).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_instance_list_truncates_to_capacity() {
        let studio = SimulatedStudio::new();
        let descriptor = studio.load_event(guid(1), SimulatedEvent::new());
        for _ in 0..5 {
            studio.create_instance(descriptor).unwrap();
        }
        assert_eq!(studio.instance_count(descriptor).unwrap(), 5);
        assert_eq!(studio.instance_list(descriptor, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_injected_failure_is_consumed() {
        let studio = SimulatedStudio::new();
        let descriptor = studio.load_event(guid(1), SimulatedEvent::new());
        let instance = studio.create_instance(descriptor).unwrap();

        studio.fail_next("set_paused", 1);
        assert!(studio.set_paused(instance, true).is_err());
        assert!(studio.set_paused(instance, true).is_ok());
        assert_eq!(studio.is_paused(instance), Some(true));
    }

    #[test]
    fn test_released_instance_removed_after_stop() {
        let studio = SimulatedStudio::new();
        let descriptor = studio.load_event(guid(1), SimulatedEvent::new());
        let instance = studio.create_instance(descriptor).unwrap();
        studio.start(instance).unwrap();
        studio.release(instance).unwrap();
        assert_eq!(studio.live_instances(), 1);

        studio.stop(instance, StopMode::Immediate).unwrap();
        studio.update(&mut |_| {}).unwrap();
        assert_eq!(studio.live_instances(), 0);
    }

    #[test]
    fn test_parameter_lookup() {
        let studio = SimulatedStudio::new();
        let descriptor =
            studio.load_event(guid(1), SimulatedEvent::new().with_parameter("occlusion"));
        assert_eq!(
            studio.parameter_index(descriptor, "occlusion").unwrap(),
            Some(ParameterIndex(0))
        );
        assert_eq!(studio.parameter_index(descriptor, "missing").unwrap(), None);

        let instance = studio.create_instance(descriptor).unwrap();
        studio
            .set_parameter_by_index(instance, ParameterIndex(0), 0.25)
            .unwrap();
        assert_eq!(studio.parameter_value(instance, "occlusion"), Some(0.25));
    }
}
