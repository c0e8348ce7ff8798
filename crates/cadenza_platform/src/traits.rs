//! Middleware Backend Traits
//!
//! Defines the capability set the lifecycle core requires from any audio
//! middleware. A backend exposes two handles: the event-level studio system
//! and the low-level system that owns raw sound objects. Both are created
//! once during initialization and shared read-only afterwards, so every
//! method takes `&self`.

use crate::error::BackendResult;
use crate::types::{
    CallbackMask, CreateSoundExInfo, DescriptorHandle, Guid, InstanceHandle, Notification,
    ParameterIndex, SoundHandle, SoundInfo, SoundMode, SoundSource, SpatialAttributes, StopMode,
};

/// Event-level middleware system
///
/// # Callback Contract
///
/// Notifications are delivered only from inside [`StudioSystem::update`],
/// synchronously, on the caller's thread. A handler may call back into
/// this trait (user data, sound info) but must never start or stop
/// instances from inside a notification.
pub trait StudioSystem: Send + Sync {
    /// Name of this backend (e.g. "Simulated")
    fn name(&self) -> &'static str;

    /// Look up an event description by guid in the loaded banks
    fn event_by_guid(&self, guid: &Guid) -> BackendResult<DescriptorHandle>;

    /// Create a new, not yet started instance of a description
    fn create_instance(&self, descriptor: DescriptorHandle) -> BackendResult<InstanceHandle>;

    /// Resolve a parameter name on a description
    ///
    /// Returns `None` if the description does not declare the parameter.
    fn parameter_index(
        &self,
        descriptor: DescriptorHandle,
        name: &str,
    ) -> BackendResult<Option<ParameterIndex>>;

    fn set_parameter_by_index(
        &self,
        instance: InstanceHandle,
        index: ParameterIndex,
        value: f32,
    ) -> BackendResult<()>;

    fn set_3d_attributes(
        &self,
        instance: InstanceHandle,
        attributes: &SpatialAttributes,
    ) -> BackendResult<()>;

    /// Register for the notification kinds in `mask`
    fn set_callback(&self, instance: InstanceHandle, mask: CallbackMask) -> BackendResult<()>;

    /// Attach an opaque per-instance token, `None` clears it
    fn set_user_data(&self, instance: InstanceHandle, data: Option<u64>) -> BackendResult<()>;

    fn user_data(&self, instance: InstanceHandle) -> BackendResult<Option<u64>>;

    /// Number of live instances of a description
    fn instance_count(&self, descriptor: DescriptorHandle) -> BackendResult<usize>;

    /// Live instances of a description, at most `capacity` of them
    fn instance_list(
        &self,
        descriptor: DescriptorHandle,
        capacity: usize,
    ) -> BackendResult<Vec<InstanceHandle>>;

    fn set_paused(&self, instance: InstanceHandle, paused: bool) -> BackendResult<()>;

    fn start(&self, instance: InstanceHandle) -> BackendResult<()>;

    fn stop(&self, instance: InstanceHandle, mode: StopMode) -> BackendResult<()>;

    /// Release the instance; it is destroyed once it has stopped
    fn release(&self, instance: InstanceHandle) -> BackendResult<()>;

    /// Look up a programmer-sound source in the loaded sound tables
    fn sound_info(&self, key: &str) -> BackendResult<SoundInfo>;

    /// Advance the middleware and deliver pending notifications to `handler`
    fn update(&self, handler: &mut dyn FnMut(Notification<'_>)) -> BackendResult<()>;
}

/// Low-level middleware system owning raw sound objects
pub trait LowLevelSystem: Send + Sync {
    fn create_sound(
        &self,
        source: &SoundSource,
        mode: SoundMode,
        exinfo: &CreateSoundExInfo,
    ) -> BackendResult<SoundHandle>;

    fn release_sound(&self, sound: SoundHandle) -> BackendResult<()>;
}
