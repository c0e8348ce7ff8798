//! Cadenza Platform - Audio Middleware Boundary
//!
//! This crate defines everything the lifecycle core needs from a native
//! audio middleware:
//! - Event description lookup and instance creation
//! - Spatial attributes, parameters, pause and stop control
//! - Per-instance callback registration and opaque user data
//! - Programmer-sound source lookup and raw sound objects
//!
//! # Architecture
//!
//! A middleware backend implements two traits, mirroring the two system
//! handles such middleware exposes:
//!
//! | Trait            | Owns                                       |
//! |------------------|--------------------------------------------|
//! | `StudioSystem`   | Banks, event descriptions, event instances |
//! | `LowLevelSystem` | Raw sound objects                          |
//!
//! `SimulatedStudio` implements both in memory and is the default backend.

mod error;
mod simulated;
mod traits;
mod types;

pub use error::{BackendError, BackendResult};
pub use simulated::{PlaybackState, SimulatedEvent, SimulatedStudio};
pub use traits::{LowLevelSystem, StudioSystem};
pub use types::{
    CallbackMask, CreateSoundExInfo, DescriptorHandle, Guid, InstanceHandle, Notification,
    ParameterIndex, ProgrammerSoundProperties, SoundHandle, SoundInfo, SoundMode, SoundSource,
    SpatialAttributes, StopMode, Vector3,
};

use std::sync::Arc;

/// Create the default backend for the current build
///
/// The returned handle serves as both the studio and the low-level system.
pub fn default_backend() -> Arc<SimulatedStudio> {
    Arc::new(SimulatedStudio::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_serves_both_systems() {
        let backend = default_backend();
        let studio: Arc<dyn StudioSystem> = backend.clone();
        let low_level: Arc<dyn LowLevelSystem> = backend;
        assert_eq!(studio.name(), "Simulated");

        let sound = low_level
            .create_sound(
                &SoundSource::Path("vo/line_01.ogg".into()),
                SoundMode::CREATE_STREAM,
                &CreateSoundExInfo::default(),
            )
            .unwrap();
        assert!(low_level.release_sound(sound).is_ok());
    }
}
