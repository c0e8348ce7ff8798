//! Programmer Sound Provider
//!
//! Supplies sound data for events whose payload is chosen at trigger time.
//! The middleware asks for a sound when such an instance starts and hands
//! it back when the instance is done with it; creation and release are
//! paired one to one.

use cadenza_platform::{SoundHandle, SoundMode};
use tracing::debug;

use crate::context::ImplContext;

/// A sound created for one programmer-sound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammerSound {
    pub sound: SoundHandle,
    pub subsound_index: i32,
}

pub struct ProgrammerSoundProvider<'a> {
    context: &'a ImplContext,
}

impl<'a> ProgrammerSoundProvider<'a> {
    /// Non-blocking, compressed, 3D-capable; the sound table adds its own flags
    pub const BASE_MODE: SoundMode = SoundMode::from_bits(
        SoundMode::CREATE_COMPRESSED_SAMPLE.bits()
            | SoundMode::NONBLOCKING.bits()
            | SoundMode::THREE_D.bits(),
    );

    pub fn new(context: &'a ImplContext) -> Self {
        Self { context }
    }

    /// Look `key` up in the sound tables and create its sound object
    pub fn create(&self, key: &str) -> Option<ProgrammerSound> {
        let info = self
            .context
            .check("sound_info", self.context.studio().sound_info(key))?;
        let mode = Self::BASE_MODE | info.mode;
        let sound = self.context.check(
            "create_sound",
            self.context
                .low_level()
                .create_sound(&info.source, mode, &info.exinfo),
        )?;

        debug!(key, %sound, subsound = info.subsound_index, "Programmer sound created");
        Some(ProgrammerSound {
            sound,
            subsound_index: info.subsound_index,
        })
    }

    /// Release a sound handed out by [`ProgrammerSoundProvider::create`]
    pub fn release(&self, sound: SoundHandle) -> bool {
        let released = self
            .context
            .check("release_sound", self.context.low_level().release_sound(sound))
            .is_some();
        if released {
            debug!(%sound, "Programmer sound released");
        }
        released
    }
}
