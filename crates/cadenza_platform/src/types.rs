//! Native Boundary Types
//!
//! Handles, payloads and flag sets exchanged with the audio middleware.
//! Handles are opaque integers minted by the backend; the core never
//! interprets them beyond equality.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BackendError;

/// Stable globally-unique identifier of an authored event
///
/// Displays braced, the way middleware tools print event guids; parses any
/// spelling `uuid` accepts (braced, hyphenated, simple, urn).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced())
    }
}

impl FromStr for Guid {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Guid)
            .map_err(|e| BackendError::InvalidParameter(format!("malformed guid {s}: {e}")))
    }
}

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

native_handle!(
    /// Resolved, reusable handle of an event description
    DescriptorHandle
);
native_handle!(
    /// Handle of one native event instance
    InstanceHandle
);
native_handle!(
    /// Handle of a low-level sound object
    SoundHandle
);

/// Index of a parameter declared by an event description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterIndex(pub u16);

/// 3D vector in the middleware's left-handed coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Spatial attributes applied to an event instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialAttributes {
    pub position: Vector3,
    pub velocity: Vector3,
    pub forward: Vector3,
    pub up: Vector3,
}

impl Default for SpatialAttributes {
    fn default() -> Self {
        Self {
            position: Vector3::default(),
            velocity: Vector3::default(),
            forward: Vector3::new(0.0, 0.0, 1.0),
            up: Vector3::new(0.0, 1.0, 0.0),
        }
    }
}

impl SpatialAttributes {
    pub fn at(position: Vector3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// How a native instance should be stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopMode {
    /// Let authored fade-outs and AHDSR release stages play out
    #[default]
    AllowFadeOut,
    /// Cut immediately
    Immediate,
}

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $value:expr,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            $($(#[$fmeta])* pub const $flag: Self = Self($value);)*

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn bits(&self) -> u32 {
                self.0
            }

            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(&self, other: Self) -> bool {
                self.0 & other.0 != 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

flag_set!(
    /// Set of notification kinds an instance callback is registered for
    CallbackMask {
        STOPPED = 0x0000_0020,
        START_FAILED = 0x0000_0040,
        CREATE_PROGRAMMER_SOUND = 0x0000_0080,
        DESTROY_PROGRAMMER_SOUND = 0x0000_0100,
        ALL = 0xffff_ffff,
    }
);

impl CallbackMask {
    /// Completion and failure notifications only
    pub const LIFECYCLE: Self = Self(Self::STOPPED.0 | Self::START_FAILED.0);
}

flag_set!(
    /// Creation mode flags for a low-level sound object
    SoundMode {
        DEFAULT = 0x0000_0000,
        LOOP_OFF = 0x0000_0001,
        LOOP_NORMAL = 0x0000_0002,
        TWO_D = 0x0000_0008,
        THREE_D = 0x0000_0010,
        CREATE_STREAM = 0x0000_0080,
        CREATE_SAMPLE = 0x0000_0100,
        CREATE_COMPRESSED_SAMPLE = 0x0000_0200,
        NONBLOCKING = 0x0001_0000,
    }
);

/// Where a sound's payload comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SoundSource {
    /// Path to a bank or loose file
    Path(String),
    /// In-memory encoded data
    Memory(Arc<[u8]>),
}

/// Extended creation info for a sound embedded in a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateSoundExInfo {
    /// Byte offset of the sound inside its file
    pub file_offset: u32,
    /// Length in bytes, 0 = to end of file
    pub length: u32,
}

/// Source descriptor returned by a sound-table lookup
#[derive(Debug, Clone, PartialEq)]
pub struct SoundInfo {
    pub source: SoundSource,
    pub mode: SoundMode,
    pub exinfo: CreateSoundExInfo,
    pub subsound_index: i32,
}

/// In/out payload of programmer-sound notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgrammerSoundProperties {
    /// Sound written by the handler on create, read back on destroy
    pub sound: Option<SoundHandle>,
    pub subsound_index: i32,
}

/// Notification delivered synchronously from the middleware update
#[derive(Debug)]
pub enum Notification<'a> {
    StartFailed(InstanceHandle),
    Stopped(InstanceHandle),
    CreateProgrammerSound(InstanceHandle, &'a mut ProgrammerSoundProperties),
    DestroyProgrammerSound(InstanceHandle, &'a ProgrammerSoundProperties),
}

impl Notification<'_> {
    pub fn instance(&self) -> InstanceHandle {
        match self {
            Notification::StartFailed(instance)
            | Notification::Stopped(instance)
            | Notification::CreateProgrammerSound(instance, _)
            | Notification::DestroyProgrammerSound(instance, _) => *instance,
        }
    }

    /// Mask bit this notification is gated by
    pub fn kind(&self) -> CallbackMask {
        match self {
            Notification::StartFailed(_) => CallbackMask::START_FAILED,
            Notification::Stopped(_) => CallbackMask::STOPPED,
            Notification::CreateProgrammerSound(..) => CallbackMask::CREATE_PROGRAMMER_SOUND,
            Notification::DestroyProgrammerSound(..) => CallbackMask::DESTROY_PROGRAMMER_SOUND,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_display_and_parse() {
        let text = "{0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0}";
        let guid: Guid = text.parse().unwrap();
        assert_eq!(guid.to_string(), text);

        let bare: Guid = "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0".parse().unwrap();
        assert_eq!(guid, bare);
    }

    #[test]
    fn test_guid_accepts_simple_form() {
        let simple: Guid = "6a1b3c2d00014e5f8a9b0c1d2e3f4a5b".parse().unwrap();
        let braced: Guid = "{6a1b3c2d-0001-4e5f-8a9b-0c1d2e3f4a5b}".parse().unwrap();
        assert_eq!(simple, braced);
        assert_eq!(simple.as_u128(), 0x6a1b3c2d_0001_4e5f_8a9b_0c1d2e3f4a5b);
    }

    #[test]
    fn test_guid_rejects_malformed() {
        assert!("not-a-guid".parse::<Guid>().is_err());
        assert!("0f1e2d3c4b5a6978".parse::<Guid>().is_err());
        assert!("zzzzzzzz-4b5a-6978-8796-a5b4c3d2e1f0".parse::<Guid>().is_err());
    }

    #[test]
    fn test_guid_serializes_as_string() {
        let guid = Guid::from_u128(7);
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000007\"");

        let back: Guid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, guid);
    }

    #[test]
    fn test_callback_mask_sets() {
        let mask = CallbackMask::LIFECYCLE;
        assert!(mask.contains(CallbackMask::STOPPED));
        assert!(mask.contains(CallbackMask::START_FAILED));
        assert!(!mask.intersects(CallbackMask::CREATE_PROGRAMMER_SOUND));
        assert!(CallbackMask::ALL.contains(CallbackMask::DESTROY_PROGRAMMER_SOUND));
    }

    #[test]
    fn test_sound_mode_combination() {
        let mut mode = SoundMode::CREATE_COMPRESSED_SAMPLE | SoundMode::NONBLOCKING;
        mode |= SoundMode::THREE_D;
        assert!(mode.contains(SoundMode::NONBLOCKING | SoundMode::THREE_D));
        assert!(!mode.contains(SoundMode::LOOP_NORMAL));
    }

    #[test]
    fn test_default_attributes_orientation() {
        let attributes = SpatialAttributes::default();
        assert_eq!(attributes.forward, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(attributes.up, Vector3::new(0.0, 1.0, 0.0));
    }
}
