//! Cadenza Core - Audio Event Instance Lifecycle
//!
//! This crate turns abstract play/stop/pause/resume requests into live
//! middleware event instances and tracks them until they are gone:
//! - Lazy, cached resolution of event guids into description handles
//! - Creation, configuration and teardown of per-trigger instances
//! - Completion, failure and programmer-sound notifications delivered
//!   synchronously from the middleware update
//! - Bounded bulk pause/resume across all live instances of an event
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  EventSystem::execute(event, object, trigger)                  │
//! │     └─▶ Event (ActionExecutor)                                 │
//! │           ├─ DescriptorCache ──▶ StudioSystem::event_by_guid   │
//! │           ├─ EventInstance ──▶ InstanceRegistry (arena)        │
//! │           └─ AudioObject.pending                               │
//! ├────────────────────────────────────────────────────────────────┤
//! │  EventSystem::update()                                         │
//! │     ├─ StudioSystem::update ──▶ CallbackBridge                 │
//! │     │     ├─ StartFailed / Stopped ──▶ ToBeRemoved             │
//! │     │     └─ Programmer sounds ──▶ ProgrammerSoundProvider     │
//! │     └─ AudioObject::update  (pending ─▶ active, sweep)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All of it runs on one thread; the middleware handles, diagnostics
//! strategy and configuration live in an immutable [`ImplContext`].

mod callback;
mod config;
mod context;
mod descriptor;
mod diagnostics;
mod error;
mod event;
mod instance;
mod object;
mod parameters;
mod programmer_sound;
mod system;

pub use callback::CallbackBridge;
pub use config::{DiagnosticsMode, ImplConfig};
pub use context::ImplContext;
pub use descriptor::DescriptorCache;
pub use diagnostics::{
    sink_for, ChannelSink, Diagnostic, DiagnosticSink, LogSink, SilentSink, StrictSink,
};
pub use error::{CoreError, CoreResult};
pub use event::{ActionType, Event, EventId, RequestStatus, TriggerId, TriggerInstanceId};
pub use instance::{EventInstance, InstanceKey, InstanceRegistry, InstanceState};
pub use object::{AudioObject, ObjectId};
pub use parameters::{InternalParameter, ParameterIndexCache};
pub use programmer_sound::{ProgrammerSound, ProgrammerSoundProvider};
pub use system::EventSystem;

// Re-export backend types for convenience
pub use cadenza_platform::{
    default_backend, Guid, SimulatedEvent, SimulatedStudio, SpatialAttributes, StopMode, Vector3,
};
