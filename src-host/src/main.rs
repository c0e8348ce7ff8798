//! Cadenza Host - scripted session over the simulated middleware
//!
//! Usage:
//!   cadenza_host                - Run with the default config
//!   cadenza_host config.json    - Run with a JSON ImplConfig
//!
//! Loads an [`ImplConfig`] (defaults when no path is given), builds an
//! [`EventSystem`] over the simulated backend and plays through a short
//! start / pause / resume / stop session, pumping the update between steps.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cadenza_core::{
    default_backend, ActionType, Event, EventId, EventSystem, ImplConfig, ImplContext, ObjectId,
    RequestStatus, SimulatedEvent, SimulatedStudio, SpatialAttributes, TriggerId,
    TriggerInstanceId, Vector3,
};
use clap::Parser;
use cadenza_platform::{CreateSoundExInfo, Guid, SoundInfo, SoundMode, SoundSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadenza_host", about = "Scripted Cadenza session over the simulated middleware")]
struct Cli {
    /// Path to a JSON ImplConfig
    config: Option<PathBuf>,
}

const FOOTSTEPS: EventId = EventId(7);
const RADIO: EventId = EventId(11);

const PLAY_FOOTSTEPS: TriggerId = TriggerId(1);
const STOP_FOOTSTEPS: TriggerId = TriggerId(2);
const PAUSE_FOOTSTEPS: TriggerId = TriggerId(3);
const RESUME_FOOTSTEPS: TriggerId = TriggerId(4);
const PLAY_RADIO: TriggerId = TriggerId(5);

fn load_config(cli: &Cli) -> Result<ImplConfig> {
    let Some(path) = &cli.config else {
        return Ok(ImplConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ImplConfig::from_json(&json)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Register the authored content the session plays with
fn load_banks(studio: &SimulatedStudio) -> Result<(Guid, Guid)> {
    let footsteps: Guid = "{6a1b3c2d-0001-4e5f-8a9b-0c1d2e3f4a5b}".parse()?;
    let radio: Guid = "6a1b3c2d-0002-4e5f-8a9b-0c1d2e3f4a5b".parse()?;

    studio.load_event(
        footsteps,
        SimulatedEvent::new()
            .with_parameter("occlusion")
            .with_parameter("absolute_velocity"),
    );
    studio.load_event(radio, SimulatedEvent::new().with_programmer_sound());
    studio.register_sound(
        "radio_chatter",
        SoundInfo {
            source: SoundSource::Path("banks/dialogue.assets.bank".into()),
            mode: SoundMode::LOOP_NORMAL,
            exinfo: CreateSoundExInfo {
                file_offset: 4096,
                length: 65536,
            },
            subsound_index: 0,
        },
    );
    Ok((footsteps, radio))
}

fn register_events(system: &mut EventSystem, footsteps: Guid, radio: Guid) {
    let triggers = [
        (PLAY_FOOTSTEPS, ActionType::Start),
        (STOP_FOOTSTEPS, ActionType::Stop),
        (PAUSE_FOOTSTEPS, ActionType::Pause),
        (RESUME_FOOTSTEPS, ActionType::Resume),
    ];
    for (trigger, action) in triggers {
        system.register_event(trigger, Event::new(FOOTSTEPS, "footsteps", footsteps, action));
    }
    let chatter = Event::new(RADIO, "radio_chatter", radio, ActionType::Start);
    system.register_event(PLAY_RADIO, chatter.with_programmer_sound());
}

fn request(
    system: &mut EventSystem,
    trigger: TriggerId,
    object: ObjectId,
    next_instance: &mut u32,
) -> RequestStatus {
    *next_instance += 1;
    let status = system.execute(trigger, object, TriggerInstanceId(*next_instance));
    if status == RequestStatus::Failure {
        warn!(%trigger, object = %object, "Request failed");
    }
    status
}

fn run(config: ImplConfig) -> Result<()> {
    let studio = default_backend();
    let (footsteps, radio) = load_banks(&studio)?;

    let context = ImplContext::simulated(Arc::clone(&studio), config);
    let mut system = EventSystem::new(context);
    register_events(&mut system, footsteps, radio);

    let player = system.create_object("player");
    let speaker = system.create_object("radio_speaker");
    system.set_object_attributes(
        speaker,
        SpatialAttributes::at(Vector3::new(4.0, 0.0, -2.0)),
    )?;
    system.set_object_occlusion(speaker, 0.35)?;

    let mut trigger = 0;
    request(&mut system, PLAY_FOOTSTEPS, player, &mut trigger);
    request(&mut system, PLAY_FOOTSTEPS, player, &mut trigger);
    request(&mut system, PLAY_RADIO, speaker, &mut trigger);
    system.update()?;
    system.update()?;
    info!(
        instances = system.instance_count(),
        sounds = studio.live_sounds(),
        "Session playing"
    );

    system.set_object_attributes(
        player,
        SpatialAttributes {
            velocity: Vector3::new(1.5, 0.0, 2.0),
            ..SpatialAttributes::default()
        },
    )?;

    request(&mut system, PAUSE_FOOTSTEPS, player, &mut trigger);
    system.update()?;
    request(&mut system, RESUME_FOOTSTEPS, player, &mut trigger);
    system.update()?;

    request(&mut system, STOP_FOOTSTEPS, player, &mut trigger);
    system.update()?;
    info!(instances = system.instance_count(), "Footsteps stopped");

    system.destroy_object(speaker);
    system.update()?;
    system.update()?;
    info!(
        instances = system.instance_count(),
        native_instances = studio.live_instances(),
        sounds = studio.live_sounds(),
        "Session finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cadenza_core=debug,cadenza_host=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(config = %serde_json::to_string(&config)?, "Starting Cadenza host session");
    run(config)
}
