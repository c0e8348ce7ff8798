//! Lifecycle benchmarks
//!
//! Measures the request and update paths against the simulated backend.

use std::sync::Arc;

use cadenza_core::{
    ActionType, Event, EventId, EventSystem, ImplConfig, ImplContext, RequestStatus,
    SimulatedEvent, SimulatedStudio, TriggerId, TriggerInstanceId,
};
use cadenza_platform::{Guid, StudioSystem};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const GUID: Guid = Guid::from_u128(0x5eed);
const SFX: EventId = EventId(1);
const START: TriggerId = TriggerId(1);
const PAUSE: TriggerId = TriggerId(2);
const RESUME: TriggerId = TriggerId(3);

fn system_with(studio: &Arc<SimulatedStudio>) -> EventSystem {
    let context = ImplContext::simulated(Arc::clone(studio), ImplConfig::shipping());
    let mut system = EventSystem::new(context);
    system.register_event(START, Event::new(SFX, "sfx", GUID, ActionType::Start));
    system.register_event(PAUSE, Event::new(SFX, "sfx", GUID, ActionType::Pause));
    system.register_event(RESUME, Event::new(SFX, "sfx", GUID, ActionType::Resume));
    system
}

fn benchmark_start_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("start_cycle");

    // Triggers per frame
    for batch in [1u32, 8, 32].iter() {
        let studio = Arc::new(SimulatedStudio::new());
        studio.load_event(
            GUID,
            SimulatedEvent::new()
                .with_parameter("occlusion")
                .with_parameter("absolute_velocity"),
        );
        let mut system = system_with(&studio);
        let object = system.create_object("emitter");
        let mut trigger = 0;

        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_function(format!("start_update_stop_{}", batch), |b| {
            b.iter(|| {
                for _ in 0..*batch {
                    trigger += 1;
                    let status = system.execute(START, object, TriggerInstanceId(trigger));
                    debug_assert_eq!(status, RequestStatus::Success);
                }
                system.update().ok();
                system.stop(START, object);
                system.update().ok();
                black_box(system.instance_count());
            })
        });
    }

    group.finish();
}

fn benchmark_pause_resume(c: &mut Criterion) {
    let studio = Arc::new(SimulatedStudio::new());
    let descriptor = studio.load_event(GUID, SimulatedEvent::new());
    for _ in 0..32 {
        studio.create_instance(descriptor).ok();
    }
    let mut system = system_with(&studio);
    let object = system.create_object("crowd");

    c.bench_function("pause_resume_32", |b| {
        b.iter(|| {
            black_box(system.execute(PAUSE, object, TriggerInstanceId(0)));
            black_box(system.execute(RESUME, object, TriggerInstanceId(0)));
        })
    });
}

criterion_group!(benches, benchmark_start_cycle, benchmark_pause_resume);
criterion_main!(benches);
