use std::sync::Arc;

use sampleline_core::render::{mailbox, RenderDiagnostics};
use sampleline_core::{
    Handshake, HandshakeOutcome, OfflineDriver, ProcessorOptions, ProcessorRegistry,
    RenderProcessor, SharedRegion, SoundRenderer, Writer, SOUND_RENDERER,
};

const QUANTUM: usize = 128;
const RATE: u32 = 22_050;

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i % 200) as f32 / 200.0).collect()
}

fn driver_with_mailbox() -> (
    OfflineDriver,
    sampleline_core::render::HandshakePort,
    Arc<RenderDiagnostics>,
) {
    let registry = ProcessorRegistry::bootstrap();
    let options = ProcessorOptions::default();
    let processor = registry.create(SOUND_RENDERER, &options).unwrap();
    let (port, receiver) = mailbox(4);
    let driver = OfflineDriver::new(processor, RATE, QUANTUM)
        .unwrap()
        .with_mailbox(receiver);
    (driver, port, options.diagnostics)
}

#[test]
fn silent_until_handshake_then_plays_queued_samples() {
    let (mut driver, mut port, diagnostics) = driver_with_mailbox();
    let region = SharedRegion::with_usable_capacity(4_096).unwrap();
    let mut writer = Writer::new(Arc::clone(&region)).unwrap();
    let samples = ramp(300);
    writer.push(&samples).unwrap();

    let before = driver.render_quanta(2);
    assert!(before.iter().all(|s| *s == 0.0));
    assert_eq!(driver.processor_state(), "uninitialized");
    assert_eq!(region.occupancy(), 300);

    port.post(Handshake::new(Arc::clone(&region))).unwrap();
    let after = driver.render_quanta(3);
    assert_eq!(driver.processor_state(), "ready");
    assert_eq!(&after[..300], samples.as_slice());
    assert!(after[300..].iter().all(|s| *s == 0.0));

    let snap = diagnostics.snapshot();
    assert_eq!(snap.ticks, 5);
    assert_eq!(snap.samples_rendered, 300);
    assert_eq!(snap.underrun_samples, 3 * QUANTUM as u64 - 300);
    assert_eq!(snap.handshakes_bound, 1);
}

#[test]
fn duplicate_handshake_keeps_first_region() {
    let (mut driver, mut port, diagnostics) = driver_with_mailbox();
    let first = SharedRegion::with_usable_capacity(1_024).unwrap();
    let second = SharedRegion::with_usable_capacity(1_024).unwrap();
    Writer::new(Arc::clone(&first))
        .unwrap()
        .push(&[0.5; QUANTUM])
        .unwrap();
    Writer::new(Arc::clone(&second))
        .unwrap()
        .push(&[-0.5; QUANTUM])
        .unwrap();

    port.post(Handshake::new(Arc::clone(&first))).unwrap();
    port.post(Handshake::new(Arc::clone(&second))).unwrap();
    let out = driver.render_quanta(1);

    assert!(out.iter().all(|s| *s == 0.5));
    assert_eq!(second.occupancy(), QUANTUM);
    assert!(!second.has_consumer());

    let returned = port.collect_returned();
    assert_eq!(returned.len(), 1);
    assert!(Arc::ptr_eq(&returned[0].region, &second));
    assert_eq!(diagnostics.snapshot().handshakes_ignored, 1);
}

#[test]
fn reader_drains_after_producer_leaves_then_renders_silence() {
    let region = SharedRegion::with_usable_capacity(1_024).unwrap();
    let mut renderer = SoundRenderer::default();
    let mut writer = Writer::new(Arc::clone(&region)).unwrap();
    writer.push(&[0.25; 200]).unwrap();
    assert!(renderer.on_message(Handshake::new(Arc::clone(&region))).is_bound());

    drop(writer);
    let reader = renderer.reader().unwrap();
    assert!(!reader.producer_attached());
    assert_eq!(reader.available(), 200);

    let mut out = [0f32; QUANTUM];
    renderer.process(&mut out);
    assert!(out.iter().all(|s| *s == 0.25));

    let mut out = [0f32; QUANTUM];
    renderer.process(&mut out);
    assert!(out[..72].iter().all(|s| *s == 0.25));
    assert!(out[72..].iter().all(|s| *s == 0.0));

    for _ in 0..4 {
        let mut out = [0f32; QUANTUM];
        assert!(renderer.process(&mut out));
        assert!(out.iter().all(|s| *s == 0.0));
    }
}

#[test]
fn region_outlives_the_side_that_created_it() {
    let mut renderer = SoundRenderer::default();
    {
        let region = SharedRegion::with_usable_capacity(64).unwrap();
        let mut writer = Writer::new(Arc::clone(&region)).unwrap();
        writer.push(&[0.1; 10]).unwrap();
        renderer.on_message(Handshake::new(region));
    }

    let mut out = [0f32; 16];
    assert!(renderer.process(&mut out));
    assert!(out[..10].iter().all(|s| *s == 0.1));
    assert_eq!(renderer.diagnostics().snapshot().faults, 0);
}

#[test]
fn rejected_handshake_leaves_renderer_uninitialized() {
    let region = SharedRegion::with_usable_capacity(64).unwrap();
    let mut first = SoundRenderer::default();
    let mut second = SoundRenderer::default();
    assert!(first.on_message(Handshake::new(Arc::clone(&region))).is_bound());

    match second.on_message(Handshake::new(Arc::clone(&region))) {
        HandshakeOutcome::Rejected(message, _) => assert!(Arc::ptr_eq(&message.region, &region)),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(second.state_name(), "uninitialized");
    assert_eq!(second.diagnostics().snapshot().handshakes_rejected, 1);
}
