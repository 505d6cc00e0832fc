/// Live graph tests: controller on one thread, processor on another
use opgraph::live::live_graph;
use opgraph::ops::{BandPassButterworth, BandRejectButterworth, Oscillator};
use opgraph::{EngineConfig, Error, SignalGraph};
use std::thread;
use std::time::Duration;

const BLOCK: usize = 64;

#[test]
fn test_install_preserves_running_filter_state() {
    // Offline reference without any edits
    let mut reference = SignalGraph::new(EngineConfig::default());
    let osc = reference.add(Oscillator::sine(2500.0)).unwrap();
    let notch = reference.add(BandRejectButterworth::patch(osc)).unwrap();
    reference.set_output(notch).unwrap();

    let (mut controller, mut processor) = live_graph(EngineConfig::default());
    let live_osc = controller.add(Oscillator::sine(2500.0)).unwrap();
    let live_notch = controller.add(BandRejectButterworth::patch(live_osc)).unwrap();
    controller.set_output(live_notch).unwrap();
    assert_eq!((live_osc, live_notch), (osc, notch));

    let mut block = [0.0f32; BLOCK];
    for i in 0..20 {
        if i == 7 {
            // Unrelated topology change mid-stream
            controller.add(BandPassButterworth::patch(live_osc)).unwrap();
        }
        processor.process(&[], &mut block).unwrap();
        let expected = reference.render(BLOCK).unwrap();
        assert_eq!(block.as_slice(), expected.as_slice(), "block {i} diverged");
        controller.collect_garbage();
    }
}

#[test]
fn test_failed_mutation_sends_nothing() {
    let (mut controller, _processor) = live_graph(EngineConfig::default());
    let osc = controller.add(Oscillator::sine(440.0)).unwrap();
    let queued = controller.pending_commands();

    assert!(matches!(
        controller.remove_operation(opgraph::OperationId(9)),
        Err(Error::UnknownOperation(_))
    ));
    assert!(controller.set_parameter(osc, "missing", 1.0).is_err());
    assert_eq!(controller.pending_commands(), queued);
}

#[test]
fn test_processor_on_audio_thread() {
    let (mut controller, mut processor) = live_graph(EngineConfig {
        queue_capacity: 8,
        ..EngineConfig::default()
    });
    let osc = controller.add(Oscillator::sine(1000.0)).unwrap();
    let notch = controller.add(BandRejectButterworth::patch(osc)).unwrap();
    controller.set_output(notch).unwrap();
    let snapshots = controller.snapshot_handle();

    let audio = thread::spawn(move || -> opgraph::Result<(u64, f32)> {
        let mut block = [0.0f32; BLOCK];
        let mut loudest = 0.0f32;
        for _ in 0..400 {
            processor.process(&[], &mut block)?;
            loudest = block.iter().fold(loudest, |m, s| m.max(s.abs()));
            thread::sleep(Duration::from_micros(50));
        }
        Ok((processor.ticks(), loudest))
    });

    // Sweep the notch while audio runs, backing off when the queue is full
    let mut sent = 0;
    let mut center = 500.0f32;
    while sent < 100 && !audio.is_finished() {
        match controller.set_parameter(notch, "center_frequency", center) {
            Ok(()) => {
                sent += 1;
                center += 50.0;
            }
            Err(Error::QueueFull) => thread::sleep(Duration::from_micros(200)),
            Err(e) => panic!("unexpected error: {e}"),
        }
        controller.collect_garbage();
    }

    let (ticks, loudest) = audio.join().unwrap().unwrap();
    assert!(sent > 0);
    assert_eq!(ticks, 400 * BLOCK as u64);
    assert!(loudest > 0.1 && loudest < 2.0, "loudest {loudest}");
    assert_eq!(snapshots.load().output, Some(notch));
}
