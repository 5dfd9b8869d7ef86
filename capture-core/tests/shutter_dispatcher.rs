mod common;

use std::{sync::Arc, thread};

use capture_core::ShutterDispatcher;
use common::{shuffled, Event, Recorder};

#[test]
fn test_in_order_delivery() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    for frame_number in 1..=3 {
        dispatcher.expect(frame_number);
    }

    dispatcher.mark_ready(2, 200);
    dispatcher.mark_ready(3, 300);
    assert!(recorder.events().is_empty());

    dispatcher.mark_ready(1, 100);
    assert_eq!(recorder.events(), vec![Event::Shutter(1, 100), Event::Shutter(2, 200), Event::Shutter(3, 300)]);
    assert!(dispatcher.is_empty());
}

#[test]
fn test_any_permutation_is_delivered_in_order() {
    for seed in 0..16 {
        let recorder = Recorder::new();
        let dispatcher = ShutterDispatcher::new(recorder.clone());

        for frame_number in 0..64 {
            dispatcher.expect(frame_number);
        }
        for frame_number in shuffled(64, seed) {
            dispatcher.mark_ready(frame_number, frame_number as i64 * 10);
        }

        assert_eq!(recorder.shutters(), (0..64).collect::<Vec<u32>>());
    }
}

#[test]
fn test_duplicate_ready_dispatches_once() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    dispatcher.expect(1);
    dispatcher.expect(2);

    dispatcher.mark_ready(2, 20);
    dispatcher.mark_ready(2, 21);
    dispatcher.mark_ready(1, 10);
    dispatcher.mark_ready(1, 11);

    assert_eq!(recorder.events(), vec![Event::Shutter(1, 10), Event::Shutter(2, 20)]);
}

#[test]
fn test_unexpected_shutter_is_dropped() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    dispatcher.mark_ready(9, 90);
    assert!(recorder.events().is_empty());
    assert!(dispatcher.is_empty());
}

#[test]
fn test_duplicate_expect_keeps_ready_record() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    dispatcher.expect(1);
    dispatcher.expect(2);
    dispatcher.mark_ready(2, 20);
    dispatcher.expect(2);
    dispatcher.mark_ready(1, 10);

    assert_eq!(recorder.shutters(), vec![1, 2]);
}

#[test]
fn test_clear_frame_discards_ready_shutter() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    dispatcher.expect(1);
    dispatcher.expect(2);
    dispatcher.mark_ready(2, 20);
    dispatcher.clear_frame(2);

    // A late duplicate of the cleared shutter is dropped
    dispatcher.mark_ready(2, 21);
    dispatcher.mark_ready(1, 10);
    assert_eq!(recorder.shutters(), vec![1]);

    // Expecting the same frame again starts a fresh record
    dispatcher.expect(2);
    assert_eq!(recorder.shutters(), vec![1]);
    dispatcher.mark_ready(2, 22);
    assert_eq!(recorder.events(), vec![Event::Shutter(1, 10), Event::Shutter(2, 22)]);
}

#[test]
fn test_clear_frame_unblocks_nothing_by_itself() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    dispatcher.expect(1);
    dispatcher.expect(2);
    dispatcher.mark_ready(2, 20);
    dispatcher.clear_frame(1);

    assert!(recorder.events().is_empty());
    assert_eq!(dispatcher.len(), 1);
}

#[test]
fn test_clear_discards_everything() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    for frame_number in 1..=3 {
        dispatcher.expect(frame_number);
    }
    dispatcher.mark_ready(3, 30);
    dispatcher.clear();

    dispatcher.mark_ready(1, 10);
    dispatcher.mark_ready(2, 20);
    assert!(recorder.events().is_empty());
    assert!(dispatcher.is_empty());
}

#[test]
fn test_pending_frames() {
    let recorder = Recorder::new();
    let dispatcher = ShutterDispatcher::new(recorder.clone());

    for frame_number in [4, 1, 3, 2] {
        dispatcher.expect(frame_number);
    }
    dispatcher.mark_ready(1, 10);
    dispatcher.mark_ready(3, 30);

    assert_eq!(recorder.shutters(), vec![1]);
    assert_eq!(dispatcher.pending_frames(), vec![2, 3, 4]);
}

#[test]
fn test_concurrent_completion_threads() {
    const FRAMES: u32 = 512;
    const THREADS: u32 = 4;

    let recorder = Recorder::new();
    let dispatcher = Arc::new(ShutterDispatcher::new(recorder.clone()));

    for frame_number in 0..FRAMES {
        dispatcher.expect(frame_number);
    }

    let order = shuffled(FRAMES, 7);
    let handles: Vec<_> = (0..THREADS)
        .map(|thread_index| {
            let dispatcher = dispatcher.clone();
            let frames: Vec<u32> = order.iter().copied().skip(thread_index as usize).step_by(THREADS as usize).collect();
            thread::spawn(move || {
                for frame_number in frames {
                    dispatcher.mark_ready(frame_number, frame_number as i64);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(recorder.shutters(), (0..FRAMES).collect::<Vec<u32>>());
}
