//! Frame-lockstep integration: several render threads, one display
//! system, one software swap barrier.

use std::sync::{Arc, Mutex};
use std::thread;

use crate::display::{ContextManager, DisplaySystem, DrawableKind, HeadlessDisplay, Viewport};
use crate::sync::Barrier;
use crate::window::{Window, WindowSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Thread finished drawing the frame, about to enter the swap
    Drawn(usize, u64),
    /// Thread started working on the frame
    Begin(usize, u64),
}

/// Four render threads swap through a shared software barrier. No thread
/// may begin frame N+1 before every thread has finished drawing frame N:
/// the barrier releases the swap only once all parties arrived.
#[test]
fn test_four_threads_swap_in_lockstep() {
    const PARTIES: usize = 4;
    const FRAMES: u64 = 8;

    let platform = Arc::new(HeadlessDisplay::new());
    let contexts = Arc::new(ContextManager::new(
        platform.clone() as Arc<dyn DisplaySystem>
    ));
    let barrier = Arc::new(Barrier::new());
    let journal: Arc<Mutex<Vec<Phase>>> = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..PARTIES)
        .map(|party| {
            let platform = platform.clone() as Arc<dyn DisplaySystem>;
            let contexts = contexts.clone();
            let barrier = barrier.clone();
            let journal = journal.clone();

            thread::spawn(move || {
                let settings = WindowSettings {
                    name: format!("node-{}", party),
                    viewport: Viewport::new(0, 0, 640, 480),
                    drawable: DrawableKind::Fbo,
                    ..WindowSettings::default()
                };
                let mut window = Window::new(platform, contexts, settings);
                window.config_init().unwrap();
                window.set_swap_barrier(barrier, PARTIES).unwrap();

                for frame in 0..FRAMES {
                    journal.lock().unwrap().push(Phase::Begin(party, frame));
                    window.make_current().unwrap();
                    // Drawing would happen here.
                    journal.lock().unwrap().push(Phase::Drawn(party, frame));
                    window.swap_buffers().unwrap();
                    window.done_current().unwrap();
                }

                window.config_exit();
                window.frames()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), FRAMES);
    }

    // Every thread presented every frame.
    assert_eq!(platform.stats().swap_calls as u64, PARTIES as u64 * FRAMES);

    // Lockstep property: all Drawn(_, N) records precede every
    // Begin(_, N+1) record in the global journal order.
    let journal = journal.lock().unwrap();
    for frame in 1..FRAMES {
        let first_begin = journal
            .iter()
            .position(|p| matches!(p, Phase::Begin(_, f) if *f == frame))
            .unwrap();
        for party in 0..PARTIES {
            let drawn = journal
                .iter()
                .position(|p| *p == Phase::Drawn(party, frame - 1))
                .unwrap();
            assert!(
                drawn < first_begin,
                "party {} had not finished frame {} when frame {} began",
                party,
                frame - 1,
                frame
            );
        }
    }

    // Teardown left nothing behind.
    assert_eq!(platform.live_windows(), 0);
    assert_eq!(platform.live_devices(), 0);
    assert_eq!(platform.live_contexts(), 0);
    assert_eq!(platform.live_framebuffers(), 0);
}

/// The rendezvous elects exactly one master per frame across the whole
/// run, and ranks within one generation form a permutation.
#[test]
fn test_swap_rendezvous_elects_one_master_per_frame() {
    const PARTIES: usize = 3;
    const FRAMES: usize = 10;

    let barrier = Arc::new(Barrier::new());
    let handles: Vec<_> = (0..PARTIES)
        .map(|_| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut masters = 0usize;
                for _ in 0..FRAMES {
                    if barrier.enter(PARTIES).unwrap() == 0 {
                        masters += 1;
                    }
                }
                masters
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, FRAMES);
}
