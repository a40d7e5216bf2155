//! Lockstep wall demo
//!
//! Simulates a display wall: N render threads, each driving one window
//! of a node, all presenting in frame lockstep through the shared
//! software swap barrier. The rank-0 master reports cluster frame
//! timing.
//!
//! Usage: `lockstep_demo [parties] [frames]`

use std::sync::Arc;
use std::thread;

use cluster_display::display::{
    ContextManager, DisplaySystem, DrawableKind, HeadlessDisplay, Viewport,
};
use cluster_display::foundation::logging;
use cluster_display::foundation::time::Stopwatch;
use cluster_display::sync::Barrier;
use cluster_display::window::{NodeConfig, Window, WindowSettings};

fn main() {
    logging::init_with_default("info");

    let mut args = std::env::args().skip(1);
    let parties: usize = args
        .next()
        .and_then(|a| a.parse().ok())
        .filter(|&p| p > 0)
        .unwrap_or(4);
    let frames: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(120);

    let config = NodeConfig {
        name: "wall-demo".into(),
        parties,
        windows: (0..parties)
            .map(|party| WindowSettings {
                name: format!("wall-{}", party),
                viewport: Viewport::new(1920 * party as i32, 0, 1920, 1080),
                drawable: DrawableKind::Fbo,
                ..WindowSettings::default()
            })
            .collect(),
    };

    log::info!(
        "starting lockstep demo: {} parties, {} frames",
        config.parties,
        frames
    );

    let platform = Arc::new(HeadlessDisplay::new());
    let contexts = Arc::new(ContextManager::new(
        platform.clone() as Arc<dyn DisplaySystem>
    ));
    let barrier = Arc::new(Barrier::new());

    let handles: Vec<_> = config
        .windows
        .into_iter()
        .map(|settings| {
            let platform = platform.clone() as Arc<dyn DisplaySystem>;
            let contexts = contexts.clone();
            let barrier = barrier.clone();

            thread::spawn(move || {
                let name = settings.name.clone();
                let mut window = Window::new(platform, contexts, settings);
                window
                    .config_init()
                    .unwrap_or_else(|err| panic!("{}: config_init failed: {}", name, err));
                window
                    .set_swap_barrier(barrier.clone(), parties)
                    .expect("swap barrier on initialized window");

                // Rank 0 of the first rendezvous is the timing master.
                let master = barrier.enter(parties).expect("rendezvous") == 0;
                let mut stopwatch = Stopwatch::start_new();

                for _ in 0..frames {
                    window.make_current().expect("make_current");
                    // Drawing would happen here.
                    window.swap_buffers().expect("swap_buffers");
                    window.done_current().expect("done_current");
                }

                stopwatch.stop();
                if master {
                    let per_frame = stopwatch.elapsed_millis() / frames as f64;
                    log::info!(
                        "{} parties, {} frames, {:.3} ms/frame ({:.1} fps)",
                        parties,
                        frames,
                        per_frame,
                        window.average_fps()
                    );
                }

                window.config_exit();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("render thread panicked");
    }

    log::info!("lockstep demo finished");
}
