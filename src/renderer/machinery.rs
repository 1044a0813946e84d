use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use image::{GenericImage, GenericImageView, RgbaImage};

use crate::{
    camera::Camera,
    geometry::ScreenBlock,
    renderer::{RenderSettings, worker::Worker},
    scene::Scene,
    screen_block::ScreenBlockExt,
    shading::Environment,
    util::MarchStats,
};

/// Starts rendering on a pool of worker threads and returns immediately.
/// Callbacks are called from the workers when a tile is started and when it is copied into the
/// output image.
pub fn render<
    F1: Fn(ScreenBlock) + Send + Sync + 'static,
    F2: Fn(ScreenBlock) + Send + Sync + 'static,
>(
    scene: Scene,
    camera: Camera,
    environment: Environment,
    settings: RenderSettings,
    started_tile_callback: F1,
    finished_tile_callback: F2,
) -> anyhow::Result<RenderProgress> {
    let resolution = camera.get_resolution();
    let state = Arc::new(RenderState {
        scene,
        camera,
        environment,
        settings,

        image: Mutex::new(RgbaImage::new(resolution.x, resolution.y)),
        stats: Mutex::new(MarchStats::default()),

        tile_ordering: ScreenBlock::from_size(resolution).tile_ordering(settings.tile_size),
        next_tile_index: AtomicUsize::new(0),
    });
    let started_tile_callback = Arc::new(started_tile_callback);
    let finished_tile_callback = Arc::new(finished_tile_callback);

    // Pinning is best effort, some platforms don't report cores at all
    let cores = core_affinity::get_core_ids().unwrap_or_default();
    let worker_count = match settings.worker_count {
        Some(count) => count.get(),
        None if cores.is_empty() => num_cpus::get(),
        None => cores.len(),
    };
    tracing::info!(
        width = resolution.x,
        height = resolution.y,
        tiles = state.tile_ordering.len(),
        workers = worker_count,
        mode = ?settings.mode,
        "starting render"
    );

    let threads = (0..worker_count)
        .map(|worker_id| {
            let state = Arc::clone(&state);
            let started_tile_callback = Arc::clone(&started_tile_callback);
            let finished_tile_callback = Arc::clone(&finished_tile_callback);
            let core = cores.get(worker_id).copied();

            thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || {
                    if let Some(core) = core {
                        core_affinity::set_for_current(core);
                    }

                    let mut worker = Worker::new(worker_id);
                    let mut buffer =
                        RgbaImage::new(settings.tile_size.into(), settings.tile_size.into());

                    while let Some((tile_index, tile)) = state.get_next_tile() {
                        (started_tile_callback)(*tile);

                        worker.render_tile(
                            &state.scene,
                            &state.camera,
                            &state.environment,
                            &state.settings,
                            tile_index,
                            tile,
                            &mut buffer,
                        );
                        state
                            .image
                            .lock()
                            .expect("Poisoned lock!")
                            .copy_from(
                                buffer.view(0, 0, tile.width(), tile.height()).deref(),
                                tile.min.x,
                                tile.min.y,
                            )
                            .unwrap_or_else(|_| {
                                unreachable!("The buffer should always fit into the output")
                            });

                        (finished_tile_callback)(*tile);
                    }

                    let mut stats = state.stats.lock().expect("Poisoned lock!");
                    *stats = stats.merge(worker.stats());
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderProgress {
        render_state: state,
        threads,
        started: Instant::now(),
    })
}

pub struct RenderProgress {
    render_state: Arc<RenderState>,
    threads: Vec<JoinHandle<()>>,
    started: Instant,
}

impl RenderProgress {
    /// Return number of processed and total tiles.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.render_state.tile_ordering.len();
        let processed = self
            .render_state
            .next_tile_index
            .load(Ordering::Acquire)
            .min(total);
        (processed, total)
    }

    pub fn progress_percent(&self) -> f32 {
        let (processed, total) = self.progress();
        if total == 0 {
            return 100.0;
        }
        100.0 * (processed as f32) / (total as f32)
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signal the workers to abort.
    /// Any running workers will still finish their tiles, but no new ones will be started.
    pub fn abort(&self) {
        tracing::info!("aborting render");
        self.render_state
            .next_tile_index
            .store(self.render_state.tile_ordering.len(), Ordering::Release);
    }

    /// Block until all workers finish.
    pub fn wait(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.threads
            .drain(..)
            .for_each(|handle| handle.join().expect("Worker thread panicked"));
        tracing::info!(
            elapsed = ?self.started.elapsed(),
            march = %self.stats(),
            "render finished"
        );
    }

    pub fn image(&self) -> &Mutex<RgbaImage> {
        &self.render_state.image
    }

    /// March statistics of the workers that already finished.
    pub fn stats(&self) -> MarchStats {
        *self.render_state.stats.lock().expect("Poisoned lock!")
    }
}

struct RenderState {
    scene: Scene,
    camera: Camera,
    environment: Environment,
    settings: RenderSettings,

    image: Mutex<RgbaImage>,
    stats: Mutex<MarchStats>,

    tile_ordering: Vec<ScreenBlock>,
    next_tile_index: AtomicUsize,
}

impl RenderState {
    fn get_next_tile(&self) -> Option<(usize, &ScreenBlock)> {
        let id = self.next_tile_index.fetch_add(1, Ordering::AcqRel);
        self.tile_ordering.get(id).map(|tile| (id, tile))
    }
}
