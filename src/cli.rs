use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use indicatif::ProgressBar;
use whirlmarch::{
    RenderMode, SceneFile,
    geometry::ScreenSize,
    render,
    scene::generation::SceneGenerator,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    Trace,
    March,
    Hybrid,
    NoiseSlice,
}

/// Renders a scene file (or a randomly generated scene) into an image.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON scene file. A random scene is generated when missing.
    scene: Option<PathBuf>,

    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    /// Overrides the render mode of the scene file, using default settings for it.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Samples per pixel
    #[arg(long)]
    samples: Option<NonZeroU32>,

    /// Seed of the pixel jitter and of the generated scene
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    workers: Option<NonZeroUsize>,

    #[arg(long, requires = "height")]
    width: Option<u32>,

    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Log tile progress and scene details
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, file: &mut SceneFile) {
        let render = &mut file.render;
        match (self.mode, render.mode) {
            (Some(Mode::Trace), RenderMode::Trace(_))
            | (Some(Mode::March), RenderMode::March(_))
            | (Some(Mode::Hybrid), RenderMode::Hybrid { .. })
            | (Some(Mode::NoiseSlice), RenderMode::NoiseSlice(_))
            | (None, _) => {}
            (Some(Mode::Trace), _) => render.mode = RenderMode::Trace(Default::default()),
            (Some(Mode::March), _) => render.mode = RenderMode::March(Default::default()),
            (Some(Mode::NoiseSlice), _) => render.mode = RenderMode::NoiseSlice(Default::default()),
            (Some(Mode::Hybrid), _) => {
                render.mode = RenderMode::Hybrid {
                    trace: Default::default(),
                    march: Default::default(),
                }
            }
        }
        if let Some(samples) = self.samples {
            render.sample_count = samples;
        }
        if let Some(seed) = self.seed {
            render.seed = seed;
            file.scene.seed = seed;
        }
        if self.workers.is_some() {
            render.worker_count = self.workers;
        }
        if let (Some(width), Some(height)) = (self.width, self.height) {
            file.camera.resolution = ScreenSize::new(width, height);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let (mut file, base_dir) = match &args.scene {
        Some(path) => (
            SceneFile::open(path).with_context(|| format!("Loading {}", path.display()))?,
            path.parent().unwrap_or(Path::new(".")).to_owned(),
        ),
        None => {
            let mut file = SceneFile::default();
            file.scene.generator = Some(SceneGenerator::default());
            (file, PathBuf::from("."))
        }
    };
    args.apply(&mut file);
    let job = file.build(&base_dir)?;

    let bar = ProgressBar::no_length();
    let mut render_progress = render(job.scene, job.camera, job.environment, job.settings, |_| {}, {
        let bar = bar.clone();
        move |_| bar.inc(1)
    })?;
    bar.set_length(render_progress.progress().1 as u64);

    render_progress.wait();
    bar.finish();

    let image = render_progress.image().lock().expect("Poisoned lock!");
    image
        .save(&args.output)
        .with_context(|| format!("Saving {}", args.output.display()))?;
    tracing::info!(output = %args.output.display(), "image saved");

    Ok(())
}
