use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use image3d_slicer::{DummySource, PlaneAxis, Session, SessionConfig};

/// Render the orthogonal planes of a recording to PNG files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session configuration (JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Frame to render (0-based)
    #[arg(long = "frame", value_name = "N", default_value_t = 0)]
    frame: usize,

    /// Output directory
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// Also render whole-volume slices through the center of the volume
    #[arg(long = "volume")]
    volume: bool,

    /// Playback rate override in frames per second (1-70)
    #[arg(long = "fps", value_name = "FPS")]
    fps: Option<f64>,

    /// Disable the color-flow overlay
    #[arg(long = "no-flow")]
    no_flow: bool,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn file_name(axis: PlaneAxis) -> &'static str {
    match axis {
        PlaneAxis::XY => "xy",
        PlaneAxis::XZ => "xz",
        PlaneAxis::ZY => "zy",
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if args.no_flow {
        config.enable_flow = false;
    }

    let mut session =
        Session::open(Box::new(DummySource::new()), config).context("loading volume source")?;
    if let Some(fps) = args.fps {
        session.set_frame_rate(fps)?;
    }

    let summary = session.summary();
    info!(
        "{} ({}): {} frames, {:?}",
        summary.sop_instance_uid, summary.probe.name, summary.frame_count, summary.playback
    );

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let set = session.render_planes(args.frame)?;
    for plane in &set.planes {
        let path = args
            .out
            .join(format!("{}_{:03}.png", file_name(plane.axis), set.selection.reference));
        plane
            .image
            .save(&path)
            .with_context(|| format!("saving {}", path.display()))?;
        info!("wrote {}", path.display());
    }

    if args.volume {
        let frame = set.selection.reference;
        let dims = session.volume_frame(frame)?.dims();
        for axis in PlaneAxis::ALL {
            let slice = session.render_volume_slice(frame, axis, dims[axis.depth_axis()] / 2)?;
            let path = args
                .out
                .join(format!("volume_{}_{:03}.png", file_name(axis), frame));
            slice
                .image
                .save(&path)
                .with_context(|| format!("saving {}", path.display()))?;
            info!("wrote {} at {:.4} m", path.display(), slice.distance);
        }
    }

    Ok(())
}
