use opencv::prelude::*;
use opencv::imgproc;
use opencv::core::*;

use anyhow::{Context, Result};

use clap::Parser;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use buggyvision::settings::{AnalyzerKind, VisionSettings};

use buggyvision::modules::{analyzer, draw, threshold};
use buggyvision::modules::{AnalyzerModule, Displacement, OutputData};

use buggyvision::modules::input::{CameraInput, EmptyFrameGuard};

use buggyvision::modules::OutputModule;
use buggyvision::modules::output::JpegStdout;

#[derive(Parser, Debug)]
#[command(name = "buggyvision", about = "Camera frame analysis for the self-driving buggy")]
struct Args {
	/// Vision settings file
	#[arg(long, default_value = "vset.toml")]
	config: PathBuf,
	/// Override the analyzer from the settings file (opticalflow, similarframe)
	#[arg(long)]
	analyzer: Option<AnalyzerKind>,
	/// Skip analyzer annotations
	#[arg(long)]
	no_draw: bool,
	/// Stop after this many frames
	#[arg(long)]
	frames: Option<u64>,
}

// Main
fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();

	let args = Args::parse();

	//Load Vision Settings
	let vset = VisionSettings::load(&args.config)
		.with_context(|| format!("failed to load {}", args.config.display()))?;
	let kind = args.analyzer.unwrap_or(vset.analyzer.kind);
	let draw_analyzer = vset.analyzer.draw && !args.no_draw;
	info!(?kind, draw = draw_analyzer, "starting buggyvision");

	//Input Module
	let camera = CameraInput::new(&vset.input).context("failed to open camera")?;
	let mut input = EmptyFrameGuard::new(camera, vset.input.max_empty_frames);
	let retry_delay = Duration::from_millis(1000 / vset.input.fps.max(1) as u64);

	//Output Modules
	let mut output_modules = Vec::<Box<dyn OutputModule>>::new();
	if vset.output.jpeg {
		output_modules.push(Box::new(JpegStdout::new(vset.output.jpeg_quality)));
	}
	#[cfg(feature = "networktables")]
	if let Some(nt_settings) = &vset.output.networktables {
		let table = buggyvision::modules::output::NetworkTable::connect(nt_settings)
			.context("failed to connect to networktables")?;
		output_modules.push(Box::new(table));
	}
	#[cfg(not(feature = "networktables"))]
	if vset.output.networktables.is_some() {
		warn!("networktables output configured but the feature is not compiled in");
	}

	let mut rng = rand::thread_rng();
	let mut tracker: Option<Box<dyn AnalyzerModule>> = None;
	let mut position = Displacement::default();
	let mut frame_count: u64 = 0;

	//Main Vision Loop
	loop {
		if let Some(limit) = args.frames {
			if frame_count >= limit {
				break;
			}
		}

		// FPS
		let e1 = get_tick_count()?;

		// empty reads count toward --frames
		let frame = match input.next_frame().context("failed to read frame")? {
			Some(frame) => frame,
			None => {
				frame_count += 1;
				thread::sleep(retry_delay);
				continue;
			}
		};
		let mut frame = preprocess(frame, &vset)?;

		let displacement = match tracker.as_mut() {
			Some(tracker) => tracker.update(&mut frame, draw_analyzer)?,
			None => {
				tracker = Some(analyzer::build(kind, &frame, &vset)?);
				Displacement::default()
			}
		};
		position += displacement;
		debug!(frame = frame_count, dx = displacement.dx, dy = displacement.dy, x = position.dx, y = position.dy, "analyzed");

		let size = frame.size()?;
		if vset.overlay.contours {
			let [b, g, r] = vset.overlay.contour_color;
			threshold::draw_significant_contours(&mut frame, vset.overlay.contour_epsilon, vset.overlay.contour_count, Scalar::new(b, g, r, 0.))?;
		}
		if vset.overlay.min_max {
			draw::draw_min_max(&mut frame, &mut rng)?;
		}
		if vset.overlay.position {
			draw::draw_position(&mut frame, size.width, size.height, position, vset.overlay.position_reverse, &mut rng)?;
		}

		// FPS
		let e2 = get_tick_count()?;
		let fps = 1. / ((e2 as f64 - e1 as f64) / get_tick_frequency()?);

		if vset.overlay.fps {
			imgproc::put_text(&mut frame, &format!("{}", fps as usize), Point::new(10, size.height / 8), imgproc::FONT_HERSHEY_DUPLEX, 0.5, Scalar::new(255., 255., 0., 0.), 2, imgproc::LINE_8, false)?;
		}

		let data = OutputData {
			displacement: displacement,
			position: position,
			fps: fps,
		};
		for module in output_modules.iter_mut() {
			module.run(&frame, &data)?;
		}

		frame_count += 1;
	}

	info!(frames = frame_count, x = position.dx, y = position.dy, "done");
	Ok(())
}

fn preprocess(frame: Mat, vset: &VisionSettings) -> Result<Mat> {
	let mut frame = frame;
	if vset.preprocess.contrast != 1. {
		frame = draw::contrast(&frame, vset.preprocess.contrast)?;
	}
	if vset.preprocess.blur > 1 {
		frame = draw::blur(&frame, vset.preprocess.blur)?;
	}
	Ok(frame)
}
