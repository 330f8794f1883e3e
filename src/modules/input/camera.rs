use crate::error::{Error, Result};
use crate::modules::InputModule;
use crate::settings::InputSettings;

use opencv::core::*;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use tracing::{debug, info};

pub struct CameraInput {
	cap: VideoCapture,
}

impl InputModule for CameraInput {
	fn run(&mut self) -> Result<Mat> {
		let mut frame = Mat::default();
		if !self.cap.read(&mut frame)? || frame.empty() {
			debug!("camera returned no frame");
			return Err(Error::EmptyFrame);
		}
		Ok(frame)
	}
}

impl CameraInput {
	pub fn new(settings: &InputSettings) -> Result<Self> {
		let mut cap = VideoCapture::new(settings.device, videoio::CAP_ANY)?;
		if !cap.is_opened()? {
			return Err(Error::Config(format!("could not open camera device {}", settings.device)));
		}
		cap.set(videoio::CAP_PROP_FRAME_HEIGHT, settings.height as f64)?;
		cap.set(videoio::CAP_PROP_FRAME_WIDTH, settings.width as f64)?;
		cap.set(videoio::CAP_PROP_FPS, settings.fps as f64)?;
		info!(device = settings.device, width = settings.width, height = settings.height, fps = settings.fps, "camera opened");
		Ok(Self {
			cap: cap
		})
	}
}
