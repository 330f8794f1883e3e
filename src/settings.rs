use serde::Deserialize;

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Everything read from `vset.toml`. Missing sections fall back to the
/// values the buggy has always run with.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
	pub input: InputSettings,
	pub preprocess: PreprocessSettings,
	pub analyzer: AnalyzerSettings,
	pub opticalflow: OpticalFlowSettings,
	pub similarframe: SimilarFrameSettings,
	pub overlay: OverlaySettings,
	pub output: OutputSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InputSettings {
	pub device: i32,
	pub width: i32,
	pub height: i32,
	pub fps: i32,
	/// Consecutive empty reads tolerated before giving up on the camera.
	pub max_empty_frames: u32,
}

impl Default for InputSettings {
	fn default() -> Self {
		Self {
			device: 0,
			width: 320,
			height: 240,
			fps: 30,
			max_empty_frames: 30,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
	/// Pixel multiplier, 1.0 leaves the frame alone.
	pub contrast: f64,
	/// Median blur aperture, 0 disables.
	pub blur: i32,
}

impl Default for PreprocessSettings {
	fn default() -> Self {
		Self {
			contrast: 1.0,
			blur: 0,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
	OpticalFlow,
	SimilarFrame,
}

impl std::str::FromStr for AnalyzerKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"opticalflow" => Ok(AnalyzerKind::OpticalFlow),
			"similarframe" => Ok(AnalyzerKind::SimilarFrame),
			other => Err(Error::Config(format!("unknown analyzer `{}`", other))),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
	pub kind: AnalyzerKind,
	pub draw: bool,
}

impl Default for AnalyzerSettings {
	fn default() -> Self {
		Self {
			kind: AnalyzerKind::OpticalFlow,
			draw: true,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OpticalFlowSettings {
	pub max_corners: i32,
	pub quality_level: f64,
	pub min_distance: f64,
	pub block_size: i32,
	/// LK search window; the whole frame when unset.
	pub win_size: Option<[i32; 2]>,
	pub max_level: i32,
	pub criteria_count: i32,
	pub criteria_eps: f64,
	/// Accumulate a line per tracked point into a persistent overlay.
	pub trails: bool,
}

impl Default for OpticalFlowSettings {
	fn default() -> Self {
		Self {
			max_corners: 100,
			quality_level: 0.3,
			min_distance: 7.,
			block_size: 7,
			win_size: None,
			max_level: 5,
			criteria_count: 10,
			criteria_eps: 0.03,
			trails: false,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimilarFrameSettings {
	/// Fraction of the frame between the edge and the centre box.
	pub boundary: f64,
	pub nfeatures: i32,
	pub ratio: f32,
	pub min_match_count: usize,
	pub ransac_threshold: f64,
}

impl Default for SimilarFrameSettings {
	fn default() -> Self {
		Self {
			boundary: 1. / 3.,
			nfeatures: 1000,
			ratio: 0.75,
			min_match_count: 10,
			ransac_threshold: 3.,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
	pub contours: bool,
	pub contour_epsilon: f64,
	pub contour_count: usize,
	/// BGR
	pub contour_color: [f64; 3],
	pub min_max: bool,
	pub position: bool,
	pub position_reverse: bool,
	pub fps: bool,
}

impl Default for OverlaySettings {
	fn default() -> Self {
		Self {
			contours: false,
			contour_epsilon: 0.001,
			contour_count: 3,
			contour_color: [255., 100., 100.],
			min_max: false,
			position: true,
			position_reverse: true,
			fps: true,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
	pub jpeg: bool,
	pub jpeg_quality: i32,
	pub networktables: Option<NetworkTableSettings>,
}

impl Default for OutputSettings {
	fn default() -> Self {
		Self {
			jpeg: true,
			jpeg_quality: 80,
			networktables: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct NetworkTableSettings {
	pub ip: String,
}

impl VisionSettings {
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let content = fs::read_to_string(path)?;
		Self::parse(&content)
	}

	pub fn parse(content: &str) -> Result<Self> {
		let vset: VisionSettings = toml::from_str(content)?;
		vset.validate()?;
		Ok(vset)
	}

	pub fn validate(&self) -> Result<()> {
		if self.input.width <= 0 || self.input.height <= 0 {
			return Err(Error::Config(format!("frame size must be positive, got {}x{}", self.input.width, self.input.height)));
		}
		let blur = self.preprocess.blur;
		if blur < 0 || (blur != 0 && blur % 2 == 0) {
			return Err(Error::Config(format!("median blur size must be odd, got {}", blur)));
		}
		if self.preprocess.contrast < 0. {
			return Err(Error::Config("contrast scale must not be negative".to_string()));
		}
		if self.opticalflow.max_corners <= 0 {
			return Err(Error::Config("opticalflow.max_corners must be at least 1".to_string()));
		}
		if let Some([w, h]) = self.opticalflow.win_size {
			if w <= 0 || h <= 0 {
				return Err(Error::Config(format!("opticalflow.win_size must be positive, got {}x{}", w, h)));
			}
		}
		let boundary = self.similarframe.boundary;
		if !(boundary > 0. && boundary < 0.5) {
			return Err(Error::Config(format!("similarframe.boundary must be in (0, 0.5), got {}", boundary)));
		}
		let ratio = self.similarframe.ratio;
		if !(ratio > 0. && ratio <= 1.) {
			return Err(Error::Config(format!("similarframe.ratio must be in (0, 1], got {}", ratio)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_file_uses_defaults() {
		let vset = VisionSettings::parse("").unwrap();
		assert_eq!(vset.input.width, 320);
		assert_eq!(vset.analyzer.kind, AnalyzerKind::OpticalFlow);
		assert_eq!(vset.opticalflow.max_corners, 100);
		assert!(vset.opticalflow.win_size.is_none());
		assert_eq!(vset.similarframe.min_match_count, 10);
		assert_eq!(vset.input.max_empty_frames, 30);
		assert_eq!(vset.overlay.contour_color, [255., 100., 100.]);
	}

	#[test]
	fn sections_override_defaults() {
		let vset = VisionSettings::parse(
			r#"
			[input]
			width = 640
			height = 480

			[analyzer]
			kind = "similarframe"
			draw = false

			[opticalflow]
			win_size = [21, 21]

			[overlay]
			contour_color = [0.0, 0.0, 255.0]

			[output.networktables]
			ip = "10.43.8.2"
			"#,
		)
		.unwrap();
		assert_eq!(vset.input.width, 640);
		assert_eq!(vset.input.fps, 30);
		assert_eq!(vset.analyzer.kind, AnalyzerKind::SimilarFrame);
		assert!(!vset.analyzer.draw);
		assert_eq!(vset.opticalflow.win_size, Some([21, 21]));
		assert_eq!(vset.overlay.contour_color, [0., 0., 255.]);
		assert_eq!(vset.output.networktables.unwrap().ip, "10.43.8.2");
	}

	#[test]
	fn even_blur_is_rejected() {
		let err = VisionSettings::parse("[preprocess]\nblur = 4\n").unwrap_err();
		assert!(matches!(err, Error::Config(_)));
	}

	#[test]
	fn bad_boundary_is_rejected() {
		assert!(VisionSettings::parse("[similarframe]\nboundary = 0.5\n").is_err());
	}

	#[test]
	fn unknown_analyzer_name() {
		assert_eq!("similarframe".parse::<AnalyzerKind>().unwrap(), AnalyzerKind::SimilarFrame);
		assert!("kalman".parse::<AnalyzerKind>().is_err());
	}
}
