mod opticalflow;
mod similarframe;

pub use opticalflow::OpticalFlowTracker;
pub use similarframe::SimilarFrameTracker;

use crate::error::Result;
use crate::modules::AnalyzerModule;
use crate::settings::{AnalyzerKind, VisionSettings};

use opencv::core::Mat;

/// Build the configured analyzer around the first frame of the stream.
pub fn build(kind: AnalyzerKind, initial_frame: &Mat, vset: &VisionSettings) -> Result<Box<dyn AnalyzerModule>> {
	Ok(match kind {
		AnalyzerKind::OpticalFlow => Box::new(OpticalFlowTracker::new(initial_frame, &vset.opticalflow)?),
		AnalyzerKind::SimilarFrame => Box::new(SimilarFrameTracker::new(initial_frame, &vset.similarframe)?),
	})
}
