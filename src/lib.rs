//! Camera frame analysis for the buggy: contour sorting, sparse optical flow,
//! similar-frame plane tracking and overlay drawing on top of OpenCV.

pub mod error;
pub mod modules;
pub mod settings;

pub use error::{Error, Result};
pub use modules::analyzer::{OpticalFlowTracker, SimilarFrameTracker};
pub use modules::planetracker::{PlaneTracker, TrackedTarget};
pub use modules::{AnalyzerModule, Displacement};
pub use settings::VisionSettings;
