mod jpeg;
#[cfg(feature = "networktables")]
mod networktable;

pub use jpeg::{to_jpeg, JpegStdout};
#[cfg(feature = "networktables")]
pub use networktable::NetworkTable;
