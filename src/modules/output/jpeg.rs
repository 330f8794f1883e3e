use crate::error::Result;
use crate::modules::{OutputData, OutputModule};

use opencv::core::*;
use opencv::imgcodecs::{self, imencode};

use std::io::{self, Write};

/// Streams every annotated frame to stdout as a JPEG, ready to be piped into
/// an MJPEG server.
pub struct JpegStdout {
	params: Vector<i32>,
}

impl OutputModule for JpegStdout {
	fn run(&mut self, frame: &Mat, _data: &OutputData) -> Result<()> {
		let jpeg = to_jpeg(frame, &self.params)?;
		let mut stdout = io::stdout();
		stdout.write_all(&jpeg)?;
		stdout.flush()?;
		Ok(())
	}
}

impl JpegStdout {
	pub fn new(quality: i32) -> Self {
		Self {
			params: Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality.clamp(1, 100)]),
		}
	}
}

pub fn to_jpeg(frame: &Mat, params: &Vector<i32>) -> Result<Vec<u8>> {
	let mut jpeg = Vector::new();
	imencode(".jpg", frame, &mut jpeg, params)?;
	Ok(jpeg.to_vec())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn frames_encode_as_jpeg() {
		let frame = Mat::new_rows_cols_with_default(24, 32, CV_8UC3, Scalar::new(255., 0., 0., 0.)).unwrap();
		let jpeg = to_jpeg(&frame, &Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, 90])).unwrap();
		assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
		assert_eq!(&jpeg[jpeg.len() - 2..], &[0xff, 0xd9]);
	}
}
