//! Frame annotation helpers shared by the analyzers and the main loop.

use crate::error::Result;
use crate::modules::Displacement;

use opencv::core::*;
use opencv::imgproc;
use opencv::prelude::*;

use rand::Rng;

/// Fixed set of random BGR colors, one per tracked point slot.
#[derive(Clone, Debug)]
pub struct Palette {
	colors: Vec<Scalar>,
}

impl Palette {
	pub fn random<R: Rng>(size: usize, rng: &mut R) -> Self {
		let colors = (0..size.max(1))
			.map(|_| random_color(rng))
			.collect();
		Self { colors }
	}

	pub fn len(&self) -> usize {
		self.colors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.colors.is_empty()
	}

	/// Wraps around when `index` exceeds the palette size.
	pub fn get(&self, index: usize) -> Scalar {
		self.colors[index % self.colors.len()]
	}
}

pub fn random_color<R: Rng>(rng: &mut R) -> Scalar {
	Scalar::new(
		rng.gen_range(0..255) as f64,
		rng.gen_range(0..255) as f64,
		rng.gen_range(0..255) as f64,
		0.,
	)
}

/// Multiply every pixel by `scale`, truncating toward zero and saturating to
/// the u8 range.
pub fn contrast(image: &Mat, scale: f64) -> Result<Mat> {
	let mut out = if image.depth() == CV_8U {
		image.try_clone()?
	} else {
		let mut bytes = Mat::default();
		image.convert_to(&mut bytes, CV_8U, 1., 0.)?;
		bytes
	};
	for v in out.data_bytes_mut()? {
		*v = (*v as f64 * scale).clamp(0., 255.) as u8;
	}
	Ok(out)
}

/// Median blur with an odd aperture `size`.
pub fn blur(frame: &Mat, size: i32) -> Result<Mat> {
	let mut out = Mat::default();
	imgproc::median_blur(frame, &mut out, size)?;
	Ok(out)
}

/// Mark the darkest and brightest pixel. The brightest gets a random color,
/// the darkest its complement. Returns `(min_loc, max_loc)`.
pub fn draw_min_max<R: Rng>(frame: &mut Mat, rng: &mut R) -> Result<(Point, Point)> {
	let mut gray = Mat::default();
	imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

	let mut min_loc = Point::default();
	let mut max_loc = Point::default();
	min_max_loc(&gray, None, None, Some(&mut min_loc), Some(&mut max_loc), &Mat::default())?;

	let color = random_color(rng);
	let inverse = Scalar::new(255. - color[0], 255. - color[1], 255. - color[2], 0.);
	imgproc::circle(frame, max_loc, 4, color, 2, imgproc::LINE_8, 0)?;
	imgproc::circle(frame, min_loc, 4, inverse, 2, imgproc::LINE_8, 0)?;
	Ok((min_loc, max_loc))
}

/// Mark an accumulated position. With `reverse` the position is mirrored
/// through the frame centre so motion to the right draws to the left.
/// Returns the pixel the marker was centred on.
pub fn draw_position<R: Rng>(frame: &mut Mat, width: i32, height: i32, position: Displacement, reverse: bool, rng: &mut R) -> Result<Point> {
	let color = Scalar::new(
		position.dx.rem_euclid(256.),
		position.dy.rem_euclid(256.),
		rng.gen_range(0..255) as f64,
		0.,
	);

	let center = if reverse {
		Point::new((width as f64 - position.dx) as i32, (height as f64 - position.dy) as i32)
	} else {
		Point::new(position.dx as i32, position.dy as i32)
	};

	imgproc::circle(frame, center, 4, color, 2, imgproc::LINE_8, 0)?;
	Ok(center)
}

#[cfg(test)]
mod tests {
	use super::*;

	use rand::rngs::StdRng;
	use rand::SeedableRng;

	fn gray(width: i32, height: i32, value: f64) -> Mat {
		Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(value)).unwrap()
	}

	#[test]
	fn contrast_saturates() {
		let image = gray(4, 4, 100.);
		let bright = contrast(&image, 3.).unwrap();
		assert_eq!(*bright.at_2d::<u8>(0, 0).unwrap(), 255);

		let dim = contrast(&image, 0.5).unwrap();
		assert_eq!(*dim.at_2d::<u8>(3, 3).unwrap(), 50);
		assert_eq!(dim.typ(), CV_8UC1);
	}

	#[test]
	fn contrast_truncates() {
		let image = gray(4, 4, 3.);
		assert_eq!(*contrast(&image, 0.5).unwrap().at_2d::<u8>(0, 0).unwrap(), 1);
		assert_eq!(*contrast(&image, 1.3).unwrap().at_2d::<u8>(2, 1).unwrap(), 3);

		let color = Mat::new_rows_cols_with_default(2, 2, CV_8UC3, Scalar::new(3., 5., 7., 0.)).unwrap();
		let out = contrast(&color, 0.5).unwrap();
		assert_eq!(*out.at_2d::<Vec3b>(1, 1).unwrap(), Vec3b::from([1, 2, 3]));
	}

	#[test]
	fn blur_removes_salt() {
		let mut image = gray(9, 9, 10.);
		*image.at_2d_mut::<u8>(4, 4).unwrap() = 255;
		let smooth = blur(&image, 3).unwrap();
		assert_eq!(*smooth.at_2d::<u8>(4, 4).unwrap(), 10);
	}

	#[test]
	fn min_max_locations() {
		let mut frame = Mat::new_rows_cols_with_default(40, 60, CV_8UC3, Scalar::all(128.)).unwrap();
		*frame.at_2d_mut::<Vec3b>(30, 50).unwrap() = Vec3b::from([255, 255, 255]);
		*frame.at_2d_mut::<Vec3b>(5, 7).unwrap() = Vec3b::from([0, 0, 0]);

		let mut rng = StdRng::seed_from_u64(7);
		let (min_loc, max_loc) = draw_min_max(&mut frame, &mut rng).unwrap();
		assert_eq!(min_loc, Point::new(7, 5));
		assert_eq!(max_loc, Point::new(50, 30));
	}

	#[test]
	fn position_is_mirrored() {
		let mut frame = Mat::new_rows_cols_with_default(50, 100, CV_8UC3, Scalar::all(0.)).unwrap();
		let mut rng = StdRng::seed_from_u64(1);

		let center = draw_position(&mut frame, 100, 50, Displacement::new(10., 20.), true, &mut rng).unwrap();
		assert_eq!(center, Point::new(90, 30));

		let center = draw_position(&mut frame, 100, 50, Displacement::new(10.7, 20.2), false, &mut rng).unwrap();
		assert_eq!(center, Point::new(10, 20));
	}

	#[test]
	fn far_positions_saturate() {
		let mut frame = Mat::new_rows_cols_with_default(50, 100, CV_8UC3, Scalar::all(0.)).unwrap();
		let mut rng = StdRng::seed_from_u64(2);

		let center = draw_position(&mut frame, 100, 50, Displacement::new(-1e10, 1e10), true, &mut rng).unwrap();
		assert_eq!(center, Point::new(i32::MAX, i32::MIN));

		let center = draw_position(&mut frame, 100, 50, Displacement::new(-1e10, 0.), false, &mut rng).unwrap();
		assert_eq!(center, Point::new(i32::MIN, 0));
	}

	#[test]
	fn palette_wraps() {
		let mut rng = StdRng::seed_from_u64(3);
		let palette = Palette::random(5, &mut rng);
		assert_eq!(palette.len(), 5);
		assert_eq!(palette.get(1), palette.get(6));
		for i in 0..5 {
			let c = palette.get(i);
			assert!(c[0] < 255. && c[1] < 255. && c[2] < 255.);
		}
	}
}
