use crate::error::Result;
use crate::modules::ThresholdModule;

use opencv::core::*;
use opencv::imgproc;
use opencv::prelude::*;

use itertools::Itertools;

use std::cmp::Ordering;

/// Dark objects on a light background become white on black.
pub fn otsu_inverse(frame: &Mat) -> Result<Mat> {
	let gray = if frame.channels() == 1 {
		frame.try_clone()?
	} else {
		let mut gray = Mat::default();
		imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;
		gray
	};

	let mut edges = Mat::default();
	imgproc::threshold(&gray, &mut edges, 0., 255., imgproc::THRESH_BINARY_INV | imgproc::THRESH_OTSU)?;
	Ok(edges)
}

/// Contours of a binary image ordered by increasing open perimeter.
///
/// With `epsilon` each contour is simplified with `approx_poly_dp` using
/// `epsilon * perimeter` as tolerance (0.001 works well).
pub fn significant_contours(binary: &Mat, epsilon: Option<f64>) -> Result<Vec<Vector<Point>>> {
	let mut cnts = Vector::<Vector<Point>>::new();
	imgproc::find_contours(binary, &mut cnts, imgproc::RETR_TREE, imgproc::CHAIN_APPROX_SIMPLE, Point::new(0, 0))?;
	rank_contours(cnts, epsilon)
}

/// Order contours by increasing open perimeter.
///
/// Contours are first ranked by area, largest first, so that contours sharing
/// a perimeter keep that order. The ordering always uses the unsimplified
/// perimeter.
pub fn rank_contours(cnts: Vector<Vector<Point>>, epsilon: Option<f64>) -> Result<Vec<Vector<Point>>> {
	let mut areas = Vec::with_capacity(cnts.len());
	for cnt in cnts.iter() {
		areas.push((imgproc::contour_area(&cnt, false)?, cnt));
	}

	let mut ranked = Vec::with_capacity(areas.len());
	for (_, cnt) in areas.into_iter().sorted_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal)) {
		let perimeter = imgproc::arc_length(&cnt, false)?;
		let kept = match epsilon {
			Some(epsilon) => {
				let mut approx = Vector::<Point>::new();
				imgproc::approx_poly_dp(&cnt, &mut approx, epsilon * perimeter, false)?;
				approx
			}
			None => cnt,
		};
		ranked.push((perimeter, kept));
	}

	// sorted_by is stable
	Ok(ranked
		.into_iter()
		.sorted_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
		.map(|(_, cnt)| cnt)
		.collect())
}

/// Outline the `count` longest contours of the frame in `color`. Returns how
/// many were drawn.
pub fn draw_significant_contours(frame: &mut Mat, epsilon: f64, count: usize, color: Scalar) -> Result<usize> {
	let cnts = OtsuContours::new(Some(epsilon)).run(frame)?;

	let skip = cnts.len().saturating_sub(count);
	let cnt_draw = cnts.iter().skip(skip).collect::<Vector<Vector<Point>>>();
	if cnt_draw.is_empty() {
		return Ok(0);
	}

	imgproc::draw_contours(frame, &cnt_draw, -1, color, 2, imgproc::LINE_8, &Mat::default(), i32::MAX, Point::new(0, 0))?;
	Ok(cnt_draw.len())
}

/// Inverse Otsu threshold followed by significant contour ranking.
pub struct OtsuContours {
	epsilon: Option<f64>,
}

impl ThresholdModule for OtsuContours {
	fn run(&mut self, frame: &Mat) -> Result<Vector<Vector<Point>>> {
		let edges = otsu_inverse(frame)?;
		Ok(significant_contours(&edges, self.epsilon)?.into_iter().collect())
	}
}

impl OtsuContours {
	pub fn new(epsilon: Option<f64>) -> Self {
		Self {
			epsilon: epsilon,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn canvas(width: i32, height: i32, value: f64) -> Mat {
		Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(value)).unwrap()
	}

	fn fill(frame: &mut Mat, rect: Rect, value: f64) {
		imgproc::rectangle(frame, rect, Scalar::all(value), -1, imgproc::LINE_8, 0).unwrap();
	}

	#[test]
	fn contours_are_ordered_by_perimeter() {
		let mut frame = canvas(200, 150, 0.);
		fill(&mut frame, Rect::new(10, 10, 60, 40), 255.);
		fill(&mut frame, Rect::new(100, 20, 10, 10), 255.);
		fill(&mut frame, Rect::new(120, 80, 30, 30), 255.);
		let mut binary = Mat::default();
		imgproc::cvt_color_def(&frame, &mut binary, imgproc::COLOR_BGR2GRAY).unwrap();

		let cnts = significant_contours(&binary, None).unwrap();
		assert_eq!(cnts.len(), 3);

		let perimeters = cnts.iter().map(|c| imgproc::arc_length(c, false).unwrap()).collect::<Vec<_>>();
		assert!(perimeters.windows(2).all(|w| w[0] <= w[1]), "{:?}", perimeters);

		let largest = imgproc::bounding_rect(&cnts[2]).unwrap();
		assert_eq!(largest, Rect::new(10, 10, 60, 40));
	}

	fn polyline(points: &[(i32, i32)]) -> Vector<Point> {
		points.iter().map(|&(x, y)| Point::new(x, y)).collect()
	}

	#[test]
	fn equal_perimeters_keep_area_order() {
		// both open lengths are 30; the square encloses 100, the hook 62.5
		let hook = polyline(&[(0, 0), (20, 0), (20, 5), (15, 5)]);
		let square = polyline(&[(0, 0), (10, 0), (10, 10), (0, 10)]);
		let short = polyline(&[(0, 0), (5, 0), (5, 5), (0, 5)]);
		let cnts = vec![hook.clone(), square.clone(), short.clone()].into_iter().collect::<Vector<Vector<Point>>>();

		let ranked = rank_contours(cnts, None).unwrap();
		assert_eq!(ranked.len(), 3);
		assert_eq!(ranked[0].to_vec(), short.to_vec());
		assert_eq!(ranked[1].to_vec(), square.to_vec());
		assert_eq!(ranked[2].to_vec(), hook.to_vec());
	}

	#[test]
	fn approximation_keeps_rectangles_as_quads() {
		let mut frame = canvas(120, 120, 0.);
		fill(&mut frame, Rect::new(20, 30, 50, 40), 255.);
		let mut binary = Mat::default();
		imgproc::cvt_color_def(&frame, &mut binary, imgproc::COLOR_BGR2GRAY).unwrap();

		let cnts = significant_contours(&binary, Some(0.001)).unwrap();
		assert_eq!(cnts.len(), 1);
		assert_eq!(cnts[0].len(), 4);
	}

	#[test]
	fn empty_image_has_no_contours() {
		let binary = Mat::new_rows_cols_with_default(50, 50, CV_8UC1, Scalar::all(0.)).unwrap();
		assert!(significant_contours(&binary, Some(0.001)).unwrap().is_empty());

		let mut frame = canvas(50, 50, 255.);
		assert_eq!(draw_significant_contours(&mut frame, 0.001, 3, Scalar::new(255., 100., 100., 0.)).unwrap(), 0);
	}

	#[test]
	fn overlay_outlines_dark_objects() {
		let mut frame = canvas(200, 150, 200.);
		fill(&mut frame, Rect::new(10, 10, 30, 30), 0.);
		fill(&mut frame, Rect::new(60, 10, 40, 40), 0.);
		fill(&mut frame, Rect::new(110, 10, 50, 50), 0.);
		fill(&mut frame, Rect::new(10, 100, 10, 10), 0.);

		let drawn = draw_significant_contours(&mut frame, 0.001, 3, Scalar::new(255., 100., 100., 0.)).unwrap();
		assert_eq!(drawn, 3);
		assert_eq!(*frame.at_2d::<Vec3b>(10, 110).unwrap(), Vec3b::from([255, 100, 100]));
		// the smallest square is not among the three longest contours
		assert_eq!(*frame.at_2d::<Vec3b>(100, 10).unwrap(), Vec3b::from([0, 0, 0]));
	}

	#[test]
	fn threshold_module_returns_all_contours() {
		let mut frame = canvas(100, 100, 200.);
		fill(&mut frame, Rect::new(10, 10, 20, 20), 0.);
		fill(&mut frame, Rect::new(50, 50, 30, 30), 0.);
		let mut module = OtsuContours::new(None);
		assert_eq!(module.run(&frame).unwrap().len(), 2);
	}
}
