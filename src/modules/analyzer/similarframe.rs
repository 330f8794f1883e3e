use crate::error::Result;
use crate::modules::planetracker::PlaneTracker;
use crate::modules::{AnalyzerModule, Displacement};
use crate::settings::SimilarFrameSettings;

use opencv::core::*;
use opencv::imgproc;
use opencv::prelude::*;

use tracing::{debug, warn};

/// Follows the previous frame as a planar target and reports how far its
/// centre has drifted from the middle of the image.
pub struct SimilarFrameTracker {
	width: i32,
	height: i32,

	x_boundary: (i32, i32),
	y_boundary: (i32, i32),

	tracker: PlaneTracker,
}

impl AnalyzerModule for SimilarFrameTracker {
	fn update(&mut self, frame: &mut Mat, draw: bool) -> Result<Displacement> {
		let tracked = self.tracker.track(frame)?;
		let reference = frame.try_clone()?;

		let found = match tracked.first() {
			Some(found) => found,
			None => {
				warn!("lost the previous frame, re-targeting");
				self.retarget(&reference)?;
				return Ok(Displacement::default());
			}
		};

		let (cx, cy) = Self::centroid(&found.quad);
		if draw {
			let q = &found.quad;
			let color = Scalar::new(
				(q[0].x as f64).rem_euclid(256.),
				(q[0].y as f64).rem_euclid(256.),
				(q[1].x as f64).rem_euclid(256.),
				0.,
			);

			let outline = q.iter().map(|p| Point::new(p.x as i32, p.y as i32)).collect::<Vector<Point>>();
			let mut polygons = Vector::<Vector<Point>>::new();
			polygons.push(outline);
			imgproc::polylines(frame, &polygons, true, color, 2, imgproc::LINE_8, 0)?;

			for p in found.p1.iter() {
				imgproc::circle(frame, Point::new(p.x as i32, p.y as i32), 4, color, 2, imgproc::LINE_8, 0)?;
			}
			imgproc::circle(frame, Point::new(cx as i32, cy as i32), 4, color, 2, imgproc::LINE_8, 0)?;
			imgproc::rectangle(frame, self.boundary(), color, 1, imgproc::LINE_8, 0)?;
		}

		let delta = Displacement::new(self.width as f64 / 2. - cx, self.height as f64 / 2. - cy);
		debug!(inliers = found.p0.len(), dx = delta.dx, dy = delta.dy, "similar frame");

		self.retarget(&reference)?;
		Ok(delta)
	}
}

impl SimilarFrameTracker {
	pub fn new(initial_frame: &Mat, settings: &SimilarFrameSettings) -> Result<Self> {
		let size = initial_frame.size()?;
		let boundary = settings.boundary;

		let mut tracker = Self {
			width: size.width,
			height: size.height,

			x_boundary: ((size.width as f64 * boundary) as i32, ((1. - boundary) * size.width as f64) as i32),
			y_boundary: ((size.height as f64 * boundary) as i32, ((1. - boundary) * size.height as f64) as i32),

			tracker: PlaneTracker::new(settings)?,
		};
		tracker.retarget(initial_frame)?;
		Ok(tracker)
	}

	/// Mean of the four quad corners.
	pub fn centroid(quad: &[Point2f; 4]) -> (f64, f64) {
		let x = quad.iter().map(|p| p.x as f64).sum::<f64>() / 4.;
		let y = quad.iter().map(|p| p.y as f64).sum::<f64>() / 4.;
		(x, y)
	}

	/// The central box drawn as a steering reference.
	pub fn boundary(&self) -> Rect {
		Rect::new(
			self.x_boundary.0,
			self.y_boundary.0,
			self.x_boundary.1 - self.x_boundary.0,
			self.y_boundary.1 - self.y_boundary.0,
		)
	}

	pub fn plane_tracker(&self) -> &PlaneTracker {
		&self.tracker
	}

	fn retarget(&mut self, frame: &Mat) -> Result<()> {
		self.tracker.clear();
		self.tracker.add_full_target(frame)?;
		Ok(())
	}
}
