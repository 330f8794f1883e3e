use crate::error::Result;
use crate::modules::draw::Palette;
use crate::modules::{AnalyzerModule, Displacement};
use crate::settings::OpticalFlowSettings;

use opencv::core::*;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::video;

use rand::Rng;

use std::cmp::Ordering;

use tracing::{debug, trace};

/// Sparse Lucas-Kanade tracker over Shi-Tomasi corners.
///
/// Each update reports the median motion of the points that survived since
/// the previous frame. When fewer than half of the initially found points are
/// left, fresh corners are detected and appended.
pub struct OpticalFlowTracker {
	max_corners: i32,
	quality_level: f64,
	min_distance: f64,
	block_size: i32,

	win_size: Size,
	max_level: i32,
	criteria: TermCriteria,

	palette: Palette,
	trails: bool,
	mask: Mat,

	old_gray: Mat,
	p0: Vec<Point2f>,
	reseed_below: f64,
}

impl AnalyzerModule for OpticalFlowTracker {
	fn update(&mut self, frame: &mut Mat, draw: bool) -> Result<Displacement> {
		let gray = to_gray(frame)?;

		let (good_new, good_old) = self.flow(&gray)?;

		if draw {
			for (i, new) in good_new.iter().enumerate() {
				imgproc::circle(frame, Point::new(new.x as i32, new.y as i32), 5, self.palette.get(i), -1, imgproc::LINE_8, 0)?;
			}
		}
		if self.trails {
			for (i, (new, old)) in good_new.iter().zip(good_old.iter()).enumerate() {
				imgproc::line(&mut self.mask, Point::new(new.x as i32, new.y as i32), Point::new(old.x as i32, old.y as i32), self.palette.get(i), 2, imgproc::LINE_8, 0)?;
			}
		}

		self.old_gray = gray;
		self.p0 = good_new.clone();

		if (self.p0.len() as f64) < self.reseed_below {
			let fresh = self.good_features(&self.old_gray)?;
			debug!(kept = self.p0.len(), fresh = fresh.len(), "re-seeding optical flow points");
			self.p0.extend(fresh);
			self.p0.truncate(self.max_corners as usize);
		}

		if self.trails && self.mask.size()? == frame.size()? {
			let mut out = Mat::default();
			add(&*frame, &self.mask, &mut out, &Mat::default(), -1)?;
			*frame = out;
		}

		Ok(median_displacement(&good_new, &good_old))
	}
}

impl OpticalFlowTracker {
	pub fn new(initial_frame: &Mat, settings: &OpticalFlowSettings) -> Result<Self> {
		Self::with_rng(initial_frame, settings, &mut rand::thread_rng())
	}

	pub fn with_rng<R: Rng>(initial_frame: &Mat, settings: &OpticalFlowSettings, rng: &mut R) -> Result<Self> {
		let size = initial_frame.size()?;
		let win_size = match settings.win_size {
			Some([w, h]) => Size::new(w, h),
			None => size,
		};
		let criteria = TermCriteria::new(
			TermCriteria_Type::EPS as i32 + TermCriteria_Type::COUNT as i32,
			settings.criteria_count,
			settings.criteria_eps,
		)?;

		let mut tracker = Self {
			max_corners: settings.max_corners,
			quality_level: settings.quality_level,
			min_distance: settings.min_distance,
			block_size: settings.block_size,

			win_size: win_size,
			max_level: settings.max_level,
			criteria: criteria,

			palette: Palette::random(settings.max_corners as usize, rng),
			trails: settings.trails,
			mask: Mat::zeros(size.height, size.width, initial_frame.typ())?.to_mat()?,

			old_gray: to_gray(initial_frame)?,
			p0: Vec::new(),
			reseed_below: 0.,
		};

		tracker.p0 = tracker.good_features(&tracker.old_gray)?;
		tracker.reseed_below = if tracker.p0.is_empty() {
			settings.max_corners as f64 / 2.
		} else {
			tracker.p0.len() as f64 / 2.
		};
		debug!(points = tracker.p0.len(), win_width = win_size.width, win_height = win_size.height, "optical flow tracker ready");

		Ok(tracker)
	}

	/// Points currently being followed.
	pub fn points(&self) -> &[Point2f] {
		&self.p0
	}

	fn good_features(&self, gray: &Mat) -> Result<Vec<Point2f>> {
		let mut corners = Vector::<Point2f>::new();
		imgproc::good_features_to_track(
			gray,
			&mut corners,
			self.max_corners,
			self.quality_level,
			self.min_distance,
			&Mat::default(),
			self.block_size,
			false,
			0.04,
		)?;
		Ok(corners.to_vec())
	}

	/// Points with a found flow, as (new, old) pairs.
	fn flow(&self, gray: &Mat) -> Result<(Vec<Point2f>, Vec<Point2f>)> {
		if self.p0.is_empty() {
			return Ok((Vec::new(), Vec::new()));
		}

		let prev = Vector::<Point2f>::from_slice(&self.p0);
		let mut next = Vector::<Point2f>::new();
		let mut status = Vector::<u8>::new();
		let mut err = Vector::<f32>::new();
		video::calc_optical_flow_pyr_lk(
			&self.old_gray,
			gray,
			&prev,
			&mut next,
			&mut status,
			&mut err,
			self.win_size,
			self.max_level,
			self.criteria,
			0,
			1e-4,
		)?;

		let mut good_new = Vec::with_capacity(self.p0.len());
		let mut good_old = Vec::with_capacity(self.p0.len());
		for ((new, old), st) in next.iter().zip(self.p0.iter()).zip(status.iter()) {
			if st == 1 {
				good_new.push(new);
				good_old.push(*old);
			}
		}
		trace!(tracked = good_new.len(), lost = self.p0.len() - good_new.len(), "optical flow");
		Ok((good_new, good_old))
	}
}

fn to_gray(frame: &Mat) -> Result<Mat> {
	let mut gray = Mat::default();
	imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;
	Ok(gray)
}

/// Median with the two middle values averaged for even counts.
fn median(values: &mut [f64]) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
	let mid = values.len() / 2;
	if values.len() % 2 == 0 {
		Some((values[mid - 1] + values[mid]) / 2.)
	} else {
		Some(values[mid])
	}
}

/// Per-axis median of `new - old`; zero when nothing was tracked.
fn median_displacement(good_new: &[Point2f], good_old: &[Point2f]) -> Displacement {
	let mut dx = good_new.iter().zip(good_old).map(|(n, o)| (n.x - o.x) as f64).collect::<Vec<_>>();
	let mut dy = good_new.iter().zip(good_old).map(|(n, o)| (n.y - o.y) as f64).collect::<Vec<_>>();
	match (median(&mut dx), median(&mut dy)) {
		(Some(dx), Some(dy)) => Displacement::new(dx, dy),
		_ => Displacement::default(),
	}
}
