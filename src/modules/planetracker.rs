//! Planar target tracking.
//!
//! Targets are rectangles of a reference image. Each frame is matched against
//! every target with ORB descriptors, and a RANSAC homography maps the target
//! rectangle into the frame.

use crate::error::Result;
use crate::settings::SimilarFrameSettings;

use opencv::calib3d;
use opencv::core::*;
use opencv::features2d::{self, BFMatcher, ORB};
use opencv::prelude::*;

use itertools::Itertools;

use tracing::trace;

/// Keypoints and descriptors of one image.
pub struct FeatureSet {
	pub keypoints: Vector<KeyPoint>,
	pub descriptors: Mat,
}

impl FeatureSet {
	pub fn len(&self) -> usize {
		self.keypoints.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keypoints.is_empty()
	}
}

pub struct PlaneTarget {
	pub image: Mat,
	pub rect: Rect,
	pub features: FeatureSet,
}

/// A target found in a frame.
pub struct TrackedTarget {
	/// Index into the tracker's targets.
	pub target: usize,
	/// Inlier points in target coordinates.
	pub p0: Vec<Point2f>,
	/// The matching inlier points in frame coordinates.
	pub p1: Vec<Point2f>,
	pub homography: Mat,
	/// Target rectangle corners projected into the frame, clockwise from top-left.
	pub quad: [Point2f; 4],
}

pub struct PlaneTracker {
	detector: Ptr<ORB>,
	matcher: BFMatcher,
	targets: Vec<PlaneTarget>,
	ratio: f32,
	min_match_count: usize,
	ransac_threshold: f64,
}

impl PlaneTracker {
	pub fn new(settings: &SimilarFrameSettings) -> Result<Self> {
		let detector = ORB::create(
			settings.nfeatures,
			1.2,
			8,
			31,
			0,
			2,
			features2d::ORB_ScoreType::HARRIS_SCORE,
			31,
			20,
		)?;
		let matcher = BFMatcher::new(NORM_HAMMING, false)?;
		Ok(Self {
			detector: detector,
			matcher: matcher,
			targets: Vec::new(),
			ratio: settings.ratio,
			min_match_count: settings.min_match_count,
			ransac_threshold: settings.ransac_threshold,
		})
	}

	pub fn targets(&self) -> &[PlaneTarget] {
		&self.targets
	}

	pub fn clear(&mut self) {
		self.targets.clear();
	}

	/// Add the part of `image` inside `rect` as a target. Returns its index.
	pub fn add_target(&mut self, image: &Mat, rect: Rect) -> Result<usize> {
		let all = self.detect_features(image)?;

		let mut keypoints = Vector::<KeyPoint>::new();
		let mut rows = Vec::new();
		for (i, kp) in all.keypoints.iter().enumerate() {
			if rect.contains(Point::new(kp.pt().x as i32, kp.pt().y as i32)) {
				keypoints.push(kp);
				rows.push(i as i32);
			}
		}

		let mut descriptors = Mat::default();
		for row in rows {
			descriptors.push_back(&all.descriptors.row(row)?.try_clone()?)?;
		}

		self.targets.push(PlaneTarget {
			image: image.try_clone()?,
			rect: rect,
			features: FeatureSet {
				keypoints,
				descriptors,
			},
		});
		Ok(self.targets.len() - 1)
	}

	pub fn add_full_target(&mut self, image: &Mat) -> Result<usize> {
		let size = image.size()?;
		self.add_target(image, Rect::new(0, 0, size.width, size.height))
	}

	/// Locate every target in `frame`, best supported first.
	pub fn track(&mut self, frame: &Mat) -> Result<Vec<TrackedTarget>> {
		let frame_features = self.detect_features(frame)?;
		if frame_features.len() < self.min_match_count {
			trace!(keypoints = frame_features.len(), "too few keypoints in frame");
			return Ok(Vec::new());
		}

		let mut tracked = Vec::new();
		for (index, target) in self.targets.iter().enumerate() {
			if target.features.len() < self.min_match_count {
				continue;
			}

			let mut knn = Vector::<Vector<DMatch>>::new();
			self.matcher.knn_train_match(&frame_features.descriptors, &target.features.descriptors, &mut knn, 2, &Mat::default(), false)?;

			let mut p0 = Vector::<Point2f>::new();
			let mut p1 = Vector::<Point2f>::new();
			for pair in knn.iter() {
				if pair.len() != 2 {
					continue;
				}
				let (best, second) = (pair.get(0)?, pair.get(1)?);
				if best.distance < second.distance * self.ratio {
					p0.push(target.features.keypoints.get(best.train_idx as usize)?.pt());
					p1.push(frame_features.keypoints.get(best.query_idx as usize)?.pt());
				}
			}
			if p0.len() < self.min_match_count {
				trace!(target = index, matches = p0.len(), "too few matches");
				continue;
			}

			let mut status = Vector::<u8>::new();
			let homography = calib3d::find_homography(&p0, &p1, &mut status, calib3d::RANSAC, self.ransac_threshold)?;
			if homography.empty() {
				continue;
			}

			let inliers = status.iter().zip(p0.iter().zip(p1.iter())).filter(|(s, _)| *s != 0).map(|(_, pair)| pair).collect::<Vec<_>>();
			if inliers.len() < self.min_match_count {
				trace!(target = index, inliers = inliers.len(), "too few inliers");
				continue;
			}
			let (p0, p1): (Vec<Point2f>, Vec<Point2f>) = inliers.into_iter().unzip();

			let r = target.rect;
			let corners = Vector::<Point2f>::from_iter(vec![
				Point2f::new(r.x as f32, r.y as f32),
				Point2f::new((r.x + r.width) as f32, r.y as f32),
				Point2f::new((r.x + r.width) as f32, (r.y + r.height) as f32),
				Point2f::new(r.x as f32, (r.y + r.height) as f32),
			]);
			let mut projected = Vector::<Point2f>::new();
			perspective_transform(&corners, &mut projected, &homography)?;
			let quad = [projected.get(0)?, projected.get(1)?, projected.get(2)?, projected.get(3)?];

			tracked.push(TrackedTarget {
				target: index,
				p0,
				p1,
				homography,
				quad,
			});
		}

		Ok(tracked.into_iter().sorted_by(|a, b| b.p0.len().cmp(&a.p0.len())).collect())
	}

	fn detect_features(&mut self, image: &Mat) -> Result<FeatureSet> {
		let mut keypoints = Vector::<KeyPoint>::new();
		let mut descriptors = Mat::default();
		let mask = Mat::default();
		self.detector
			.detect_and_compute(image, &mask, &mut keypoints, &mut descriptors, false)?;
		Ok(FeatureSet {
			keypoints,
			descriptors,
		})
	}
}
