pub mod input;
pub mod threshold;
pub mod analyzer;
pub mod planetracker;
pub mod draw;
pub mod output;

use opencv::core::*;

use std::ops::{Add, AddAssign};

use crate::error::Result;

/// Per-frame motion estimate handed to the outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Displacement {
	pub dx: f64,
	pub dy: f64,
}

impl Displacement {
	pub fn new(dx: f64, dy: f64) -> Self {
		Self { dx, dy }
	}
}

impl Add for Displacement {
	type Output = Displacement;

	fn add(self, other: Displacement) -> Displacement {
		Displacement::new(self.dx + other.dx, self.dy + other.dy)
	}
}

impl AddAssign for Displacement {
	fn add_assign(&mut self, other: Displacement) {
		self.dx += other.dx;
		self.dy += other.dy;
	}
}

pub struct OutputData {
	pub displacement: Displacement,
	pub position: Displacement,
	pub fps: f64,
}

pub trait InputModule {
	fn run(&mut self) -> Result<Mat>;
}

pub trait ThresholdModule {
	fn run(&mut self, frame: &Mat) -> Result<Vector<Vector<Point>>>;
}

/// Stateful per-frame tracker. Draws on `frame` in place when `draw` is set.
pub trait AnalyzerModule {
	fn update(&mut self, frame: &mut Mat, draw: bool) -> Result<Displacement>;
}

pub trait OutputModule {
	fn run(&mut self, frame: &Mat, data: &OutputData) -> Result<()>;
}
