use crate::error::{Error, Result};
use crate::modules::InputModule;

use opencv::core::Mat;

use tracing::{info, warn};

/// Skips empty reads from an input, giving up after `limit` in a row.
pub struct EmptyFrameGuard<I> {
	input: I,
	limit: u32,
	streak: u32,
}

impl<I: InputModule> EmptyFrameGuard<I> {
	pub fn new(input: I, limit: u32) -> Self {
		Self {
			input: input,
			limit: limit,
			streak: 0,
		}
	}

	/// The next frame, `None` for a skipped empty read, or
	/// `Error::InputLost` once more than `limit` empty reads happened in a row.
	pub fn next_frame(&mut self) -> Result<Option<Mat>> {
		match self.input.run() {
			Ok(frame) => {
				if self.streak > 0 {
					info!(skipped = self.streak, "input recovered");
					self.streak = 0;
				}
				Ok(Some(frame))
			}
			Err(Error::EmptyFrame) => {
				self.streak += 1;
				if self.streak > self.limit {
					return Err(Error::InputLost(self.streak));
				}
				if self.streak == 1 {
					warn!("input returned an empty frame, skipping");
				}
				Ok(None)
			}
			Err(err) => Err(err),
		}
	}

	/// Empty reads since the last good frame.
	pub fn streak(&self) -> u32 {
		self.streak
	}
}
