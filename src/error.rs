use thiserror::Error;

/// Errors that can occur while analyzing frames
#[derive(Error, Debug)]
pub enum Error {
	#[error("OpenCV error: {0}")]
	OpenCv(#[from] opencv::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Invalid settings file: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("Invalid configuration: {0}")]
	Config(String),

	#[error("Input returned an empty frame")]
	EmptyFrame,

	#[error("Input returned {0} empty frames in a row")]
	InputLost(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
