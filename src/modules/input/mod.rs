mod camera;
mod guard;

pub use camera::CameraInput;
pub use guard::EmptyFrameGuard;
