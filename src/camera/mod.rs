mod device;
mod frame;
mod motion;

pub use device::{CameraError, FrameSource, HttpCamera};
pub use frame::{ColorMode, Frame, Resolution};
pub use motion::MotionDetector;
