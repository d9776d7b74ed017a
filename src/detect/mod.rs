//! Detection strategies and their shared result contract.
//!
//! Two interchangeable detectors live here: the classical shape+color
//! pipeline and the neural network wrapper. Both implement [`Detector`] and
//! feed the same temporal stabilizer.

pub mod classic;
pub mod color;
pub mod neural;
pub mod nms;
pub mod result;
pub mod shape;

use crate::frame::Frame;
use result::DetectionResult;

/// Common contract for per-frame detection strategies.
///
/// `detect` never fails outward: frame-level errors are logged and yield an
/// empty list, so a single bad frame cannot take down the caller's loop.
pub trait Detector: Send {
    /// Strategy identifier for logs.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    fn detect(&mut self, frame: &Frame) -> Vec<DetectionResult>;
}
