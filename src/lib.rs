//! brickseek
//!
//! Detection and tracking engine for locating physical bricks from a live
//! camera feed. A frame flows through one of two interchangeable detection
//! strategies into a temporal stabilizer:
//!
//! - [`ClassicDetector`]: edge/contour candidate extraction plus palette
//!   color matching, with overlap suppression. No learning.
//! - [`NeuralDetector`]: a tract-onnx model wrapper with plan fallback and
//!   an optional class-name allow-list.
//! - [`DetectorLifecycle`]: thread-safe readiness state machine gating the
//!   neural path; model weights load on a background worker.
//! - [`TemporalStabilizer`]: 2-of-3 stability quorum over recent frames,
//!   debouncing single-frame false positives and negatives.
//!
//! Frame acquisition, inventory persistence, and the surrounding GUI are
//! collaborators behind narrow seams ([`Frame`], [`PartInventory`],
//! [`DetectorConfig`]). Nothing in this crate panics or propagates errors
//! through the per-frame detection surface: failures end in an empty
//! result, a skipped item, or an observable lifecycle transition.

pub mod catalog;
pub mod config;
pub mod detect;
pub mod frame;
pub mod lifecycle;
pub mod stabilize;

pub use catalog::{CatalogPart, PartInventory, SetInventory};
pub use config::{
    ColorParams, DetectorConfig, NeuralParams, NmsParams, ShapeParams, StabilizerParams,
};
pub use detect::classic::ClassicDetector;
pub use detect::color::{ColorClassifier, ColorMatch, Palette};
pub use detect::neural::{AllowList, NeuralDetector};
pub use detect::nms::suppress;
pub use detect::result::{BoundingBox, DetectionResult};
pub use detect::shape::{Candidate, ShapeCandidateFinder};
pub use detect::Detector;
pub use frame::Frame;
pub use lifecycle::{DetectorLifecycle, DetectorState, LoadOutcome, ModelLoader};
pub use stabilize::TemporalStabilizer;
