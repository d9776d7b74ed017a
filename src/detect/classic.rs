//! Classical shape + color detection strategy.

use std::sync::Arc;

use log::debug;

use crate::catalog::{CatalogPart, PartInventory};
use crate::config::{DetectorConfig, NmsParams};
use crate::detect::color::{ColorClassifier, Palette};
use crate::detect::nms::suppress;
use crate::detect::result::DetectionResult;
use crate::detect::shape::ShapeCandidateFinder;
use crate::detect::Detector;
use crate::frame::Frame;

/// Shape-candidate extraction composed with palette color matching.
///
/// Parts already fully satisfied in the inventory are never matched again.
/// When more parts are outstanding than the per-frame scan cap, the scanned
/// subset rotates round-robin across frames so no part is permanently
/// starved.
pub struct ClassicDetector {
    shapes: ShapeCandidateFinder,
    colors: ColorClassifier,
    inventory: Arc<dyn PartInventory>,
    nms: NmsParams,
    scan_cap: usize,
    scan_cursor: usize,
}

impl ClassicDetector {
    pub fn new(
        config: &DetectorConfig,
        palette: Palette,
        inventory: Arc<dyn PartInventory>,
    ) -> Self {
        Self {
            shapes: ShapeCandidateFinder::new(config.shape.clone()),
            colors: ColorClassifier::new(config.color.clone(), palette),
            inventory,
            nms: config.nms.clone(),
            scan_cap: config.color.scan_cap,
            scan_cursor: 0,
        }
    }

    /// Subset of outstanding parts scanned this frame.
    fn scan_window(&mut self, outstanding: Vec<CatalogPart>) -> Vec<CatalogPart> {
        if outstanding.len() <= self.scan_cap {
            return outstanding;
        }
        let len = outstanding.len();
        let start = self.scan_cursor % len;
        self.scan_cursor = (start + self.scan_cap) % len;
        (0..self.scan_cap)
            .map(|i| outstanding[(start + i) % len].clone())
            .collect()
    }
}

impl Detector for ClassicDetector {
    fn name(&self) -> &'static str {
        "classic"
    }

    fn detect(&mut self, frame: &Frame) -> Vec<DetectionResult> {
        let outstanding = self.inventory.outstanding();
        if outstanding.is_empty() {
            debug!("no outstanding parts, skipping detection");
            return Vec::new();
        }
        let parts = self.scan_window(outstanding);

        let candidates = self.shapes.find_candidates(frame);
        let mut detections = Vec::new();
        for candidate in candidates {
            let Some(matched) = self.colors.match_region(frame, candidate.bbox, &parts) else {
                continue;
            };
            match DetectionResult::new(matched.part_id, candidate.bbox, matched.confidence) {
                Ok(detection) => detections.push(detection.with_color(matched.color)),
                Err(e) => debug!("discarding candidate: {}", e),
            }
        }

        let kept = suppress(detections, &self.nms);
        debug!("detected {} bricks in frame", kept.len());
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SetInventory;

    fn inventory(parts: Vec<CatalogPart>) -> Arc<dyn PartInventory> {
        Arc::new(SetInventory::new("test", parts))
    }

    fn part(id: &str, color: &str) -> CatalogPart {
        CatalogPart::new(id, color, 1).unwrap()
    }

    #[test]
    fn empty_inventory_short_circuits() {
        let inv = inventory(Vec::new());
        let mut detector = ClassicDetector::new(&DetectorConfig::default(), Palette::lego(), inv);
        let mut frame = Frame::solid(120, 120, [255, 255, 255]);
        frame.paint_rect(30, 30, 40, 40, [0, 0, 255]);
        assert!(detector.detect(&frame).is_empty());
    }

    #[test]
    fn scan_window_rotates_across_frames() {
        let parts: Vec<CatalogPart> = (0..5).map(|i| part(&format!("p{}", i), "red")).collect();
        let mut config = DetectorConfig::default();
        config.color.scan_cap = 2;
        let mut detector =
            ClassicDetector::new(&config, Palette::lego(), inventory(parts.clone()));

        let first = detector.scan_window(parts.clone());
        let second = detector.scan_window(parts.clone());
        let third = detector.scan_window(parts.clone());

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].part_id, "p0");
        assert_eq!(second[0].part_id, "p2");
        assert_eq!(third[0].part_id, "p4");
        assert_eq!(third[1].part_id, "p0");
    }

    #[test]
    fn small_catalogs_are_scanned_whole() {
        let parts: Vec<CatalogPart> = (0..3).map(|i| part(&format!("p{}", i), "red")).collect();
        let mut detector = ClassicDetector::new(
            &DetectorConfig::default(),
            Palette::lego(),
            inventory(parts.clone()),
        );
        assert_eq!(detector.scan_window(parts).len(), 3);
    }
}
