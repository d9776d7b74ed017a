//! Non-maximum suppression.

use std::cmp::Ordering;

use crate::config::NmsParams;
use crate::detect::result::DetectionResult;

/// Greedy overlap suppression.
///
/// Detections are ranked by confidence descending (stable, so confidence
/// ties keep first-seen order) and kept unless they overlap an
/// already-kept detection by more than `iou_threshold`. At most
/// `max_results` detections survive. Idempotent on already-suppressed
/// input.
pub fn suppress(
    mut detections: Vec<DetectionResult>,
    params: &NmsParams,
) -> Vec<DetectionResult> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<DetectionResult> = Vec::new();
    for detection in detections {
        if kept.len() >= params.max_results {
            break;
        }
        let overlaps = kept
            .iter()
            .any(|existing| existing.bbox.iou(&detection.bbox) > params.iou_threshold);
        if !overlaps {
            kept.push(detection);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn det(id: &str, x: i32, y: i32, size: u32, confidence: f32) -> DetectionResult {
        DetectionResult::new(id, BoundingBox::new(x, y, size, size), confidence).unwrap()
    }

    #[test]
    fn drops_heavily_overlapping_lower_confidence_boxes() {
        let detections = vec![
            det("a", 0, 0, 40, 0.9),
            det("b", 2, 2, 40, 0.8),
            det("c", 100, 100, 40, 0.7),
        ];
        let kept = suppress(detections, &NmsParams::default());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].part_id, "a");
        assert_eq!(kept[1].part_id, "c");
    }

    #[test]
    fn suppression_is_idempotent() {
        let detections = vec![
            det("a", 0, 0, 40, 0.9),
            det("b", 100, 0, 40, 0.8),
            det("c", 0, 100, 40, 0.7),
        ];
        let params = NmsParams::default();
        let once = suppress(detections, &params);
        let twice = suppress(once.clone(), &params);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.part_id, b.part_id);
            assert_eq!(a.bbox, b.bbox);
        }
    }

    #[test]
    fn confidence_ties_keep_first_seen() {
        let detections = vec![det("first", 0, 0, 40, 0.8), det("second", 1, 1, 40, 0.8)];
        let kept = suppress(detections, &NmsParams::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].part_id, "first");
    }

    #[test]
    fn respects_max_results_cap() {
        let detections = (0..20)
            .map(|i| det("p", i * 100, 0, 40, 0.5))
            .collect::<Vec<_>>();
        let params = NmsParams {
            max_results: 10,
            ..NmsParams::default()
        };
        assert_eq!(suppress(detections, &params).len(), 10);
    }
}
