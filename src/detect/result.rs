use std::time::SystemTime;

use anyhow::{anyhow, Result};

/// Axis-aligned bounding box in pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && px <= self.x + self.width as i32
            && py >= self.y
            && py <= self.y + self.height as i32
    }

    /// Intersection over union; 0 for disjoint boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x_left = self.x.max(other.x);
        let y_top = self.y.max(other.y);
        let x_right = (self.x + self.width as i32).min(other.x + other.width as i32);
        let y_bottom = (self.y + self.height as i32).min(other.y + other.height as i32);

        if x_right <= x_left || y_bottom <= y_top {
            return 0.0;
        }

        let intersection = (x_right - x_left) as f32 * (y_bottom - y_top) as f32;
        let union = self.area() as f32 + other.area() as f32 - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// One observation of a part in one frame. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub part_id: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub center: (i32, i32),
    pub color: Option<String>,
    pub timestamp: SystemTime,
}

impl DetectionResult {
    /// Build a detection; the confidence must lie in [0.0, 1.0] and the
    /// center point is derived from the bounding box.
    pub fn new(part_id: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!(
                "confidence must be between 0.0 and 1.0, got {}",
                confidence
            ));
        }
        Ok(Self {
            part_id: part_id.into(),
            bbox,
            confidence,
            center: bbox.center(),
            color: None,
            timestamp: SystemTime::now(),
        })
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Override the derived center point.
    pub fn with_center(mut self, center: (i32, i32)) -> Self {
        self.center = center;
        self
    }

    /// Hit-test for the click-to-mark flow.
    pub fn contains_point(&self, point: (i32, i32)) -> bool {
        self.bbox.contains(point.0, point.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_outside_unit_interval_fails_validation() {
        let bbox = BoundingBox::new(0, 0, 10, 10);
        assert!(DetectionResult::new("3005", bbox, -0.1).is_err());
        assert!(DetectionResult::new("3005", bbox, 1.01).is_err());
        assert!(DetectionResult::new("3005", bbox, 0.0).is_ok());
        assert!(DetectionResult::new("3005", bbox, 1.0).is_ok());
    }

    #[test]
    fn center_is_derived_from_bbox() {
        let det = DetectionResult::new("3005", BoundingBox::new(10, 20, 41, 30), 0.5).unwrap();
        assert_eq!(det.center, (10 + 41 / 2, 20 + 30 / 2));
    }

    #[test]
    fn center_can_be_overridden() {
        let det = DetectionResult::new("3005", BoundingBox::new(0, 0, 10, 10), 0.5)
            .unwrap()
            .with_center((99, 99));
        assert_eq!(det.center, (99, 99));
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(20, 20, 10, 10);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox::new(5, 5, 10, 10);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn contains_point_includes_edges() {
        let det = DetectionResult::new("3005", BoundingBox::new(10, 10, 20, 20), 0.5).unwrap();
        assert!(det.contains_point((10, 10)));
        assert!(det.contains_point((30, 30)));
        assert!(!det.contains_point((31, 30)));
    }
}
