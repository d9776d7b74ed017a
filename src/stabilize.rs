//! Temporal stabilization.
//!
//! Keeps a bounded window of recent per-frame detection lists and reports
//! only identities that recur across a quorum of the most recent frames.
//! The 2-of-3 default debounces single-frame flicker without adding more
//! than three frames of latency.

use std::collections::{HashMap, VecDeque};

use crate::config::StabilizerParams;
use crate::detect::result::DetectionResult;

struct Tally {
    frames: usize,
    last_frame: usize,
    latest: DetectionResult,
}

/// Sliding-window stability voter.
///
/// Pushes must arrive in strict frame order; the caller's frame loop is the
/// sole source of ordering.
pub struct TemporalStabilizer {
    window: VecDeque<Vec<DetectionResult>>,
    params: StabilizerParams,
}

impl TemporalStabilizer {
    pub fn new(params: StabilizerParams) -> Self {
        Self {
            window: VecDeque::with_capacity(params.window_capacity),
            params,
        }
    }

    /// Append one frame's detections, evicting the oldest frame beyond
    /// capacity.
    pub fn push(&mut self, detections: Vec<DetectionResult>) {
        while self.window.len() >= self.params.window_capacity {
            self.window.pop_front();
        }
        self.window.push_back(detections);
    }

    /// Identities present in at least `quorum_min` of the last
    /// `quorum_frames` frames, one representative each.
    ///
    /// The representative is the most recent occurrence, so the reported
    /// bounding box tracks the current position. Empty until `quorum_frames`
    /// frames have been pushed.
    pub fn stable(&self) -> Vec<DetectionResult> {
        if self.window.len() < self.params.quorum_frames {
            return Vec::new();
        }

        let skip = self.window.len() - self.params.quorum_frames;
        let mut order: Vec<String> = Vec::new();
        let mut tallies: HashMap<String, Tally> = HashMap::new();

        for (frame_idx, frame) in self.window.iter().skip(skip).enumerate() {
            for detection in frame {
                match tallies.get_mut(&detection.part_id) {
                    Some(tally) => {
                        if tally.last_frame != frame_idx {
                            tally.frames += 1;
                            tally.last_frame = frame_idx;
                        }
                        tally.latest = detection.clone();
                    }
                    None => {
                        order.push(detection.part_id.clone());
                        tallies.insert(
                            detection.part_id.clone(),
                            Tally {
                                frames: 1,
                                last_frame: frame_idx,
                                latest: detection.clone(),
                            },
                        );
                    }
                }
            }
        }

        order
            .into_iter()
            .filter_map(|part_id| {
                tallies
                    .remove(&part_id)
                    .filter(|tally| tally.frames >= self.params.quorum_min)
                    .map(|tally| tally.latest)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn det(id: &str, x: i32) -> DetectionResult {
        DetectionResult::new(id, BoundingBox::new(x, 0, 10, 10), 0.8).unwrap()
    }

    fn stabilizer() -> TemporalStabilizer {
        TemporalStabilizer::new(StabilizerParams::default())
    }

    #[test]
    fn empty_until_quorum_frames_pushed() {
        let mut s = stabilizer();
        s.push(vec![det("3005", 0)]);
        assert!(s.stable().is_empty());
        s.push(vec![det("3005", 1)]);
        assert!(s.stable().is_empty());
        s.push(vec![det("3005", 2)]);
        assert_eq!(s.stable().len(), 1);
    }

    #[test]
    fn duplicate_detections_in_one_frame_count_once() {
        let mut s = stabilizer();
        s.push(vec![det("3005", 0), det("3005", 50)]);
        s.push(Vec::new());
        s.push(Vec::new());
        assert!(s.stable().is_empty());
    }

    #[test]
    fn representative_is_most_recent_occurrence() {
        let mut s = stabilizer();
        s.push(vec![det("3005", 10)]);
        s.push(vec![det("3005", 20)]);
        s.push(Vec::new());
        let stable = s.stable();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].bbox.x, 20);
    }
}
