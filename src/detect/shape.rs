//! Geometric candidate extraction.
//!
//! Turns a frame into a ranked list of brick-like contour candidates using
//! edge detection and polygon-shape heuristics. No learning involved; every
//! step is a tunable policy in [`ShapeParams`].

use std::cmp::Ordering;

use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull};
use imageproc::morphology::close;
use imageproc::point::Point;
use log::debug;

use crate::config::ShapeParams;
use crate::detect::result::BoundingBox;
use crate::frame::Frame;

/// A contour proposed as possibly containing a brick.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub points: Vec<Point<i32>>,
    pub bbox: BoundingBox,
    pub area: f64,
}

pub struct ShapeCandidateFinder {
    params: ShapeParams,
}

impl ShapeCandidateFinder {
    pub fn new(params: ShapeParams) -> Self {
        Self { params }
    }

    /// Extract brick-like contour candidates from a frame.
    ///
    /// Candidates are ranked by area descending and capped twice: once
    /// before shape filtering and once on accepted results. Both caps bound
    /// per-frame cost and are not correctness thresholds. A contour that
    /// fails analysis is rejected individually; the frame always completes.
    pub fn find_candidates(&self, frame: &Frame) -> Vec<Candidate> {
        let gray = frame.to_gray();
        let blurred = gaussian_blur_f32(&gray, self.params.blur_sigma);
        let low = self.params.edge_threshold;
        let mut edges = canny(&blurred, low, low * 2.0);

        // Closing is only worth the pass when the edge map is noisy.
        let total = (frame.width() as usize) * (frame.height() as usize);
        if total > 0 {
            let lit = edges.as_raw().iter().filter(|&&v| v > 0).count();
            if lit as f64 / total as f64 > self.params.closing_density {
                edges = close(&edges, Norm::LInf, 1);
            }
        }

        let mut ranked: Vec<(f64, Vec<Point<i32>>)> = find_contours::<i32>(&edges)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .map(|c| (polygon_area(&c.points), c.points))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        ranked.truncate(self.params.candidate_cap);

        let mut accepted = Vec::new();
        for (area, points) in ranked {
            if let Some(candidate) = self.analyze(points, area) {
                accepted.push(candidate);
                if accepted.len() >= self.params.accepted_cap {
                    break;
                }
            }
        }
        debug!("found {} potential brick contours", accepted.len());
        accepted
    }

    /// Accept a contour iff all brick-shape heuristics hold. `None` rejects
    /// this contour only.
    fn analyze(&self, points: Vec<Point<i32>>, area: f64) -> Option<Candidate> {
        if points.len() < 3 {
            return None;
        }
        if area < self.params.min_area || area > self.params.max_area {
            return None;
        }

        let perimeter = arc_length(&points, true);
        if perimeter < self.params.min_perimeter {
            return None;
        }

        let approx = approximate_polygon_dp(&points, self.params.approx_epsilon * perimeter, true);
        if approx.len() < self.params.min_vertices || approx.len() > self.params.max_vertices {
            return None;
        }

        let bbox = bounding_box(&points)?;
        let aspect = f64::from(bbox.width) / f64::from(bbox.height);
        if aspect < self.params.min_aspect || aspect > self.params.max_aspect {
            return None;
        }

        let solidity = area / bbox.area() as f64;
        if solidity < self.params.min_solidity {
            return None;
        }

        let hull = convex_hull(points.as_slice());
        let hull_area = polygon_area(&hull);
        if hull_area <= 0.0 {
            return None;
        }
        if area / hull_area < self.params.min_convexity {
            return None;
        }

        Some(Candidate { points, bbox, area })
    }
}

/// Shoelace polygon area over a closed contour.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        twice_area += f64::from(points[i].x) * f64::from(points[j].y)
            - f64::from(points[j].x) * f64::from(points[i].y);
    }
    (twice_area * 0.5).abs()
}

fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let width = (max_x - min_x + 1) as u32;
    let height = (max_y - min_y + 1) as u32;
    if width == 0 || height == 0 {
        return None;
    }
    Some(BoundingBox::new(min_x, min_y, width, height))
}
