//! Palette color matching.
//!
//! Assigns a catalog identity and confidence to a candidate region by
//! color-distance scoring against a small fixed palette. The palette is an
//! explicit immutable value handed in at construction so classifiers can be
//! tested with alternate palettes.

use std::collections::HashMap;

use log::debug;

use crate::catalog::CatalogPart;
use crate::config::ColorParams;
use crate::detect::result::BoundingBox;
use crate::frame::Frame;

/// Maximum euclidean distance between two RGB colors.
const MAX_RGB_DISTANCE: f32 = 441.673; // 255 * sqrt(3)

/// Immutable name -> RGB palette.
#[derive(Clone, Debug)]
pub struct Palette {
    colors: Vec<(String, [u8; 3])>,
}

impl Palette {
    /// The standard brick colors.
    pub fn lego() -> Self {
        Self::custom([
            ("black", [0, 0, 0]),
            ("white", [255, 255, 255]),
            ("red", [255, 0, 0]),
            ("blue", [0, 0, 255]),
            ("green", [0, 255, 0]),
            ("yellow", [255, 255, 0]),
            ("orange", [255, 165, 0]),
            ("purple", [128, 0, 128]),
            ("pink", [255, 192, 203]),
            ("brown", [165, 42, 42]),
            ("gray", [128, 128, 128]),
            ("light_gray", [211, 211, 211]),
            ("dark_gray", [64, 64, 64]),
            ("lime", [50, 205, 50]),
            ("cyan", [0, 255, 255]),
            ("magenta", [255, 0, 255]),
            ("tan", [210, 180, 140]),
            ("dark_blue", [0, 0, 139]),
            ("bright_green", [0, 255, 127]),
        ])
    }

    pub fn custom<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, [u8; 3])>,
        S: Into<String>,
    {
        Self {
            colors: entries
                .into_iter()
                .map(|(name, rgb)| (normalize_color_name(&name.into()), rgb))
                .collect(),
        }
    }

    /// Look up a color by name; lookup is case- and whitespace-insensitive.
    pub fn get(&self, name: &str) -> Option<[u8; 3]> {
        let wanted = normalize_color_name(name);
        self.colors
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, rgb)| *rgb)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.colors.iter().map(|(n, _)| n.as_str())
    }
}

fn normalize_color_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Result of matching a region against the outstanding catalog.
#[derive(Clone, Debug)]
pub struct ColorMatch {
    pub part_id: String,
    pub color: String,
    pub confidence: f32,
}

pub struct ColorClassifier {
    params: ColorParams,
    palette: Palette,
    similarity_cache: HashMap<([u8; 3], [u8; 3]), f32>,
}

impl ColorClassifier {
    pub fn new(params: ColorParams, palette: Palette) -> Self {
        Self {
            params,
            palette,
            similarity_cache: HashMap::new(),
        }
    }

    /// Match a frame region against the given catalog subset.
    ///
    /// Returns the best-scoring entry, or `None` when the region is too
    /// small, nothing scores above the threshold, or no entry's color label
    /// is present in the palette.
    pub fn match_region(
        &mut self,
        frame: &Frame,
        bbox: BoundingBox,
        parts: &[CatalogPart],
    ) -> Option<ColorMatch> {
        if bbox.area() < u64::from(self.params.min_region_px) {
            return None;
        }

        let dominant = self.dominant_color(frame, bbox)?;

        let mut best: Option<(f32, &CatalogPart, String)> = None;
        for part in parts {
            let color_name = normalize_color_name(&part.color);
            let Some(target) = self.palette.get(&color_name) else {
                debug!("part {} has no palette color '{}'", part.part_id, part.color);
                continue;
            };
            let score = self.similarity(dominant, target);
            if best.as_ref().map_or(true, |(b, _, _)| score > *b) {
                best = Some((score, part, color_name));
            }
        }

        let threshold = f32::from(self.params.color_threshold) / 255.0;
        best.filter(|(score, _, _)| *score > threshold)
            .map(|(score, part, color)| ColorMatch {
                part_id: part.part_id.clone(),
                color,
                confidence: score,
            })
    }

    /// Dominant color of a region, as RGB.
    ///
    /// Small regions use the mean color; larger ones use a hue histogram and
    /// reconstruct the modal bin's hue with the mean saturation and value of
    /// its pixels. Falls back to the mean color when the histogram is
    /// degenerate (e.g. a fully unsaturated region).
    fn dominant_color(&self, frame: &Frame, bbox: BoundingBox) -> Option<[u8; 3]> {
        if bbox.area() < u64::from(self.params.small_region_px) {
            return mean_color(frame, bbox);
        }
        histogram_color(frame, bbox, self.params.hue_bins).or_else(|| mean_color(frame, bbox))
    }

    /// Symmetric normalized similarity in [0, 1], memoized by color pair.
    fn similarity(&mut self, a: [u8; 3], b: [u8; 3]) -> f32 {
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(&cached) = self.similarity_cache.get(&key) {
            return cached;
        }
        let dr = f32::from(a[0]) - f32::from(b[0]);
        let dg = f32::from(a[1]) - f32::from(b[1]);
        let db = f32::from(a[2]) - f32::from(b[2]);
        let distance = (dr * dr + dg * dg + db * db).sqrt();
        let similarity = 1.0 - distance / MAX_RGB_DISTANCE;
        self.similarity_cache.insert(key, similarity);
        similarity
    }
}

fn region_pixels<'a>(
    frame: &'a Frame,
    bbox: BoundingBox,
) -> impl Iterator<Item = [u8; 3]> + 'a {
    let x0 = bbox.x.max(0) as u32;
    let y0 = bbox.y.max(0) as u32;
    let x1 = ((bbox.x + bbox.width as i32).max(0) as u32).min(frame.width());
    let y1 = ((bbox.y + bbox.height as i32).max(0) as u32).min(frame.height());
    (y0..y1).flat_map(move |y| (x0..x1).map(move |x| frame.rgb_at(x, y)))
}

fn mean_color(frame: &Frame, bbox: BoundingBox) -> Option<[u8; 3]> {
    let (mut r, mut g, mut b, mut n) = (0u64, 0u64, 0u64, 0u64);
    for [pr, pg, pb] in region_pixels(frame, bbox) {
        r += u64::from(pr);
        g += u64::from(pg);
        b += u64::from(pb);
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some([(r / n) as u8, (g / n) as u8, (b / n) as u8])
}

fn histogram_color(frame: &Frame, bbox: BoundingBox, bins: usize) -> Option<[u8; 3]> {
    let bin_width = 360.0 / bins as f32;
    let mut counts = vec![0usize; bins];
    let mut sums = vec![(0.0f32, 0.0f32, 0.0f32); bins];

    for rgb in region_pixels(frame, bbox) {
        let (h, s, v) = rgb_to_hsv(rgb);
        let bin = ((h / bin_width) as usize).min(bins - 1);
        counts[bin] += 1;
        let (sh, ss, sv) = &mut sums[bin];
        *sh += h;
        *ss += s;
        *sv += v;
    }

    let (modal, &count) = counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, &count)| count)?;
    if count == 0 {
        return None;
    }
    let (sh, ss, sv) = sums[modal];
    let n = count as f32;
    Some(hsv_to_rgb(sh / n, ss / n, sv / n))
}

/// RGB -> (hue in [0, 360), saturation and value in [0, 1]).
fn rgb_to_hsv([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let r = f32::from(r) / 255.0;
    let g = f32::from(g) / 255.0;
    let b = f32::from(b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let h = h.rem_euclid(360.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorParams;

    fn red_part() -> CatalogPart {
        CatalogPart::new("3005", "red", 1).unwrap()
    }

    fn classifier() -> ColorClassifier {
        ColorClassifier::new(ColorParams::default(), Palette::lego())
    }

    #[test]
    fn palette_lookup_is_case_and_space_insensitive() {
        let palette = Palette::lego();
        assert_eq!(palette.get("Red"), Some([255, 0, 0]));
        assert_eq!(palette.get(" Light Gray "), Some([211, 211, 211]));
        assert_eq!(palette.get("chartreuse"), None);
    }

    #[test]
    fn identical_colors_score_one() {
        let mut c = classifier();
        assert!((c.similarity([10, 20, 30], [10, 20, 30]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_is_symmetric_and_cached() {
        let mut c = classifier();
        let ab = c.similarity([255, 0, 0], [0, 0, 255]);
        let ba = c.similarity([0, 0, 255], [255, 0, 0]);
        assert_eq!(ab, ba);
        assert_eq!(c.similarity_cache.len(), 1);
    }

    #[test]
    fn matches_a_solid_red_region() {
        let frame = Frame::solid(32, 32, [0, 0, 255]);
        let mut c = classifier();
        let m = c
            .match_region(&frame, BoundingBox::new(0, 0, 32, 32), &[red_part()])
            .expect("red region should match");
        assert_eq!(m.part_id, "3005");
        assert_eq!(m.color, "red");
        assert!(m.confidence > 0.9);
    }

    #[test]
    fn rejects_regions_below_area_floor() {
        let frame = Frame::solid(32, 32, [0, 0, 255]);
        let mut c = classifier();
        assert!(c
            .match_region(&frame, BoundingBox::new(0, 0, 2, 2), &[red_part()])
            .is_none());
    }

    #[test]
    fn rejects_scores_below_threshold() {
        // Mid-gray against a pure-blue catalog entry scores ~0.5 on the
        // normalized scale; a high threshold rejects it.
        let frame = Frame::solid(32, 32, [128, 128, 128]);
        let params = ColorParams {
            color_threshold: 220,
            ..ColorParams::default()
        };
        let mut c = ColorClassifier::new(params, Palette::lego());
        let part = CatalogPart::new("3020", "blue", 1).unwrap();
        assert!(c
            .match_region(&frame, BoundingBox::new(0, 0, 32, 32), &[part])
            .is_none());
    }

    #[test]
    fn parts_with_unknown_colors_are_skipped() {
        let frame = Frame::solid(32, 32, [0, 0, 255]);
        let mut c = classifier();
        let part = CatalogPart::new("9999", "hyperviolet", 1).unwrap();
        assert!(c
            .match_region(&frame, BoundingBox::new(0, 0, 32, 32), &[part])
            .is_none());
    }

    #[test]
    fn hsv_round_trip_preserves_primaries() {
        for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]] {
            let (h, s, v) = rgb_to_hsv(rgb);
            assert_eq!(hsv_to_rgb(h, s, v), rgb);
        }
    }

    #[test]
    fn histogram_picks_majority_hue() {
        // Two-thirds red, one-third blue: the modal hue bin is red.
        let mut frame = Frame::solid(30, 30, [255, 0, 0]);
        frame.paint_rect(0, 0, 30, 20, [0, 0, 255]);
        let color = histogram_color(&frame, BoundingBox::new(0, 0, 30, 30), 8)
            .expect("histogram should produce a color");
        assert!(color[0] > 200 && color[2] < 60, "got {:?}", color);
    }
}
