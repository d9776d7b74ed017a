use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_EDGE_THRESHOLD: f32 = 50.0;
const DEFAULT_BLUR_SIGMA: f32 = 0.8;
const DEFAULT_CLOSING_DENSITY: f64 = 0.1;
const DEFAULT_MIN_AREA: f64 = 300.0;
const DEFAULT_MAX_AREA: f64 = 100_000.0;
const DEFAULT_APPROX_EPSILON: f64 = 0.02;
const DEFAULT_MIN_PERIMETER: f64 = 50.0;
const DEFAULT_MIN_VERTICES: usize = 4;
const DEFAULT_MAX_VERTICES: usize = 12;
const DEFAULT_MIN_ASPECT: f64 = 0.3;
const DEFAULT_MAX_ASPECT: f64 = 5.0;
const DEFAULT_MIN_SOLIDITY: f64 = 0.5;
const DEFAULT_MIN_CONVEXITY: f64 = 0.8;
const DEFAULT_CANDIDATE_CAP: usize = 100;
const DEFAULT_ACCEPTED_CAP: usize = 50;

const DEFAULT_COLOR_THRESHOLD: u8 = 30;
const DEFAULT_MIN_REGION_PX: u32 = 16;
const DEFAULT_SMALL_REGION_PX: u32 = 100;
const DEFAULT_HUE_BINS: usize = 8;
const DEFAULT_SCAN_CAP: usize = 20;

const DEFAULT_NMS_IOU: f32 = 0.3;
const DEFAULT_NMS_MAX_RESULTS: usize = 10;

const DEFAULT_WINDOW_CAPACITY: usize = 10;
const DEFAULT_QUORUM_FRAMES: usize = 3;
const DEFAULT_QUORUM_MIN: usize = 2;

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_INPUT_WIDTH: u32 = 640;
const DEFAULT_INPUT_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    shape: Option<ShapeSection>,
    color: Option<ColorSection>,
    nms: Option<NmsSection>,
    stabilizer: Option<StabilizerSection>,
    neural: Option<NeuralSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ShapeSection {
    edge_threshold: Option<f32>,
    blur_sigma: Option<f32>,
    closing_density: Option<f64>,
    min_area: Option<f64>,
    max_area: Option<f64>,
    approx_epsilon: Option<f64>,
    min_perimeter: Option<f64>,
    min_vertices: Option<usize>,
    max_vertices: Option<usize>,
    min_aspect: Option<f64>,
    max_aspect: Option<f64>,
    min_solidity: Option<f64>,
    min_convexity: Option<f64>,
    candidate_cap: Option<usize>,
    accepted_cap: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ColorSection {
    color_threshold: Option<u8>,
    min_region_px: Option<u32>,
    small_region_px: Option<u32>,
    hue_bins: Option<usize>,
    scan_cap: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct NmsSection {
    iou_threshold: Option<f32>,
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct StabilizerSection {
    window_capacity: Option<usize>,
    quorum_frames: Option<usize>,
    quorum_min: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct NeuralSection {
    confidence_threshold: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

/// Shape-candidate extraction tunables.
#[derive(Debug, Clone)]
pub struct ShapeParams {
    /// Canny low threshold; the high threshold is always twice this value.
    pub edge_threshold: f32,
    pub blur_sigma: f32,
    /// Edge density above which a morphological closing pass runs.
    pub closing_density: f64,
    pub min_area: f64,
    pub max_area: f64,
    /// Polygon-approximation epsilon as a fraction of the perimeter.
    pub approx_epsilon: f64,
    pub min_perimeter: f64,
    pub min_vertices: usize,
    pub max_vertices: usize,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_solidity: f64,
    pub min_convexity: f64,
    /// Contours considered per frame, largest-area first.
    pub candidate_cap: usize,
    /// Accepted candidates per frame.
    pub accepted_cap: usize,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            closing_density: DEFAULT_CLOSING_DENSITY,
            min_area: DEFAULT_MIN_AREA,
            max_area: DEFAULT_MAX_AREA,
            approx_epsilon: DEFAULT_APPROX_EPSILON,
            min_perimeter: DEFAULT_MIN_PERIMETER,
            min_vertices: DEFAULT_MIN_VERTICES,
            max_vertices: DEFAULT_MAX_VERTICES,
            min_aspect: DEFAULT_MIN_ASPECT,
            max_aspect: DEFAULT_MAX_ASPECT,
            min_solidity: DEFAULT_MIN_SOLIDITY,
            min_convexity: DEFAULT_MIN_CONVEXITY,
            candidate_cap: DEFAULT_CANDIDATE_CAP,
            accepted_cap: DEFAULT_ACCEPTED_CAP,
        }
    }
}

/// Color matching tunables.
#[derive(Debug, Clone)]
pub struct ColorParams {
    /// Similarity acceptance threshold on the 0-255 scale.
    pub color_threshold: u8,
    /// Regions below this pixel area are rejected outright.
    pub min_region_px: u32,
    /// Regions below this pixel area use the cheap mean-color path.
    pub small_region_px: u32,
    pub hue_bins: usize,
    /// Outstanding catalog entries scanned per frame.
    pub scan_cap: usize,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            color_threshold: DEFAULT_COLOR_THRESHOLD,
            min_region_px: DEFAULT_MIN_REGION_PX,
            small_region_px: DEFAULT_SMALL_REGION_PX,
            hue_bins: DEFAULT_HUE_BINS,
            scan_cap: DEFAULT_SCAN_CAP,
        }
    }
}

/// Overlap suppression tunables.
#[derive(Debug, Clone)]
pub struct NmsParams {
    pub iou_threshold: f32,
    pub max_results: usize,
}

impl Default for NmsParams {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_NMS_IOU,
            max_results: DEFAULT_NMS_MAX_RESULTS,
        }
    }
}

/// Temporal stability tunables.
#[derive(Debug, Clone)]
pub struct StabilizerParams {
    pub window_capacity: usize,
    /// Recent frames inspected by the quorum.
    pub quorum_frames: usize,
    /// Frames an identity must appear in to count as stable.
    pub quorum_min: usize,
}

impl Default for StabilizerParams {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            quorum_frames: DEFAULT_QUORUM_FRAMES,
            quorum_min: DEFAULT_QUORUM_MIN,
        }
    }
}

/// Neural inference tunables.
#[derive(Debug, Clone)]
pub struct NeuralParams {
    pub confidence_threshold: f32,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for NeuralParams {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            input_width: DEFAULT_INPUT_WIDTH,
            input_height: DEFAULT_INPUT_HEIGHT,
        }
    }
}

/// Complete tunable record for the detection engine. Every field has a
/// default; a config file may specify any subset.
#[derive(Debug, Clone, Default)]
pub struct DetectorConfig {
    pub shape: ShapeParams,
    pub color: ColorParams,
    pub nms: NmsParams,
    pub stabilizer: StabilizerParams,
    pub neural: NeuralParams,
}

impl DetectorConfig {
    /// Load configuration from the file named by `BRICKSEEK_CONFIG` (JSON,
    /// partial), then apply environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BRICKSEEK_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let shape = file.shape.unwrap_or_default();
        let color = file.color.unwrap_or_default();
        let nms = file.nms.unwrap_or_default();
        let stabilizer = file.stabilizer.unwrap_or_default();
        let neural = file.neural.unwrap_or_default();
        Self {
            shape: ShapeParams {
                edge_threshold: shape.edge_threshold.unwrap_or(DEFAULT_EDGE_THRESHOLD),
                blur_sigma: shape.blur_sigma.unwrap_or(DEFAULT_BLUR_SIGMA),
                closing_density: shape.closing_density.unwrap_or(DEFAULT_CLOSING_DENSITY),
                min_area: shape.min_area.unwrap_or(DEFAULT_MIN_AREA),
                max_area: shape.max_area.unwrap_or(DEFAULT_MAX_AREA),
                approx_epsilon: shape.approx_epsilon.unwrap_or(DEFAULT_APPROX_EPSILON),
                min_perimeter: shape.min_perimeter.unwrap_or(DEFAULT_MIN_PERIMETER),
                min_vertices: shape.min_vertices.unwrap_or(DEFAULT_MIN_VERTICES),
                max_vertices: shape.max_vertices.unwrap_or(DEFAULT_MAX_VERTICES),
                min_aspect: shape.min_aspect.unwrap_or(DEFAULT_MIN_ASPECT),
                max_aspect: shape.max_aspect.unwrap_or(DEFAULT_MAX_ASPECT),
                min_solidity: shape.min_solidity.unwrap_or(DEFAULT_MIN_SOLIDITY),
                min_convexity: shape.min_convexity.unwrap_or(DEFAULT_MIN_CONVEXITY),
                candidate_cap: shape.candidate_cap.unwrap_or(DEFAULT_CANDIDATE_CAP),
                accepted_cap: shape.accepted_cap.unwrap_or(DEFAULT_ACCEPTED_CAP),
            },
            color: ColorParams {
                color_threshold: color.color_threshold.unwrap_or(DEFAULT_COLOR_THRESHOLD),
                min_region_px: color.min_region_px.unwrap_or(DEFAULT_MIN_REGION_PX),
                small_region_px: color.small_region_px.unwrap_or(DEFAULT_SMALL_REGION_PX),
                hue_bins: color.hue_bins.unwrap_or(DEFAULT_HUE_BINS),
                scan_cap: color.scan_cap.unwrap_or(DEFAULT_SCAN_CAP),
            },
            nms: NmsParams {
                iou_threshold: nms.iou_threshold.unwrap_or(DEFAULT_NMS_IOU),
                max_results: nms.max_results.unwrap_or(DEFAULT_NMS_MAX_RESULTS),
            },
            stabilizer: StabilizerParams {
                window_capacity: stabilizer.window_capacity.unwrap_or(DEFAULT_WINDOW_CAPACITY),
                quorum_frames: stabilizer.quorum_frames.unwrap_or(DEFAULT_QUORUM_FRAMES),
                quorum_min: stabilizer.quorum_min.unwrap_or(DEFAULT_QUORUM_MIN),
            },
            neural: NeuralParams {
                confidence_threshold: neural
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                input_width: neural.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
                input_height: neural.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("BRICKSEEK_EDGE_THRESHOLD") {
            self.shape.edge_threshold = value
                .parse()
                .map_err(|_| anyhow!("BRICKSEEK_EDGE_THRESHOLD must be a number"))?;
        }
        if let Ok(value) = std::env::var("BRICKSEEK_COLOR_THRESHOLD") {
            self.color.color_threshold = value
                .parse()
                .map_err(|_| anyhow!("BRICKSEEK_COLOR_THRESHOLD must be an integer in 0..=255"))?;
        }
        if let Ok(value) = std::env::var("BRICKSEEK_CONFIDENCE_THRESHOLD") {
            self.neural.confidence_threshold = value
                .parse()
                .map_err(|_| anyhow!("BRICKSEEK_CONFIDENCE_THRESHOLD must be a number"))?;
        }
        if let Ok(value) = std::env::var("BRICKSEEK_NMS_MAX_RESULTS") {
            self.nms.max_results = value
                .parse()
                .map_err(|_| anyhow!("BRICKSEEK_NMS_MAX_RESULTS must be an integer"))?;
        }
        if let Ok(value) = std::env::var("BRICKSEEK_WINDOW_CAPACITY") {
            self.stabilizer.window_capacity = value
                .parse()
                .map_err(|_| anyhow!("BRICKSEEK_WINDOW_CAPACITY must be an integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.shape.edge_threshold <= 0.0 {
            return Err(anyhow!("edge_threshold must be positive"));
        }
        if self.shape.blur_sigma <= 0.0 {
            return Err(anyhow!("blur_sigma must be positive"));
        }
        if self.shape.min_area < 1.0 || self.shape.max_area <= self.shape.min_area {
            return Err(anyhow!("shape area bounds must satisfy 1 <= min_area < max_area"));
        }
        if !(0.0..1.0).contains(&self.shape.approx_epsilon) || self.shape.approx_epsilon == 0.0 {
            return Err(anyhow!("approx_epsilon must lie in (0, 1)"));
        }
        if self.shape.min_vertices < 3 || self.shape.max_vertices < self.shape.min_vertices {
            return Err(anyhow!("vertex bounds must satisfy 3 <= min <= max"));
        }
        if self.shape.min_aspect <= 0.0 || self.shape.max_aspect <= self.shape.min_aspect {
            return Err(anyhow!("aspect bounds must satisfy 0 < min < max"));
        }
        if !(0.0..=1.0).contains(&self.shape.min_solidity)
            || !(0.0..=1.0).contains(&self.shape.min_convexity)
        {
            return Err(anyhow!("solidity and convexity floors must lie in [0, 1]"));
        }
        if self.shape.candidate_cap == 0 || self.shape.accepted_cap == 0 {
            return Err(anyhow!("shape caps must be at least 1"));
        }
        if self.color.hue_bins == 0 {
            return Err(anyhow!("hue_bins must be at least 1"));
        }
        if self.color.scan_cap == 0 {
            return Err(anyhow!("scan_cap must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.nms.iou_threshold) {
            return Err(anyhow!("nms iou_threshold must lie in [0, 1]"));
        }
        if self.nms.max_results == 0 {
            return Err(anyhow!("nms max_results must be at least 1"));
        }
        if self.stabilizer.quorum_frames == 0
            || self.stabilizer.quorum_min == 0
            || self.stabilizer.quorum_min > self.stabilizer.quorum_frames
            || self.stabilizer.quorum_frames > self.stabilizer.window_capacity
        {
            return Err(anyhow!(
                "stabilizer bounds must satisfy 1 <= quorum_min <= quorum_frames <= window_capacity"
            ));
        }
        if !(0.0..=1.0).contains(&self.neural.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must lie in [0, 1]"));
        }
        if self.neural.input_width == 0 || self.neural.input_height == 0 {
            return Err(anyhow!("neural input dimensions must be positive"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
