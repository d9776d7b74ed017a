//! Tract-based neural detection strategy.
//!
//! Loads a local ONNX model and runs inference on BGR frames. The model is
//! executed through the optimized tract plan when possible; when
//! optimization fails at load time, or the optimized plan fails at run time,
//! the detector falls back to the unoptimized reference plan. The runtime
//! fallback is attempted exactly once.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use tract_onnx::prelude::*;

use crate::config::NeuralParams;
use crate::detect::result::{BoundingBox, DetectionResult};
use crate::detect::Detector;
use crate::frame::Frame;
use crate::lifecycle::{DetectorLifecycle, DetectorState};

type Plan = TypedSimplePlan<TypedModel>;

/// Which execution plan the detector currently runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlanKind {
    Optimized,
    Reference,
}

/// Optional filter restricting accepted class names.
///
/// Tokens are normalized (trimmed, lower-cased). A class name is accepted
/// when it matches a token exactly or contains one as a substring, case-
/// insensitively. An empty token set means no filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowList {
    tokens: BTreeSet<String>,
}

impl AllowList {
    /// Normalize tokens and build a filter. Returns `None` when no usable
    /// tokens remain, which callers treat as "accept all".
    pub fn from_tokens<I, S>(tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: BTreeSet<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens })
        }
    }

    pub fn accepts(&self, class_name: &str) -> bool {
        let name = class_name.trim().to_lowercase();
        self.tokens.contains(&name) || self.tokens.iter().any(|token| name.contains(token.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// ONNX object-detection wrapper.
///
/// The model handle is owned exclusively by this struct and must not be
/// mutated concurrently with `infer`; the single-frame-at-a-time caller is
/// responsible for quiescing before `unload`.
pub struct NeuralDetector {
    plan: Option<Plan>,
    reference_model: Option<TypedModel>,
    plan_kind: PlanKind,
    fallback_attempted: bool,
    params: NeuralParams,
    confidence_threshold: f32,
    allow_list: Option<AllowList>,
    class_names: Vec<String>,
    lifecycle: Arc<DetectorLifecycle>,
    last_detections: Vec<DetectionResult>,
}

impl NeuralDetector {
    pub fn new(
        params: NeuralParams,
        class_names: Vec<String>,
        lifecycle: Arc<DetectorLifecycle>,
    ) -> Self {
        let confidence_threshold = params.confidence_threshold;
        Self {
            plan: None,
            reference_model: None,
            plan_kind: PlanKind::Optimized,
            fallback_attempted: false,
            params,
            confidence_threshold,
            allow_list: None,
            class_names,
            lifecycle,
            last_detections: Vec::new(),
        }
    }

    pub fn lifecycle(&self) -> Arc<DetectorLifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Current lifecycle state and error message, read atomically.
    pub fn state(&self) -> (DetectorState, Option<String>) {
        self.lifecycle.snapshot()
    }

    /// Load an ONNX model from disk.
    ///
    /// Transitions the lifecycle Loading -> Ready on success and
    /// Loading -> Error with a message on failure; the failure itself never
    /// propagates to the caller.
    pub fn load(&mut self, model_path: &Path) -> bool {
        self.lifecycle.begin_loading();
        info!("loading model from {}", model_path.display());
        match self.try_load(model_path) {
            Ok(()) => {
                self.lifecycle.mark_ready();
                info!("model loaded successfully");
                true
            }
            Err(e) => {
                self.lifecycle.mark_error(format!("failed to load model: {:#}", e));
                false
            }
        }
    }

    fn try_load(&mut self, model_path: &Path) -> Result<()> {
        if !model_path.exists() {
            return Err(anyhow!("model file not found: {}", model_path.display()));
        }
        let height = self.params.input_height as usize;
        let width = self.params.input_width as usize;
        let inference = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to read ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, height, width)),
            )
            .context("failed to set input fact")?;
        let reference = inference.into_typed().context("failed to type ONNX model")?;

        let (plan, kind) = match reference.clone().into_optimized() {
            Ok(optimized) => {
                let plan = optimized
                    .into_runnable()
                    .context("failed to build optimized plan")?;
                (plan, PlanKind::Optimized)
            }
            Err(e) => {
                // Recoverable: the reference plan is slower but complete.
                warn!(
                    "model optimization failed ({:#}); falling back to the reference plan",
                    e
                );
                let plan = reference
                    .clone()
                    .into_runnable()
                    .context("failed to build reference plan")?;
                (plan, PlanKind::Reference)
            }
        };

        self.fallback_attempted = kind == PlanKind::Reference;
        self.reference_model = Some(reference);
        self.plan = Some(plan);
        self.plan_kind = kind;
        self.last_detections.clear();
        Ok(())
    }

    /// Update the confidence threshold used for filtering detections.
    /// Values outside [0, 1] are clamped.
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        if !threshold.is_finite() {
            warn!("ignoring non-finite confidence threshold");
            return;
        }
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        info!(
            "detection confidence threshold set to {:.2}",
            self.confidence_threshold
        );
    }

    /// Restrict accepted class names, or pass `None` to accept all.
    pub fn set_allow_list(&mut self, allow_list: Option<AllowList>) {
        match &allow_list {
            Some(list) => info!("detection class filter enabled for {} tokens", list.len()),
            None => info!("detection class filter disabled (allow all classes)"),
        }
        self.allow_list = allow_list;
    }

    /// Results of the most recent successful inference.
    pub fn last_detections(&self) -> Vec<DetectionResult> {
        self.last_detections.clone()
    }

    /// Run inference on one frame.
    ///
    /// Frame-level failures (bad input, plan errors after the one fallback
    /// retry) yield an empty list; the lifecycle state is untouched so a
    /// single bad frame cannot take down a healthy detector.
    pub fn infer(&mut self, frame: &Frame) -> Vec<DetectionResult> {
        if self.plan.is_none() {
            warn!("model not loaded, skipping inference");
            return Vec::new();
        }
        let input = match self.build_input(frame) {
            Ok(tensor) => tensor,
            Err(e) => {
                error!("inference input rejected: {:#}", e);
                return Vec::new();
            }
        };

        let outputs = match self.run_plan(&input) {
            Ok(outputs) => outputs,
            Err(first_err) => {
                if self.plan_kind == PlanKind::Optimized && !self.fallback_attempted {
                    warn!(
                        "optimized plan failed ({:#}); retrying once on the reference plan",
                        first_err
                    );
                    self.fallback_attempted = true;
                    if let Err(e) = self.rebuild_reference_plan() {
                        error!("reference plan rebuild failed: {:#}", e);
                        return Vec::new();
                    }
                    match self.run_plan(&input) {
                        Ok(outputs) => outputs,
                        Err(e) => {
                            error!("inference failed on reference plan: {:#}", e);
                            return Vec::new();
                        }
                    }
                } else {
                    error!("inference failed: {:#}", first_err);
                    return Vec::new();
                }
            }
        };

        match self.decode_outputs(&outputs) {
            Ok(detections) => {
                self.last_detections = detections.clone();
                detections
            }
            Err(e) => {
                error!("failed to decode model outputs: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Drop the model and return the lifecycle to Off.
    pub fn unload(&mut self) {
        if self.plan.take().is_some() {
            self.reference_model = None;
            self.fallback_attempted = false;
            self.last_detections.clear();
            self.lifecycle.set_off();
            info!("model unloaded");
        }
    }

    fn run_plan(&self, input: &Tensor) -> Result<TVec<TValue>> {
        let plan = self.plan.as_ref().ok_or_else(|| anyhow!("model not loaded"))?;
        plan.run(tvec!(input.clone().into()))
            .context("model execution failed")
    }

    fn rebuild_reference_plan(&mut self) -> Result<()> {
        let model = self
            .reference_model
            .clone()
            .ok_or_else(|| anyhow!("reference model unavailable"))?;
        let plan = model
            .into_runnable()
            .context("failed to build reference plan")?;
        self.plan = Some(plan);
        self.plan_kind = PlanKind::Reference;
        Ok(())
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width() != self.params.input_width || frame.height() != self.params.input_height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width(),
                frame.height(),
                self.params.input_width,
                self.params.input_height
            ));
        }
        let height = frame.height() as usize;
        let width = frame.width() as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height, width),
            |(_, channel, y, x)| {
                let [r, g, b] = frame.rgb_at(x as u32, y as u32);
                let value = match channel {
                    0 => r,
                    1 => g,
                    _ => b,
                };
                f32::from(value) / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    /// Convert raw model outputs into detection results.
    ///
    /// Expects one output tensor whose trailing dimension holds rows of
    /// `[x1, y1, x2, y2, score, class]`.
    fn decode_outputs(&self, outputs: &TVec<TValue>) -> Result<Vec<DetectionResult>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let cols = *view
            .shape()
            .last()
            .ok_or_else(|| anyhow!("model output has no shape"))?;
        if cols < 6 {
            return Err(anyhow!("unexpected model output shape {:?}", view.shape()));
        }
        let data = view
            .as_slice()
            .ok_or_else(|| anyhow!("model output not contiguous"))?;
        Ok(decode_rows(
            data.chunks_exact(cols),
            self.confidence_threshold,
            self.allow_list.as_ref(),
            &self.class_names,
        ))
    }
}

impl Detector for NeuralDetector {
    fn name(&self) -> &'static str {
        "neural"
    }

    fn detect(&mut self, frame: &Frame) -> Vec<DetectionResult> {
        self.infer(frame)
    }
}

/// Filter and convert raw output rows.
///
/// Rows below the confidence threshold, rows rejected by the allow-list, and
/// rows that fail result validation are skipped individually.
fn decode_rows<'a, I>(
    rows: I,
    threshold: f32,
    allow_list: Option<&AllowList>,
    class_names: &[String],
) -> Vec<DetectionResult>
where
    I: Iterator<Item = &'a [f32]>,
{
    let mut detections = Vec::new();
    for row in rows {
        let (x1, y1, x2, y2, score, class) = (row[0], row[1], row[2], row[3], row[4], row[5]);
        if !score.is_finite() || score < threshold {
            continue;
        }
        if !class.is_finite() || class < 0.0 {
            continue;
        }
        let class_idx = class as usize;
        let class_name = class_names
            .get(class_idx)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_idx));
        if let Some(list) = allow_list {
            if !list.accepts(&class_name) {
                continue;
            }
        }
        let x = x1.min(x2).floor() as i32;
        let y = y1.min(y2).floor() as i32;
        let w = (x2 - x1).abs().round() as u32;
        let h = (y2 - y1).abs().round() as u32;
        match DetectionResult::new(class_name, BoundingBox::new(x, y, w, h), score) {
            Ok(detection) => detections.push(detection),
            Err(e) => debug!("discarding malformed detection row: {}", e),
        }
    }
    detections
}
