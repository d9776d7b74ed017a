//! Part catalog and inventory accounting.
//!
//! The catalog is owned by the surrounding application (set loading is out of
//! scope); the engine only needs to know which parts are still outstanding
//! and to report found units back. `PartInventory` is that seam.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// One part identity the engine can recognize.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CatalogPart {
    pub part_id: String,
    pub color: String,
    pub quantity: u32,
    #[serde(default)]
    pub found: u32,
}

impl CatalogPart {
    pub fn new(part_id: impl Into<String>, color: impl Into<String>, quantity: u32) -> Result<Self> {
        if quantity == 0 {
            return Err(anyhow!("part quantity must be positive"));
        }
        Ok(Self {
            part_id: part_id.into(),
            color: color.into(),
            quantity,
            found: 0,
        })
    }

    /// Human-readable label, color first.
    pub fn name(&self) -> String {
        format!("{} {}", self.color, self.part_id)
    }

    pub fn is_fully_found(&self) -> bool {
        self.found >= self.quantity
    }

    pub fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.found)
    }
}

/// Inventory view consumed by detectors.
pub trait PartInventory: Send + Sync {
    /// Parts not yet fully satisfied.
    fn outstanding(&self) -> Vec<CatalogPart>;

    /// Record up to `count` found units of a part. Returns the number of
    /// units actually recorded (0 for unknown or already-complete parts).
    fn mark_found(&self, part_id: &str, count: u32) -> u32;
}

/// Mutex-guarded inventory for one set's part list.
pub struct SetInventory {
    name: String,
    parts: Mutex<Vec<CatalogPart>>,
}

impl SetInventory {
    pub fn new(name: impl Into<String>, parts: Vec<CatalogPart>) -> Self {
        Self {
            name: name.into(),
            parts: Mutex::new(parts),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the full part list.
    pub fn parts(&self) -> Vec<CatalogPart> {
        self.lock().clone()
    }

    /// Fraction of required units found so far, in [0, 1].
    pub fn completion(&self) -> f32 {
        let parts = self.lock();
        let required: u32 = parts.iter().map(|p| p.quantity).sum();
        if required == 0 {
            return 1.0;
        }
        let found: u32 = parts.iter().map(|p| p.found.min(p.quantity)).sum();
        found as f32 / required as f32
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CatalogPart>> {
        self.parts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PartInventory for SetInventory {
    fn outstanding(&self) -> Vec<CatalogPart> {
        self.lock()
            .iter()
            .filter(|p| !p.is_fully_found())
            .cloned()
            .collect()
    }

    fn mark_found(&self, part_id: &str, count: u32) -> u32 {
        let mut parts = self.lock();
        let Some(part) = parts.iter_mut().find(|p| p.part_id == part_id) else {
            log::debug!("mark_found for unknown part {}", part_id);
            return 0;
        };
        let recorded = count.min(part.remaining());
        part.found += recorded;
        if recorded > 0 {
            log::info!(
                "marked {} x{} found ({}/{})",
                part.name(),
                recorded,
                part.found,
                part.quantity
            );
        }
        recorded
    }
}
