use crate::{color::DrawColor, registry::ClassRegistry};
use std::collections::BTreeMap;

/// Per-class detection counts for a single image.
///
/// Every registered class starts at zero. Ids that are not registered get
/// their own entry the first time they are seen, so no detection is lost
/// from the totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionCounts {
    registered: BTreeMap<u32, usize>,
    unregistered: BTreeMap<u32, usize>,
}

impl DetectionCounts {
    pub fn new(registry: &ClassRegistry) -> Self {
        Self {
            registered: registry.class_ids().map(|id| (id, 0)).collect(),
            unregistered: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, class_id: u32) {
        match self.registered.get_mut(&class_id) {
            Some(count) => *count += 1,
            None => *self.unregistered.entry(class_id).or_insert(0) += 1,
        }
    }

    pub fn get(&self, class_id: u32) -> usize {
        self.registered
            .get(&class_id)
            .or_else(|| self.unregistered.get(&class_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn registered(&self) -> &BTreeMap<u32, usize> {
        &self.registered
    }

    pub fn unregistered(&self) -> &BTreeMap<u32, usize> {
        &self.unregistered
    }

    pub fn registered_total(&self) -> usize {
        self.registered.values().sum()
    }

    pub fn unregistered_total(&self) -> usize {
        self.unregistered.values().sum()
    }

    pub fn total(&self) -> usize {
        self.registered_total() + self.unregistered_total()
    }

    /// Registered classes first, in id order, then unregistered ids.
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.registered
            .iter()
            .chain(self.unregistered.iter())
            .map(|(id, count)| (*id, *count))
    }

    /// Normalizes the counts by `total_detections`.
    ///
    /// Returns `None` when there is nothing to normalize by.
    pub fn percentages(
        &self,
        registry: &ClassRegistry,
        total_detections: usize,
    ) -> Option<PercentageTable> {
        if total_detections == 0 {
            return None;
        }

        let rows = self
            .iter()
            .map(|(class_id, count)| {
                let info = registry.resolve(class_id);
                ClassPercentage {
                    class_id,
                    display_name: info.display_name.clone(),
                    color: info.color,
                    count,
                    percentage: count as f64 / total_detections as f64 * 100.0,
                }
            })
            .collect();

        Some(PercentageTable {
            rows,
            total_detections,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassPercentage {
    pub class_id: u32,
    pub display_name: String,
    pub color: DrawColor,
    pub count: usize,
    pub percentage: f64,
}

/// Percentage of detections per class, in chart order.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentageTable {
    rows: Vec<ClassPercentage>,
    total_detections: usize,
}

impl PercentageTable {
    pub fn rows(&self) -> &[ClassPercentage] {
        &self.rows
    }

    pub fn total_detections(&self) -> usize {
        self.total_detections
    }

    pub fn get(&self, class_id: u32) -> Option<&ClassPercentage> {
        self.rows.iter().find(|row| row.class_id == class_id)
    }

    pub fn sum(&self) -> f64 {
        self.rows.iter().map(|row| row.percentage).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
