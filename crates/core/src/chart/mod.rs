use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{Carrier, Category, Result};

/// Carrier list as produced by an offline timeline processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartFile {
    #[serde(default)]
    pub carriers: Vec<Carrier>,
}

impl ChartFile {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let chart: Self = serde_json::from_str(json)?;
        chart.validate()?;
        Ok(chart)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        for (index, carrier) in self.carriers.iter().enumerate() {
            carrier.validate(index)?;
        }
        Ok(())
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<Category> {
        let mut seen = Vec::new();
        for carrier in &self.carriers {
            if !seen.contains(&carrier.category) {
                seen.push(carrier.category);
            }
        }
        seen
    }

    /// Latest end time over all carriers, or `0.0` for an empty chart.
    pub fn end_time(&self) -> f64 {
        self.carriers
            .iter()
            .map(Carrier::end_time)
            .fold(0.0, f64::max)
    }

    pub fn into_arena(self) -> Arc<[Carrier]> {
        Arc::from(self.carriers)
    }
}
