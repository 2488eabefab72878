use std::path::Path;

use serde::{Deserialize, Serialize};
use sgc_core::{ErrorInfo, SgcError};

/// Per-cycle, per-rung metrics stored for CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Exchange cycle the sample closes.
    pub cycle: usize,
    /// Ladder position, hottest first.
    pub rung: usize,
    /// Temperature of the rung (K).
    pub temperature: f64,
    /// Cached energy after the exchange step (eV).
    pub energy: f64,
    /// Mean accumulated energy of the rung so far (eV).
    pub mean_energy: f64,
    /// Samples accumulated by the rung so far.
    pub samples: f64,
    /// Trial-move acceptance rate of the rung so far.
    pub move_acceptance: f64,
    /// Whether the rung gave its configuration away this cycle.
    pub swapped: bool,
}

/// Collects per-cycle metrics.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<MetricSample>,
}

impl MetricsRecorder {
    /// Creates a new recorder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a metrics sample.
    pub fn push_sample(&mut self, sample: MetricSample) {
        self.samples.push(sample);
    }

    /// Returns an immutable view over the recorded samples.
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Writes the recorded metrics to a CSV file with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<(), SgcError> {
        let wrap = |err: csv::Error| {
            SgcError::Storage(
                ErrorInfo::new("metrics-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        };
        let mut writer = csv::Writer::from_path(path).map_err(wrap)?;
        for sample in &self.samples {
            writer.serialize(sample).map_err(wrap)?;
        }
        writer.flush().map_err(|err| {
            SgcError::Storage(
                ErrorInfo::new("metrics-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
