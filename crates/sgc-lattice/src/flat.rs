use sgc_core::{Configuration, EnergyModel, ErrorInfo, SgcError, SiteChange};

/// Coefficient holding the total energy of a [`FlatModel`].
pub const FLAT_ENERGY_COEFFICIENT: &str = "e0";

/// Energy model whose energy ignores the configuration.
///
/// Every move has zero delta and every replica exchange is accepted, which
/// makes it a calibration fixture for the ladder search and the scheduler.
#[derive(Debug, Clone)]
pub struct FlatModel {
    energy: f64,
    counts: Vec<usize>,
    sites: usize,
    names: Vec<String>,
    pending: Option<SiteChange>,
}

impl FlatModel {
    /// Creates a flat model with total energy `energy`.
    pub fn new(energy: f64) -> Self {
        Self {
            energy,
            counts: Vec::new(),
            sites: 0,
            names: Vec::new(),
            pending: None,
        }
    }
}

impl EnergyModel for FlatModel {
    fn initialize(&mut self, config: &Configuration) -> Result<(), SgcError> {
        self.counts = config.composition();
        self.sites = config.len();
        self.names = config.alphabet().symbols()[1..]
            .iter()
            .map(|s| format!("c1_{s}"))
            .collect();
        self.pending = None;
        Ok(())
    }

    fn current_energy(&self) -> f64 {
        self.energy
    }

    fn apply_change(&mut self, _config: &Configuration, change: &SiteChange) -> Result<f64, SgcError> {
        if change.new.index() >= self.counts.len() || change.old.index() >= self.counts.len() {
            return Err(SgcError::Model(ErrorInfo::new(
                "flat-uninitialized",
                "flat model was not initialized with this alphabet",
            )));
        }
        self.counts[change.old.index()] -= 1;
        self.counts[change.new.index()] += 1;
        self.pending = Some(*change);
        Ok(0.0)
    }

    fn revert_last_change(&mut self) {
        if let Some(change) = self.pending.take() {
            self.counts[change.new.index()] -= 1;
            self.counts[change.old.index()] += 1;
        }
    }

    fn singlets(&self) -> Vec<f64> {
        let n = self.sites.max(1) as f64;
        self.counts.iter().skip(1).map(|&c| c as f64 / n).collect()
    }

    fn singlet_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn coefficient_names(&self) -> Vec<String> {
        vec![FLAT_ENERGY_COEFFICIENT.to_string()]
    }

    fn coefficient(&self, name: &str) -> Option<f64> {
        (name == FLAT_ENERGY_COEFFICIENT).then_some(self.energy)
    }

    fn set_coefficient(&mut self, name: &str, value: f64) -> Result<(), SgcError> {
        if name != FLAT_ENERGY_COEFFICIENT {
            return Err(SgcError::Model(
                ErrorInfo::new("unknown-coefficient", "flat model only exposes e0")
                    .with_context("name", name),
            ));
        }
        self.energy = value;
        Ok(())
    }
}
