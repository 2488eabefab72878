use std::collections::BTreeMap;

use sgc_core::{EnergyModel, ErrorInfo, SgcError};
use tracing::{debug, warn};

/// Chemical potentials folded into an energy model's coefficients.
///
/// `apply` subtracts each potential from the coefficient of the same name and
/// remembers the original values; `revert` writes those values back verbatim,
/// so an apply/revert pair leaves the coefficients bit-identical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChemicalPotentialBias {
    potentials: BTreeMap<String, f64>,
    originals: BTreeMap<String, f64>,
    active: bool,
}

impl ChemicalPotentialBias {
    /// Creates an inactive bias.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while the potentials are folded into a model.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Potentials applied by the last successful `apply`, sorted by name.
    pub fn potentials(&self) -> &BTreeMap<String, f64> {
        &self.potentials
    }

    /// Folds `potentials` into `model`.
    ///
    /// Fails without touching the model when the bias is already active, the
    /// mapping is empty, a value is not finite or a name is unknown.
    pub fn apply<M: EnergyModel>(
        &mut self,
        model: &mut M,
        potentials: &BTreeMap<String, f64>,
    ) -> Result<(), SgcError> {
        if self.active {
            return Err(SgcError::usage(
                "bias-active",
                "chemical potentials are already folded into the coefficients",
            ));
        }
        if potentials.is_empty() {
            return Err(SgcError::Configuration(
                ErrorInfo::new("bias-empty", "no chemical potentials given")
                    .with_hint("supply a mapping such as {c1_Mg: -0.1}"),
            ));
        }
        let mut originals = BTreeMap::new();
        for (name, value) in potentials {
            if !value.is_finite() {
                return Err(SgcError::Usage(
                    ErrorInfo::new("bias-value", "chemical potential is not finite")
                        .with_context("name", name.clone()),
                ));
            }
            let original = model.coefficient(name).ok_or_else(|| {
                SgcError::Usage(
                    ErrorInfo::new("bias-name", "chemical potential has no matching coefficient")
                        .with_context("name", name.clone())
                        .with_hint(format!("known: {}", model.coefficient_names().join(","))),
                )
            })?;
            originals.insert(name.clone(), original);
        }
        for (name, value) in potentials {
            let original = originals[name];
            if let Err(err) = model.set_coefficient(name, original - value) {
                return Err(match restore(model, &originals) {
                    Some(rollback) => {
                        warn!(error = %rollback, "coefficients left partly biased");
                        err.with_context("rollback", rollback.to_string())
                    }
                    None => err,
                });
            }
        }
        debug!(names = ?potentials.keys().collect::<Vec<_>>(), "chemical potentials applied");
        self.potentials = potentials.clone();
        self.originals = originals;
        self.active = true;
        Ok(())
    }

    /// Restores the coefficients recorded by the matching `apply`.
    pub fn revert<M: EnergyModel>(&mut self, model: &mut M) -> Result<(), SgcError> {
        if !self.active {
            return Err(SgcError::usage(
                "bias-inactive",
                "chemical potentials were not applied",
            ));
        }
        for (name, original) in &self.originals {
            model.set_coefficient(name, *original)?;
        }
        self.originals.clear();
        self.active = false;
        debug!("chemical potentials reverted");
        Ok(())
    }

    /// Potential for each name in `names`, zero where none was applied.
    pub fn aligned(&self, names: &[String]) -> Vec<f64> {
        names
            .iter()
            .map(|name| self.potentials.get(name).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Writes every original back, returning the first failure.
fn restore<M: EnergyModel>(
    model: &mut M,
    originals: &BTreeMap<String, f64>,
) -> Option<SgcError> {
    let mut first = None;
    for (name, value) in originals {
        if let Err(err) = model.set_coefficient(name, *value) {
            first.get_or_insert(err);
        }
    }
    first
}
