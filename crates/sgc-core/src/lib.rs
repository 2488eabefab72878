#![deny(missing_docs)]
#![doc = "Core traits and data types for the semi-grand-canonical sampler."]

pub mod errors;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, SgcError};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{Alphabet, Configuration, SiteChange, SpeciesId};

/// Boltzmann constant in eV/K.
pub const BOLTZMANN_EV: f64 = 8.617_333_262e-5;

/// Inverse temperature `1 / (kB T)` for a temperature in Kelvin.
pub fn beta(temperature: f64) -> f64 {
    1.0 / (BOLTZMANN_EV * temperature)
}

/// Incremental energy evaluator consumed by the samplers.
///
/// A model mirrors the configuration it was initialised from. The sampler
/// calls [`EnergyModel::apply_change`] before mutating the configuration; the
/// model updates its internal state tentatively and returns the energy delta.
/// The change is kept on acceptance and undone with
/// [`EnergyModel::revert_last_change`] on rejection.
pub trait EnergyModel: Clone + Send {
    /// Rebuilds all internal state from `config`.
    fn initialize(&mut self, config: &Configuration) -> Result<(), SgcError>;

    /// Total energy of the mirrored configuration, chemical-potential bias
    /// included when one is folded into the coefficients.
    fn current_energy(&self) -> f64;

    /// Tentatively applies `change` and returns the energy delta.
    ///
    /// `config` is the state before the change.
    fn apply_change(&mut self, config: &Configuration, change: &SiteChange)
        -> Result<f64, SgcError>;

    /// Undoes the most recent [`EnergyModel::apply_change`].
    fn revert_last_change(&mut self);

    /// Average occupation of every non-reference species.
    fn singlets(&self) -> Vec<f64>;

    /// Coefficient names paired with [`EnergyModel::singlets`], same order.
    fn singlet_names(&self) -> Vec<String>;

    /// Names of all coefficients which may be read or written.
    fn coefficient_names(&self) -> Vec<String>;

    /// Current value of a coefficient.
    fn coefficient(&self, name: &str) -> Option<f64>;

    /// Overwrites a coefficient and refreshes the cached energy.
    fn set_coefficient(&mut self, name: &str, value: f64) -> Result<(), SgcError>;

    /// Temperature dependent vibrational contribution. Zero unless overridden.
    fn vib_energy(&self, _temperature: f64) -> f64 {
        0.0
    }
}
