use std::collections::BTreeMap;
use std::sync::Arc;

use sgc_core::{Alphabet, Configuration, EnergyModel, ErrorInfo, SgcError, SiteChange, BOLTZMANN_EV};

use crate::shape::LatticeShape;

/// Per-site constant coefficient name.
pub const CONSTANT_COEFFICIENT: &str = "c0";
/// Like-species nearest-neighbour bond coefficient name.
pub const PAIR_COEFFICIENT: &str = "c2_nn";

/// Nearest-neighbour lattice gas with named coefficients.
///
/// `E = N c0 + sum_k c1_k n_k + c2_nn * like_bonds`, where `n_k` counts sites
/// occupied by non-reference species `k` and `c1_k` is named `c1_<symbol>`.
#[derive(Debug, Clone)]
pub struct PairLatticeModel {
    shape: LatticeShape,
    alphabet: Alphabet,
    neighbours: Arc<Vec<Vec<usize>>>,
    bonds: Arc<Vec<(usize, usize)>>,
    coefficients: BTreeMap<String, f64>,
    vib_per_kbt: BTreeMap<String, f64>,
    counts: Vec<usize>,
    like_bonds: i64,
    energy: f64,
    pending: Option<Pending>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    change: SiteChange,
    delta_like: i64,
    delta_energy: f64,
}

impl PairLatticeModel {
    /// Creates a model; coefficients missing from `coefficients` default to zero.
    pub fn new(
        shape: LatticeShape,
        alphabet: Alphabet,
        coefficients: &BTreeMap<String, f64>,
    ) -> Result<Self, SgcError> {
        shape.validate()?;
        let mut table = BTreeMap::new();
        table.insert(CONSTANT_COEFFICIENT.to_string(), 0.0);
        table.insert(PAIR_COEFFICIENT.to_string(), 0.0);
        for symbol in &alphabet.symbols()[1..] {
            table.insert(singlet_name(symbol), 0.0);
        }
        for (name, value) in coefficients {
            match table.get_mut(name) {
                Some(slot) => *slot = *value,
                None => return Err(unknown_coefficient(name, &table)),
            }
        }
        let counts = vec![0; alphabet.len()];
        Ok(Self {
            shape,
            neighbours: Arc::new(shape.neighbours()),
            bonds: Arc::new(shape.bonds()),
            alphabet,
            coefficients: table,
            vib_per_kbt: BTreeMap::new(),
            counts,
            like_bonds: 0,
            energy: 0.0,
            pending: None,
        })
    }

    /// Adds a linear vibrational correction `kB T * sum_k v_k n_k` keyed by
    /// singlet coefficient name.
    pub fn with_linear_vib(mut self, per_kbt: BTreeMap<String, f64>) -> Result<Self, SgcError> {
        let names = self.singlet_names();
        if let Some(bad) = per_kbt.keys().find(|name| !names.contains(name)) {
            return Err(unknown_coefficient(bad, &self.coefficients));
        }
        self.vib_per_kbt = per_kbt;
        Ok(self)
    }

    /// Lattice geometry of the model.
    pub fn shape(&self) -> LatticeShape {
        self.shape
    }

    /// Number of like-species bonds in the mirrored configuration.
    pub fn like_bonds(&self) -> i64 {
        self.like_bonds
    }

    fn sites(&self) -> usize {
        self.shape.sites()
    }

    fn singlet_coefficient(&self, species: usize) -> f64 {
        if species == 0 {
            return 0.0;
        }
        let name = singlet_name(&self.alphabet.symbols()[species]);
        self.coefficients.get(&name).copied().unwrap_or(0.0)
    }

    fn coeff(&self, name: &str) -> f64 {
        self.coefficients.get(name).copied().unwrap_or(0.0)
    }

    fn recompute_energy(&mut self) {
        let mut energy = self.sites() as f64 * self.coeff(CONSTANT_COEFFICIENT);
        for (species, count) in self.counts.iter().enumerate().skip(1) {
            energy += self.singlet_coefficient(species) * *count as f64;
        }
        energy += self.coeff(PAIR_COEFFICIENT) * self.like_bonds as f64;
        self.energy = energy;
    }
}

impl EnergyModel for PairLatticeModel {
    fn initialize(&mut self, config: &Configuration) -> Result<(), SgcError> {
        if config.len() != self.sites() {
            return Err(SgcError::Configuration(
                ErrorInfo::new("lattice-size", "configuration does not match lattice size")
                    .with_context("expected", self.sites().to_string())
                    .with_context("actual", config.len().to_string()),
            ));
        }
        if config.alphabet() != &self.alphabet {
            return Err(SgcError::configuration(
                "alphabet-mismatch",
                "configuration alphabet differs from the model alphabet",
            ));
        }
        let sites = config.sites();
        self.counts = config.composition();
        self.like_bonds = self
            .bonds
            .iter()
            .filter(|(i, j)| sites[*i] == sites[*j])
            .count() as i64;
        self.pending = None;
        self.recompute_energy();
        Ok(())
    }

    fn current_energy(&self) -> f64 {
        self.energy
    }

    fn apply_change(
        &mut self,
        config: &Configuration,
        change: &SiteChange,
    ) -> Result<f64, SgcError> {
        if change.site >= self.sites() || !self.alphabet.contains(change.new) {
            return Err(SgcError::Model(
                ErrorInfo::new("invalid-change", "change does not fit the lattice")
                    .with_context("site", change.site.to_string())
                    .with_context("species", change.new.as_raw().to_string()),
            ));
        }
        let sites = config.sites();
        let mut delta_like = 0i64;
        for &nb in &self.neighbours[change.site] {
            if sites[nb] == change.new {
                delta_like += 1;
            }
            if sites[nb] == change.old {
                delta_like -= 1;
            }
        }
        let delta_energy = self.singlet_coefficient(change.new.index())
            - self.singlet_coefficient(change.old.index())
            + self.coeff(PAIR_COEFFICIENT) * delta_like as f64;

        self.counts[change.old.index()] -= 1;
        self.counts[change.new.index()] += 1;
        self.like_bonds += delta_like;
        self.energy += delta_energy;
        self.pending = Some(Pending {
            change: *change,
            delta_like,
            delta_energy,
        });
        Ok(delta_energy)
    }

    fn revert_last_change(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.counts[pending.change.new.index()] -= 1;
            self.counts[pending.change.old.index()] += 1;
            self.like_bonds -= pending.delta_like;
            self.energy -= pending.delta_energy;
        }
    }

    fn singlets(&self) -> Vec<f64> {
        let n = self.sites() as f64;
        self.counts[1..].iter().map(|&c| c as f64 / n).collect()
    }

    fn singlet_names(&self) -> Vec<String> {
        self.alphabet.symbols()[1..]
            .iter()
            .map(|s| singlet_name(s))
            .collect()
    }

    fn coefficient_names(&self) -> Vec<String> {
        self.coefficients.keys().cloned().collect()
    }

    fn coefficient(&self, name: &str) -> Option<f64> {
        self.coefficients.get(name).copied()
    }

    fn set_coefficient(&mut self, name: &str, value: f64) -> Result<(), SgcError> {
        match self.coefficients.get_mut(name) {
            Some(slot) => *slot = value,
            None => return Err(unknown_coefficient(name, &self.coefficients)),
        }
        self.pending = None;
        self.recompute_energy();
        Ok(())
    }

    fn vib_energy(&self, temperature: f64) -> f64 {
        if self.vib_per_kbt.is_empty() {
            return 0.0;
        }
        let kbt = BOLTZMANN_EV * temperature;
        self.alphabet.symbols()[1..]
            .iter()
            .zip(self.counts[1..].iter())
            .map(|(symbol, &count)| {
                self.vib_per_kbt.get(&singlet_name(symbol)).copied().unwrap_or(0.0) * count as f64
            })
            .sum::<f64>()
            * kbt
    }
}

/// Singlet coefficient name for a species symbol.
pub fn singlet_name(symbol: &str) -> String {
    format!("c1_{symbol}")
}

fn unknown_coefficient(name: &str, table: &BTreeMap<String, f64>) -> SgcError {
    SgcError::Model(
        ErrorInfo::new("unknown-coefficient", "model has no coefficient with this name")
            .with_context("name", name)
            .with_hint(format!(
                "known coefficients: {}",
                table.keys().cloned().collect::<Vec<_>>().join(",")
            )),
    )
}
