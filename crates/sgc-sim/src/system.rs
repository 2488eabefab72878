use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sgc_core::{Alphabet, Configuration, ErrorInfo, RngHandle, SgcError};
use sgc_lattice::{LatticeShape, PairLatticeModel};
use sgc_mcmc::{Replica, RunConfig};

/// Reference lattice system the CLI samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub lattice: LatticeShape,
    /// Species symbols; the first one is the reference species.
    pub species: Vec<String>,
    #[serde(default)]
    pub initial: InitialState,
    /// Model coefficients by name (`c0`, `c1_<symbol>`, `c2_nn`).
    #[serde(default)]
    pub coefficients: BTreeMap<String, f64>,
    /// Linear vibrational free energy per `kB T`, keyed by singlet name.
    #[serde(default)]
    pub vibration: BTreeMap<String, f64>,
}

/// Starting occupation of the lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InitialState {
    /// Every site holds `symbol`, the reference species when omitted.
    Fill {
        #[serde(default)]
        symbol: Option<String>,
    },
    /// One symbol per site.
    Sites { symbols: Vec<String> },
}

impl Default for InitialState {
    fn default() -> Self {
        InitialState::Fill { symbol: None }
    }
}

impl SystemConfig {
    /// Builds the initial configuration on the lattice.
    pub fn configuration(&self) -> Result<Configuration, SgcError> {
        let alphabet = Alphabet::new(&self.species)?;
        let sites = self.lattice.sites();
        match &self.initial {
            InitialState::Fill { symbol } => {
                let fill = match symbol {
                    Some(symbol) => alphabet.id_of(symbol)?,
                    None => alphabet.id_of(&self.species[0])?,
                };
                Configuration::uniform(alphabet, sites, fill)
            }
            InitialState::Sites { symbols } => {
                if symbols.len() != sites {
                    return Err(SgcError::Configuration(
                        ErrorInfo::new("initial-sites", "initial symbols do not cover the lattice")
                            .with_context("sites", sites.to_string())
                            .with_context("symbols", symbols.len().to_string()),
                    ));
                }
                Configuration::from_symbols(alphabet, symbols)
            }
        }
    }

    /// Energy model for the lattice, vibrational term included when given.
    pub fn model(&self) -> Result<PairLatticeModel, SgcError> {
        let alphabet = Alphabet::new(&self.species)?;
        let model = PairLatticeModel::new(self.lattice, alphabet, &self.coefficients)?;
        if self.vibration.is_empty() {
            Ok(model)
        } else {
            model.with_linear_vib(self.vibration.clone())
        }
    }

    /// Fresh replica at `temperature`.
    pub fn replica(
        &self,
        temperature: f64,
        rng: RngHandle,
    ) -> Result<Replica<PairLatticeModel>, SgcError> {
        Replica::new(temperature, self.configuration()?, self.model()?, rng)
    }
}

/// Simulation file: a `system` section next to the run configuration keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationFile {
    pub system: SystemConfig,
    #[serde(flatten)]
    pub run: RunConfig,
}

impl SimulationFile {
    pub fn from_yaml(text: &str) -> Result<Self, SgcError> {
        let file: SimulationFile = serde_yaml::from_str(text)
            .map_err(|err| SgcError::Serde(ErrorInfo::new("simulation-parse", err.to_string())))?;
        file.run.validate()?;
        Ok(file)
    }

    /// Reads the file and points the run artefacts at `out_dir`.
    pub fn load(path: &Path, out_dir: &Path) -> Result<Self, SgcError> {
        let text = fs::read_to_string(path).map_err(|err| {
            SgcError::Storage(
                ErrorInfo::new("simulation-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let mut file = Self::from_yaml(&text)?;
        file.run.output.run_directory = Some(out_dir.to_path_buf());
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgc_core::EnergyModel;
    use sgc_mcmc::SamplingMode;

    const FILE: &str = r#"
system:
  lattice:
    type: square
    width: 4
    height: 4
  species: [Al, Mg]
  coefficients:
    c2_nn: -0.02
  vibration:
    c1_Mg: 0.5
ladder:
  t_max: 1000
  t_min: 200
sampling:
  mode:
    type: fixed
    sweeps: 20
chemical_potentials:
  c1_Mg: 0.1
"#;

    #[test]
    fn system_and_run_sections_share_a_file() {
        let file = SimulationFile::from_yaml(FILE).unwrap();
        assert_eq!(file.system.lattice.sites(), 16);
        assert_eq!(file.run.ladder.t_max, 1000.0);
        assert_eq!(file.run.sampling.mode, SamplingMode::Fixed { sweeps: 20 });
        assert_eq!(file.run.chemical_potentials["c1_Mg"], 0.1);
        assert_eq!(file.run.exchange.cycles, 10);

        let replica = file.system.replica(500.0, RngHandle::from_seed(1)).unwrap();
        assert_eq!(replica.sites(), 16);
        assert_eq!(replica.model().coefficient("c2_nn"), Some(-0.02));
        assert_eq!(replica.model().vib_energy(500.0), 0.0);
    }

    #[test]
    fn explicit_sites_must_cover_the_lattice() {
        let mut system = SimulationFile::from_yaml(FILE).unwrap().system;
        system.initial = InitialState::Sites {
            symbols: vec!["Mg".to_string(); 3],
        };
        let err = system.configuration().unwrap_err();
        assert_eq!(err.info().code, "initial-sites");

        system.initial = InitialState::Fill {
            symbol: Some("Mg".to_string()),
        };
        let config = system.configuration().unwrap();
        assert_eq!(config.composition(), vec![0, 16]);
    }

    #[test]
    fn loading_points_output_at_the_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.yaml");
        fs::write(&path, FILE).unwrap();
        let out = dir.path().join("out");
        let file = SimulationFile::load(&path, &out).unwrap();
        assert_eq!(file.run.output.run_directory.as_deref(), Some(out.as_path()));
        assert_eq!(file.run.ladder_path(), Some(out.join("temp_scheme.csv")));
        assert!(SimulationFile::load(&dir.path().join("nope.yaml"), &out).is_err());
    }
}
