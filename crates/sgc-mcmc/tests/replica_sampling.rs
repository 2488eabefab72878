use std::collections::BTreeMap;
use std::thread;

use sgc_core::{Alphabet, Configuration, EnergyModel, RngHandle, SpeciesId};
use sgc_lattice::{FlatModel, LatticeShape, PairLatticeModel, PAIR_COEFFICIENT};
use sgc_mcmc::{
    ChannelReducer, ConvergenceStatus, EquilibrationConfig, Replica, RunConfig, SamplingConfig,
    SamplingMode,
};

fn pair_replica(seed: u64) -> Replica<PairLatticeModel> {
    let alphabet = Alphabet::new(&["Al", "Mg"]).unwrap();
    let mut coefficients = BTreeMap::new();
    coefficients.insert(PAIR_COEFFICIENT.to_string(), -0.03);
    let model = PairLatticeModel::new(
        LatticeShape::Square {
            width: 4,
            height: 4,
        },
        alphabet.clone(),
        &coefficients,
    )
    .unwrap();
    let config = Configuration::uniform(alphabet, 16, SpeciesId::from_raw(0)).unwrap();
    Replica::new(800.0, config, model, RngHandle::from_seed(seed)).unwrap()
}

fn quick_config() -> RunConfig {
    let mut config = RunConfig::default();
    config.equilibration = EquilibrationConfig {
        enabled: true,
        max_iterations: 20,
        window_length: 200,
        confidence_level: 0.05,
    };
    config.sampling.mode = SamplingMode::Fixed { sweeps: 50 };
    config
        .chemical_potentials
        .insert("c1_Mg".to_string(), 0.02);
    config
}

#[test]
fn cached_energy_tracks_the_model() {
    let mut replica = pair_replica(1);
    replica.run_sweeps(20).unwrap();
    assert!((replica.current_energy() - replica.model().current_energy()).abs() < 1e-9);
    assert_eq!(replica.accumulator().count(), 20.0 * 16.0);
    assert!(replica.acceptance_rate() > 0.0);
}

#[test]
fn measurement_restores_the_coefficients() {
    let mut replica = pair_replica(2);
    let before = replica.model().coefficient("c1_Mg");
    let thermo = replica.measure(&quick_config()).unwrap();
    assert_eq!(replica.model().coefficient("c1_Mg"), before);
    assert!(!replica.bias().is_active());

    assert_eq!(thermo.temperature, 800.0);
    assert_eq!(thermo.samples, 50.0 * 16.0);
    assert_eq!(thermo.chemical_potentials.get("c1_Mg"), Some(&0.02));
    let x = thermo.singlets["c1_Mg"];
    assert!((0.0..=1.0).contains(&x));
    assert!(thermo.singlet_variances["c1_Mg"] >= 0.0);
    assert!(thermo.heat_capacity >= 0.0);
}

#[test]
fn measurement_requires_chemical_potentials() {
    let mut replica = pair_replica(3);
    let mut config = quick_config();
    config.chemical_potentials.clear();
    let err = replica.measure(&config).unwrap_err();
    assert_eq!(err.info().code, "bias-empty");

    config.chemical_potentials.insert("c1_Zn".to_string(), 0.1);
    let err = replica.measure(&config).unwrap_err();
    assert!(err.is_usage());
}

#[test]
fn unbiased_energy_adds_back_the_potential() {
    let mut replica = pair_replica(4);
    let mut potentials = BTreeMap::new();
    potentials.insert("c1_Mg".to_string(), 0.02);
    replica.apply_bias(&potentials).unwrap();
    replica.run_sweeps(10).unwrap();
    let thermo = replica.thermodynamics().unwrap();
    let acc = replica.accumulator();
    let expected = acc.mean_energy() + 0.02 * acc.mean_singlets()[0] * 16.0;
    assert!((thermo.energy - expected).abs() < 1e-9);
    replica.revert_bias().unwrap();
}

#[test]
fn flat_energy_has_no_heat_capacity() {
    let alphabet = Alphabet::new(&["A", "B"]).unwrap();
    let config = Configuration::from_symbols(alphabet, &["A", "B", "A", "B"]).unwrap();
    let mut replica =
        Replica::new(500.0, config, FlatModel::new(-1.0), RngHandle::from_seed(4)).unwrap();
    replica.run_sweeps(10).unwrap();
    let thermo = replica.thermodynamics().unwrap();
    assert!((thermo.energy + 1.0).abs() < 1e-12);
    assert!(thermo.heat_capacity.abs() < 1e-12);
    assert_eq!(thermo.acceptance_rate, 1.0);
    assert_eq!(thermo.singlets.keys().collect::<Vec<_>>(), vec!["c1_B"]);
}

#[test]
fn precision_mode_stops_within_budget() {
    let mut replica = pair_replica(5);
    let sampling = SamplingConfig {
        mode: SamplingMode::Precision {
            precision: 0.05,
            confidence_level: 0.05,
            max_sweeps: 400,
            check_interval: 10,
        },
        ..SamplingConfig::default()
    };
    let outcome = replica.run(&sampling).unwrap();
    assert!(outcome.sweeps <= 400);
    assert!(outcome.sweeps % 10 == 0);
    let status = outcome.status.unwrap();
    assert_ne!(status, ConvergenceStatus::Sampling);
    if status == ConvergenceStatus::MaxIterReached {
        assert_eq!(outcome.sweeps, 400);
    }
}

#[test]
fn equilibration_resets_statistics() {
    let mut replica = pair_replica(6);
    let status = replica
        .equilibrate(&EquilibrationConfig {
            enabled: true,
            max_iterations: 5,
            window_length: 64,
            confidence_level: 0.05,
        })
        .unwrap();
    assert_ne!(status, ConvergenceStatus::Sampling);
    assert_eq!(replica.accumulator().count(), 0.0);
}

#[test]
fn correlation_time_is_estimated() {
    let mut replica = pair_replica(7);
    let tau = replica.estimate_correlation_time(40).unwrap();
    assert_eq!(replica.accumulator().correlation_time(), tau);
    if let Some(tau) = tau {
        assert!(tau > 0.0);
    }
    assert_eq!(replica.accumulator().count(), 0.0);
}

#[test]
fn clones_copy_state_and_reset_statistics() {
    let mut replica = pair_replica(8);
    replica.run_sweeps(5).unwrap();
    let clone = replica.clone_reset(400.0, RngHandle::from_seed(80)).unwrap();
    assert_eq!(clone.configuration(), replica.configuration());
    assert_eq!(clone.temperature(), 400.0);
    assert_eq!(clone.accumulator().count(), 0.0);
    assert_eq!(clone.acceptance_rate(), 0.0);
    assert!(replica.clone_reset(-1.0, RngHandle::from_seed(1)).is_err());
}

#[test]
fn workers_share_reduced_thermodynamics() {
    let reducers = ChannelReducer::group(3).unwrap();
    let handles: Vec<_> = reducers
        .into_iter()
        .enumerate()
        .map(|(rank, reducer)| {
            thread::spawn(move || {
                let mut replica = pair_replica(100 + rank as u64).with_reducer(Box::new(reducer));
                replica.run_sweeps(10).unwrap();
                replica.thermodynamics().unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for thermo in &results[1..] {
        assert_eq!(thermo.energy, results[0].energy);
        assert_eq!(thermo.singlets, results[0].singlets);
        assert_eq!(thermo.heat_capacity, results[0].heat_capacity);
    }
    assert_eq!(results[0].samples, 160.0);
}
