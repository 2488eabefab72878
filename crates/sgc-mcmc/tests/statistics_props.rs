use std::collections::BTreeMap;

use proptest::prelude::*;
use sgc_core::{Alphabet, EnergyModel};
use sgc_lattice::{LatticeShape, PairLatticeModel, CONSTANT_COEFFICIENT, PAIR_COEFFICIENT};
use sgc_mcmc::{ChemicalPotentialBias, ObservableAccumulator};

fn model(coefficients: &BTreeMap<String, f64>) -> PairLatticeModel {
    let alphabet = Alphabet::new(&["Al", "Mg", "Si"]).unwrap();
    PairLatticeModel::new(LatticeShape::Chain { length: 6 }, alphabet, coefficients).unwrap()
}

proptest! {
    #[test]
    fn variances_never_go_negative(
        base in -1.0e6f64..1.0e6,
        jitter in prop::collection::vec(-1.0e-9f64..1.0e-9, 1..200),
        singlet in 0.0f64..1.0,
    ) {
        let mut acc = ObservableAccumulator::new(2);
        for dx in &jitter {
            acc.record(base + dx, &[singlet, singlet + dx]).unwrap();
        }
        prop_assert!(acc.variance_energy() >= 0.0);
        prop_assert!(acc.variance_singlets().iter().all(|v| *v >= 0.0));
        prop_assert!(acc.variance_of_mean_energy() >= 0.0);
        prop_assert!(acc.variance_of_mean_singlets().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn bias_round_trip_is_bit_identical(
        c0 in -10.0f64..10.0,
        c2 in -1.0f64..1.0,
        c1_mg in -1.0f64..1.0,
        mu_mg in -2.0f64..2.0,
        mu_si in -2.0f64..2.0,
    ) {
        let mut coefficients = BTreeMap::new();
        coefficients.insert(CONSTANT_COEFFICIENT.to_string(), c0);
        coefficients.insert(PAIR_COEFFICIENT.to_string(), c2);
        coefficients.insert("c1_Mg".to_string(), c1_mg);
        let mut model = model(&coefficients);
        let before: Vec<u64> = model
            .coefficient_names()
            .iter()
            .map(|name| model.coefficient(name).unwrap().to_bits())
            .collect();

        let mut potentials = BTreeMap::new();
        potentials.insert("c1_Mg".to_string(), mu_mg);
        potentials.insert("c1_Si".to_string(), mu_si);
        let mut bias = ChemicalPotentialBias::new();
        bias.apply(&mut model, &potentials).unwrap();
        prop_assert_eq!(model.coefficient("c1_Si").unwrap(), 0.0 - mu_si);
        bias.revert(&mut model).unwrap();

        let after: Vec<u64> = model
            .coefficient_names()
            .iter()
            .map(|name| model.coefficient(name).unwrap().to_bits())
            .collect();
        prop_assert_eq!(before, after);
    }
}

#[test]
fn bias_misuse_is_reported() {
    let mut model = model(&BTreeMap::new());
    let mut bias = ChemicalPotentialBias::new();
    assert!(bias.revert(&mut model).unwrap_err().is_usage());

    let empty = BTreeMap::new();
    let err = bias.apply(&mut model, &empty).unwrap_err();
    assert_eq!(err.info().code, "bias-empty");

    let mut unknown = BTreeMap::new();
    unknown.insert("c1_Fe".to_string(), 0.1);
    let err = bias.apply(&mut model, &unknown).unwrap_err();
    assert!(err.is_usage());
    assert_eq!(err.info().code, "bias-name");

    let mut potentials = BTreeMap::new();
    potentials.insert("c1_Mg".to_string(), 0.25);
    bias.apply(&mut model, &potentials).unwrap();
    assert!(bias.is_active());
    assert_eq!(bias.apply(&mut model, &potentials).unwrap_err().info().code, "bias-active");
    assert_eq!(
        bias.aligned(&["c1_Mg".to_string(), "c1_Si".to_string()]),
        vec![0.25, 0.0]
    );
}

#[test]
fn non_finite_potentials_leave_the_model_untouched() {
    let mut model = model(&BTreeMap::new());
    let mut potentials = BTreeMap::new();
    potentials.insert("c1_Mg".to_string(), 0.1);
    potentials.insert("c1_Si".to_string(), f64::NAN);
    let mut bias = ChemicalPotentialBias::new();
    let err = bias.apply(&mut model, &potentials).unwrap_err();
    assert_eq!(err.info().code, "bias-value");
    assert_eq!(model.coefficient("c1_Mg"), Some(0.0));
    assert!(!bias.is_active());
}

#[test]
fn accumulator_means_match_direct_averages() {
    let mut acc = ObservableAccumulator::new(1);
    let samples = [(1.0, 0.25), (2.0, 0.5), (4.0, 0.75)];
    for (energy, singlet) in samples {
        acc.record(energy, &[singlet]).unwrap();
    }
    assert_eq!(acc.count(), 3.0);
    assert!((acc.mean_energy() - 7.0 / 3.0).abs() < 1e-12);
    assert!((acc.variance_energy() - 14.0 / 9.0).abs() < 1e-12);
    assert!((acc.mean_singlets()[0] - 0.5).abs() < 1e-12);
    assert!(acc.record(1.0, &[0.1, 0.2]).is_err());
    acc.reset();
    assert_eq!(acc.count(), 0.0);
    assert_eq!(acc.mean_energy(), 0.0);
}
