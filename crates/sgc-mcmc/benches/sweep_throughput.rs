use std::collections::BTreeMap;

use criterion::{criterion_group, criterion_main, Criterion};
use sgc_core::{Alphabet, Configuration, RngHandle, SpeciesId};
use sgc_lattice::{LatticeShape, PairLatticeModel, PAIR_COEFFICIENT};

use sgc_mcmc::{ExchangeScheduler, Replica};

fn sample_replica(temperature: f64, seed: u64) -> Replica<PairLatticeModel> {
    let alphabet = Alphabet::new(&["Al", "Mg", "Si"]).unwrap();
    let mut coefficients = BTreeMap::new();
    coefficients.insert(PAIR_COEFFICIENT.to_string(), -0.02);
    coefficients.insert("c1_Mg".to_string(), 0.01);
    let shape = LatticeShape::Square {
        width: 16,
        height: 16,
    };
    let model = PairLatticeModel::new(shape, alphabet.clone(), &coefficients).unwrap();
    let config = Configuration::uniform(alphabet, 256, SpeciesId::from_raw(0)).unwrap();
    Replica::new(temperature, config, model, RngHandle::from_seed(seed)).unwrap()
}

fn bench_sweep(c: &mut Criterion) {
    let mut replica = sample_replica(600.0, 42);
    c.bench_function("sgc_sweep_16x16", |b| {
        b.iter(|| {
            replica.run_sweeps(1).unwrap();
        })
    });
}

fn bench_exchange(c: &mut Criterion) {
    let mut replicas: Vec<_> = [1200.0, 900.0, 700.0, 550.0]
        .iter()
        .enumerate()
        .map(|(i, &t)| sample_replica(t, i as u64))
        .collect();
    let mut scheduler = ExchangeScheduler::new(replicas.len());
    let mut rng = RngHandle::from_seed(7);
    c.bench_function("exchange_cycle_4_rungs", |b| {
        b.iter(|| {
            scheduler.cycle(&mut replicas, &mut rng).unwrap();
        })
    });
}

criterion_group!(benches, bench_sweep, bench_exchange);
criterion_main!(benches);
