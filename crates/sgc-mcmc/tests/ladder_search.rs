use std::collections::BTreeMap;
use std::fs;

use sgc_core::{Alphabet, Configuration, RngHandle, SgcError};
use sgc_lattice::{FlatModel, LatticeShape, PairLatticeModel, PAIR_COEFFICIENT};
use sgc_mcmc::ladder::{load_ladder, save_ladder, LADDER_HEADER};
use sgc_mcmc::{LadderConfig, LadderTermination, Replica, RungRecord, TemperatureLadderBuilder};

fn alphabet() -> Alphabet {
    Alphabet::new(&["Al", "Mg"]).unwrap()
}

fn alternating(sites: usize) -> Configuration {
    let symbols: Vec<&str> = (0..sites)
        .map(|i| if i % 2 == 0 { "Al" } else { "Mg" })
        .collect();
    Configuration::from_symbols(alphabet(), &symbols).unwrap()
}

fn flat_seed() -> Replica<FlatModel> {
    Replica::new(1500.0, alternating(8), FlatModel::new(-1.0), RngHandle::from_seed(7)).unwrap()
}

fn pair_seed(seed: u64) -> Replica<PairLatticeModel> {
    let mut coefficients = BTreeMap::new();
    coefficients.insert(PAIR_COEFFICIENT.to_string(), -0.05);
    let model =
        PairLatticeModel::new(LatticeShape::Chain { length: 16 }, alphabet(), &coefficients)
            .unwrap();
    Replica::new(1500.0, alternating(16), model, RngHandle::from_seed(seed)).unwrap()
}

fn search_config() -> LadderConfig {
    LadderConfig {
        sweeps_per_probe: 5,
        scheme_file: None,
        ..LadderConfig::default()
    }
}

#[test]
fn flat_model_ladder_stops_after_one_rung() {
    let builder = TemperatureLadderBuilder::new(search_config(), 11).unwrap();
    let ladder = builder.build(flat_seed(), None).unwrap();
    assert_eq!(ladder.len(), 1);
    assert_eq!(ladder.temperatures(), vec![1500.0]);
    // 750, 375 and 187.5 K are probed; 93.75 K lies below the floor.
    assert_eq!(
        ladder.termination,
        LadderTermination::SearchExhausted { floor: 187.5 }
    );
}

#[test]
fn pair_model_rungs_meet_target_or_bracket() {
    let config = search_config();
    let builder = TemperatureLadderBuilder::new(config.clone(), 5).unwrap();
    let ladder = builder.build(pair_seed(3), None).unwrap();
    assert!(ladder.len() >= 2, "ladder: {:?}", ladder.rungs);
    assert_eq!(ladder.rungs[0].temperature, config.t_max);
    assert_eq!(ladder.rungs[0].acceptance, 0.0);
    for pair in ladder.rungs.windows(2) {
        assert!(pair[1].temperature < pair[0].temperature);
        assert!(pair[1].temperature > config.t_min);
    }
    for rung in &ladder.rungs[1..] {
        let width = rung.bracket_width.unwrap();
        assert!(
            (rung.acceptance - config.target_acceptance).abs() < config.acceptance_tolerance
                || width < config.min_bracket,
            "rung {rung:?}"
        );
    }
    for (replica, rung) in ladder.replicas.iter().zip(&ladder.rungs) {
        assert_eq!(replica.temperature(), rung.temperature);
    }
}

#[test]
fn rungs_start_with_empty_statistics() {
    let builder = TemperatureLadderBuilder::new(search_config(), 5).unwrap();
    let ladder = builder.build(pair_seed(9), None).unwrap();
    assert!(ladder.len() >= 2);
    for replica in &ladder.replicas {
        assert_eq!(replica.accumulator().count(), 0.0);
    }

    let single = builder.build(flat_seed(), None).unwrap();
    assert_eq!(single.replicas[0].accumulator().count(), 0.0);
}

#[test]
fn flat_model_cooler_range_halves_three_times() {
    let config = LadderConfig {
        t_max: 1000.0,
        t_min: 100.0,
        target_acceptance: 0.2,
        ..search_config()
    };
    let builder = TemperatureLadderBuilder::new(config, 11).unwrap();
    let seed =
        Replica::new(1000.0, alternating(8), FlatModel::new(-1.0), RngHandle::from_seed(7)).unwrap();
    let ladder = builder.build(seed, None).unwrap();
    // 500, 250 and 125 K are probed; 62.5 K lies below the floor.
    assert_eq!(ladder.len(), 1);
    assert_eq!(ladder.temperatures(), vec![1000.0]);
    assert_eq!(
        ladder.termination,
        LadderTermination::SearchExhausted { floor: 125.0 }
    );
}

#[test]
fn ladder_file_is_written_and_reused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("temp_scheme.csv");
    let builder = TemperatureLadderBuilder::new(search_config(), 5).unwrap();

    let searched = builder.build(pair_seed(3), Some(&path)).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next(), Some(LADDER_HEADER));
    assert_eq!(text.lines().count(), searched.len() + 1);

    let loaded = builder.build(pair_seed(4), Some(&path)).unwrap();
    assert_eq!(
        loaded.termination,
        LadderTermination::LoadedFromFile { path: path.clone() }
    );
    assert_eq!(loaded.temperatures(), searched.temperatures());
    assert_eq!(loaded.len(), searched.len());
}

#[test]
fn unreadable_ladder_file_falls_back_to_search() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, "not,a,number\n").unwrap();
    let builder = TemperatureLadderBuilder::new(search_config(), 5).unwrap();
    let ladder = builder.build(flat_seed(), Some(&path)).unwrap();
    assert!(matches!(
        ladder.termination,
        LadderTermination::SearchExhausted { .. }
    ));
    // The fresh search replaced the broken file.
    assert_eq!(load_ladder(&path).unwrap().len(), 1);
}

#[test]
fn ladder_files_must_decrease() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scheme.csv");
    fs::write(&path, format!("{LADDER_HEADER}\n1000,0\n1200,0.2\n")).unwrap();
    let err = load_ladder(&path).unwrap_err();
    assert!(matches!(err, SgcError::Storage(_)));
    assert_eq!(err.info().code, "ladder-malformed");

    let missing = load_ladder(&dir.path().join("missing.csv")).unwrap_err();
    assert!(matches!(missing, SgcError::Storage(_)));
}

#[test]
fn saved_ladders_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("scheme.csv");
    let rungs = vec![
        RungRecord {
            temperature: 1500.0,
            acceptance: 0.0,
            bracket_width: None,
        },
        RungRecord {
            temperature: 1020.5,
            acceptance: 0.195,
            bracket_width: Some(0.5),
        },
    ];
    save_ladder(&path, &rungs).unwrap();
    let loaded = load_ladder(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[1].temperature, 1020.5);
    assert_eq!(loaded[1].acceptance, 0.195);
    assert_eq!(loaded[1].bracket_width, None);
}

#[test]
fn builder_rejects_inverted_range() {
    let config = LadderConfig {
        t_min: 2000.0,
        ..search_config()
    };
    let err = TemperatureLadderBuilder::new(config, 1).unwrap_err();
    assert_eq!(err.info().code, "ladder-range");
}
