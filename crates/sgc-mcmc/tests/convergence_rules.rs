use sgc_mcmc::convergence::{
    compare_windows, has_converged_precision, normal_quantile, within_confidence, z_statistic,
    WindowComparison,
};
use sgc_mcmc::{ConvergenceChecker, ConvergenceStatus, ObservableAccumulator, WindowStats};

fn window(mean_energy: f64, var: f64, singlets: Vec<f64>) -> WindowStats {
    let var_mean_singlets = vec![var; singlets.len()];
    WindowStats {
        mean_energy,
        var_mean_energy: var,
        singlets,
        var_mean_singlets,
    }
}

#[test]
fn z_grows_with_the_mean_difference() {
    let mut previous = 0.0;
    for step in 1..20 {
        let z = z_statistic(step as f64 * 0.1, 0.04);
        assert!(z > previous);
        previous = z;
    }
    assert_eq!(z_statistic(-0.3, 0.09), z_statistic(0.3, 0.09));
}

#[test]
fn no_convergence_beyond_the_two_sided_band() {
    // ppf(0.975) is 1.96.
    assert!(!within_confidence(1.97, 0.025));
    assert!(!within_confidence(2.5, 0.025));
    assert!(within_confidence(1.95, 0.025));

    let mut checker = ConvergenceChecker::new(0.025, 10).unwrap();
    assert_eq!(checker.check(window(0.0, 0.5, vec![0.5])), ConvergenceStatus::Sampling);
    // z = 2.5 / sqrt(1.0) on the energy.
    assert_eq!(checker.check(window(2.5, 0.5, vec![0.5])), ConvergenceStatus::Sampling);
    assert!((checker.last_z().unwrap() - 2.5).abs() < 1e-12);
    assert_eq!(checker.check(window(2.6, 0.5, vec![0.5])), ConvergenceStatus::Converged);
    // Terminal states are sticky.
    assert_eq!(checker.check(window(50.0, 0.5, vec![0.5])), ConvergenceStatus::Converged);
    assert_eq!(checker.iterations(), 3);
}

#[test]
fn largest_singlet_z_decides() {
    let previous = window(0.0, 1.0, vec![0.2, 0.4]);
    let current = WindowStats {
        singlets: vec![0.2, 3.4],
        ..previous.clone()
    };
    match compare_windows(&previous, &current) {
        WindowComparison::Z(z) => assert!((z - 3.0 / 2f64.sqrt()).abs() < 1e-12),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn frozen_windows_converge() {
    let mut checker = ConvergenceChecker::new(0.05, 10).unwrap();
    checker.check(window(-3.0, 0.0, vec![0.5]));
    assert_eq!(checker.check(window(-3.0, 0.0, vec![0.5])), ConvergenceStatus::Converged);
}

#[test]
fn changed_singlet_count_is_not_converged() {
    let mut checker = ConvergenceChecker::new(0.05, 10).unwrap();
    checker.check(window(1.0, 1.0, vec![0.5]));
    assert_eq!(
        checker.check(window(1.0, 1.0, vec![0.5, 0.1])),
        ConvergenceStatus::Sampling
    );
    // The mismatched window became the reference for the next check.
    assert_eq!(
        checker.check(window(1.0, 1.0, vec![0.5, 0.1])),
        ConvergenceStatus::Converged
    );
}

#[test]
fn budget_exhaustion_is_reported() {
    let mut checker = ConvergenceChecker::new(0.05, 3).unwrap();
    let mut status = ConvergenceStatus::Sampling;
    for i in 0..3 {
        status = checker.check(window(i as f64 * 100.0, 0.01, vec![]));
    }
    assert_eq!(status, ConvergenceStatus::MaxIterReached);
    assert_eq!(
        ConvergenceChecker::new(0.05, 0).unwrap().status(),
        ConvergenceStatus::MaxIterReached
    );
    assert!(ConvergenceChecker::new(0.7, 3).is_err());
}

#[test]
fn precision_rule_tracks_the_variance_of_the_mean() {
    let mut acc = ObservableAccumulator::new(1);
    for i in 0..400 {
        let x = if i % 2 == 0 { 0.4 } else { 0.6 };
        acc.record(-10.0 + x, &[x]).unwrap();
    }
    // var = 0.01, var/N = 2.5e-5; threshold (0.01 / 1.645)^2 = 3.7e-5.
    assert!(has_converged_precision(&acc, 10, 1, 0.01, 0.05));
    // A tighter target is not reached.
    assert!(!has_converged_precision(&acc, 1, 1, 0.001, 0.05));
    // Inflating by a correlation time of 5 samples pushes it above the threshold.
    acc.set_correlation_time(Some(5.0));
    assert!(!has_converged_precision(&acc, 10, 1, 0.01, 0.05));
    // Averaging over more workers shrinks the variance again.
    assert!(has_converged_precision(&acc, 10, 10, 0.01, 0.05));

    let single = ObservableAccumulator::new(1);
    assert!(!has_converged_precision(&single, 10, 1, 0.01, 0.05));
}

#[test]
fn quantile_is_antisymmetric() {
    for p in [0.01, 0.05, 0.2, 0.4] {
        assert!((normal_quantile(p) + normal_quantile(1.0 - p)).abs() < 1e-9);
    }
    assert!(normal_quantile(0.0).is_infinite());
}
