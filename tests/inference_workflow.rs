mod common;

use common::{evaluation_population, parameter_names, synthetic_predictions, training_population};
use lensing_population::models::hierarchical::names::{GAMMA, SIGMA_SUB, THETA_E};
use lensing_population::{
    FrequentistOptions, GaussianInference, GaussianInferenceConfig, HierarchicalError,
    McmcOptions, SpreadParameterization, render_summary_table,
};

fn config(spread: SpreadParameterization) -> GaussianInferenceConfig {
    GaussianInferenceConfig {
        all_parameters: parameter_names(),
        select_parameters: parameter_names(),
        positive_parameters: vec![THETA_E.to_string(), GAMMA.to_string()],
        spread,
        n_images: None,
        log_sigma_floor: -15.0,
    }
}

fn inference(n_images: usize, seed: u64, spread: SpreadParameterization) -> GaussianInference {
    let population = evaluation_population();
    let training = training_population();
    let input = synthetic_predictions(n_images, &population, &training, seed);
    GaussianInference::new(&input, &training, &population, &config(spread))
        .expect("synthetic inputs are valid")
}

#[test]
fn frequentist_fit_recovers_population_means() {
    let inference = inference(500, 2022, SpreadParameterization::LinearStd);
    let fit = inference
        .frequentist_asymptotic(&FrequentistOptions::default())
        .expect("fit should succeed");

    assert_eq!(fit.summary.len(), 6);
    assert_eq!(fit.covariance.nrows(), 6);
    assert!(fit.objective.is_finite());
    for row in &fit.summary {
        assert!(row.fit_unc.is_finite() && row.fit_unc > 0.0, "{}", row.name);
    }
    for row in &fit.summary[..3] {
        assert!(
            (row.fit - row.truth).abs() < 5.0 * row.fit_unc,
            "{}: fit {} truth {} unc {}",
            row.name,
            row.fit,
            row.truth,
            row.fit_unc
        );
    }

    let table = render_summary_table(&fit.summary);
    assert!(table.contains(&format!("mean_{THETA_E}")));
    assert!(table.contains(&format!("std_{SIGMA_SUB}")));
}

#[test]
fn bounded_fit_keeps_spreads_positive() {
    let inference = inference(200, 7, SpreadParameterization::LinearStd);
    let options = FrequentistOptions {
        use_bounds: true,
        ..FrequentistOptions::default()
    };
    let fit = inference
        .frequentist_asymptotic(&options)
        .expect("fit should succeed");
    assert!(fit.optimum[3..].iter().all(|s| *s > 0.0));
    assert!(fit.optimum[0] >= 0.0 && fit.optimum[2] >= 0.0);
}

#[test]
fn mcmc_posterior_covers_generating_hyperparameters() {
    let inference = inference(200, 31, SpreadParameterization::LinearStd);
    let options = McmcOptions {
        n_samples: 700,
        n_burnin: 300,
        n_walkers: 16,
        seed: 99,
        ..McmcOptions::default()
    };
    let fit = inference.bayesian_mcmc(&options).expect("sampler should run");

    assert_eq!(fit.chain.nrows(), 16 * 700);
    assert_eq!(fit.chain.ncols(), 6);
    assert_eq!(fit.log_probs.len(), fit.chain.nrows());
    assert!(fit.log_probs.iter().all(|lp| lp.is_finite()));
    let last = fit.chain.nrows() - 1;
    let last_draw: Vec<f64> = (0..6).map(|col| fit.chain[(last, col)]).collect();
    assert_eq!(fit.log_probs[last], inference.log_posterior(&last_draw));
    let acceptance = fit.diagnostics.mean_acceptance_fraction;
    assert!(acceptance > 0.1 && acceptance < 0.9, "acceptance {acceptance}");

    let generating = [1.0, 0.05, 2.0, 0.05, 0.02, 0.1];
    for (row, truth) in fit.summary.iter().zip(generating) {
        assert!(
            (row.fit - truth).abs() < 3.0 * row.fit_unc,
            "{}: posterior mean {} sd {} truth {truth}",
            row.name,
            row.fit,
            row.fit_unc
        );
    }
}

#[test]
fn log_spread_mode_labels_and_fits() {
    let inference = inference(300, 5, SpreadParameterization::LogStd);
    assert_eq!(
        inference.hyperparameter_labels()[3],
        format!("log_std_{THETA_E}")
    );
    let fit = inference
        .frequentist_asymptotic(&FrequentistOptions::default())
        .expect("fit should succeed");
    // Spreads come back on the log scale.
    assert!(fit.optimum[3] < 0.0);
    assert!((fit.optimum[3].exp() - 0.05).abs() < 0.03);
}

#[test]
fn subset_selection_reorders_hyperparameters() {
    let population = evaluation_population();
    let training = training_population();
    let input = synthetic_predictions(50, &population, &training, 3);
    let config = GaussianInferenceConfig {
        select_parameters: vec![GAMMA.to_string(), THETA_E.to_string()],
        n_images: Some(20),
        ..config(SpreadParameterization::LinearStd)
    };
    let inference = GaussianInference::new(&input, &training, &population, &config)
        .expect("selection should succeed");
    assert_eq!(inference.n_images(), 20);
    assert_eq!(inference.true_hyperparameters(), &[2.0, 1.0, 0.1, 0.05]);
    assert_eq!(
        inference.log_posterior(&[-2.0, 1.0, 0.1, 0.05]),
        f64::NEG_INFINITY
    );

    let unknown = GaussianInferenceConfig {
        select_parameters: vec!["not_a_parameter".to_string()],
        ..config
    };
    assert!(matches!(
        GaussianInference::new(&input, &training, &population, &unknown),
        Err(HierarchicalError::UnknownParameter(name)) if name == "not_a_parameter"
    ));
}
