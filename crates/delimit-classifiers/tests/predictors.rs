use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use delimit_classifiers::{
    ClassifierModel, DelimitConfig, DelimitError, GenotypeBatch, LabelSet, MultiBranchGenotypePredictor,
    MultiBranchSfsPredictor, PredictionTable, SfsSample, TabularEnsemblePredictor, TabularNetworkPredictor,
};

const N_MODELS: usize = 3;
const REPLICATES: usize = 10;

fn config(seed: u64) -> DelimitConfig {
    DelimitConfig::from_value(&json!({
        "seed": seed,
        "sampling dict": {"popA": 3, "popB": 2},
        "training": {"n_trees": 20, "epochs": 3, "batch_size": 10}
    }))
    .unwrap()
}

fn sfs_vectors(rng: &mut StdRng) -> Vec<Vec<Array1<f32>>> {
    (0..N_MODELS)
        .map(|m| {
            (0..REPLICATES)
                .map(|_| Array1::from_shape_fn(8, |bin| (m * 5 + bin) as f32 + rng.gen_range(0.0..0.5)))
                .collect()
        })
        .collect()
}

fn sfs_samples(rng: &mut StdRng) -> Vec<Vec<SfsSample>> {
    (0..N_MODELS)
        .map(|m| {
            (0..REPLICATES)
                .map(|_| {
                    SfsSample::new(vec![
                        ("popA-popB", Array2::from_shape_fn((4, 3), |_| m as f32 + rng.gen_range(0.0..0.5))),
                        ("popA-popC", Array2::from_shape_fn((5, 4), |_| m as f32 + rng.gen_range(0.0..0.5))),
                    ])
                })
                .collect()
        })
        .collect()
}

fn genotype_matrices(rng: &mut StdRng) -> Vec<Vec<Array2<f32>>> {
    (0..N_MODELS)
        .map(|m| {
            (0..REPLICATES)
                .map(|_| Array2::from_shape_fn((5, 6), |_| if rng.gen_range(0..N_MODELS) <= m { 1.0 } else { 0.0 }))
                .collect()
        })
        .collect()
}

fn assert_probability_table(table: &PredictionTable, n_rows: usize) {
    assert_eq!(table.n_replicates(), n_rows);
    assert_eq!(table.n_models(), N_MODELS);
    for row in table.scores().rows() {
        assert!((row.sum() - 1.0).abs() < 1e-4, "row sums to {}", row.sum());
    }
}

#[test]
fn test_tabular_ensemble_build_and_predict() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut predictor = TabularEnsemblePredictor::new(config(3), sfs_vectors(&mut rng), LabelSet::Grouped).unwrap();
    let output = predictor.build().unwrap();

    assert_eq!(output.confusion_matrix.n_classes(), N_MODELS);
    // 20% of 30 samples are held out.
    assert_eq!(output.confusion_matrix.total(), 6);
    assert!(output.model.oob_error().is_some());
    assert_eq!(output.model.n_trees(), 20);

    let new_data = Array2::from_shape_fn((4, 8), |(r, bin)| (r * 3 + bin) as f32);
    let table = predictor.predict(&output.model, &new_data).unwrap();
    assert_probability_table(&table, 4);
    assert_eq!(table, predictor.predict(&output.model, &new_data).unwrap());
    assert_eq!(table.row_labels()[3], "Replicate 4");
    assert_eq!(table.headers()[2], "Model 2");

    assert!(matches!(
        predictor.predict(&output.model, &Array2::zeros((1, 7))),
        Err(DelimitError::ShapeMismatch(_))
    ));
}

#[test]
fn test_tabular_ensemble_is_reproducible() {
    let data = sfs_vectors(&mut StdRng::seed_from_u64(2));
    let mut first = TabularEnsemblePredictor::new(config(9), data.clone(), LabelSet::Grouped).unwrap();
    let mut second = TabularEnsemblePredictor::new(config(9), data, LabelSet::Grouped).unwrap();

    let a = first.build().unwrap();
    let b = second.build().unwrap();
    assert_eq!(a.confusion_matrix, b.confusion_matrix);
    assert_eq!(a.model.oob_error(), b.model.oob_error());

    let new_data = Array2::from_shape_fn((3, 8), |(r, bin)| (r * 5 + bin) as f32);
    assert_eq!(
        first.predict(&a.model, &new_data).unwrap(),
        second.predict(&b.model, &new_data).unwrap()
    );
}

#[test]
fn test_tabular_network_build_and_predict() {
    let mut rng = StdRng::seed_from_u64(12);
    let mut predictor = TabularNetworkPredictor::new(config(1), sfs_vectors(&mut rng), LabelSet::Grouped).unwrap();
    let output = predictor.build().unwrap();

    assert_eq!(output.confusion_matrix.total(), 6);
    assert_eq!(output.model.history().epochs.len(), 3);
    assert!(output.model.history().last().unwrap().val_accuracy.is_some());

    let new_data = Array2::from_shape_fn((5, 8), |(r, bin)| (r + bin) as f32);
    let table = predictor.predict(&output.model, &new_data).unwrap();
    assert_probability_table(&table, 5);
    assert_eq!(table, predictor.predict(&output.model, &new_data).unwrap());
    assert_eq!(output.model.predict(&new_data).unwrap(), table.best_model());
}

#[test]
fn test_multi_branch_sfs_build_and_predict() {
    let mut rng = StdRng::seed_from_u64(13);
    let mut predictor = MultiBranchSfsPredictor::new(config(1), sfs_samples(&mut rng), LabelSet::Grouped).unwrap();
    assert_eq!(predictor.representation().names(), &["popA-popB".to_string(), "popA-popC".to_string()]);

    let output = predictor.build().unwrap();
    assert_eq!(output.confusion_matrix.n_classes(), N_MODELS);

    let mut new_data: Vec<SfsSample> = sfs_samples(&mut rng).into_iter().flatten().take(4).collect();
    let table = predictor.predict(&output.model, &new_data).unwrap();
    assert_probability_table(&table, 4);
    assert_eq!(table, predictor.predict(&output.model, &new_data).unwrap());

    new_data.push(SfsSample::new(vec![
        ("popA-popC", Array2::zeros((5, 4))),
        ("popA-popB", Array2::zeros((4, 3))),
    ]));
    assert!(matches!(
        predictor.predict(&output.model, &new_data),
        Err(DelimitError::ShapeMismatch(_))
    ));
}

#[test]
fn test_multi_branch_genotype_build_and_predict() {
    let mut rng = StdRng::seed_from_u64(14);
    let mut predictor =
        MultiBranchGenotypePredictor::new(config(1), genotype_matrices(&mut rng), LabelSet::Grouped).unwrap();
    let output = predictor.build().unwrap();
    assert_eq!(output.confusion_matrix.n_classes(), N_MODELS);
    assert_eq!(output.model.history().epochs.len(), 3);

    let empirical = Array2::from_shape_fn((5, 6), |(r, c)| ((r + c) % 2) as f32);
    let table = predictor.predict(&output.model, &empirical).unwrap();
    assert_probability_table(&table, 1);
    assert_eq!(table, predictor.predict(&output.model, &empirical).unwrap());

    let batch = GenotypeBatch::from_array(Array3::from_shape_fn((3, 5, 6), |(s, r, c)| ((s + r * c) % 2) as f32));
    let many = predictor.predict_many(&output.model, &batch).unwrap();
    assert_probability_table(&many, 3);

    assert!(matches!(
        predictor.predict(&output.model, &Array2::zeros((4, 6))),
        Err(DelimitError::ShapeMismatch(_))
    ));
    assert!(matches!(
        predictor.predict(&output.model, &Array2::zeros((5, 7))),
        Err(DelimitError::ShapeMismatch(_))
    ));
}

#[test]
fn test_build_figure_is_returned() {
    let mut rng = StdRng::seed_from_u64(15);
    let mut predictor = TabularEnsemblePredictor::new(config(4), sfs_vectors(&mut rng), LabelSet::Grouped).unwrap();
    let output = predictor.build().unwrap();
    let json = output.figure.to_json();
    assert!(json.contains("True Labels"));
    assert!(json.contains("Predicted Labels"));
}

#[test]
fn test_invalid_training_params_are_rejected() {
    let mut rng = StdRng::seed_from_u64(16);

    let mut zero_batch = config(1);
    zero_batch.training.batch_size = 0;
    let err = TabularNetworkPredictor::new(zero_batch, sfs_vectors(&mut rng), LabelSet::Grouped).unwrap_err();
    assert!(matches!(err, DelimitError::Configuration(_)));

    let mut zero_folds = config(1);
    zero_folds.training.cv_folds = 0;
    let err = TabularEnsemblePredictor::new(zero_folds, sfs_vectors(&mut rng), LabelSet::Grouped).unwrap_err();
    assert!(matches!(err, DelimitError::Configuration(_)));
}

#[test]
fn test_small_validation_set_warns() {
    // Four samples leave a single validation sample, too few for 2-fold CV.
    let data: Vec<Vec<Array1<f32>>> = (0..2)
        .map(|m| (0..2).map(|r| Array1::from_elem(8, (m * 10 + r) as f32)).collect())
        .collect();
    let mut predictor = TabularEnsemblePredictor::new(config(5), data, LabelSet::Grouped).unwrap();
    let output = predictor.build().unwrap();

    assert_eq!(output.confusion_matrix.total(), 1);
    assert!(!output.warnings.is_empty());
    assert!(output.warnings.iter().any(|w| w.contains("cross-validation")));
}
