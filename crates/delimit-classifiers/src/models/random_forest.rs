//! Bagged ensemble of decision trees.
//!
//! Every tree is fitted on a bootstrap sample of the training rows and a
//! random subset of the feature columns. Class probabilities are the fraction
//! of trees voting for each class. Samples left out of a tree's bootstrap are
//! used to estimate the out-of-bag error.
use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::MaxFeatures;
use crate::error::{DelimitError, Result};
use crate::labels::EncodedLabels;
use crate::models::classifier_trait::ClassifierModel;

#[derive(Debug, Clone, Copy)]
pub struct RandomForestParams {
    pub n_trees: usize,
    pub max_features: MaxFeatures,
}

/// One fitted tree and the feature columns it was trained on.
#[derive(Debug, Clone)]
struct FeatureTree {
    tree: DecisionTree<f32, usize>,
    features: Vec<usize>,
}

impl FeatureTree {
    fn predict(&self, x: &Array2<f32>) -> Array1<usize> {
        let records = x.select(Axis(1), &self.features);
        self.tree.predict(&records)
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<FeatureTree>,
    n_features: usize,
    n_classes: usize,
    oob_error: Option<f64>,
}

impl RandomForest {
    /// Fit the forest. Per-tree seeds are drawn from `rng` up front so the
    /// result does not depend on how rayon schedules the trees.
    pub fn fit(
        x: &Array2<f32>,
        labels: &EncodedLabels,
        params: RandomForestParams,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 || n_features == 0 {
            return Err(DelimitError::ShapeMismatch(format!(
                "cannot fit a forest on a {}x{} feature matrix",
                n_samples, n_features
            )));
        }
        if labels.len() != n_samples {
            return Err(DelimitError::ShapeMismatch(format!(
                "{} feature rows but {} labels",
                n_samples,
                labels.len()
            )));
        }

        let n_classes = labels.n_classes();
        let max_features = params.max_features.resolve(n_features);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| rng.gen()).collect();

        log::info!(
            "Fitting random forest: {} trees, {} of {} features per tree, {} samples, {} classes",
            params.n_trees,
            max_features,
            n_features,
            n_samples,
            n_classes
        );

        let fitted = seeds
            .into_par_iter()
            .map(|seed| fit_tree(x, labels.classes(), max_features, seed))
            .collect::<Result<Vec<_>>>()?;

        let mut oob_votes = Array2::<usize>::zeros((n_samples, n_classes));
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, oob) in fitted {
            for (row, class) in oob {
                if class < n_classes {
                    oob_votes[(row, class)] += 1;
                }
            }
            trees.push(tree);
        }

        let oob_error = out_of_bag_error(&oob_votes, labels.classes());
        match oob_error {
            Some(err) => log::info!("Out-of-bag error: {:.4}", err),
            None => log::warn!("No out-of-bag samples; the out-of-bag error is undefined"),
        }

        Ok(Self {
            trees,
            n_features,
            n_classes,
            oob_error,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// `1 - accuracy` over samples that were out of bag for at least one tree.
    pub fn oob_error(&self) -> Option<f64> {
        self.oob_error
    }

    /// Vote counts per sample and class.
    pub fn votes(&self, x: &Array2<f32>) -> Result<Array2<usize>> {
        if x.ncols() != self.n_features {
            return Err(DelimitError::ShapeMismatch(format!(
                "forest was fitted on {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let per_tree: Vec<Array1<usize>> = self.trees.par_iter().map(|t| t.predict(x)).collect();

        let mut votes = Array2::<usize>::zeros((x.nrows(), self.n_classes));
        for predictions in &per_tree {
            for (row, &class) in predictions.iter().enumerate() {
                if class < self.n_classes {
                    votes[(row, class)] += 1;
                }
            }
        }
        Ok(votes)
    }
}

impl ClassifierModel<Array2<f32>> for RandomForest {
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let n_trees = self.trees.len().max(1) as f32;
        Ok(self.votes(x)?.mapv(|v| v as f32 / n_trees))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

/// Fit one tree on a bootstrap sample; returns the tree and its
/// out-of-bag `(row, predicted class)` pairs.
fn fit_tree(
    x: &Array2<f32>,
    classes: &[usize],
    max_features: usize,
    seed: u64,
) -> Result<(FeatureTree, Vec<(usize, usize)>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_samples = x.nrows();

    let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
    let mut features = index::sample(&mut rng, x.ncols(), max_features).into_vec();
    features.sort_unstable();

    let records = x.select(Axis(0), &bootstrap).select(Axis(1), &features);
    let targets: Array1<usize> = bootstrap.iter().map(|&i| classes[i]).collect();
    let dataset = Dataset::new(records, targets);

    let tree = DecisionTree::<f32, usize>::params()
        .fit(&dataset)
        .map_err(|e| DelimitError::Fit(e.to_string()))?;
    let tree = FeatureTree { tree, features };

    let mut in_bag = vec![false; n_samples];
    for &i in &bootstrap {
        in_bag[i] = true;
    }
    let oob_rows: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    let oob = if oob_rows.is_empty() {
        Vec::new()
    } else {
        let predictions = tree.predict(&x.select(Axis(0), &oob_rows));
        oob_rows.into_iter().zip(predictions.iter().copied()).collect()
    };

    Ok((tree, oob))
}

fn out_of_bag_error(votes: &Array2<usize>, classes: &[usize]) -> Option<f64> {
    let mut evaluated = 0usize;
    let mut correct = 0usize;
    for (row, &class) in votes.rows().into_iter().zip(classes) {
        if row.sum() == 0 {
            continue;
        }
        evaluated += 1;
        let predicted = row
            .iter()
            .enumerate()
            .fold((0, 0), |best, (k, &v)| if v > best.1 { (k, v) } else { best })
            .0;
        if predicted == class {
            correct += 1;
        }
    }
    if evaluated == 0 {
        return None;
    }
    Some(1.0 - correct as f64 / evaluated as f64)
}
