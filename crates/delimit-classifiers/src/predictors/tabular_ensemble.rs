use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Predictor, Representation};
use crate::config::{DelimitConfig, TrainingParams};
use crate::data_handling::{flatten_groups, stack_vectors, SampleSet};
use crate::error::{DelimitError, Result};
use crate::labels::{EncodedLabels, LabelSet};
use crate::models::random_forest::{RandomForest, RandomForestParams};
use crate::models::ClassifierModel;
use crate::split::{stratified_kfold, stratified_split, TrainValidationSplit};

/// Random forest over flattened 1-D SFS vectors.
pub type TabularEnsemblePredictor = Predictor<TabularEnsemble>;

/// Flat SFS vectors modeled by a [`RandomForest`].
///
/// Owns the predictor's random stream: every split, cross-validation fold
/// and forest seed is drawn from one generator seeded with the configured
/// seed, so builds are reproducible.
#[derive(Debug, Clone)]
pub struct TabularEnsemble {
    n_features: usize,
    rng: StdRng,
}

impl TabularEnsemble {
    pub fn new(seed: u64, n_features: usize) -> Self {
        Self {
            n_features,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn forest_params(params: &TrainingParams) -> RandomForestParams {
        RandomForestParams {
            n_trees: params.n_trees,
            max_features: params.max_features,
        }
    }
}

impl Predictor<TabularEnsemble> {
    /// `features` holds one group of SFS vectors per demographic model.
    pub fn new(config: DelimitConfig, features: Vec<Vec<Array1<f32>>>, labels: LabelSet) -> Result<Self> {
        let (samples, group_sizes) = flatten_groups(features);
        let labels = labels.encode(&group_sizes)?;
        let x = stack_vectors(&samples)?;
        let representation = TabularEnsemble::new(config.seed, x.ncols());
        Predictor::assemble(config, representation, x, labels)
    }
}

impl Representation for TabularEnsemble {
    type Features = Array2<f32>;
    type Input = Array2<f32>;
    type Model = RandomForest;

    fn name(&self) -> &'static str {
        "tabular ensemble"
    }

    fn validate(&self, features: &Array2<f32>) -> Result<()> {
        if features.ncols() != self.n_features {
            return Err(DelimitError::ShapeMismatch(format!(
                "expected SFS vectors with {} bins, got {}",
                self.n_features,
                features.ncols()
            )));
        }
        Ok(())
    }

    fn prepare(&self, input: &Array2<f32>) -> Result<Array2<f32>> {
        Ok(input.clone())
    }

    fn split(&mut self, labels: &EncodedLabels, params: &TrainingParams) -> Result<TrainValidationSplit> {
        let split_seed: u32 = self.rng.gen();
        log::debug!("Stratified split with seed {}", split_seed);
        stratified_split(
            labels.classes(),
            params.validation_fraction,
            &mut StdRng::seed_from_u64(split_seed as u64),
        )
    }

    fn fit(
        &mut self,
        train: (&Array2<f32>, &EncodedLabels),
        _validation: (&Array2<f32>, &EncodedLabels),
        params: &TrainingParams,
    ) -> Result<RandomForest> {
        RandomForest::fit(train.0, train.1, Self::forest_params(params), &mut self.rng)
    }

    /// Cross-validated predictions over the validation samples, each fold
    /// predicted by a forest fitted on the other folds. The returned model is
    /// only used when the validation set is too small to fold.
    fn held_out_predictions(
        &mut self,
        model: &RandomForest,
        features: &Array2<f32>,
        labels: &EncodedLabels,
        params: &TrainingParams,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<usize>> {
        let n_folds = params.cv_folds;
        if labels.len() < n_folds {
            let warning = format!(
                "only {} validation samples for {}-fold cross-validation; evaluating the fitted forest instead",
                labels.len(),
                n_folds
            );
            log::warn!("{}", warning);
            warnings.push(warning);
            return model.predict(features);
        }

        let cv_seed: u32 = self.rng.gen();
        let folds = stratified_kfold(labels.classes(), n_folds, &mut StdRng::seed_from_u64(cv_seed as u64))?;

        let mut predictions = vec![0usize; labels.len()];
        let mut scores = Vec::with_capacity(n_folds);
        for fold in &folds {
            let forest = RandomForest::fit(
                &SampleSet::select(features, &fold.train),
                &labels.select(&fold.train),
                Self::forest_params(params),
                &mut self.rng,
            )?;
            let fold_pred = forest.predict(&SampleSet::select(features, &fold.validation))?;

            let correct = fold
                .validation
                .iter()
                .zip(&fold_pred)
                .filter(|&(&i, &p)| labels.classes()[i] == p)
                .count();
            scores.push(correct as f64 / fold.validation.len().max(1) as f64);

            for (&i, &p) in fold.validation.iter().zip(&fold_pred) {
                predictions[i] = p;
            }
        }

        log::info!("{}-fold cross-validation accuracy scores: {:?}", n_folds, scores);
        Ok(predictions)
    }
}
