//! The four demographic-model predictors.
//!
//! Every predictor runs the same pipeline: encode labels, split into training
//! and validation samples, fit, evaluate on the held-out samples and report
//! per-class probabilities for new data. What differs is the sample
//! representation and the model fitted on it, captured by [`Representation`].
use std::fmt;

use plotly::Plot;

use crate::config::{DelimitConfig, TrainingParams};
use crate::data_handling::SampleSet;
use crate::error::{DelimitError, Result};
use crate::evaluation::{ConfusionMatrix, Evaluation};
use crate::labels::EncodedLabels;
use crate::models::ClassifierModel;
use crate::report::{plot_confusion_matrix, PredictionTable};
use crate::split::TrainValidationSplit;

pub mod genotype_branches;
pub mod sfs_branches;
pub mod tabular_ensemble;
pub mod tabular_network;

pub use genotype_branches::{GenotypeBranches, MultiBranchGenotypePredictor};
pub use sfs_branches::{MultiBranchSfsPredictor, SfsBranches};
pub use tabular_ensemble::{TabularEnsemble, TabularEnsemblePredictor};
pub use tabular_network::{TabularNetwork, TabularNetworkPredictor};

/// Sample shape and model family of a predictor.
pub trait Representation {
    /// Container of encoded samples.
    type Features: SampleSet;
    /// Raw data accepted by [`Predictor::predict`].
    type Input;
    type Model: ClassifierModel<Self::Features>;

    fn name(&self) -> &'static str;

    /// Reject samples the model cannot consume.
    fn validate(&self, features: &Self::Features) -> Result<()>;

    /// Encode raw prediction input, applying the same reshape as training data.
    fn prepare(&self, input: &Self::Input) -> Result<Self::Features>;

    fn split(&mut self, labels: &EncodedLabels, params: &TrainingParams) -> Result<TrainValidationSplit>;

    fn fit(
        &mut self,
        train: (&Self::Features, &EncodedLabels),
        validation: (&Self::Features, &EncodedLabels),
        params: &TrainingParams,
    ) -> Result<Self::Model>;

    /// Predictions for the validation samples used to build the confusion matrix.
    /// Fallbacks taken along the way are reported through `warnings`.
    fn held_out_predictions(
        &mut self,
        model: &Self::Model,
        features: &Self::Features,
        _labels: &EncodedLabels,
        _params: &TrainingParams,
        _warnings: &mut Vec<String>,
    ) -> Result<Vec<usize>> {
        model.predict(features)
    }
}

/// Result of [`Predictor::build`].
pub struct BuildOutput<M> {
    pub model: M,
    pub confusion_matrix: ConfusionMatrix,
    pub figure: Plot,
    /// Problems found while evaluating on the validation samples.
    pub warnings: Vec<String>,
}

/// Labeled samples plus the representation they are modeled with.
pub struct Predictor<R: Representation> {
    config: DelimitConfig,
    representation: R,
    features: R::Features,
    labels: EncodedLabels,
}

impl<R> fmt::Debug for Predictor<R>
where
    R: Representation + fmt::Debug,
    R::Features: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predictor")
            .field("config", &self.config)
            .field("representation", &self.representation)
            .field("features", &self.features)
            .field("labels", &self.labels)
            .finish()
    }
}

impl<R: Representation> Predictor<R> {
    pub(crate) fn assemble(
        config: DelimitConfig,
        representation: R,
        features: R::Features,
        labels: EncodedLabels,
    ) -> Result<Self> {
        config.training.validate()?;
        if features.n_samples() != labels.len() {
            return Err(DelimitError::ShapeMismatch(format!(
                "{} feature samples but {} labels",
                features.n_samples(),
                labels.len()
            )));
        }
        representation.validate(&features)?;

        log::info!(
            "Prepared {} predictor: {} samples, {} classes {:?}",
            representation.name(),
            labels.len(),
            labels.n_classes(),
            labels.class_counts()
        );

        Ok(Self {
            config,
            representation,
            features,
            labels,
        })
    }

    pub fn config(&self) -> &DelimitConfig {
        &self.config
    }

    pub fn representation(&self) -> &R {
        &self.representation
    }

    pub fn features(&self) -> &R::Features {
        &self.features
    }

    pub fn labels(&self) -> &EncodedLabels {
        &self.labels
    }

    pub fn n_classes(&self) -> usize {
        self.labels.n_classes()
    }

    /// Fit the model on a training split and evaluate it on the held-out samples.
    pub fn build(&mut self) -> Result<BuildOutput<R::Model>> {
        let params = self.config.training.clone();
        params.validate()?;
        let n_classes = self.labels.n_classes();

        let split = self.representation.split(&self.labels, &params)?;
        let train_x = self.features.select(&split.train);
        let train_y = self.labels.select(&split.train);
        let val_x = self.features.select(&split.validation);
        let val_y = self.labels.select(&split.validation);

        log::info!(
            "Building {} predictor on {} training and {} validation samples",
            self.representation.name(),
            train_y.len(),
            val_y.len()
        );

        let model = self
            .representation
            .fit((&train_x, &train_y), (&val_x, &val_y), &params)?;

        let mut warnings = Vec::new();
        let y_pred = if val_y.is_empty() {
            Vec::new()
        } else {
            match self
                .representation
                .held_out_predictions(&model, &val_x, &val_y, &params, &mut warnings)
            {
                Ok(y_pred) => y_pred,
                Err(e) => {
                    let warning = format!(
                        "held-out evaluation failed ({}); evaluating the fitted {} instead",
                        e,
                        model.name()
                    );
                    log::warn!("{}", warning);
                    warnings.push(warning);
                    model.predict(&val_x)?
                }
            }
        };
        let evaluation = Evaluation::from_predictions(val_y.classes(), &y_pred, n_classes);
        let figure = plot_confusion_matrix(&evaluation.confusion_matrix);
        warnings.extend(evaluation.warnings);

        Ok(BuildOutput {
            model,
            confusion_matrix: evaluation.confusion_matrix,
            figure,
            warnings,
        })
    }

    /// Per-class probabilities for new raw data.
    pub fn predict(&self, model: &R::Model, input: &R::Input) -> Result<PredictionTable> {
        let features = self.representation.prepare(input)?;
        self.predict_many(model, &features)
    }

    /// Per-class probabilities for already encoded samples.
    pub fn predict_many(&self, model: &R::Model, features: &R::Features) -> Result<PredictionTable> {
        self.representation.validate(features)?;
        if model.n_classes() != self.labels.n_classes() {
            return Err(DelimitError::ShapeMismatch(format!(
                "model predicts {} classes but the predictor was built for {}",
                model.n_classes(),
                self.labels.n_classes()
            )));
        }

        let scores = model.predict_proba(features)?;
        if scores.dim() != (features.n_samples(), self.labels.n_classes()) {
            return Err(DelimitError::ShapeMismatch(format!(
                "{} returned scores of shape {:?} for {} samples",
                model.name(),
                scores.dim(),
                features.n_samples()
            )));
        }
        log::debug!("Predicted {} samples with {}", features.n_samples(), model.name());
        Ok(PredictionTable::from_scores(scores))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::config::SamplingDict;
    use crate::split::shuffle_split;

    /// Always predicts the first class.
    struct FirstClass {
        n_classes: usize,
    }

    impl ClassifierModel<Array2<f32>> for FirstClass {
        fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
            let mut scores = Array2::zeros((x.nrows(), self.n_classes));
            scores.column_mut(0).fill(1.0);
            Ok(scores)
        }

        fn n_classes(&self) -> usize {
            self.n_classes
        }
    }

    /// Representation whose held-out evaluation always fails.
    #[derive(Debug)]
    struct FailingHeldOut;

    impl Representation for FailingHeldOut {
        type Features = Array2<f32>;
        type Input = Array2<f32>;
        type Model = FirstClass;

        fn name(&self) -> &'static str {
            "failing held-out"
        }

        fn validate(&self, _features: &Array2<f32>) -> Result<()> {
            Ok(())
        }

        fn prepare(&self, input: &Array2<f32>) -> Result<Array2<f32>> {
            Ok(input.clone())
        }

        fn split(&mut self, labels: &EncodedLabels, params: &TrainingParams) -> Result<TrainValidationSplit> {
            shuffle_split(labels.len(), params.validation_fraction, &mut rand::thread_rng())
        }

        fn fit(
            &mut self,
            train: (&Array2<f32>, &EncodedLabels),
            _validation: (&Array2<f32>, &EncodedLabels),
            _params: &TrainingParams,
        ) -> Result<FirstClass> {
            Ok(FirstClass {
                n_classes: train.1.n_classes(),
            })
        }

        fn held_out_predictions(
            &mut self,
            _model: &FirstClass,
            _features: &Array2<f32>,
            _labels: &EncodedLabels,
            _params: &TrainingParams,
            _warnings: &mut Vec<String>,
        ) -> Result<Vec<usize>> {
            Err(DelimitError::Fit("fold could not be fitted".to_string()))
        }
    }

    fn config() -> DelimitConfig {
        DelimitConfig::new(0, SamplingDict::new(vec![("popA", 2)]).unwrap())
    }

    #[test]
    fn test_failed_held_out_evaluation_becomes_warning() {
        let x = Array2::from_shape_fn((10, 3), |(r, c)| (r + c) as f32);
        let labels = EncodedLabels::from_group_sizes(&[5, 5]);
        let mut predictor = Predictor::assemble(config(), FailingHeldOut, x, labels).unwrap();

        let output = predictor.build().unwrap();
        assert_eq!(output.confusion_matrix.total(), 2);
        assert!(output.warnings.iter().any(|w| w.contains("fold could not be fitted")));
    }

    #[test]
    fn test_invalid_training_params_fail_at_assembly() {
        let mut config = config();
        config.training.batch_size = 0;
        let x = Array2::<f32>::zeros((4, 3));
        let labels = EncodedLabels::from_group_sizes(&[2, 2]);
        let err = Predictor::assemble(config, FailingHeldOut, x, labels).unwrap_err();
        assert!(matches!(err, DelimitError::Configuration(_)));
    }
}
