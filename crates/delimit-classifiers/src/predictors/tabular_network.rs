use ndarray::{Array1, Array2};

use super::{Predictor, Representation};
use crate::config::{DelimitConfig, TrainingParams};
use crate::data_handling::{flatten_groups, stack_vectors};
use crate::error::{DelimitError, Result};
use crate::labels::{EncodedLabels, LabelSet};
use crate::models::dense::DenseNet;
use crate::models::training::{fit_network, FitParams, TrainedNetwork};
use crate::split::{shuffle_split, TrainValidationSplit};

/// Feed-forward network over flattened 1-D SFS vectors.
pub type TabularNetworkPredictor = Predictor<TabularNetwork>;

#[derive(Debug, Clone)]
pub struct TabularNetwork {
    n_features: usize,
}

impl TabularNetwork {
    pub fn new(n_features: usize) -> Self {
        Self { n_features }
    }
}

impl Predictor<TabularNetwork> {
    /// `features` holds one group of SFS vectors per demographic model.
    pub fn new(config: DelimitConfig, features: Vec<Vec<Array1<f32>>>, labels: LabelSet) -> Result<Self> {
        let (samples, group_sizes) = flatten_groups(features);
        let labels = labels.encode(&group_sizes)?;
        let x = stack_vectors(&samples)?;
        Predictor::assemble(config, TabularNetwork::new(x.ncols()), x, labels)
    }
}

pub(crate) fn fit_params(params: &TrainingParams) -> FitParams {
    FitParams {
        epochs: params.epochs,
        batch_size: params.batch_size,
        learning_rate: params.learning_rate,
    }
}

/// Unseeded, unstratified shuffle split shared by the network predictors.
pub(crate) fn network_split(labels: &EncodedLabels, params: &TrainingParams) -> Result<TrainValidationSplit> {
    shuffle_split(labels.len(), params.validation_fraction, &mut rand::thread_rng())
}

impl Representation for TabularNetwork {
    type Features = Array2<f32>;
    type Input = Array2<f32>;
    type Model = TrainedNetwork<DenseNet>;

    fn name(&self) -> &'static str {
        "tabular network"
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
        network_split(labels, params)
    }

    fn fit(
        &mut self,
        train: (&Array2<f32>, &EncodedLabels),
        validation: (&Array2<f32>, &EncodedLabels),
        params: &TrainingParams,
    ) -> Result<Self::Model> {
        let n_features = self.n_features;
        let n_classes = train.1.n_classes();
        fit_network(
            |vb| DenseNet::new(vb, n_features, n_classes),
            train.0,
            train.1,
            validation.0,
            validation.1,
            fit_params(params),
        )
    }
}
