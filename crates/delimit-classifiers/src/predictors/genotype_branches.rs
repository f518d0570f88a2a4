use ndarray::Array2;

use super::tabular_network::{fit_params, network_split};
use super::{Predictor, Representation};
use crate::config::{DelimitConfig, TrainingParams};
use crate::data_handling::{flatten_groups, GenotypeBatch, PopulationPartition};
use crate::error::{DelimitError, Result};
use crate::labels::{EncodedLabels, LabelSet};
use crate::models::genotype_cnn::GenotypeCnn;
use crate::models::training::{fit_network, TrainedNetwork};
use crate::split::TrainValidationSplit;

/// Population-aware convolutional network over raw genotype matrices.
pub type MultiBranchGenotypePredictor = Predictor<GenotypeBranches>;

/// Row-to-population assignment plus the site count every matrix must have.
#[derive(Debug, Clone)]
pub struct GenotypeBranches {
    partition: PopulationPartition,
    n_sites: usize,
}

impl GenotypeBranches {
    pub fn partition(&self) -> &PopulationPartition {
        &self.partition
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }
}

impl Predictor<GenotypeBranches> {
    /// `features` holds, per demographic model, one genotype matrix
    /// (individuals x sites) per replicate. Matrix rows must follow the
    /// population order of the configured sampling dict.
    pub fn new(config: DelimitConfig, features: Vec<Vec<Array2<f32>>>, labels: LabelSet) -> Result<Self> {
        let partition = PopulationPartition::from_sampling(&config.sampling);
        let (samples, group_sizes) = flatten_groups(features);
        let labels = labels.encode(&group_sizes)?;

        for matrix in &samples {
            partition.validate_rows(matrix.nrows())?;
        }
        let batch = GenotypeBatch::from_matrices(&samples)?;

        let representation = GenotypeBranches {
            partition,
            n_sites: batch.n_sites(),
        };
        Predictor::assemble(config, representation, batch, labels)
    }
}

impl Representation for GenotypeBranches {
    type Features = GenotypeBatch;
    /// A single empirical genotype matrix.
    type Input = Array2<f32>;
    type Model = TrainedNetwork<GenotypeCnn>;

    fn name(&self) -> &'static str {
        "multi-branch genotype"
    }

    fn validate(&self, features: &GenotypeBatch) -> Result<()> {
        self.partition.validate_rows(features.n_individuals())?;
        if features.n_sites() != self.n_sites {
            return Err(DelimitError::ShapeMismatch(format!(
                "expected genotype matrices with {} sites, got {}",
                self.n_sites,
                features.n_sites()
            )));
        }
        Ok(())
    }

    fn prepare(&self, input: &Array2<f32>) -> Result<GenotypeBatch> {
        self.partition.validate_rows(input.nrows())?;
        GenotypeBatch::from_matrices(std::slice::from_ref(input))
    }

    fn split(&mut self, labels: &EncodedLabels, params: &TrainingParams) -> Result<TrainValidationSplit> {
        network_split(labels, params)
    }

    fn fit(
        &mut self,
        train: (&GenotypeBatch, &EncodedLabels),
        validation: (&GenotypeBatch, &EncodedLabels),
        params: &TrainingParams,
    ) -> Result<Self::Model> {
        let partition = &self.partition;
        let n_sites = self.n_sites;
        let n_classes = train.1.n_classes();
        fit_network(
            |vb| GenotypeCnn::new(vb, partition, n_sites, n_classes),
            train.0,
            train.1,
            validation.0,
            validation.1,
            fit_params(params),
        )
    }
}
