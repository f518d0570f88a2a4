use super::tabular_network::{fit_params, network_split};
use super::{Predictor, Representation};
use crate::config::{DelimitConfig, TrainingParams};
use crate::data_handling::{flatten_groups, SfsSample, SfsSlices};
use crate::error::{DelimitError, Result};
use crate::labels::{EncodedLabels, LabelSet};
use crate::models::sfs_cnn::SfsCnn;
use crate::models::training::{fit_network, TrainedNetwork};
use crate::split::TrainValidationSplit;

/// Multi-branch convolutional network over named 2-D SFS slices.
pub type MultiBranchSfsPredictor = Predictor<SfsBranches>;

/// Smallest slice a 3x3 convolution can be applied to.
const MIN_SLICE_DIM: usize = 3;

/// Slice names and shapes every sample must carry, in branch order.
#[derive(Debug, Clone)]
pub struct SfsBranches {
    names: Vec<String>,
    shapes: Vec<(usize, usize)>,
}

impl SfsBranches {
    fn from_slices(slices: &SfsSlices) -> Result<Self> {
        for (name, &(rows, cols)) in slices.names().iter().zip(&slices.slice_shapes()) {
            if rows < MIN_SLICE_DIM || cols < MIN_SLICE_DIM {
                return Err(DelimitError::ShapeMismatch(format!(
                    "2-D SFS slice '{}' is {}x{}; every slice must be at least {}x{}",
                    name, rows, cols, MIN_SLICE_DIM, MIN_SLICE_DIM
                )));
            }
        }
        Ok(Self {
            names: slices.names().to_vec(),
            shapes: slices.slice_shapes(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Predictor<SfsBranches> {
    /// `features` holds, per demographic model, one mapping of named 2-D SFS
    /// slices per replicate.
    pub fn new(config: DelimitConfig, features: Vec<Vec<SfsSample>>, labels: LabelSet) -> Result<Self> {
        let (samples, group_sizes) = flatten_groups(features);
        let labels = labels.encode(&group_sizes)?;
        let slices = SfsSlices::transpose(&samples)?;
        let representation = SfsBranches::from_slices(&slices)?;
        Predictor::assemble(config, representation, slices, labels)
    }
}

impl Representation for SfsBranches {
    type Features = SfsSlices;
    /// Associated types must be sized, so samples come as a `Vec`.
    type Input = Vec<SfsSample>;
    type Model = TrainedNetwork<SfsCnn>;

    fn name(&self) -> &'static str {
        "multi-branch SFS"
    }

    fn validate(&self, features: &SfsSlices) -> Result<()> {
        if features.names() != self.names.as_slice() {
            return Err(DelimitError::ShapeMismatch(format!(
                "expected SFS slices {:?}, got {:?}",
                self.names,
                features.names()
            )));
        }
        if features.slice_shapes() != self.shapes {
            return Err(DelimitError::ShapeMismatch(format!(
                "expected SFS slice shapes {:?}, got {:?}",
                self.shapes,
                features.slice_shapes()
            )));
        }
        Ok(())
    }

    #[allow(clippy::ptr_arg)]
    fn prepare(&self, input: &Vec<SfsSample>) -> Result<SfsSlices> {
        SfsSlices::transpose(input)
    }

    fn split(&mut self, labels: &EncodedLabels, params: &TrainingParams) -> Result<TrainValidationSplit> {
        network_split(labels, params)
    }

    fn fit(
        &mut self,
        train: (&SfsSlices, &EncodedLabels),
        validation: (&SfsSlices, &EncodedLabels),
        params: &TrainingParams,
    ) -> Result<Self::Model> {
        let slices: Vec<(String, (usize, usize))> = self
            .names
            .iter()
            .cloned()
            .zip(self.shapes.iter().copied())
            .collect();
        let n_classes = train.1.n_classes();
        fit_network(
            |vb| SfsCnn::new(vb, &slices, n_classes),
            train.0,
            train.1,
            validation.0,
            validation.1,
            fit_params(params),
        )
    }
}
