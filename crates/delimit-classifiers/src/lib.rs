//! delimit-classifiers: demographic-model classifiers for species delimitation.
//!
//! Classifiers are trained on data simulated under competing demographic
//! models and applied to empirical data summarised as site frequency spectra
//! (SFS) or raw genotype matrices. Four predictors share one pipeline
//! (label encoding, train/validation split, fitting, confusion-matrix
//! evaluation and probability reporting):
//!
//! - [`TabularEnsemblePredictor`]: random forest over 1-D SFS vectors
//! - [`TabularNetworkPredictor`]: feed-forward network over 1-D SFS vectors
//! - [`MultiBranchSfsPredictor`]: one convolutional branch per 2-D SFS slice
//! - [`MultiBranchGenotypePredictor`]: one convolutional branch per population
//!
//! The crate only works on in-memory arrays; reading simulations, alignments
//! or configuration files is left to the caller. Progress is reported through
//! the `log` facade.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod labels;
pub mod models;
pub mod predictors;
pub mod report;
pub mod split;

pub use config::{DelimitConfig, MaxFeatures, SamplingDict, TrainingParams};
pub use data_handling::{GenotypeBatch, PopulationPartition, SfsSample, SfsSlices};
pub use error::{DelimitError, Result};
pub use evaluation::{ConfusionMatrix, Evaluation};
pub use labels::{EncodedLabels, LabelSet};
pub use models::ClassifierModel;
pub use predictors::{
    BuildOutput, MultiBranchGenotypePredictor, MultiBranchSfsPredictor, Predictor, Representation,
    TabularEnsemblePredictor, TabularNetworkPredictor,
};
pub use report::PredictionTable;
