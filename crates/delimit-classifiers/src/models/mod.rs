pub mod classifier_trait;
pub mod dense;
pub mod genotype_cnn;
pub mod random_forest;
pub mod sfs_cnn;
pub mod training;

pub use classifier_trait::ClassifierModel;
pub use random_forest::RandomForest;
pub use training::{TrainedNetwork, TrainingHistory};
