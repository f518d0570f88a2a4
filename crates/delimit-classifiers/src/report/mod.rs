//! Reporting helpers handed back to callers.
//!
//! `plots` turns evaluation results into `plotly::Plot` figures and `table`
//! renders per-class prediction scores as a replicate x model table. Nothing
//! here writes to disk; saving is left to the caller.
pub mod plots;
pub mod table;

pub use plots::plot_confusion_matrix;
pub use table::PredictionTable;
