use ndarray::Array2;

use crate::error::Result;

/// Contract shared by every fitted classifier, whatever its input shape.
///
/// `X` is the sample container the model was trained on: a feature matrix
/// for the tabular models, per-slice stacks or genotype batches for the
/// multi-branch networks.
pub trait ClassifierModel<X> {
    /// Per-class probabilities, one row per sample and one column per class.
    fn predict_proba(&self, x: &X) -> Result<Array2<f32>>;

    /// Most probable class of every sample.
    fn predict(&self, x: &X) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    /// Number of classes the model was fitted against.
    fn n_classes(&self) -> usize;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Column index of the largest value of every row; ties go to the lowest index.
pub fn argmax_rows(scores: &Array2<f32>) -> Vec<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (k, &v)| if v > best.1 { (k, v) } else { best })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_rows() {
        let scores = array![[0.1f32, 0.7, 0.2], [0.5, 0.5, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(argmax_rows(&scores), vec![1, 0, 2]);
    }
}
