//! Held-out evaluation of a fitted predictor.
use ndarray::Array2;

/// Class-count x class-count prediction counts; row = true class,
/// column = predicted class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Count (true, predicted) pairs. Pairs referencing a class outside
    /// `0..n_classes` are skipped.
    pub fn from_labels(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let mut counts = Array2::<usize>::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t < n_classes && p < n_classes {
                counts[(t, p)] += 1;
            }
        }
        Self { counts }
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Number of evaluated samples per true class.
    pub fn true_class_totals(&self) -> Vec<usize> {
        self.counts.rows().into_iter().map(|r| r.sum()).collect()
    }

    /// Fraction of samples on the diagonal, `None` when nothing was evaluated.
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let correct: usize = self.counts.diag().sum();
        Some(correct as f64 / total as f64)
    }

    pub fn to_vec(&self) -> Vec<Vec<usize>> {
        self.counts.rows().into_iter().map(|r| r.to_vec()).collect()
    }
}

/// A confusion matrix together with the problems noticed while building it.
///
/// Degenerate validation sets do not abort a build: the trained model is
/// still usable, so the issue is reported and a best-effort matrix returned.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub confusion_matrix: ConfusionMatrix,
    pub warnings: Vec<String>,
}

impl Evaluation {
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let mut warnings = Vec::new();

        if y_true.len() != y_pred.len() {
            warnings.push(format!(
                "{} true labels but {} predictions; only the first {} pairs were counted",
                y_true.len(),
                y_pred.len(),
                y_true.len().min(y_pred.len())
            ));
        }
        if y_true.is_empty() {
            warnings.push("validation set is empty; the confusion matrix is all zeros".to_string());
        } else {
            let mut present: Vec<usize> = y_true.to_vec();
            present.sort_unstable();
            present.dedup();
            if present.len() < 2 && n_classes > 1 {
                warnings.push(format!(
                    "validation set only contains class {:?}; the confusion matrix is degenerate",
                    present
                ));
            }
        }
        let out_of_range = y_true
            .iter()
            .chain(y_pred)
            .filter(|&&c| c >= n_classes)
            .count();
        if out_of_range > 0 {
            warnings.push(format!(
                "{} labels fall outside the {} known classes and were skipped",
                out_of_range, n_classes
            ));
        }

        for warning in &warnings {
            log::warn!("{}", warning);
        }

        let confusion_matrix = ConfusionMatrix::from_labels(y_true, y_pred, n_classes);
        if let Some(acc) = confusion_matrix.accuracy() {
            log::info!(
                "Validation accuracy: {:.4} over {} samples",
                acc,
                confusion_matrix.total()
            );
        }

        Self {
            confusion_matrix,
            warnings,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let cm = ConfusionMatrix::from_labels(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        assert_eq!(cm.to_vec(), vec![vec![1, 1], vec![0, 2]]);
        assert_eq!(cm.accuracy(), Some(0.75));
        assert_eq!(cm.true_class_totals(), vec![2, 2]);
    }

    #[test]
    fn test_missing_class_keeps_full_shape() {
        let cm = ConfusionMatrix::from_labels(&[0, 2], &[0, 2], 3);
        assert_eq!(cm.counts().shape(), &[3, 3]);
        assert_eq!(cm.counts()[(1, 1)], 0);
    }

    #[test]
    fn test_degenerate_evaluation_warns() {
        let eval = Evaluation::from_predictions(&[1, 1], &[1, 0], 2);
        assert!(eval.is_degenerate());
        assert_eq!(eval.confusion_matrix.to_vec(), vec![vec![0, 0], vec![1, 1]]);

        let empty = Evaluation::from_predictions(&[], &[], 2);
        assert!(empty.is_degenerate());
        assert_eq!(empty.confusion_matrix.accuracy(), None);

        let fine = Evaluation::from_predictions(&[0, 1], &[0, 1], 2);
        assert!(!fine.is_degenerate());
    }
}
