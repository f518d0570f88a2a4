//! Label encoding for the predictors.
//!
//! Labels arrive either implicitly, one class per outer feature group
//! (simulated training data), or as free-text model names ending in
//! `_<integer>` (user supplied data). Both are normalised once, at ingestion,
//! into dense 0-based class indices.
use std::collections::BTreeSet;

use ndarray::Array2;

use crate::error::{DelimitError, Result};

/// Where the labels of a feature collection come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSet {
    /// One class per outer group of the feature collection, in group order.
    Grouped,
    /// One `<name>_<integer>` identifier per flattened sample.
    Named(Vec<String>),
}

impl LabelSet {
    pub fn named<S: AsRef<str>>(names: &[S]) -> Self {
        LabelSet::Named(names.iter().map(|s| s.as_ref().to_string()).collect())
    }

    /// Resolve against the group sizes of the accompanying feature collection.
    pub fn encode(&self, group_sizes: &[usize]) -> Result<EncodedLabels> {
        match self {
            LabelSet::Grouped => Ok(EncodedLabels::from_group_sizes(group_sizes)),
            LabelSet::Named(names) => EncodedLabels::from_model_names(names),
        }
    }
}

/// Dense class indices plus the class count they were encoded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedLabels {
    classes: Vec<usize>,
    n_classes: usize,
}

impl EncodedLabels {
    /// Training mode: group `g` contributes `group_sizes[g]` samples of class `g`.
    pub fn from_group_sizes(group_sizes: &[usize]) -> Self {
        let classes = group_sizes
            .iter()
            .enumerate()
            .flat_map(|(class, &size)| std::iter::repeat(class).take(size))
            .collect();
        Self {
            classes,
            n_classes: group_sizes.len(),
        }
    }

    /// User mode: extract the trailing integer of each `<name>_<integer>`
    /// label and shift so the smallest identifier becomes class 0.
    pub fn from_model_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let ids = names
            .iter()
            .map(|name| parse_model_id(name.as_ref()))
            .collect::<Result<Vec<i64>>>()?;

        let min_id = *ids.iter().min().ok_or_else(|| {
            DelimitError::InputFormat("at least one model name is required".to_string())
        })?;

        let classes = ids
            .iter()
            .map(|&id| {
                id.checked_sub(min_id)
                    .and_then(|offset| usize::try_from(offset).ok())
                    .ok_or_else(|| {
                        DelimitError::InputFormat(format!(
                            "model identifiers {} and {} are too far apart to be consecutive",
                            min_id, id
                        ))
                    })
            })
            .collect::<Result<Vec<usize>>>()?;
        let distinct: BTreeSet<usize> = classes.iter().copied().collect();
        let n_classes = distinct.len();

        if let Some(&max_class) = distinct.iter().next_back() {
            if max_class >= n_classes {
                return Err(DelimitError::InputFormat(format!(
                    "model identifiers must be consecutive integers; found {} distinct identifiers spanning {}..={}",
                    n_classes,
                    min_id,
                    min_id + max_class as i64
                )));
            }
        }

        Ok(Self { classes, n_classes })
    }

    /// Labels that are already dense class indices.
    pub fn from_classes(classes: Vec<usize>, n_classes: usize) -> Result<Self> {
        if let Some(&bad) = classes.iter().find(|&&c| c >= n_classes) {
            return Err(DelimitError::InputFormat(format!(
                "class index {} is out of range for {} classes",
                bad, n_classes
            )));
        }
        Ok(Self { classes, n_classes })
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Number of samples per class.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &c in &self.classes {
            counts[c] += 1;
        }
        counts
    }

    /// Subset of the labels, keeping the class count.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            classes: indices.iter().map(|&i| self.classes[i]).collect(),
            n_classes: self.n_classes,
        }
    }

    /// One-hot matrix with one row per sample and one column per class.
    pub fn one_hot(&self) -> Array2<f32> {
        let mut encoded = Array2::<f32>::zeros((self.classes.len(), self.n_classes));
        for (row, &class) in self.classes.iter().enumerate() {
            encoded[(row, class)] = 1.0;
        }
        encoded
    }
}

fn parse_model_id(name: &str) -> Result<i64> {
    name.rsplit_once('_')
        .and_then(|(_, suffix)| suffix.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            DelimitError::InputFormat(format!(
                "model names must end in '_x', where x is some integer; got '{}'",
                name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_labels() {
        let labels = EncodedLabels::from_group_sizes(&[2, 2, 2]);
        assert_eq!(labels.classes(), &[0, 0, 1, 1, 2, 2]);
        assert_eq!(labels.n_classes(), 3);
        assert_eq!(labels.class_counts(), vec![2, 2, 2]);
    }

    #[test]
    fn test_named_labels_are_shifted() {
        let labels = EncodedLabels::from_model_names(&["modelA_5", "modelA_5", "modelB_6"]).unwrap();
        assert_eq!(labels.classes(), &[0, 0, 1]);
        assert_eq!(labels.n_classes(), 2);
    }

    #[test]
    fn test_named_labels_with_underscored_names() {
        let labels = EncodedLabels::from_model_names(&["sec_contact_2", "dwgf_1", "iso_0"]).unwrap();
        assert_eq!(labels.classes(), &[2, 1, 0]);
    }

    #[test]
    fn test_bad_names() {
        for bad in [vec!["badname"], vec!["model_x"], vec!["model_1", "model"]] {
            let err = EncodedLabels::from_model_names(&bad).unwrap_err();
            assert!(matches!(err, DelimitError::InputFormat(ref m) if m.contains("'_x'")));
        }
        let empty: Vec<&str> = Vec::new();
        assert!(EncodedLabels::from_model_names(&empty).is_err());
    }

    #[test]
    fn test_gapped_identifiers_rejected() {
        let err = EncodedLabels::from_model_names(&["a_1", "b_3"]).unwrap_err();
        assert!(matches!(err, DelimitError::InputFormat(_)));
    }

    #[test]
    fn test_far_apart_identifiers_rejected() {
        let err = EncodedLabels::from_model_names(&["a_9223372036854775807", "b_-1"]).unwrap_err();
        assert!(matches!(err, DelimitError::InputFormat(_)));
    }

    #[test]
    fn test_one_hot() {
        let labels = EncodedLabels::from_group_sizes(&[1, 2]);
        let one_hot = labels.one_hot();
        assert_eq!(one_hot.shape(), &[3, 2]);
        assert_eq!(one_hot.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(one_hot.row(2).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_select_keeps_class_count() {
        let labels = EncodedLabels::from_group_sizes(&[2, 2, 2]);
        let subset = labels.select(&[0, 5]);
        assert_eq!(subset.classes(), &[0, 2]);
        assert_eq!(subset.n_classes(), 3);
        assert_eq!(subset.one_hot().ncols(), 3);
    }
}
