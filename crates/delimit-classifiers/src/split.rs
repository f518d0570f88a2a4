//! Train/validation splitting and cross-validation folds.
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{DelimitError, Result};

/// Sample indices of a train/validation partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainValidationSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

impl TrainValidationSplit {
    fn check(self, n_samples: usize) -> Result<Self> {
        if self.train.is_empty() {
            return Err(DelimitError::ShapeMismatch(format!(
                "cannot split {} samples: the training partition would be empty",
                n_samples
            )));
        }
        log::debug!(
            "Split {} samples into {} training and {} validation samples",
            n_samples,
            self.train.len(),
            self.validation.len()
        );
        Ok(self)
    }
}

/// Stratified split: each class contributes to the validation set in
/// proportion to its size, with `ceil(n * validation_fraction)` validation
/// samples overall.
pub fn stratified_split<R: Rng + ?Sized>(
    classes: &[usize],
    validation_fraction: f64,
    rng: &mut R,
) -> Result<TrainValidationSplit> {
    let n_samples = classes.len();
    let n_classes = classes.iter().max().map(|&c| c + 1).unwrap_or(0);
    let n_validation = ((n_samples as f64 * validation_fraction).ceil() as usize).min(n_samples.saturating_sub(1));

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &c) in classes.iter().enumerate() {
        by_class[c].push(i);
    }

    let allocation = allocate_largest_remainder(
        &by_class.iter().map(Vec::len).collect::<Vec<_>>(),
        n_validation,
    );

    let mut train = Vec::with_capacity(n_samples - n_validation);
    let mut validation = Vec::with_capacity(n_validation);
    for (members, take) in by_class.iter_mut().zip(allocation) {
        members.shuffle(rng);
        validation.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }
    train.shuffle(rng);
    validation.shuffle(rng);

    TrainValidationSplit { train, validation }.check(n_samples)
}

/// Unstratified split: shuffle all indices, the first
/// `floor(n * (1 - validation_fraction))` become the training set.
pub fn shuffle_split<R: Rng + ?Sized>(
    n_samples: usize,
    validation_fraction: f64,
    rng: &mut R,
) -> Result<TrainValidationSplit> {
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(rng);

    let split_idx = (n_samples as f64 * (1.0 - validation_fraction)).floor() as usize;
    let validation = indices.split_off(split_idx.min(n_samples));

    TrainValidationSplit {
        train: indices,
        validation,
    }
    .check(n_samples)
}

/// Stratified k-fold: every sample lands in exactly one validation fold and
/// each class is spread evenly across the folds.
pub fn stratified_kfold<R: Rng + ?Sized>(
    classes: &[usize],
    n_folds: usize,
    rng: &mut R,
) -> Result<Vec<TrainValidationSplit>> {
    if n_folds == 0 {
        return Err(DelimitError::Configuration(
            "cross-validation needs at least one fold".to_string(),
        ));
    }
    let n_classes = classes.iter().max().map(|&c| c + 1).unwrap_or(0);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &c) in classes.iter().enumerate() {
        by_class[c].push(i);
    }

    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_folds];
    let mut next_fold = 0;
    for members in by_class.iter_mut() {
        members.shuffle(rng);
        for &idx in members.iter() {
            folds[next_fold].push(idx);
            next_fold = (next_fold + 1) % n_folds;
        }
    }

    let splits: Vec<TrainValidationSplit> = (0..n_folds)
        .map(|k| {
            let train = folds
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            TrainValidationSplit {
                train,
                validation: folds[k].clone(),
            }
        })
        .collect();
    Ok(splits)
}

/// Distribute `total` picks over groups proportionally to their sizes.
fn allocate_largest_remainder(sizes: &[usize], total: usize) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    if n == 0 {
        return vec![0; sizes.len()];
    }

    let ideal: Vec<f64> = sizes.iter().map(|&s| s as f64 * total as f64 / n as f64).collect();
    let mut allocation: Vec<usize> = ideal.iter().map(|v| v.floor() as usize).collect();
    let mut remaining = total - allocation.iter().sum::<usize>();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = ideal[a] - ideal[a].floor();
        let rb = ideal[b] - ideal[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });
    for &g in order.iter().cycle().take(sizes.len() * 2) {
        if remaining == 0 {
            break;
        }
        if allocation[g] < sizes[g] {
            allocation[g] += 1;
            remaining -= 1;
        }
    }

    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_stratified_split_is_balanced_and_reproducible() {
        let classes: Vec<usize> = (0..50).map(|i| i / 10).collect();
        let split = stratified_split(&classes, 0.2, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(split.validation.len(), 10);
        assert_eq!(split.train.len(), 40);
        for class in 0..5 {
            assert_eq!(split.validation.iter().filter(|&&i| classes[i] == class).count(), 2);
        }
        let all = sorted(split.train.iter().chain(&split.validation).copied().collect());
        assert_eq!(all, (0..50).collect::<Vec<_>>());

        let again = stratified_split(&classes, 0.2, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(split, again);
    }

    #[test]
    fn test_stratified_split_small_classes() {
        let classes = vec![0, 0, 1, 1, 2, 2];
        let split = stratified_split(&classes, 0.2, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(split.validation.len(), 2);
        assert_eq!(split.train.len(), 4);
    }

    #[test]
    fn test_shuffle_split_sizes() {
        let split = shuffle_split(10, 0.2, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(split.train.len(), 8);
        assert_eq!(split.validation.len(), 2);
        let all = sorted(split.train.iter().chain(&split.validation).copied().collect());
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert!(shuffle_split(1, 0.2, &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_kfold_covers_every_sample_once() {
        let classes = vec![0, 0, 0, 1, 1, 1, 1];
        let folds = stratified_kfold(&classes, 2, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(folds.len(), 2);
        let held_out = sorted(folds.iter().flat_map(|f| f.validation.iter().copied()).collect());
        assert_eq!(held_out, (0..7).collect::<Vec<_>>());
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.validation.len(), 7);
            assert!(fold.validation.len() >= 3);
        }
    }

    #[test]
    fn test_kfold_rejects_zero_folds() {
        let err = stratified_kfold(&[0, 1], 0, &mut StdRng::seed_from_u64(9)).unwrap_err();
        assert!(matches!(err, DelimitError::Configuration(_)));
    }

    #[test]
    fn test_largest_remainder() {
        assert_eq!(allocate_largest_remainder(&[2, 2, 2], 2), vec![1, 1, 0]);
        assert_eq!(allocate_largest_remainder(&[10, 10], 4), vec![2, 2]);
        assert_eq!(allocate_largest_remainder(&[1, 5], 3).iter().sum::<usize>(), 3);
    }
}
