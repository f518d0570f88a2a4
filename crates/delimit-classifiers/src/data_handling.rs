//! Reshaping of simulated and empirical population-genetic data.
//!
//! Feature collections arrive grouped by demographic model and are flattened
//! into sample-major containers here. This module also owns the two
//! representation-specific reshapes: the transpose of per-sample 2-D SFS
//! mappings into per-slice stacks, and the partition of genotype matrix rows
//! into populations.
use std::ops::Range;

use ndarray::{s, stack, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::config::SamplingDict;
use crate::error::{DelimitError, Result};

/// A collection of samples that can be subset along the sample axis.
pub trait SampleSet: Sized {
    fn n_samples(&self) -> usize;

    /// Samples at `indices`, in that order.
    fn select(&self, indices: &[usize]) -> Self;
}

impl SampleSet for Array2<f32> {
    fn n_samples(&self) -> usize {
        self.nrows()
    }

    fn select(&self, indices: &[usize]) -> Self {
        ndarray::ArrayBase::select(self, Axis(0), indices)
    }
}

/// Flatten a per-model feature collection, returning the samples in order and
/// the number of replicates each model contributed.
pub fn flatten_groups<T>(groups: Vec<Vec<T>>) -> (Vec<T>, Vec<usize>) {
    let group_sizes = groups.iter().map(|g| g.len()).collect();
    let samples = groups.into_iter().flatten().collect();
    (samples, group_sizes)
}

/// Stack 1-D SFS vectors into a (samples x bins) matrix.
pub fn stack_vectors(vectors: &[Array1<f32>]) -> Result<Array2<f32>> {
    let first = vectors
        .first()
        .ok_or_else(|| DelimitError::ShapeMismatch("no SFS vectors supplied".to_string()))?;
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != first.len()) {
        return Err(DelimitError::ShapeMismatch(format!(
            "SFS vector {} has {} entries, expected {}",
            i,
            v.len(),
            first.len()
        )));
    }
    let views: Vec<_> = vectors.iter().map(|v| v.view()).collect();
    stack(Axis(0), &views).map_err(|e| DelimitError::ShapeMismatch(e.to_string()))
}

/// The 2-D SFS slices of one replicate, keyed by slice name (e.g. population pair).
#[derive(Debug, Clone, PartialEq)]
pub struct SfsSample {
    slices: Vec<(String, Array2<f32>)>,
}

impl SfsSample {
    pub fn new<S: Into<String>>(slices: Vec<(S, Array2<f32>)>) -> Self {
        Self {
            slices: slices.into_iter().map(|(name, sfs)| (name.into(), sfs)).collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slices.iter().map(|(name, _)| name.as_str())
    }

    pub fn slices(&self) -> &[(String, Array2<f32>)] {
        &self.slices
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Per-slice stacks of 2-D SFS: `arrays[k]` holds slice `names[k]` for every
/// sample, shaped (samples x rows x cols). Sample `i` of every stack comes
/// from the same replicate.
#[derive(Debug, Clone, PartialEq)]
pub struct SfsSlices {
    names: Vec<String>,
    arrays: Vec<Array3<f32>>,
}

impl SfsSlices {
    /// Transpose a list of per-sample slice mappings into one stack per slice name.
    pub fn transpose(samples: &[SfsSample]) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| DelimitError::ShapeMismatch("no 2-D SFS samples supplied".to_string()))?;
        if first.is_empty() {
            return Err(DelimitError::ShapeMismatch(
                "2-D SFS samples must contain at least one slice".to_string(),
            ));
        }
        let names: Vec<String> = first.names().map(str::to_string).collect();

        for (i, sample) in samples.iter().enumerate() {
            if !sample.names().eq(names.iter().map(String::as_str)) {
                return Err(DelimitError::ShapeMismatch(format!(
                    "sample {} has slices {:?}, expected {:?}",
                    i,
                    sample.names().collect::<Vec<_>>(),
                    names
                )));
            }
        }

        let arrays = (0..names.len())
            .map(|k| {
                let shape = first.slices[k].1.dim();
                let views = samples
                    .iter()
                    .enumerate()
                    .map(|(i, sample)| {
                        let sfs = &sample.slices[k].1;
                        if sfs.dim() != shape {
                            return Err(DelimitError::ShapeMismatch(format!(
                                "slice '{}' of sample {} has shape {:?}, expected {:?}",
                                names[k],
                                i,
                                sfs.dim(),
                                shape
                            )));
                        }
                        Ok(sfs.view())
                    })
                    .collect::<Result<Vec<ArrayView2<f32>>>>()?;
                stack(Axis(0), &views).map_err(|e| DelimitError::ShapeMismatch(e.to_string()))
            })
            .collect::<Result<Vec<Array3<f32>>>>()?;

        log::debug!(
            "Transposed {} samples into {} SFS slices: {:?}",
            samples.len(),
            names.len(),
            names
        );

        Ok(Self { names, arrays })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn arrays(&self) -> &[Array3<f32>] {
        &self.arrays
    }

    /// (rows, cols) of each slice.
    pub fn slice_shapes(&self) -> Vec<(usize, usize)> {
        self.arrays.iter().map(|a| (a.shape()[1], a.shape()[2])).collect()
    }
}

impl SampleSet for SfsSlices {
    fn n_samples(&self) -> usize {
        self.arrays.first().map(|a| a.shape()[0]).unwrap_or(0)
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            arrays: self.arrays.iter().map(|a| a.select(Axis(0), indices)).collect(),
        }
    }
}

/// Genotype matrices stacked as (samples x individuals x sites).
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeBatch {
    data: Array3<f32>,
}

impl GenotypeBatch {
    pub fn from_matrices(matrices: &[Array2<f32>]) -> Result<Self> {
        let first = matrices
            .first()
            .ok_or_else(|| DelimitError::ShapeMismatch("no genotype matrices supplied".to_string()))?;
        if let Some((i, m)) = matrices.iter().enumerate().find(|(_, m)| m.dim() != first.dim()) {
            return Err(DelimitError::ShapeMismatch(format!(
                "genotype matrix {} has shape {:?}, expected {:?}",
                i,
                m.dim(),
                first.dim()
            )));
        }
        let views: Vec<_> = matrices.iter().map(|m| m.view()).collect();
        let data = stack(Axis(0), &views).map_err(|e| DelimitError::ShapeMismatch(e.to_string()))?;
        Ok(Self { data })
    }

    pub fn from_array(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn n_individuals(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn n_sites(&self) -> usize {
        self.data.shape()[2]
    }
}

impl SampleSet for GenotypeBatch {
    fn n_samples(&self) -> usize {
        self.data.shape()[0]
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), indices),
        }
    }
}

/// A contiguous block of genotype matrix rows belonging to one population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationBlock {
    pub name: String,
    pub rows: Range<usize>,
}

impl PopulationBlock {
    pub fn size(&self) -> usize {
        self.rows.len()
    }
}

/// Explicit assignment of genotype matrix rows to populations, derived from
/// the order and sizes of the sampling dict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationPartition {
    blocks: Vec<PopulationBlock>,
}

impl PopulationPartition {
    pub fn from_sampling(sampling: &SamplingDict) -> Self {
        let mut start = 0;
        let blocks = sampling
            .iter()
            .map(|(name, count)| {
                let block = PopulationBlock {
                    name: name.to_string(),
                    rows: start..start + count,
                };
                start += count;
                block
            })
            .collect();
        Self { blocks }
    }

    pub fn blocks(&self) -> &[PopulationBlock] {
        &self.blocks
    }

    pub fn n_populations(&self) -> usize {
        self.blocks.len()
    }

    pub fn total_rows(&self) -> usize {
        self.blocks.last().map(|b| b.rows.end).unwrap_or(0)
    }

    /// Population owning the given row.
    pub fn population_of(&self, row: usize) -> Option<&str> {
        self.blocks
            .iter()
            .find(|b| b.rows.contains(&row))
            .map(|b| b.name.as_str())
    }

    pub fn validate_rows(&self, n_rows: usize) -> Result<()> {
        if n_rows != self.total_rows() {
            return Err(DelimitError::ShapeMismatch(format!(
                "genotype matrix has {} rows but the sampling dict accounts for {} individuals ({})",
                n_rows,
                self.total_rows(),
                self.blocks
                    .iter()
                    .map(|b| format!("{}: {}", b.name, b.size()))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(())
    }

    /// Split one genotype matrix into per-population row blocks.
    pub fn split_rows<'a>(&self, matrix: &'a Array2<f32>) -> Result<Vec<ArrayView2<'a, f32>>> {
        self.validate_rows(matrix.nrows())?;
        Ok(self
            .blocks
            .iter()
            .map(|b| matrix.slice(s![b.rows.clone(), ..]))
            .collect())
    }

    /// Split a batch of genotype matrices into per-population row blocks.
    pub fn split_batch<'a>(&self, batch: &'a GenotypeBatch) -> Result<Vec<ArrayView3<'a, f32>>> {
        self.validate_rows(batch.n_individuals())?;
        Ok(self
            .blocks
            .iter()
            .map(|b| batch.data.slice(s![.., b.rows.clone(), ..]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sampling() -> SamplingDict {
        SamplingDict::new(vec![("popA", 3), ("popB", 2)]).unwrap()
    }

    #[test]
    fn test_flatten_groups() {
        let (samples, sizes) = flatten_groups(vec![vec![1, 2], vec![3], vec![4, 5, 6]]);
        assert_eq!(samples, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(sizes, vec![2, 1, 3]);
    }

    #[test]
    fn test_stack_vectors_rejects_ragged() {
        let ok = stack_vectors(&[array![1.0, 2.0], array![3.0, 4.0]]).unwrap();
        assert_eq!(ok, array![[1.0f32, 2.0], [3.0, 4.0]]);
        assert!(matches!(
            stack_vectors(&[array![1.0, 2.0], array![3.0]]),
            Err(DelimitError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_partition_splits_rows_in_order() {
        let partition = PopulationPartition::from_sampling(&sampling());
        let matrix = Array2::from_shape_fn((5, 4), |(r, _)| r as f32);
        let blocks = partition.split_rows(&matrix).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].nrows(), 3);
        assert_eq!(blocks[1].nrows(), 2);
        assert_eq!(blocks[0].column(0).to_vec(), vec![0.0, 1.0, 2.0]);
        assert_eq!(blocks[1].column(0).to_vec(), vec![3.0, 4.0]);
        assert_eq!(partition.population_of(3), Some("popB"));
    }

    #[test]
    fn test_partition_rejects_wrong_row_count() {
        let partition = PopulationPartition::from_sampling(&sampling());
        let matrix = Array2::<f32>::zeros((4, 4));
        assert!(matches!(
            partition.split_rows(&matrix),
            Err(DelimitError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_transpose_keeps_sample_alignment() {
        let samples: Vec<SfsSample> = (0..3)
            .map(|i| {
                SfsSample::new(vec![
                    ("pop0-pop1", Array2::from_elem((3, 3), i as f32)),
                    ("pop0-pop2", Array2::from_elem((4, 3), 10.0 + i as f32)),
                ])
            })
            .collect();

        let slices = SfsSlices::transpose(&samples).unwrap();
        assert_eq!(slices.names(), &["pop0-pop1".to_string(), "pop0-pop2".to_string()]);
        assert_eq!(slices.slice_shapes(), vec![(3, 3), (4, 3)]);

        let subset = slices.select(&[2, 0]);
        assert_eq!(subset.n_samples(), 2);
        assert_eq!(subset.arrays()[0][[0, 0, 0]], 2.0);
        assert_eq!(subset.arrays()[1][[0, 0, 0]], 12.0);
        assert_eq!(subset.arrays()[1][[1, 0, 0]], 10.0);
    }

    #[test]
    fn test_transpose_rejects_misaligned_slices() {
        let a = SfsSample::new(vec![("x", Array2::zeros((3, 3))), ("y", Array2::zeros((3, 3)))]);
        let b = SfsSample::new(vec![("y", Array2::zeros((3, 3))), ("x", Array2::zeros((3, 3)))]);
        assert!(matches!(
            SfsSlices::transpose(&[a.clone(), b]),
            Err(DelimitError::ShapeMismatch(_))
        ));

        let c = SfsSample::new(vec![("x", Array2::zeros((3, 3))), ("y", Array2::zeros((4, 3)))]);
        assert!(SfsSlices::transpose(&[a, c]).is_err());
    }

    #[test]
    fn test_genotype_batch() {
        let batch = GenotypeBatch::from_matrices(&[Array2::zeros((5, 6)), Array2::ones((5, 6))]).unwrap();
        assert_eq!(batch.n_samples(), 2);
        assert_eq!(batch.n_individuals(), 5);
        assert_eq!(batch.n_sites(), 6);

        let partition = PopulationPartition::from_sampling(&sampling());
        let blocks = partition.split_batch(&batch).unwrap();
        assert_eq!(blocks[0].shape(), &[2, 3, 6]);
        assert_eq!(blocks[1].shape(), &[2, 2, 6]);

        assert!(GenotypeBatch::from_matrices(&[Array2::zeros((5, 6)), Array2::zeros((5, 5))]).is_err());
    }
}
