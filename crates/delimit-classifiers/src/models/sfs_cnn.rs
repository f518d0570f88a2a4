use candle_core::{Device, Tensor};
use candle_nn::{self as nn, Module, VarBuilder};

use crate::data_handling::SfsSlices;
use crate::error::{DelimitError, Result};
use crate::models::training::{array_to_tensor, Network};

const BRANCH_FILTERS: usize = 10;
const KERNEL_SIZE: usize = 3;
const HIDDEN_UNITS: usize = 64;

/// One convolutional branch per named 2-D SFS slice, concatenated and fed
/// through a 64-unit dense layer.
#[derive(Debug, Clone)]
pub struct SfsCnn {
    names: Vec<String>,
    shapes: Vec<(usize, usize)>,
    branches: Vec<nn::Conv2d>,
    fc: nn::Linear,
    out: nn::Linear,
}

impl SfsCnn {
    /// `slices` gives the name and (rows, cols) of every input slice, in input order.
    pub fn new(vb: VarBuilder, slices: &[(String, (usize, usize))], n_classes: usize) -> Result<Self> {
        if slices.is_empty() {
            return Err(DelimitError::ShapeMismatch(
                "at least one SFS slice is required".to_string(),
            ));
        }

        let mut branches = Vec::with_capacity(slices.len());
        let mut concat_width = 0;
        for (i, (name, (rows, cols))) in slices.iter().enumerate() {
            if *rows < KERNEL_SIZE || *cols < KERNEL_SIZE {
                return Err(DelimitError::ShapeMismatch(format!(
                    "SFS slice '{}' is {}x{}; slices must be at least {}x{}",
                    name, rows, cols, KERNEL_SIZE, KERNEL_SIZE
                )));
            }
            branches.push(nn::conv2d(
                1,
                BRANCH_FILTERS,
                KERNEL_SIZE,
                nn::Conv2dConfig::default(),
                vb.pp(format!("branch{}", i)),
            )?);
            concat_width += BRANCH_FILTERS * (rows - KERNEL_SIZE + 1) * (cols - KERNEL_SIZE + 1);
        }

        log::debug!(
            "Built {} SFS branches with {} concatenated features",
            branches.len(),
            concat_width
        );

        Ok(Self {
            names: slices.iter().map(|(name, _)| name.clone()).collect(),
            shapes: slices.iter().map(|(_, shape)| *shape).collect(),
            branches,
            fc: nn::linear(concat_width, HIDDEN_UNITS, vb.pp("fc"))?,
            out: nn::linear(HIDDEN_UNITS, n_classes, vb.pp("out"))?,
        })
    }

    pub fn slice_names(&self) -> &[String] {
        &self.names
    }
}

impl Network for SfsCnn {
    type Input = SfsSlices;

    /// One (samples x 1 x rows x cols) tensor per slice.
    fn inputs(&self, x: &SfsSlices, device: &Device) -> Result<Vec<Tensor>> {
        if x.names() != self.names.as_slice() || x.slice_shapes() != self.shapes {
            return Err(DelimitError::ShapeMismatch(format!(
                "network was built for slices {:?} with shapes {:?}, got {:?} with shapes {:?}",
                self.names,
                self.shapes,
                x.names(),
                x.slice_shapes()
            )));
        }
        x.arrays()
            .iter()
            .map(|a| array_to_tensor(&a.view().insert_axis(ndarray::Axis(1)), device))
            .collect()
    }

    fn forward_t(&self, inputs: &[Tensor], _train: bool) -> candle_core::Result<Tensor> {
        if inputs.len() != self.branches.len() {
            return Err(candle_core::Error::Msg(format!(
                "expected {} SFS inputs, got {}",
                self.branches.len(),
                inputs.len()
            )));
        }
        let features = self
            .branches
            .iter()
            .zip(inputs)
            .map(|(conv, x)| conv.forward(x)?.relu()?.flatten_from(1))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let x = Tensor::cat(&features, 1)?;
        let x = self.fc.forward(&x)?.relu()?;
        self.out.forward(&x)
    }

    fn name(&self) -> &'static str {
        "multi_branch_sfs"
    }
}
