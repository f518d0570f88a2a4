//! Population-aware convolutional network over raw genotype matrices.
//!
//! Each population gets a branch whose kernel spans all of that population's
//! rows and a single site, so every branch collapses its block of
//! individuals to one row per filter. The branch outputs are stacked along
//! the row axis (one row per population) and fused by a second convolution
//! spanning every population.
use candle_core::{Device, Tensor};
use candle_nn::{self as nn, Module, VarBuilder};

use crate::data_handling::{GenotypeBatch, PopulationPartition};
use crate::error::{DelimitError, Result};
use crate::models::training::{array_to_tensor, Network};

const FILTERS: usize = 10;
const DROPOUT: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct GenotypeCnn {
    partition: PopulationPartition,
    n_sites: usize,
    branches: Vec<nn::Conv2d>,
    fusion: nn::Conv2d,
    fc1: nn::Linear,
    dropout: nn::Dropout,
    fc2: nn::Linear,
    out: nn::Linear,
}

/// Convolution with a `kernel_height x 1` kernel.
///
/// The input height always equals the kernel height, so the kernel is applied
/// exactly once along the row axis and a unit stride gives the same result as
/// a stride equal to the kernel height.
fn column_conv(vb: VarBuilder, in_channels: usize, out_channels: usize, kernel_height: usize) -> Result<nn::Conv2d> {
    let weight = vb.get_with_hints(
        (out_channels, in_channels, kernel_height, 1),
        "weight",
        nn::init::DEFAULT_KAIMING_NORMAL,
    )?;
    let bound = 1.0 / ((in_channels * kernel_height) as f64).sqrt();
    let bias = vb.get_with_hints(out_channels, "bias", nn::Init::Uniform { lo: -bound, up: bound })?;
    Ok(nn::Conv2d::new(weight, Some(bias), nn::Conv2dConfig::default()))
}

impl GenotypeCnn {
    pub fn new(vb: VarBuilder, partition: &PopulationPartition, n_sites: usize, n_classes: usize) -> Result<Self> {
        if partition.n_populations() == 0 || n_sites == 0 {
            return Err(DelimitError::ShapeMismatch(format!(
                "cannot build a genotype network for {} populations and {} sites",
                partition.n_populations(),
                n_sites
            )));
        }

        let branches = partition
            .blocks()
            .iter()
            .enumerate()
            .map(|(i, block)| column_conv(vb.pp(format!("population{}", i)), 1, FILTERS, block.size()))
            .collect::<Result<Vec<_>>>()?;
        let fusion = column_conv(vb.pp("fusion"), FILTERS, FILTERS, partition.n_populations())?;

        log::debug!(
            "Built genotype network: populations {:?}, {} sites",
            partition
                .blocks()
                .iter()
                .map(|b| format!("{}={}", b.name, b.size()))
                .collect::<Vec<_>>(),
            n_sites
        );

        Ok(Self {
            partition: partition.clone(),
            n_sites,
            branches,
            fusion,
            fc1: nn::linear(FILTERS * n_sites, 100, vb.pp("fc1"))?,
            dropout: nn::Dropout::new(DROPOUT),
            fc2: nn::linear(100, 50, vb.pp("fc2"))?,
            out: nn::linear(50, n_classes, vb.pp("out"))?,
        })
    }

    pub fn partition(&self) -> &PopulationPartition {
        &self.partition
    }
}

impl Network for GenotypeCnn {
    type Input = GenotypeBatch;

    /// One (samples x 1 x population size x sites) tensor per population,
    /// in sampling-dict order.
    fn inputs(&self, x: &GenotypeBatch, device: &Device) -> Result<Vec<Tensor>> {
        if x.n_sites() != self.n_sites {
            return Err(DelimitError::ShapeMismatch(format!(
                "network was built for {} sites, got {}",
                self.n_sites,
                x.n_sites()
            )));
        }
        self.partition
            .split_batch(x)?
            .iter()
            .map(|block| array_to_tensor(&block.view().insert_axis(ndarray::Axis(1)), device))
            .collect()
    }

    fn forward_t(&self, inputs: &[Tensor], train: bool) -> candle_core::Result<Tensor> {
        if inputs.len() != self.branches.len() {
            return Err(candle_core::Error::Msg(format!(
                "expected {} population inputs, got {}",
                self.branches.len(),
                inputs.len()
            )));
        }
        let rows = self
            .branches
            .iter()
            .zip(inputs)
            .map(|(conv, x)| conv.forward(x)?.relu())
            .collect::<candle_core::Result<Vec<_>>>()?;

        // (batch, filters, populations, sites)
        let x = Tensor::cat(&rows, 2)?;
        let x = self.fusion.forward(&x)?.relu()?.flatten_from(1)?;

        let x = self.fc1.forward(&x)?.relu()?;
        let x = self.dropout.forward(&x, train)?;
        let x = self.fc2.forward(&x)?.relu()?;
        self.out.forward(&x)
    }

    fn name(&self) -> &'static str {
        "multi_branch_genotype"
    }
}
