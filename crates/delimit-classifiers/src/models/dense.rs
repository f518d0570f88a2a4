use candle_core::{Device, Tensor};
use candle_nn::{self as nn, Module, VarBuilder};
use ndarray::Array2;

use crate::error::{DelimitError, Result};
use crate::models::training::{array_to_tensor, Network};

/// Feed-forward classifier over flattened SFS vectors:
/// `features -> 100 -> 50 -> classes` with ReLU between layers.
#[derive(Debug, Clone)]
pub struct DenseNet {
    n_features: usize,
    fc1: nn::Linear,
    fc2: nn::Linear,
    out: nn::Linear,
}

impl DenseNet {
    pub fn new(vb: VarBuilder, n_features: usize, n_classes: usize) -> Result<Self> {
        Ok(Self {
            n_features,
            fc1: nn::linear(n_features, 100, vb.pp("fc1"))?,
            fc2: nn::linear(100, 50, vb.pp("fc2"))?,
            out: nn::linear(50, n_classes, vb.pp("out"))?,
        })
    }
}

impl Network for DenseNet {
    type Input = Array2<f32>;

    fn inputs(&self, x: &Array2<f32>, device: &Device) -> Result<Vec<Tensor>> {
        if x.ncols() != self.n_features {
            return Err(DelimitError::ShapeMismatch(format!(
                "network expects {} SFS bins per sample, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(vec![array_to_tensor(x, device)?])
    }

    fn forward_t(&self, inputs: &[Tensor], _train: bool) -> candle_core::Result<Tensor> {
        let x = inputs
            .first()
            .ok_or_else(|| candle_core::Error::Msg("dense network expects one input".to_string()))?;
        let x = self.fc1.forward(x)?.relu()?;
        let x = self.fc2.forward(&x)?.relu()?;
        self.out.forward(&x)
    }

    fn name(&self) -> &'static str {
        "dense_sfs"
    }
}
