//! Training loop shared by the candle networks.
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Optimizer, VarBuilder, VarMap};
use log::info;
use ndarray::{Array2, ArrayBase, Data, Dimension};
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::data_handling::SampleSet;
use crate::error::{DelimitError, Result};
use crate::labels::EncodedLabels;
use crate::models::classifier_trait::{argmax_rows, ClassifierModel};

/// A classification network over one or several input tensors.
pub trait Network {
    /// Sample container the network consumes.
    type Input: SampleSet;

    /// Convert samples into the ordered input tensors of `forward_t`,
    /// rejecting samples whose shape differs from the one the network was
    /// built for.
    fn inputs(&self, x: &Self::Input, device: &Device) -> Result<Vec<Tensor>>;

    /// Unnormalised class scores, shaped (batch x classes).
    fn forward_t(&self, inputs: &[Tensor], train: bool) -> candle_core::Result<Tensor>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

/// Per-epoch loss and validation metrics of a fitted network.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A fitted network together with its weights and training history.
pub struct TrainedNetwork<N: Network> {
    network: N,
    // Owns the trained variables referenced by `network`.
    varmap: VarMap,
    device: Device,
    n_classes: usize,
    history: TrainingHistory,
}

impl<N: Network> TrainedNetwork<N> {
    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }
}

impl<N: Network> ClassifierModel<N::Input> for TrainedNetwork<N> {
    fn predict_proba(&self, x: &N::Input) -> Result<Array2<f32>> {
        if x.n_samples() == 0 {
            return Ok(Array2::zeros((0, self.n_classes)));
        }
        let inputs = self.network.inputs(x, &self.device)?;
        let logits = self.network.forward_t(&inputs, false)?;
        let probabilities = candle_nn::ops::softmax(&logits, D::Minus1)?;
        tensor_to_array2(&probabilities)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn name(&self) -> &str {
        self.network.name()
    }
}

/// Build a network with `build` and train it with AdamW on categorical
/// cross-entropy. The validation samples are scored after every epoch but
/// never trained on.
pub fn fit_network<N, F>(
    build: F,
    train_x: &N::Input,
    train_y: &EncodedLabels,
    val_x: &N::Input,
    val_y: &EncodedLabels,
    params: FitParams,
) -> Result<TrainedNetwork<N>>
where
    N: Network,
    F: FnOnce(VarBuilder) -> Result<N>,
{
    let n_train = train_x.n_samples();
    if n_train == 0 || n_train != train_y.len() {
        return Err(DelimitError::ShapeMismatch(format!(
            "cannot train on {} samples with {} labels",
            n_train,
            train_y.len()
        )));
    }
    let n_classes = train_y.n_classes();

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let network = build(vb)?;

    let train_inputs = network.inputs(train_x, &device)?;
    let train_targets = array_to_tensor(&train_y.one_hot(), &device)?;
    let validation = if val_x.n_samples() > 0 {
        Some((
            network.inputs(val_x, &device)?,
            array_to_tensor(&val_y.one_hot(), &device)?,
            val_y.classes().to_vec(),
        ))
    } else {
        None
    };

    let num_batches = (n_train + params.batch_size - 1) / params.batch_size;
    info!(
        "Training {} network on {} samples ({} batches of {}) for {} epochs",
        network.name(),
        n_train,
        num_batches,
        params.batch_size,
        params.epochs
    );

    let adamw = candle_nn::ParamsAdamW {
        lr: params.learning_rate,
        weight_decay: 0.0,
        ..Default::default()
    };
    let mut opt = candle_nn::AdamW::new(varmap.all_vars(), adamw)?;

    let mut history = TrainingHistory::default();
    let mut order: Vec<u32> = (0..n_train as u32).collect();
    let mut rng = rand::thread_rng();

    for epoch in 0..params.epochs {
        order.shuffle(&mut rng);
        let mut total_loss = 0.0f32;

        for chunk in order.chunks(params.batch_size) {
            let idx = Tensor::from_slice(chunk, chunk.len(), &device)?;
            let batch = train_inputs
                .iter()
                .map(|t| t.index_select(&idx, 0))
                .collect::<candle_core::Result<Vec<_>>>()?;
            let targets = train_targets.index_select(&idx, 0)?;

            let logits = network.forward_t(&batch, true)?;
            let loss = categorical_cross_entropy(&logits, &targets)?;
            opt.backward_step(&loss)?;
            total_loss += loss.to_scalar::<f32>()?;
        }

        let train_loss = total_loss / num_batches as f32;
        let (val_loss, val_accuracy) = match &validation {
            Some((inputs, targets, classes)) => {
                let logits = network.forward_t(inputs, false)?;
                let loss = categorical_cross_entropy(&logits, targets)?.to_scalar::<f32>()?;
                let predicted = argmax_rows(&tensor_to_array2(&logits)?);
                let correct = predicted.iter().zip(classes).filter(|(p, t)| p == t).count();
                (Some(loss), Some(correct as f32 / classes.len() as f32))
            }
            None => (None, None),
        };

        match (val_loss, val_accuracy) {
            (Some(vl), Some(va)) => info!(
                "[{}] Epoch {}/{}: loss {:.4}, val_loss {:.4}, val_accuracy {:.4}",
                network.name(),
                epoch + 1,
                params.epochs,
                train_loss,
                vl,
                va
            ),
            _ => info!(
                "[{}] Epoch {}/{}: loss {:.4}",
                network.name(),
                epoch + 1,
                params.epochs,
                train_loss
            ),
        }

        history.epochs.push(EpochMetrics {
            epoch,
            train_loss,
            val_loss,
            val_accuracy,
        });
    }

    Ok(TrainedNetwork {
        network,
        varmap,
        device,
        n_classes,
        history,
    })
}

/// Mean over the batch of `-sum(onehot * log_softmax(logits))`.
pub fn categorical_cross_entropy(logits: &Tensor, one_hot: &Tensor) -> candle_core::Result<Tensor> {
    let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    one_hot.mul(&log_probs)?.sum(D::Minus1)?.neg()?.mean_all()
}

/// Copy a host array into a tensor of the same shape.
pub fn array_to_tensor<S, Dim>(array: &ArrayBase<S, Dim>, device: &Device) -> Result<Tensor>
where
    S: Data<Elem = f32>,
    Dim: Dimension,
{
    let values: Vec<f32> = array.iter().copied().collect();
    Ok(Tensor::from_vec(values, array.shape(), device)?)
}

pub fn tensor_to_array2(tensor: &Tensor) -> Result<Array2<f32>> {
    let (rows, cols) = tensor.dims2()?;
    let values = tensor.flatten_all()?.to_vec1::<f32>()?;
    Array2::from_shape_vec((rows, cols), values).map_err(|e| DelimitError::ShapeMismatch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cross_entropy_matches_manual() {
        let device = Device::Cpu;
        let logits = array_to_tensor(&array![[2.0f32, 0.0], [0.0, 0.0]], &device).unwrap();
        let targets = array_to_tensor(&array![[1.0f32, 0.0], [0.0, 1.0]], &device).unwrap();
        let loss = categorical_cross_entropy(&logits, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();

        let first = -(2.0f32.exp() / (2.0f32.exp() + 1.0)).ln();
        let second = -(0.5f32).ln();
        assert!((loss - (first + second) / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_tensor_round_trip_keeps_layout() {
        let device = Device::Cpu;
        let original = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let tensor = array_to_tensor(&original.t(), &device).unwrap();
        assert_eq!(tensor.dims(), &[3, 2]);
        assert_eq!(tensor_to_array2(&tensor).unwrap(), original.t().to_owned());
    }
}
