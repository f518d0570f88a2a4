use anyhow::Result;
use ndarray::{stack, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use delimit_classifiers::{
    ClassifierModel, DelimitConfig, LabelSet, MultiBranchGenotypePredictor, MultiBranchSfsPredictor,
    SfsSample, TabularEnsemblePredictor, TabularNetworkPredictor,
};

const N_MODELS: usize = 3;
const REPLICATES: usize = 30;
const SFS_BINS: usize = 12;
const SITES: usize = 24;

/// 1-D SFS whose shape depends on the model: model `k` shifts mass towards
/// higher-frequency bins.
fn sfs_vector(model: usize, rng: &mut StdRng) -> Array1<f32> {
    Array1::from_shape_fn(SFS_BINS, |bin| {
        let expected = 100.0 / (bin as f32 + 1.0) + 8.0 * model as f32 * bin as f32 / SFS_BINS as f32;
        expected * rng.gen_range(0.8..1.2)
    })
}

fn sfs_sample(model: usize, rng: &mut StdRng) -> SfsSample {
    let slice = |rows: usize, cols: usize, rng: &mut StdRng| {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let shared = if r == c { 5.0 * (model as f32 + 1.0) } else { 1.0 };
            shared * rng.gen_range(0.5..1.5)
        })
    };
    SfsSample::new(vec![
        ("popA-popB", slice(7, 5, rng)),
        ("popA-popC", slice(7, 4, rng)),
    ])
}

/// Genotype matrix with 3 + 2 individuals; gene flow (higher model index)
/// makes popB look more like popA.
fn genotype_matrix(model: usize, rng: &mut StdRng) -> Array2<f32> {
    let freqs: Vec<f32> = (0..SITES).map(|_| rng.gen_range(0.1..0.9)).collect();
    Array2::from_shape_fn((5, SITES), |(row, site)| {
        let p = if row < 3 {
            freqs[site]
        } else {
            let similarity = model as f32 / (N_MODELS - 1) as f32;
            similarity * freqs[site] + (1.0 - similarity) * (1.0 - freqs[site])
        };
        if rng.gen::<f32>() < p {
            1.0
        } else {
            0.0
        }
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("DELIMIT_LOG", "info")).init();

    let config = DelimitConfig::from_value(&json!({
        "seed": 1234,
        "sampling dict": {"popA": 3, "popB": 2},
        "training": {"n_trees": 100, "epochs": 10}
    }))?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let vectors: Vec<Vec<Array1<f32>>> = (0..N_MODELS)
        .map(|m| (0..REPLICATES).map(|_| sfs_vector(m, &mut rng)).collect())
        .collect();
    let (first, second) = (sfs_vector(0, &mut rng), sfs_vector(2, &mut rng));
    let empirical_sfs = stack(Axis(0), &[first.view(), second.view()])?;

    let mut ensemble = TabularEnsemblePredictor::new(config.clone(), vectors.clone(), LabelSet::Grouped)?;
    let built = ensemble.build()?;
    println!("Random forest confusion matrix: {:?}", built.confusion_matrix.to_vec());
    println!("Out-of-bag error: {:?}", built.model.oob_error());
    println!("{}", ensemble.predict(&built.model, &empirical_sfs)?);

    let mut dense = TabularNetworkPredictor::new(config.clone(), vectors, LabelSet::Grouped)?;
    let built = dense.build()?;
    println!("Dense network confusion matrix: {:?}", built.confusion_matrix.to_vec());
    println!("{}", dense.predict(&built.model, &empirical_sfs)?);

    let sfs_2d: Vec<Vec<SfsSample>> = (0..N_MODELS)
        .map(|m| (0..REPLICATES).map(|_| sfs_sample(m, &mut rng)).collect())
        .collect();
    let mut branches = MultiBranchSfsPredictor::new(config.clone(), sfs_2d, LabelSet::Grouped)?;
    let built = branches.build()?;
    println!("2-D SFS network confusion matrix: {:?}", built.confusion_matrix.to_vec());
    let new_samples = vec![sfs_sample(0, &mut rng), sfs_sample(2, &mut rng)];
    println!("{}", branches.predict(&built.model, &new_samples)?);

    let matrices: Vec<Vec<Array2<f32>>> = (0..N_MODELS)
        .map(|m| (0..REPLICATES).map(|_| genotype_matrix(m, &mut rng)).collect())
        .collect();
    let mut genotypes = MultiBranchGenotypePredictor::new(config, matrices, LabelSet::Grouped)?;
    let built = genotypes.build()?;
    println!("Genotype network confusion matrix: {:?}", built.confusion_matrix.to_vec());
    if let Some(last) = built.model.history().last() {
        println!("Final epoch: {:?}", last);
    }
    let table = genotypes.predict(&built.model, &genotype_matrix(1, &mut rng))?;
    println!("{}", table);
    println!("Best model per replicate: {:?} ({})", table.best_model(), built.model.name());

    Ok(())
}
