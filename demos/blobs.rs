use rand::rngs::StdRng;
use rand::SeedableRng;

use tapenet::data::separable_blobs;
use tapenet::train::evaluate;
use tapenet::{NetworkSpec, Result, TrainConfig};

const SEED: u64 = 42;
const SAMPLES: usize = 256;
const FEATURES: usize = 2;

/// Trains a small classifier on a synthetic, linearly separable data set.
///
/// Usage: `cargo run --example blobs -- [network_spec.json] [train_config.json]`
/// Log verbosity is controlled by `RUST_LOG` (e.g. `RUST_LOG=debug`).
fn main() {
    pretty_env_logger::init();
    if let Err(err) = run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let spec = match args.next() {
        Some(path) => NetworkSpec::load_json(path)?,
        None => NetworkSpec::classifier("blobs", FEATURES, 16, 2),
    };
    let config = match args.next() {
        Some(path) => TrainConfig::load_json(path)?,
        None => {
            let mut config = TrainConfig::new(20, 0.1, spec.loss);
            config.batch_size = 16;
            config.seed = Some(SEED);
            config
        }
    };
    spec.check_loss(config.loss_type)?;

    let mut rng = StdRng::seed_from_u64(SEED);
    let network = spec.build(&mut rng)?;
    let features = spec.layers.first().map_or(FEATURES, |layer| layer.input_size);
    let (inputs, labels) = separable_blobs(SAMPLES, features, &mut rng);
    let mut dataset = config.dataset(inputs, labels)?;
    let optimizer = config.optimizer(&network);

    log::info!(
        "training '{}' ({} parameters) on {} samples for {} epochs",
        spec.name,
        optimizer.len(),
        dataset.len(),
        config.epochs
    );
    let report = tapenet::train_loop(&network, &mut dataset, &optimizer, &config)?;

    let eval = evaluate(&network, &mut dataset, config.loss_type, config.reduction)?;
    log::info!(
        "final: train loss = {:.6}, eval loss = {:.6}, eval accuracy = {:.2}%",
        report.final_loss().unwrap_or(f64::NAN),
        eval.loss,
        eval.accuracy * 100.0
    );
    Ok(())
}
