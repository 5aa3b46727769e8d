use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tapenet::data::separable_blobs;
use tapenet::train::{evaluate, train_loop, EpochStats, TrainConfig};
use tapenet::{Batch, BatchSource, InMemoryDataset, LossType, NdArray, Network, NetworkSpec, NnError, Parameter, Reduction, Sgd, Tape};

fn blobs_dataset(seed: u64, samples: usize, batch_size: usize) -> InMemoryDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let (inputs, labels) = separable_blobs(samples, 2, &mut rng);
    InMemoryDataset::new(inputs, labels, batch_size).unwrap().shuffled(seed)
}

fn classifier(seed: u64) -> Network {
    NetworkSpec::classifier("blobs", 2, 8, 2)
        .build(&mut StdRng::seed_from_u64(seed))
        .unwrap()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("tapenet-{}-{}.json", name, std::process::id()))
}

#[test]
fn sgd_step_moves_by_learning_rate_times_gradient() {
    let w = Parameter::new("w", NdArray::from_vec(vec![1.0, 2.0], &[2]).unwrap());
    let sgd = Sgd::new(&[w.clone()], 0.1);

    let tape = Tape::new();
    let c = tape.constant(NdArray::from_vec(vec![3.0, -1.0], &[2]).unwrap());
    tape.param(&w).mul(c).unwrap().sum().unwrap().backward().unwrap();
    assert_eq!(w.grad().unwrap().data(), &[3.0, -1.0]);

    sgd.step().unwrap();
    let value = w.value();
    assert_abs_diff_eq!(value.data()[0], 1.0 - 0.1 * 3.0, epsilon = 1e-15);
    assert_abs_diff_eq!(value.data()[1], 2.0 + 0.1, epsilon = 1e-15);

    sgd.zero_grad().unwrap();
    assert_eq!(w.grad().unwrap().data(), &[0.0, 0.0]);

    // An allocated but zeroed gradient leaves the value where it is.
    sgd.step().unwrap();
    assert_eq!(w.value(), value);
}

#[test]
fn training_separates_blobs() {
    let network = classifier(7);
    let mut dataset = blobs_dataset(7, 200, 20);
    let mut config = TrainConfig::new(30, 0.1, LossType::Nll);
    config.reduction = Reduction::Mean;
    let optimizer = config.optimizer(&network);

    let report = train_loop(&network, &mut dataset, &optimizer, &config).unwrap();
    assert_eq!(report.epochs.len(), 30);
    assert!(!report.stopped_early);

    let first = report.epochs[0].train_loss;
    let last = report.final_loss().unwrap();
    assert!(last < first, "loss did not decrease: {} -> {}", first, last);
    assert_eq!(report.epochs[0].batches, 10);
    assert_eq!(report.epochs[0].samples, 200);

    let eval = evaluate(&network, &mut dataset, LossType::Nll, Reduction::Mean).unwrap();
    assert!(eval.accuracy >= 0.95, "accuracy too low: {}", eval.accuracy);
    assert_eq!(eval.samples, 200);
}

#[test]
fn cross_entropy_trains_a_logit_network() {
    let mut spec = NetworkSpec::classifier("logits", 2, 8, 2);
    spec.layers[1].activation = None;
    spec.loss = LossType::CrossEntropy;
    let network = spec.build(&mut StdRng::seed_from_u64(3)).unwrap();
    let mut dataset = blobs_dataset(3, 100, 10);
    let config = TrainConfig::new(20, 0.1, spec.loss);
    let optimizer = config.optimizer(&network);

    let report = train_loop(&network, &mut dataset, &optimizer, &config).unwrap();
    assert!(report.final_loss().unwrap() < report.epochs[0].train_loss);
}

#[test]
fn identical_seeds_give_identical_runs() {
    let run = || {
        let network = classifier(11);
        let mut dataset = blobs_dataset(11, 64, 8);
        let config = TrainConfig::new(5, 0.05, LossType::Nll);
        let optimizer = config.optimizer(&network);
        let report = train_loop(&network, &mut dataset, &optimizer, &config).unwrap();
        let losses: Vec<f64> = report.epochs.iter().map(|s| s.train_loss).collect();
        let weights: Vec<NdArray> = network.parameters().iter().map(Parameter::value).collect();
        (losses, weights)
    };
    assert_eq!(run(), run());
}

#[test]
fn malformed_batch_fails_the_run_with_its_position() {
    let network = classifier(1);
    let good = Batch::new(NdArray::zeros(&[2, 2]), vec![0, 1]);
    let wide = Batch::new(NdArray::zeros(&[2, 3]), vec![0, 1]);
    let mut batches = vec![good.clone(), wide];
    let config = TrainConfig::new(3, 0.1, LossType::Nll);
    let optimizer = config.optimizer(&network);

    let err = train_loop(&network, &mut batches, &optimizer, &config).unwrap_err();
    assert!(matches!(err, NnError::Batch { epoch: 1, batch: 1, .. }));
    assert!(err.is_shape_error());

    let mut bad_labels = vec![good, Batch::new(NdArray::zeros(&[1, 2]), vec![5])];
    let err = train_loop(&network, &mut bad_labels, &optimizer, &config).unwrap_err();
    assert!(err.is_index_error());
}

#[test]
fn empty_source_is_rejected() {
    let network = classifier(1);
    let mut batches: Vec<Batch> = Vec::new();
    let config = TrainConfig::new(1, 0.1, LossType::Nll);
    let optimizer = config.optimizer(&network);
    let err = train_loop(&network, &mut batches, &optimizer, &config).unwrap_err();
    assert!(matches!(err, NnError::InvalidConfig(_)));
}

#[test]
fn progress_channel_receives_every_epoch() {
    let network = classifier(2);
    let mut dataset = blobs_dataset(2, 40, 10);
    let (tx, rx) = mpsc::channel::<EpochStats>();
    let config = TrainConfig::new(4, 0.1, LossType::Nll).with_progress(tx);
    let optimizer = config.optimizer(&network);

    let report = train_loop(&network, &mut dataset, &optimizer, &config).unwrap();
    drop(config);
    let received: Vec<EpochStats> = rx.iter().collect();
    assert_eq!(received.len(), 4);
    assert_eq!(received.iter().map(|s| s.epoch).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert!(received.iter().all(|s| s.total_epochs == 4));
    assert_eq!(received[3].train_loss, report.epochs[3].train_loss);
}

#[test]
fn dropped_receiver_stops_training() {
    let network = classifier(2);
    let mut dataset = blobs_dataset(2, 40, 10);
    let (tx, rx) = mpsc::channel::<EpochStats>();
    drop(rx);
    let config = TrainConfig::new(10, 0.1, LossType::Nll).with_progress(tx);
    let optimizer = config.optimizer(&network);

    let report = train_loop(&network, &mut dataset, &optimizer, &config).unwrap();
    assert!(report.stopped_early);
    assert_eq!(report.epochs.len(), 1);
}

/// Replays its batches and raises the stop flag when asked for the
/// `trip_on`-th epoch.
struct Tripwire {
    batches: Vec<Batch>,
    flag: Arc<AtomicBool>,
    calls: usize,
    trip_on: usize,
}

impl BatchSource for Tripwire {
    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch> + '_> {
        self.calls += 1;
        if self.calls == self.trip_on {
            self.flag.store(true, Ordering::Relaxed);
        }
        Box::new(self.batches.iter().cloned())
    }
}

#[test]
fn stop_flag_interrupts_between_steps() {
    let network = classifier(4);
    let flag = Arc::new(AtomicBool::new(false));
    let mut source = Tripwire {
        batches: vec![Batch::new(NdArray::zeros(&[2, 2]), vec![0, 1]); 3],
        flag: flag.clone(),
        calls: 0,
        trip_on: 2,
    };
    let config = TrainConfig::new(5, 0.1, LossType::Nll).with_stop_flag(flag);
    let optimizer = config.optimizer(&network);

    let report = train_loop(&network, &mut source, &optimizer, &config).unwrap();
    assert!(report.stopped_early);
    assert_eq!(report.epochs.len(), 1);
    assert_eq!(source.calls, 2);
}

#[test]
fn raised_stop_flag_prevents_any_update() {
    let network = classifier(4);
    let before: Vec<NdArray> = network.parameters().iter().map(Parameter::value).collect();
    let mut dataset = blobs_dataset(4, 20, 5);
    let config = TrainConfig::new(3, 0.1, LossType::Nll).with_stop_flag(Arc::new(AtomicBool::new(true)));
    let optimizer = config.optimizer(&network);

    let report = train_loop(&network, &mut dataset, &optimizer, &config).unwrap();
    assert!(report.stopped_early);
    assert!(report.epochs.is_empty());
    let after: Vec<NdArray> = network.parameters().iter().map(Parameter::value).collect();
    assert_eq!(before, after);
}

#[test]
fn evaluate_leaves_parameters_untouched() {
    let network = classifier(5);
    let before: Vec<NdArray> = network.parameters().iter().map(Parameter::value).collect();
    let mut dataset = blobs_dataset(5, 20, 5);
    evaluate(&network, &mut dataset, LossType::Nll, Reduction::Sum).unwrap();
    let after: Vec<NdArray> = network.parameters().iter().map(Parameter::value).collect();
    assert_eq!(before, after);
    assert!(network.parameters().iter().all(|p| p.grad().is_none()));
}

#[test]
fn released_network_fails_the_optimizer() {
    let network = classifier(6);
    let config = TrainConfig::new(1, 0.1, LossType::Nll);
    let optimizer = config.optimizer(&network);
    drop(network);
    assert!(matches!(optimizer.step(), Err(NnError::ParameterReleased)));
}

#[test]
fn trained_network_survives_json_round_trip() {
    let network = classifier(8);
    let mut dataset = blobs_dataset(8, 60, 10);
    let config = TrainConfig::new(5, 0.1, LossType::Nll);
    let optimizer = config.optimizer(&network);
    train_loop(&network, &mut dataset, &optimizer, &config).unwrap();

    let path = temp_path("network");
    network.save_json(&path).unwrap();
    let restored = Network::load_json(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let probe = dataset.full_batch().unwrap().inputs;
    assert_eq!(network.predict(&probe).unwrap(), restored.predict(&probe).unwrap());
    let original: Vec<NdArray> = network.parameters().iter().map(Parameter::value).collect();
    let loaded: Vec<NdArray> = restored.parameters().iter().map(Parameter::value).collect();
    assert_eq!(original, loaded);
}

#[test]
fn configs_survive_json_round_trip() {
    let spec = NetworkSpec::classifier("saved", 3, 5, 4);
    let spec_path = temp_path("spec");
    spec.save_json(&spec_path).unwrap();
    assert_eq!(NetworkSpec::load_json(&spec_path).unwrap(), spec);
    std::fs::remove_file(&spec_path).ok();

    let mut config = TrainConfig::new(7, 0.25, LossType::CrossEntropy);
    config.reduction = Reduction::Sum;
    config.seed = Some(9);
    let config_path = temp_path("config");
    config.save_json(&config_path).unwrap();
    let loaded = TrainConfig::load_json(&config_path).unwrap();
    std::fs::remove_file(&config_path).ok();
    assert_eq!(loaded.epochs, 7);
    assert_eq!(loaded.learning_rate, 0.25);
    assert_eq!(loaded.loss_type, LossType::CrossEntropy);
    assert_eq!(loaded.reduction, Reduction::Sum);
    assert_eq!(loaded.seed, Some(9));
}

#[test]
fn config_loss_must_agree_with_saved_spec() {
    let mut spec = NetworkSpec::classifier("logits", 2, 4, 2);
    spec.layers[1].activation = None;
    spec.loss = LossType::CrossEntropy;
    let spec_path = temp_path("logit-spec");
    spec.save_json(&spec_path).unwrap();

    let config_path = temp_path("default-loss-config");
    std::fs::write(&config_path, r#"{ "epochs": 2, "learning_rate": 0.1 }"#).unwrap();

    let loaded_spec = NetworkSpec::load_json(&spec_path).unwrap();
    let loaded_config = TrainConfig::load_json(&config_path).unwrap();
    std::fs::remove_file(&spec_path).ok();
    std::fs::remove_file(&config_path).ok();

    assert_eq!(loaded_config.loss_type, LossType::Nll);
    let err = loaded_spec.check_loss(loaded_config.loss_type).unwrap_err();
    assert!(matches!(err, NnError::InvalidConfig(_)));
}
