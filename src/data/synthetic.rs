use rand::Rng;

/// Two linearly separable classes in `dims` dimensions.
///
/// Class 0 is drawn uniformly from `[-1.5, -0.5]` in every coordinate, class 1
/// from `[0.5, 1.5]`; labels alternate so each class has about half the
/// samples.
pub fn separable_blobs<R: Rng + ?Sized>(samples: usize, dims: usize, rng: &mut R) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut inputs = Vec::with_capacity(samples);
    let mut labels = Vec::with_capacity(samples);
    for i in 0..samples {
        let label = i % 2;
        let center = if label == 0 { -1.0 } else { 1.0 };
        inputs.push((0..dims).map(|_| center + rng.gen_range(-0.5..0.5)).collect());
        labels.push(label);
    }
    (inputs, labels)
}
