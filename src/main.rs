// All training logic lives in the library (src/lib.rs and its modules).
// Run the demo with:
//   cargo run --example blobs -- [network_spec.json] [train_config.json]
fn main() {
    println!("tapenet: a reverse-mode autodiff tape and SGD trainer in Rust.");
    println!("Run `cargo run --example blobs` to train a classifier on synthetic data.");
}
