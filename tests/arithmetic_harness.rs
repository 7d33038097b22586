//! Arithmetic tables run through the console harness.
//!
//! `cargo test --test arithmetic_harness -- -v Addition` runs only the addition rows.

mod common;

use factory_runner::Harness;

fn main() {
    Harness::new().producer::<common::Arithmetic>().main()
}
