//! Synthetic bars for development, benches and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, Timestamp};

/// Generate `n` bars of a random walk starting at 100.0.
///
/// The RNG seed is the BLAKE3 hash of `label`, so the same label always
/// yields the same series.
pub fn synthetic_bars(label: &str, n: usize, start: Timestamp, interval_ms: i64) -> Vec<Bar> {
    let seed: [u8; 32] = *blake3::hash(label.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;
    for i in 0..n {
        let bar_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + bar_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500.0..5_000.0);

        bars.push(Bar::new(start + i as i64 * interval_ms, open, high, low, close, volume));
        price = close;
    }
    bars
}
