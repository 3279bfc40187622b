use std::fmt::Write as _;

use anyhow::{Context, Result};

/// Decaying fluorescence during a laser pulse: bright start, steady state.
fn pulse_shape(bin: usize, amplitude: f64, steady: f64, decay_bins: f64) -> f64 {
    steady + (amplitude - steady) * (-(bin as f64) / decay_bins).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_trace.dat".to_string());

    let mut rng = SimpleRng::new(42);

    // 20 lasers of 300 bins, separated by 200 dark bins, 1 ns per bin
    let lasers = 20;
    let laser_bins = 300;
    let dark_bins = 200;
    let bin_width = 1e-9;

    let mut counts: Vec<f64> = Vec::new();
    for laser in 0..lasers {
        // Rabi-like contrast on the first bins of each pulse
        let contrast = 0.7 + 0.3 * (laser as f64 * 0.6).cos();
        for _ in 0..dark_bins {
            counts.push(rng.gauss(2.0, 1.0).max(0.0).round());
        }
        for bin in 0..laser_bins {
            let mean = pulse_shape(bin, 100.0 * contrast, 70.0, 40.0);
            counts.push(rng.gauss(mean, mean.sqrt()).max(0.0).round());
        }
    }

    let mut text = String::new();
    writeln!(text, "# synthetic pulsed trace, {lasers} lasers x {laser_bins} bins")?;
    writeln!(text, "# bin width {bin_width} s")?;
    writeln!(text, "time(s)\tcounts")?;
    for (i, c) in counts.iter().enumerate() {
        writeln!(text, "{:.3e}\t{c}", i as f64 * bin_width)?;
    }

    std::fs::write(&output_path, text).with_context(|| format!("writing {output_path}"))?;

    println!(
        "Wrote {} bins ({lasers} lasers) to {output_path}",
        counts.len()
    );
    Ok(())
}
