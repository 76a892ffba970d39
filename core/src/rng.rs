//! Injectable randomness for metric jitter.
//!
//! RULE: Metric derivation never calls a platform RNG directly.
//! All jitter flows through a `JitterSource` handed to the emulator,
//! so tests pin a seed and production passes an entropy-seeded one.
//!
//! `JitterBank` gives every metric family its own stream, seeded from
//! (master_seed XOR family_slot). This means:
//!   - Adding a metric family never changes existing families' streams.
//!   - Each family's stream is reproducible in isolation.

use crate::phase::Metric;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Strategy for drawing jitter. Implementations return a float in [0.0, 1.0).
pub trait JitterSource: Send {
    fn next_unit(&mut self, metric: Metric) -> f64;
}

/// A single PCG stream.
pub struct JitterRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl JitterRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            name: "seeded",
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            name: "entropy",
            inner: Pcg64Mcg::from_entropy(),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a float uniformly in [low, high).
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }
}

impl JitterSource for JitterRng {
    fn next_unit(&mut self, _metric: Metric) -> f64 {
        self.next_f64()
    }
}

/// One stream per metric family, all derived from one master seed.
pub struct JitterBank {
    master_seed: u64,
    streams:     Vec<JitterRng>,
}

impl JitterBank {
    pub fn new(master_seed: u64) -> Self {
        let streams = Metric::ALL
            .iter()
            .map(|m| {
                let slot = stream_slot(*m);
                let derived = master_seed ^ slot.wrapping_mul(0x9e37_79b9_7f4a_7c15);
                JitterRng::seeded(derived).with_name(stream_name(*m))
            })
            .collect();
        Self { master_seed, streams }
    }

    /// A bank seeded from OS entropy, for interactive sessions.
    pub fn from_entropy() -> Self {
        let mut seeder = Pcg64Mcg::from_entropy();
        Self::new(seeder.next_u64())
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }
}

impl JitterSource for JitterBank {
    fn next_unit(&mut self, metric: Metric) -> f64 {
        self.streams[stream_slot(metric) as usize].next_f64()
    }
}

/// Always returns the same draw. Useful when a test wants jitter out of the way.
#[derive(Debug, Clone, Copy)]
pub struct ConstantJitter(pub f64);

impl JitterSource for ConstantJitter {
    fn next_unit(&mut self, _metric: Metric) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Stable stream slot per metric family.
/// NEVER renumber — only append. Renumbering changes every stream's seed.
fn stream_slot(metric: Metric) -> u64 {
    match metric {
        Metric::Throughput     => 0,
        Metric::AverageValue   => 1,
        Metric::QueueDepth     => 2,
        Metric::LiquidityUsage => 3,
    }
}

fn stream_name(metric: Metric) -> &'static str {
    match metric {
        Metric::Throughput     => "throughput",
        Metric::AverageValue   => "average_value",
        Metric::QueueDepth     => "queue_depth",
        Metric::LiquidityUsage => "liquidity_usage",
    }
}
