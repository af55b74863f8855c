//! Deterministic commuter pools for batch benchmarks.
//!
//! Pickups are spread around a handful of neighbourhood centres within a
//! few kilometres of each other, with departure windows drawn from a
//! morning peak. Every third commuter drives.

use carpool_core::OptIn;
use carpool_core::test_support::{OptInBuilder, base_coord, offset_east, offset_north};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed for deterministic random number generation in benchmarks.
pub const BENCHMARK_SEED: u64 = 42;

/// Neighbourhood centres, as kilometre offsets from the base coordinate.
const CENTRES_KM: [(f64, f64); 4] = [(0.0, 0.0), (3.0, 1.0), (-2.0, 2.5), (1.5, -3.0)];

/// Maximum offset of a pickup from its centre, in kilometres.
const SPREAD_KM: f64 = 1.5;

/// Generate `count` pending opt-ins on the default commute date.
pub fn generate_commuters(count: usize, seed: u64) -> Vec<OptIn> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            #[expect(
                clippy::integer_division_remainder_used,
                reason = "round-robin assignment to centres and roles"
            )]
            let (slot, drives) = (i % CENTRES_KM.len(), i % 3 == 0);
            let centre = CENTRES_KM.get(slot).copied().unwrap_or((0.0, 0.0));
            let id = u64::try_from(i + 1).unwrap_or(u64::MAX);
            let builder = if drives {
                OptInBuilder::driver(id, id, rng.gen_range(1..=4))
            } else {
                OptInBuilder::rider(id, id)
            };

            #[expect(clippy::float_arithmetic, reason = "jitter around the centre")]
            let (north, east) = (
                centre.0 + rng.gen_range(-SPREAD_KM..SPREAD_KM),
                centre.1 + rng.gen_range(-SPREAD_KM..SPREAD_KM),
            );
            let start: u16 = rng.gen_range(7 * 60..8 * 60 + 30);
            let length: u16 = rng.gen_range(20..90);
            builder
                .at(offset_east(offset_north(base_coord(), north), east))
                .window(&clock(start), &clock(start + length))
                .build()
        })
        .collect()
}

#[expect(
    clippy::integer_division,
    clippy::integer_division_remainder_used,
    reason = "minutes to clock time"
)]
fn clock(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
