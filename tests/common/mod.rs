//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;

use chainsieve::primes::pow_mod;
use chainsieve::{PrimeTable, ScalarBackend, SieveConfig, SieveSession};
use rug::Integer;

static TRACING_INIT: Once = Once::new();

/// Route session logs through the test harness. `RUST_LOG=debug` shows
/// every stage.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Small layout that still has several work groups and segments.
pub fn test_config() -> SieveConfig {
    SieveConfig {
        segment_words: 16,
        segments_per_block: 2,
        num_blocks: 8,
        small_prime_count: 23,
        min_chain_length: 3,
        long_chain_length: 6,
        estimated_chains_per_million: 100_000,
        threads: 4,
        ..SieveConfig::default()
    }
}

/// A multiple of 30 far above every table prime.
pub fn big_base() -> Integer {
    Integer::from(1_000_000_000_007u64) * 30u32
}

pub fn scalar_session(config: SieveConfig, table: PrimeTable, words: usize) -> SieveSession {
    SieveSession::with_backend(config, table, words, Box::new(ScalarBackend::new(0)))
        .expect("scalar session")
}

/// Smallest multiple of 30 such that `base + offset` is divisible by `q`
/// for every `(offset, q)` pair. The `q` must be distinct primes above 5.
pub fn covering_base(assignments: &[(u64, u32)]) -> Integer {
    let mut base = Integer::new();
    let mut modulus = Integer::from(30u32);
    for &(offset, q) in assignments {
        let q64 = q as u64;
        let b = base.mod_u(q) as u64;
        let target = (2 * q64 - offset % q64 - b) % q64;
        let m = modulus.mod_u(q) as u64;
        let t = target * pow_mod(m, q64 - 2, q64) % q64;
        base += Integer::from(&modulus * t);
        modulus *= q;
    }
    base
}
