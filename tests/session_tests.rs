//! End-to-end tests for the sieve session lifecycle.
//!
//! Every test drives a full `init → run_sieve → find_chains → clean_chains →
//! harvest` round (or replays a synthetic buffer with `load_sieve`) and
//! checks one observable property of the round. `rug` is the oracle for
//! divisibility and primality.
//!
//! ```bash
//! cargo test --test session_tests
//! RUST_LOG=debug cargo test --test session_tests -- --nocapture
//! ```

mod common;

use anyhow::Result;
use chainsieve::wheel::{bit_offset, offset_bit};
use chainsieve::{Chain, PrimeTable, SieveConfig, SieveError, SieveSession};
use rug::integer::IsPrime;
use rug::Integer;
use std::collections::HashSet;

use common::{big_base, covering_base, init_tracing, scalar_session, test_config};

const WORDS: usize = 256;

fn cpu_session(table_limit: u32) -> Result<SieveSession> {
    init_tracing();
    Ok(SieveSession::load(
        test_config(),
        PrimeTable::generate(table_limit),
        WORDS,
        0,
    )?)
}

fn round(session: &mut SieveSession, base: &Integer, range_base: u64) -> Result<Vec<Chain>> {
    let starts = session
        .table()
        .starting_multiples(base, session.config().small_prime_count);
    session.init(&starts.large, &starts.small)?;
    session.run_sieve(range_base)?;
    session.find_chains();
    session.clean_chains();
    Ok(session.get_chains())
}

// == Determinism ===============================================================

#[test]
fn repeated_rounds_are_identical() -> Result<()> {
    let mut session = cpu_session(2000)?;
    let base = big_base();
    let first = round(&mut session, &base, 0)?;
    let second = round(&mut session, &base, 0)?;
    assert!(!first.is_empty(), "expected chains at min length 3");
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn cpu_matches_scalar_reference() -> Result<()> {
    let mut cpu = cpu_session(5000)?;
    let mut scalar = scalar_session(test_config(), PrimeTable::generate(5000), WORDS);
    let base = big_base();
    let a = round(&mut cpu, &base, 3000)?;
    let b = round(&mut scalar, &base, 3000)?;
    assert_eq!(cpu.get_sieve(), scalar.get_sieve());
    assert_eq!(a, b);
    assert_eq!(cpu.get_stats(), scalar.get_stats());
    Ok(())
}

// == Sieve correctness =========================================================

/// With a base far above the table, a candidate is struck exactly when some
/// table prime divides it. In particular no prime is ever eliminated.
#[test]
fn struck_candidates_are_exactly_the_table_multiples() -> Result<()> {
    let table = PrimeTable::generate(3000);
    let primes: Vec<u32> = table.entries().iter().map(|e| e.prime).collect();
    let mut session = cpu_session(3000)?;
    let base = big_base();
    let range_base = 30 * 1234;
    round(&mut session, &base, range_base)?;

    let words = session.get_sieve();
    let mut alive = 0u64;
    for bit in 0..WORDS * 32 {
        let is_alive = words[bit / 32] & (1 << (bit % 32)) != 0;
        let n = Integer::from(&base + range_base) + bit_offset(bit);
        let divisible = primes.iter().any(|&p| n.is_divisible_u(p));
        assert_eq!(is_alive, !divisible, "candidate at bit {} misclassified", bit);
        if n.is_probably_prime(20) != IsPrime::No {
            assert!(is_alive, "prime at bit {} was struck", bit);
        }
        alive += is_alive as u64;
    }
    assert_eq!(session.get_prime_candidate_count(), alive);
    Ok(())
}

#[test]
fn striking_only_removes_candidates() -> Result<()> {
    let mut session = cpu_session(4000)?;
    let base = big_base();
    let starts = session
        .table()
        .starting_multiples(&base, session.config().small_prime_count);
    session.init(&starts.large, &starts.small)?;
    let after_init = session.get_sieve();
    assert!(after_init.iter().all(|&w| w == u32::MAX));

    session.run_small_prime_sieve(0)?;
    let after_small = session.get_sieve();
    session.run_large_prime_sieve(0)?;
    let after_large = session.get_sieve();

    for ((&i, &s), &l) in after_init.iter().zip(&after_small).zip(&after_large) {
        assert_eq!(s & !i, 0);
        assert_eq!(l & !s, 0);
    }
    assert!(session.get_prime_candidate_count() < (WORDS * 32) as u64);
    Ok(())
}

#[test]
fn phases_commute() -> Result<()> {
    let base = big_base();
    let mut a = cpu_session(4000)?;
    let mut b = cpu_session(4000)?;
    let starts = a.table().starting_multiples(&base, a.config().small_prime_count);
    a.init(&starts.large, &starts.small)?;
    b.init(&starts.large, &starts.small)?;
    a.run_small_prime_sieve(0)?;
    a.run_large_prime_sieve(0)?;
    b.run_large_prime_sieve(0)?;
    b.run_small_prime_sieve(0)?;
    assert_eq!(a.get_sieve(), b.get_sieve());

    // run_sieve resets first, so it lands on the same state.
    a.run_sieve(0)?;
    assert_eq!(a.get_sieve(), b.get_sieve());
    Ok(())
}

/// One init serves successive ranges: sieving range offset R from base B
/// equals sieving offset 0 from base B + R.
#[test]
fn successive_ranges_share_starting_multiples() -> Result<()> {
    let mut session = cpu_session(3000)?;
    let base = big_base();
    let range = session.range_size();
    let starts = session
        .table()
        .starting_multiples(&base, session.config().small_prime_count);
    session.init(&starts.large, &starts.small)?;
    session.run_sieve(range)?;
    session.find_chains();
    session.clean_chains();
    let shifted = session.get_chains();
    let shifted_sieve = session.get_sieve();

    let mut fresh = cpu_session(3000)?;
    let moved_base = Integer::from(&base + range);
    let direct = round(&mut fresh, &moved_base, 0)?;

    assert_eq!(shifted_sieve, fresh.get_sieve());
    assert_eq!(shifted.len(), direct.len());
    for (s, d) in shifted.iter().zip(&direct) {
        assert_eq!(s.start_offset, d.start_offset + range);
        assert_eq!(s.length, d.length);
    }
    Ok(())
}

// == Chain invariants ==========================================================

#[test]
fn harvested_chains_are_unique_and_long_enough() -> Result<()> {
    let mut session = cpu_session(1000)?;
    let base = big_base();
    let chains = round(&mut session, &base, 0)?;
    let min = session.config().min_chain_length;

    let words = session.get_sieve();
    let mut seen = HashSet::new();
    for chain in &chains {
        assert!(chain.length >= min);
        assert!(seen.insert(chain.start_offset), "duplicate {}", chain.start_offset);
        // Every member is alive in the buffer.
        for offset in chain.offsets() {
            let bit = offset_bit(offset).expect("member on the wheel");
            assert!(words[bit / 32] & (1 << (bit % 32)) != 0);
        }
    }
    let long = session.get_long_chains();
    assert!(long.iter().all(|c| c.length >= session.config().long_chain_length));
    Ok(())
}

#[test]
fn members_have_no_table_factor() -> Result<()> {
    let table = PrimeTable::generate(2000);
    let mut session = cpu_session(2000)?;
    let base = big_base();
    let chains = round(&mut session, &base, 0)?;
    for chain in chains.iter().take(20) {
        let members = chain.members(&base);
        assert_eq!(members.len(), chain.length as usize);
        for n in members {
            assert!(table.entries().iter().all(|e| !n.is_divisible_u(e.prime)));
        }
    }
    Ok(())
}

#[test]
fn harvest_returns_each_chain_once() -> Result<()> {
    let mut session = cpu_session(2000)?;
    let base = big_base();
    let first = round(&mut session, &base, 0)?;
    assert!(!first.is_empty());
    assert_eq!(session.get_chain_count(), 0);
    assert!(session.get_chains().is_empty());
    Ok(())
}

#[test]
fn recleaning_a_range_adds_no_duplicates() -> Result<()> {
    let mut session = cpu_session(2000)?;
    let base = big_base();
    let starts = session
        .table()
        .starting_multiples(&base, session.config().small_prime_count);
    session.init(&starts.large, &starts.small)?;
    session.run_sieve(0)?;
    session.find_chains();
    let kept = session.clean_chains();
    assert!(kept > 0);
    session.find_chains();
    assert_eq!(session.clean_chains(), 0);

    let chains = session.get_chains();
    assert_eq!(chains.len(), kept);
    let starts: HashSet<u64> = chains.iter().map(|c| c.start_offset).collect();
    assert_eq!(starts.len(), chains.len());
    let stats = session.get_stats();
    assert_eq!(stats.chain_count, kept as u64);
    assert_eq!(stats.bucket_total(), stats.chain_count);
    Ok(())
}

#[test]
fn histogram_matches_chain_count_across_ranges() -> Result<()> {
    let mut session = cpu_session(2000)?;
    let base = big_base();
    let mut harvested = 0u64;
    let mut candidates = 0u64;
    for i in 0..3 {
        let range_base = i * session.range_size();
        harvested += round(&mut session, &base, range_base)?.len() as u64;
        candidates += session.get_prime_candidate_count();
    }
    let stats = session.get_stats();
    assert_eq!(stats.bucket_total(), stats.chain_count);
    assert_eq!(stats.chain_count, harvested);
    assert_eq!(stats.prime_candidates, candidates);

    session.reset_stats();
    let stats = session.get_stats();
    assert_eq!(stats.chain_count, 0);
    assert_eq!(stats.bucket_total(), 0);
    Ok(())
}

// == Scenarios =================================================================

/// Every candidate of a one-word range gets its own table prime, so the
/// sieve must eliminate all of them.
#[test]
fn range_without_primes_yields_nothing() -> Result<()> {
    init_tracing();
    let table = PrimeTable::generate(151);
    let assignments: Vec<(u64, u32)> = table
        .entries()
        .iter()
        .take(32)
        .enumerate()
        .map(|(bit, e)| (bit_offset(bit), e.prime))
        .collect();
    let base = covering_base(&assignments);

    let config = SieveConfig {
        segment_words: 1,
        num_blocks: 1,
        small_prime_count: 5,
        min_chain_length: 1,
        threads: 2,
        ..SieveConfig::default()
    };
    let mut session = SieveSession::load(config, table, 1, 0)?;
    let chains = round(&mut session, &base, 0)?;
    assert_eq!(session.get_prime_candidate_count(), 0);
    assert!(chains.is_empty());
    assert_eq!(session.get_stats().chain_count, 0);
    Ok(())
}

#[test]
fn single_minimum_length_run() -> Result<()> {
    init_tracing();
    let config = SieveConfig {
        segment_words: 2,
        num_blocks: 2,
        ..SieveConfig::default()
    };
    let min = config.min_chain_length;
    let mut session = SieveSession::load(config, PrimeTable::generate(100), 4, 0)?;
    // bits 70..78 alive, everything else struck
    let words = [0, 0, 0xFF << 6, 0];
    session.load_sieve(&words, 600)?;
    assert_eq!(session.get_prime_candidate_count(), 8);
    session.find_chains();
    session.clean_chains();
    let chains = session.get_chains();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].length, min);
    assert_eq!(chains[0].start_offset, 600 + bit_offset(70));
    assert!(!chains[0].boundary);
    Ok(())
}

#[test]
fn shared_boundary_run_survives_once() -> Result<()> {
    init_tracing();
    let config = SieveConfig {
        segment_words: 1,
        num_blocks: 4,
        ..SieveConfig::default()
    };
    let mut session = SieveSession::load(config, PrimeTable::generate(100), 4, 0)?;
    // bits 56..72: crosses from work group 1 into work group 2
    session.load_sieve(&[0, 0xFF00_0000, 0x0000_00FF, 0], 0)?;
    assert_eq!(session.find_chains(), 2);
    assert_eq!(session.clean_chains(), 1);
    let chains = session.get_chains();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].length, 16);
    assert_eq!(chains[0].start_offset, bit_offset(56));
    Ok(())
}

#[test]
fn boundary_runs_are_flagged_not_merged() -> Result<()> {
    let config = SieveConfig {
        segment_words: 1,
        num_blocks: 1,
        estimated_chains_per_million: 100_000,
        ..SieveConfig::default()
    };
    let mut session = scalar_session(config, PrimeTable::generate(100), 2);
    session.load_sieve(&[0x0000_03FF, 0xFFF0_0000], 0)?;
    session.find_chains();
    session.clean_chains();
    let chains = session.get_chains();
    assert_eq!(chains.len(), 2);
    assert!(chains.iter().all(|c| c.boundary));
    assert_eq!(chains[0].length, 10);
    assert_eq!(chains[1].length, 12);
    Ok(())
}

#[test]
fn full_pool_drops_but_counts() -> Result<()> {
    let config = SieveConfig {
        segment_words: 1,
        num_blocks: 1,
        min_chain_length: 2,
        long_chain_length: 2,
        max_long_chains: 1,
        estimated_chains_per_million: 1,
        ..SieveConfig::default()
    };
    let mut session = scalar_session(config, PrimeTable::generate(100), 1);
    // Three runs of length 3 separated by dead bits.
    session.load_sieve(&[0b0111_0111_0111_0], 0)?;
    session.find_chains();
    assert_eq!(session.clean_chains(), 3);
    assert_eq!(session.get_chains().len(), 1);
    assert_eq!(session.get_long_chains().len(), 1);
    assert_eq!(session.dropped_chains(), 2);
    let stats = session.get_stats();
    assert_eq!(stats.chain_count, 3);
    assert_eq!(stats.histogram[3], 3);
    Ok(())
}

#[test]
fn errors_are_distinct_from_empty_results() {
    let err = SieveSession::load(test_config(), PrimeTable::generate(100), WORDS, 1)
        .err()
        .expect("device 1 does not exist");
    assert!(err.is_fatal());
    assert!(matches!(err, SieveError::Device { .. }));

    let err = SieveSession::load(test_config(), PrimeTable::generate(100), 17, 0)
        .err()
        .expect("17 words is not a whole number of segments");
    assert!(!err.is_fatal());
}

#[test]
fn free_sieve_consumes_the_session() -> Result<()> {
    let mut session = cpu_session(500)?;
    round(&mut session, &big_base(), 0)?;
    session.get_stats().log_summary();
    session.free_sieve();
    // A fresh load on the same device is allowed afterwards.
    let again = cpu_session(500)?;
    again.free_sieve();
    Ok(())
}
