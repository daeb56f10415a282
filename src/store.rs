//! # Store — Chain Pools and Yield Statistics
//!
//! Bounded per-range working sets of cleaned chains. The general pool holds
//! every chain up to `max_chains`; the long pool additionally keeps chains of
//! at least `long_chain_length`, up to `max_long_chains`. A full pool drops
//! new arrivals and never evicts.
//!
//! [`ChainStats`] is recorded for every chain that survives cleaning,
//! including the ones a full pool drops, so the histogram reflects what the
//! sieve produced rather than what fit.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chain::Chain;
use crate::config::SieveConfig;

/// Chain-length histogram and yield counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    /// `histogram[n]` counts chains of length `n`; the last bucket also
    /// counts every longer chain.
    pub histogram: Vec<u32>,
    pub chain_count: u64,
    /// Candidates alive after sieving, summed over every sieved range.
    pub prime_candidates: u64,
}

impl ChainStats {
    pub fn new(histogram_max: usize) -> Self {
        ChainStats {
            histogram: vec![0; histogram_max + 1],
            chain_count: 0,
            prime_candidates: 0,
        }
    }

    pub fn record(&mut self, length: u32) {
        if self.histogram.is_empty() {
            self.histogram.push(0);
        }
        let bucket = (length as usize).min(self.histogram.len() - 1);
        self.histogram[bucket] += 1;
        self.chain_count += 1;
    }

    pub fn reset(&mut self) {
        self.histogram.iter_mut().for_each(|b| *b = 0);
        self.chain_count = 0;
        self.prime_candidates = 0;
    }

    /// Sum of all histogram buckets.
    pub fn bucket_total(&self) -> u64 {
        self.histogram.iter().map(|&b| b as u64).sum()
    }

    /// Fold another snapshot into this one, e.g. to combine devices.
    pub fn merge(&mut self, other: &ChainStats) {
        if self.histogram.len() < other.histogram.len() {
            self.histogram.resize(other.histogram.len(), 0);
        }
        for (mine, theirs) in self.histogram.iter_mut().zip(&other.histogram) {
            *mine += theirs;
        }
        self.chain_count += other.chain_count;
        self.prime_candidates += other.prime_candidates;
    }

    pub fn log_summary(&self) {
        let per_million = if self.prime_candidates > 0 {
            self.chain_count as f64 * 1e6 / self.prime_candidates as f64
        } else {
            0.0
        };
        info!(
            chains = self.chain_count,
            candidates = self.prime_candidates,
            chains_per_million_candidates = format_args!("{:.2}", per_million),
            histogram = ?self.histogram,
            "sieve chain statistics"
        );
    }
}

impl Default for ChainStats {
    fn default() -> Self {
        ChainStats::new(SieveConfig::default().histogram_max)
    }
}

impl AddAssign<&ChainStats> for ChainStats {
    fn add_assign(&mut self, other: &ChainStats) {
        self.merge(other);
    }
}

pub struct ChainStore {
    general: Vec<Chain>,
    long: Vec<Chain>,
    max_chains: usize,
    max_long_chains: usize,
    long_chain_length: u32,
    dropped: u64,
    stats: ChainStats,
}

impl ChainStore {
    pub fn new(config: &SieveConfig, max_chains: usize) -> Self {
        ChainStore {
            general: Vec::new(),
            long: Vec::new(),
            max_chains,
            max_long_chains: config.max_long_chains,
            long_chain_length: config.long_chain_length,
            dropped: 0,
            stats: ChainStats::new(config.histogram_max),
        }
    }

    /// Record cleaned chains and keep as many as the pools have room for.
    pub fn add(&mut self, chains: Vec<Chain>) {
        let mut dropped = 0u64;
        for chain in chains {
            self.stats.record(chain.length);
            if chain.length >= self.long_chain_length && self.long.len() < self.max_long_chains {
                self.long.push(chain.clone());
            }
            if self.general.len() < self.max_chains {
                self.general.push(chain);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.dropped += dropped;
            debug!(
                dropped,
                capacity = self.max_chains,
                "chain pool full, dropping chains"
            );
        }
    }

    /// Hand out the general pool and leave it empty.
    pub fn take_chains(&mut self) -> Vec<Chain> {
        std::mem::take(&mut self.general)
    }

    /// Hand out the long pool and leave it empty.
    pub fn take_long_chains(&mut self) -> Vec<Chain> {
        std::mem::take(&mut self.long)
    }

    pub fn len(&self) -> usize {
        self.general.len()
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_empty()
    }

    pub fn long_len(&self) -> usize {
        self.long.len()
    }

    pub fn chains_mut(&mut self) -> &mut Vec<Chain> {
        &mut self.general
    }

    pub fn clear(&mut self) {
        self.general.clear();
        self.long.clear();
    }

    /// Chains dropped because the general pool was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn stats(&self) -> &ChainStats {
        &self.stats
    }

    pub fn add_prime_candidates(&mut self, count: u64) {
        self.stats.prime_candidates += count;
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
        self.dropped = 0;
    }
}
