//! # Session — One Sieve Lifecycle per Device
//!
//! A [`SieveSession`] binds a prime table, a sieve buffer, a chain store and
//! a device backend for its whole lifetime. A mining round drives it through
//! the stages below, each of which blocks until every parallel unit has
//! finished:
//!
//! ```text
//! load ─▶ init ─▶ run_sieve ─▶ find_chains ─▶ clean_chains ─▶ get_chains ─┐
//!          ▲                                                              │
//!          └──────────────────────────── next range ──────────────────────┘
//!                                                              free_sieve
//! ```
//!
//! Stage order is the driver's responsibility. Calling a stage out of order
//! produces meaningless chains but never panics.
//!
//! ## Offsets
//!
//! Starting multiples passed to [`SieveSession::init`] are measured from the
//! search base `B`. A range is addressed by `range_base_offset`, its distance
//! from `B` (a multiple of 30). Chain start offsets are reported from `B` as
//! well, so a member's value is `B + offset`.

use tracing::{debug, info};

use crate::backend::{CpuBackend, SieveBackend};
use crate::buffer::SieveBuffer;
use crate::chain::{self, Chain};
use crate::config::SieveConfig;
use crate::engine::{self, SieveLayout};
use crate::error::{Result, SieveError};
use crate::primes::PrimeTable;
use crate::store::{ChainStats, ChainStore};

pub struct SieveSession {
    config: SieveConfig,
    table: PrimeTable,
    layout: SieveLayout,
    buffer: SieveBuffer,
    backend: Box<dyn SieveBackend>,
    small_starts: Vec<u32>,
    large_starts: Vec<u32>,
    range_base: u64,
    candidates: Vec<Chain>,
    store: ChainStore,
    prime_candidates: u64,
    candidates_uncounted: bool,
    /// The current buffer state has already been cleaned into the pools.
    chains_cleaned: bool,
}

impl SieveSession {
    /// Open `device_id` on the host CPU and allocate a `sieve_word_count`
    /// word buffer.
    pub fn load(
        config: SieveConfig,
        table: PrimeTable,
        sieve_word_count: usize,
        device_id: u16,
    ) -> Result<Self> {
        config.validate()?;
        let backend = CpuBackend::open(device_id, config.threads)?;
        Self::with_backend(config, table, sieve_word_count, Box::new(backend))
    }

    /// Same as [`SieveSession::load`] with a caller-supplied device.
    pub fn with_backend(
        config: SieveConfig,
        table: PrimeTable,
        sieve_word_count: usize,
        backend: Box<dyn SieveBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let layout = SieveLayout::new(&config, sieve_word_count)?;
        let buffer = SieveBuffer::allocate(sieve_word_count)?;
        let (small_len, large_len) = {
            let (small, large) = table.split(config.small_prime_count);
            (small.len(), large.len())
        };
        let store = ChainStore::new(&config, config.max_chains_for(sieve_word_count));

        info!(
            device = %backend.describe(),
            words = sieve_word_count,
            work_groups = layout.block_count(),
            small_primes = small_len,
            large_primes = large_len,
            largest_prime = table.largest().unwrap_or(0),
            "sieve session loaded"
        );

        Ok(SieveSession {
            small_starts: Vec::with_capacity(small_len),
            large_starts: Vec::with_capacity(large_len),
            config,
            table,
            layout,
            buffer,
            backend,
            range_base: 0,
            candidates: Vec::new(),
            store,
            prime_candidates: 0,
            candidates_uncounted: false,
            chains_cleaned: false,
        })
    }

    /// Set the per-prime starting multiples for the coming range(s) and reset
    /// the buffer, working list and pools.
    ///
    /// `starting_multiples` covers the large primes and `small_prime_offsets`
    /// the small primes, in table order (see
    /// [`PrimeTable::starting_multiples`]).
    pub fn init(&mut self, starting_multiples: &[u32], small_prime_offsets: &[u32]) -> Result<()> {
        let (small, large) = self.table.split(self.config.small_prime_count);
        if starting_multiples.len() != large.len() || small_prime_offsets.len() != small.len() {
            return Err(SieveError::InvalidInput {
                message: format!(
                    "expected {} large and {} small starting multiples, got {} and {}",
                    large.len(),
                    small.len(),
                    starting_multiples.len(),
                    small_prime_offsets.len()
                ),
            });
        }
        self.large_starts.clear();
        self.large_starts.extend_from_slice(starting_multiples);
        self.small_starts.clear();
        self.small_starts.extend_from_slice(small_prime_offsets);

        self.buffer.fill();
        self.candidates.clear();
        self.store.clear();
        self.candidates_uncounted = false;
        self.chains_cleaned = false;
        debug!(device = self.backend.device_id(), "sieve initialised");
        Ok(())
    }

    /// Dense phase only. Does not reset the buffer.
    pub fn run_small_prime_sieve(&mut self, range_base_offset: u64) -> Result<()> {
        engine::check_alignment(range_base_offset)?;
        self.strike_small(range_base_offset);
        self.finish_sieve(range_base_offset);
        Ok(())
    }

    /// Sparse phase only. Does not reset the buffer.
    pub fn run_large_prime_sieve(&mut self, range_base_offset: u64) -> Result<()> {
        engine::check_alignment(range_base_offset)?;
        self.strike_large(range_base_offset);
        self.finish_sieve(range_base_offset);
        Ok(())
    }

    /// Reset the buffer and sieve the range with both phases.
    pub fn run_sieve(&mut self, range_base_offset: u64) -> Result<()> {
        engine::check_alignment(range_base_offset)?;
        self.buffer.fill();
        self.strike_small(range_base_offset);
        self.strike_large(range_base_offset);
        self.finish_sieve(range_base_offset);
        Ok(())
    }

    fn strike_small(&self, range_base: u64) {
        let (small, _) = self.table.split(self.config.small_prime_count);
        let plan = engine::small_prime_plan(small, &self.small_starts, range_base);
        self.backend
            .strike_small(&self.buffer, &self.layout, small, &plan);
    }

    fn strike_large(&self, range_base: u64) {
        let (_, large) = self.table.split(self.config.small_prime_count);
        self.backend
            .strike_large(&self.buffer, large, &self.large_starts, range_base);
    }

    fn finish_sieve(&mut self, range_base: u64) {
        self.range_base = range_base;
        self.prime_candidates = self.backend.count_alive(&self.buffer);
        self.candidates_uncounted = true;
        self.chains_cleaned = false;
        debug!(
            range_base,
            candidates = self.prime_candidates,
            "sieve pass complete"
        );
    }

    /// Scan the buffer for chains, replacing the working list. Returns the
    /// number of raw candidates, duplicates included.
    pub fn find_chains(&mut self) -> usize {
        if self.candidates_uncounted {
            self.store.add_prime_candidates(self.prime_candidates);
            self.candidates_uncounted = false;
        }
        self.candidates = self.backend.find_chains(
            &self.buffer,
            &self.layout,
            self.range_base,
            self.config.min_chain_length,
        );
        debug!(raw = self.candidates.len(), "chains found");
        self.candidates.len()
    }

    /// Deduplicate and validate the working list and move the survivors into
    /// the pools. Returns the number of surviving chains.
    ///
    /// Only the first clean after a sieve pass (or [`SieveSession::init`])
    /// feeds the pools; later ones discard the working list and return 0, so
    /// a range's chains are pooled and counted once.
    pub fn clean_chains(&mut self) -> usize {
        let raw = std::mem::take(&mut self.candidates);
        if self.chains_cleaned {
            debug!(raw = raw.len(), "range already cleaned, discarding chains");
            return 0;
        }
        self.chains_cleaned = true;
        let raw_len = raw.len();
        let cleaned = chain::clean_chains(raw, self.config.min_chain_length);
        let kept = cleaned.len();
        self.store.add(cleaned);
        debug!(raw = raw_len, kept, "chains cleaned");
        kept
    }

    /// Harvest the general pool. Each chain is returned at most once.
    pub fn get_chains(&mut self) -> Vec<Chain> {
        self.store.take_chains()
    }

    /// Harvest the long-chain pool.
    pub fn get_long_chains(&mut self) -> Vec<Chain> {
        self.store.take_long_chains()
    }

    pub fn get_chain_count(&self) -> usize {
        self.store.len()
    }

    /// The live general pool. Chains removed or left here are the caller's
    /// business until the next [`SieveSession::init`].
    pub fn chain_pool_mut(&mut self) -> &mut Vec<Chain> {
        self.store.chains_mut()
    }

    /// Raw copy of the sieve buffer words.
    pub fn get_sieve(&self) -> Vec<u32> {
        self.buffer.snapshot()
    }

    /// Replace the buffer contents, e.g. to replay a captured sieve. The
    /// words count as a freshly sieved range at `range_base_offset`.
    pub fn load_sieve(&mut self, words: &[u32], range_base_offset: u64) -> Result<()> {
        engine::check_alignment(range_base_offset)?;
        if words.len() != self.buffer.len_words() {
            return Err(SieveError::InvalidInput {
                message: format!(
                    "expected {} sieve words, got {}",
                    self.buffer.len_words(),
                    words.len()
                ),
            });
        }
        self.buffer.fill();
        for (i, &w) in words.iter().enumerate() {
            self.buffer.and_word(i, w);
        }
        self.finish_sieve(range_base_offset);
        Ok(())
    }

    /// Candidates alive after the most recent sieve pass.
    pub fn get_prime_candidate_count(&self) -> u64 {
        self.prime_candidates
    }

    /// Histogram and counters accumulated since the last reset.
    pub fn get_stats(&self) -> ChainStats {
        self.store.stats().clone()
    }

    pub fn reset_stats(&mut self) {
        self.store.reset_stats();
    }

    /// Chains lost to a full general pool since the last stats reset.
    pub fn dropped_chains(&self) -> u64 {
        self.store.dropped()
    }

    pub fn config(&self) -> &SieveConfig {
        &self.config
    }

    pub fn table(&self) -> &PrimeTable {
        &self.table
    }

    pub fn device_id(&self) -> u16 {
        self.backend.device_id()
    }

    /// Integer span covered by one range of this session.
    pub fn range_size(&self) -> u64 {
        crate::wheel::words_range(self.layout.words())
    }

    /// Release the buffer, pools and device.
    pub fn free_sieve(self) {
        info!(
            device = self.backend.device_id(),
            chains = self.store.stats().chain_count,
            "sieve session freed"
        );
    }
}
