//! # Backend — Device Scheduling for the Sieve Kernels
//!
//! [`SieveBackend`] is the device side of a session: it owns the execution
//! resources and schedules the per-unit kernels from [`crate::engine`] and
//! [`crate::chain`]. Every method blocks until all of its units finish.
//!
//! - [`CpuBackend`] — a dedicated rayon pool per device; work groups and
//!   large primes are distributed across the pool's threads.
//! - [`ScalarBackend`] — runs the same kernels one unit at a time on the
//!   calling thread. Used as a reference and in tests.

use rayon::prelude::*;

use crate::buffer::SieveBuffer;
use crate::chain::{scan_unit, Chain};
use crate::engine::{strike_prime, strike_segment, SieveLayout};
use crate::error::{Result, SieveError};
use crate::primes::PrimeEntry;

pub trait SieveBackend: Send {
    fn device_id(&self) -> u16;

    /// Human-readable device description for logs.
    fn describe(&self) -> String;

    /// Dense phase: each work group strikes its segments with `plan`.
    fn strike_small(
        &self,
        buffer: &SieveBuffer,
        layout: &SieveLayout,
        primes: &[PrimeEntry],
        plan: &[[u32; 8]],
    );

    /// Sparse phase: one unit per prime.
    fn strike_large(
        &self,
        buffer: &SieveBuffer,
        primes: &[PrimeEntry],
        starts: &[u32],
        range_base: u64,
    );

    /// Chain candidates of every work group, in work-group order.
    fn find_chains(
        &self,
        buffer: &SieveBuffer,
        layout: &SieveLayout,
        range_base: u64,
        min_length: u32,
    ) -> Vec<Chain>;

    fn count_alive(&self, buffer: &SieveBuffer) -> u64;
}

/// Host CPU exposed as a single sieve device.
pub struct CpuBackend {
    device_id: u16,
    pool: rayon::ThreadPool,
}

impl CpuBackend {
    /// Number of devices this backend exposes.
    pub const DEVICE_COUNT: u16 = 1;

    /// Open device `device_id` with `threads` workers (0 = one per core).
    pub fn open(device_id: u16, threads: usize) -> Result<Self> {
        if device_id >= Self::DEVICE_COUNT {
            return Err(SieveError::Device {
                device_id,
                message: format!(
                    "no such device ({} available)",
                    Self::DEVICE_COUNT
                ),
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("sieve-{}-{}", device_id, i))
            .build()
            .map_err(|e| SieveError::Device {
                device_id,
                message: e.to_string(),
            })?;
        Ok(CpuBackend { device_id, pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl SieveBackend for CpuBackend {
    fn device_id(&self) -> u16 {
        self.device_id
    }

    fn describe(&self) -> String {
        format!("cpu:{} ({} threads)", self.device_id, self.threads())
    }

    fn strike_small(
        &self,
        buffer: &SieveBuffer,
        layout: &SieveLayout,
        primes: &[PrimeEntry],
        plan: &[[u32; 8]],
    ) {
        if primes.is_empty() {
            return;
        }
        let blocks: Vec<_> = layout.blocks().collect();
        self.pool.install(|| {
            blocks.into_par_iter().for_each(|block| {
                for segment in layout.segments(block) {
                    strike_segment(buffer, segment, primes, plan);
                }
            })
        });
    }

    fn strike_large(
        &self,
        buffer: &SieveBuffer,
        primes: &[PrimeEntry],
        starts: &[u32],
        range_base: u64,
    ) {
        self.pool.install(|| {
            primes
                .par_iter()
                .zip(starts.par_iter())
                .for_each(|(entry, &start)| strike_prime(buffer, entry, start, range_base))
        });
    }

    fn find_chains(
        &self,
        buffer: &SieveBuffer,
        layout: &SieveLayout,
        range_base: u64,
        min_length: u32,
    ) -> Vec<Chain> {
        let units: Vec<_> = layout.block_bits().collect();
        let per_unit: Vec<Vec<Chain>> = self.pool.install(|| {
            units
                .into_par_iter()
                .map(|bits| scan_unit(buffer, bits, range_base, min_length))
                .collect()
        });
        per_unit.into_iter().flatten().collect()
    }

    fn count_alive(&self, buffer: &SieveBuffer) -> u64 {
        self.pool.install(|| {
            buffer
                .words()
                .par_chunks(4096)
                .map(crate::buffer::count_alive)
                .sum()
        })
    }
}

/// Sequential reference device.
#[derive(Debug, Default)]
pub struct ScalarBackend {
    device_id: u16,
}

impl ScalarBackend {
    pub fn new(device_id: u16) -> Self {
        ScalarBackend { device_id }
    }
}

impl SieveBackend for ScalarBackend {
    fn device_id(&self) -> u16 {
        self.device_id
    }

    fn describe(&self) -> String {
        format!("scalar:{}", self.device_id)
    }

    fn strike_small(
        &self,
        buffer: &SieveBuffer,
        layout: &SieveLayout,
        primes: &[PrimeEntry],
        plan: &[[u32; 8]],
    ) {
        for block in layout.blocks() {
            for segment in layout.segments(block) {
                strike_segment(buffer, segment, primes, plan);
            }
        }
    }

    fn strike_large(
        &self,
        buffer: &SieveBuffer,
        primes: &[PrimeEntry],
        starts: &[u32],
        range_base: u64,
    ) {
        for (entry, &start) in primes.iter().zip(starts) {
            strike_prime(buffer, entry, start, range_base);
        }
    }

    fn find_chains(
        &self,
        buffer: &SieveBuffer,
        layout: &SieveLayout,
        range_base: u64,
        min_length: u32,
    ) -> Vec<Chain> {
        layout
            .block_bits()
            .flat_map(|bits| scan_unit(buffer, bits, range_base, min_length))
            .collect()
    }

    fn count_alive(&self, buffer: &SieveBuffer) -> u64 {
        buffer.count_alive()
    }
}
