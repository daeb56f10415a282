//! # chainsieve — Segmented Prime-Chain Sieve
//!
//! The elimination engine of a prime-chain proof-of-work miner. A range of
//! wheel-30 candidates is packed one bit per candidate into a shared buffer,
//! struck by a dense small-prime phase and a sparse large-prime phase running
//! on many parallel units, then scanned for runs of surviving candidates.
//! Those runs ("chains") are deduplicated, counted in a length histogram and
//! handed to the caller, which runs the expensive primality tests.
//!
//! ## Modules
//!
//! - [`wheel`] — mod-30 bit ↔ offset addressing
//! - [`primes`] — sieving prime table, wheel inverses, starting multiples
//! - [`buffer`] — clear-only atomic bit buffer
//! - [`engine`] — strike kernels and work-group layout
//! - [`chain`] — chain finder and cleaner
//! - [`store`] — bounded chain pools and histogram
//! - [`backend`] — rayon and sequential devices
//! - [`session`] — the per-device lifecycle
//!
//! ## Example
//!
//! ```no_run
//! use chainsieve::{PrimeTable, SieveConfig, SieveSession};
//! use rug::Integer;
//!
//! # fn main() -> chainsieve::Result<()> {
//! let config = SieveConfig::default();
//! let table = PrimeTable::generate(1_000_000);
//! let base = Integer::from(30u32) * 1_000_000_007u64;
//! let starts = table.starting_multiples(&base, config.small_prime_count);
//!
//! let words = config.sieve_word_count();
//! let mut session = SieveSession::load(config, table, words, 0)?;
//! session.init(&starts.large, &starts.small)?;
//! session.run_sieve(0)?;
//! session.find_chains();
//! session.clean_chains();
//! for chain in session.get_chains() {
//!     let _members = chain.members(&base);
//! }
//! session.free_sieve();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod buffer;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod primes;
pub mod session;
pub mod store;
pub mod wheel;

pub use backend::{CpuBackend, ScalarBackend, SieveBackend};
pub use chain::Chain;
pub use config::SieveConfig;
pub use error::{Result, SieveError};
pub use primes::{PrimeEntry, PrimeTable, StartingMultiples};
pub use session::SieveSession;
pub use store::ChainStats;
