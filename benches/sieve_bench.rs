use chainsieve::{PrimeTable, SieveConfig, SieveSession};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rug::Integer;

const WORDS: usize = 1 << 16;

fn bench_config() -> SieveConfig {
    SieveConfig {
        segment_words: 1024,
        num_blocks: 64,
        ..SieveConfig::default()
    }
}

fn bench_generate_table_1m(c: &mut Criterion) {
    c.bench_function("PrimeTable::generate(1_000_000)", |b| {
        b.iter(|| PrimeTable::generate(black_box(1_000_000)));
    });
}

fn bench_run_sieve(c: &mut Criterion) {
    let config = bench_config();
    let table = PrimeTable::generate(1_000_000);
    let base = Integer::from(1_000_000_000_007u64) * 30u32;
    let starts = table.starting_multiples(&base, config.small_prime_count);
    let mut session = SieveSession::load(config, table, WORDS, 0).unwrap();
    session.init(&starts.large, &starts.small).unwrap();
    let range = session.range_size();
    let mut offset = 0u64;
    c.bench_function("run_sieve(64K words, primes < 1M)", |b| {
        b.iter(|| {
            session.run_sieve(black_box(offset)).unwrap();
            offset += range;
        });
    });
}

fn bench_find_and_clean(c: &mut Criterion) {
    let config = SieveConfig {
        min_chain_length: 4,
        ..bench_config()
    };
    let table = PrimeTable::generate(100_000);
    let base = Integer::from(1_000_000_000_007u64) * 30u32;
    let starts = table.starting_multiples(&base, config.small_prime_count);
    let mut session = SieveSession::load(config, table, WORDS, 0).unwrap();
    session.init(&starts.large, &starts.small).unwrap();
    session.run_sieve(0).unwrap();
    c.bench_function("find_chains + clean_chains(64K words)", |b| {
        b.iter(|| {
            session.find_chains();
            black_box(session.clean_chains());
            session.get_chains()
        });
    });
}

criterion_group!(
    benches,
    bench_generate_table_1m,
    bench_run_sieve,
    bench_find_and_clean,
);
criterion_main!(benches);
