use std::env;

/// Configuration for benchmarks, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Simulated origin latency in milliseconds (from DB_LATENCY_MS env var, defaults to 10)
    pub db_latency_ms: u64,

    /// Sample size for benchmarks (from BENCH_SAMPLE_SIZE env var, defaults to 100)
    pub sample_size: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            db_latency_ms: env::var("DB_LATENCY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            sample_size: env::var("BENCH_SAMPLE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        let config = Self::default();
        eprintln!("Benchmark Configuration:");
        eprintln!("  Origin Latency: {}ms", config.db_latency_ms);
        eprintln!("  Sample Size: {}", config.sample_size);
        config
    }
}
