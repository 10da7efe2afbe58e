use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use swr_engine::{Fetcher, fetcher_fn};

/// Test data structure for benchmarks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub score: u32,
}

impl BenchUser {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            score: (id % 1000) as u32,
        }
    }
}

/// Simulated origin with configurable latency
#[derive(Clone)]
pub struct FakeDatabase {
    data: Arc<HashMap<String, BenchUser>>,
    latency_ms: u64,
    query_count: Arc<AtomicUsize>,
}

impl FakeDatabase {
    pub fn new(num_users: usize, latency_ms: u64) -> Self {
        let mut data = HashMap::new();
        for i in 0..num_users {
            let user = BenchUser::new(i as u64);
            data.insert(format!("user:{}", i), user);
        }

        Self {
            data: Arc::new(data),
            latency_ms,
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// An engine fetcher that queries this database.
    pub fn fetcher(&self) -> Fetcher<BenchUser> {
        let db = self.clone();
        fetcher_fn(move |key: String| {
            let db = db.clone();
            async move {
                db.query_count.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(db.latency_ms)).await;
                db.data
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| format!("no user under {}", key).into())
            }
        })
    }

    #[allow(dead_code)]
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }
}

/// Generate test keys for different workload patterns
pub struct KeyGenerator {
    num_keys: usize,
}

impl KeyGenerator {
    pub fn new(num_keys: usize) -> Self {
        Self { num_keys }
    }

    /// Generate sequential keys (for cold cache tests)
    pub fn sequential(&self) -> Vec<String> {
        (0..self.num_keys).map(|i| format!("user:{}", i)).collect()
    }

    /// Generate keys for mixed workloads (some hits, some misses)
    pub fn mixed(&self, hit_ratio: f64, count: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let hot_key_count = (self.num_keys as f64 * hit_ratio) as usize;

        (0..count)
            .map(|_| {
                if rng.gen_bool(hit_ratio) {
                    format!("user:{}", rng.gen_range(0..hot_key_count))
                } else {
                    format!("user:{}", rng.gen_range(hot_key_count..self.num_keys))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn test_fake_database_fetcher() {
        use super::FakeDatabase;

        let db = FakeDatabase::new(100, 0);
        let fetcher = db.fetcher();

        let user = fetcher("user:0".to_string()).await.unwrap();
        assert_eq!(user.id, 0);
        assert_eq!(db.query_count(), 1);

        assert!(fetcher("user:999".to_string()).await.is_err());
    }

    #[test]
    fn test_key_generator() {
        use super::KeyGenerator;

        let key_gen = KeyGenerator::new(100);

        let seq = key_gen.sequential();
        assert_eq!(seq.len(), 100);
        assert_eq!(seq[0], "user:0");

        let mixed = key_gen.mixed(0.8, 50);
        assert_eq!(mixed.len(), 50);
    }
}
