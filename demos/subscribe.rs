//! Example demonstrating subscriptions over a file-mirrored store.
//!
//! This shows the full data-layer loop: subscribe to a key, let the
//! engine fetch it in the background, push an optimistic local write,
//! and watch every refresh arrive through the subscription. The cache
//! survives restarts through a JSON file mirror.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swr_engine::{
    DataListener, JsonFileBackend, MirrorBackend, PersistentStore, Swr, fetcher_fn, manual_trigger,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Quote {
    symbol: String,
    price_cents: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join("swr-engine-demo.json");
    let backend: Arc<dyn MirrorBackend<Quote>> = Arc::new(JsonFileBackend::new(&path));
    let store = PersistentStore::new(backend).await?;

    // Fake origin: every fetch takes a moment and moves the price
    let tick = Arc::new(AtomicU64::new(100_00));
    let fetcher = fetcher_fn(move |key: String| {
        let tick = tick.clone();
        async move {
            println!("Fetching {} from the origin", key);
            tokio::time::sleep(tokio::time::Duration::from_millis(150)).await;
            Ok(Quote {
                symbol: key,
                price_cents: tick.fetch_add(25, Ordering::SeqCst),
            })
        }
    });

    let (focus, focus_handle) = manual_trigger();

    let engine: Swr<Quote> = Swr::builder()
        .cache(Arc::new(store))
        .fetcher(fetcher)
        .focus_when(focus)
        .deduping_interval(500)
        .build();

    // Follow a key: the engine fetches it and keeps us posted
    let on_data: DataListener<Quote> = Arc::new(|quote| match quote {
        Some(quote) => println!(
            "Subscriber saw {} at {} cents",
            quote.symbol, quote.price_cents
        ),
        None => println!("Subscriber saw the entry go away"),
    });
    let mut subscription = engine.subscribe("ACME", Some(on_data), None, None);

    let first = subscription.revalidated().await?;
    println!("Start revalidation produced: {:?}", first);

    // Optimistic local write; the follow-up refetch replaces it
    engine
        .mutate(
            "ACME",
            Quote {
                symbol: "ACME".into(),
                price_cents: 99_00,
            },
            None,
        )
        .await?;

    // A focus event refreshes the key once its horizon has passed
    tokio::time::sleep(tokio::time::Duration::from_millis(600)).await;
    focus_handle.fire();
    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;

    println!("Settled value: {:?}", engine.get("ACME"));

    subscription.unsubscribe();

    // The JSON mirror keeps the data for the next run
    println!("Mirror file: {}", path.display());

    Ok(())
}
