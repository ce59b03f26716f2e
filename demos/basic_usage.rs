use std::time::Duration;

use futures::StreamExt;
use numista_rs::{CacheMode, NumistaClient, RequestDescriptor};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Catalogue {
    id: u64,
    code: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct TypeSummary {
    id: u64,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing-subscriber")]
    numista_rs::init_tracing();

    // 1. Build a client: API key from the environment, one-day cache, default quota.
    let api_key = std::env::var("NUMISTA_API_KEY")?;
    let client = NumistaClient::builder()
        .api_key(api_key)
        .cache_ttl(Duration::from_secs(24 * 60 * 60))
        .timeout(Duration::from_secs(10))
        .build()?;

    // 2. A cacheable GET. Run the demo twice to see the second run served from disk.
    let catalogues = RequestDescriptor::get("/catalogues").query("lang", "en");
    let env = client.execute(&catalogues).await?;
    let list: Vec<Catalogue> = env.decode_field("catalogues")?;
    println!("{} {} catalogues", env.cache_indicator(), list.len());
    for c in list.iter().take(5) {
        println!("  #{:<4} {:<8} {}", c.id, c.code, c.title);
    }
    println!();

    // 3. Force a fresh copy without dropping the cached one first.
    let fresh = client
        .execute_with(&catalogues, CacheMode::Refresh, None)
        .await?;
    println!("refreshed: {} (status {})", fresh.cache_indicator(), fresh.status());
    println!();

    // 4. Walk a search lazily; only as many pages as needed are fetched.
    let search = RequestDescriptor::get("/types")
        .query("q", "5 francs")
        .query("lang", "en");
    let mut types = std::pin::pin!(
        client
            .paginate::<TypeSummary>(search, "types")
            .page_size(25)
            .into_stream()
            .take(40)
    );
    while let Some(item) = types.next().await {
        let t = item?;
        println!("  type {:<8} {}", t.id, t.title);
    }
    println!();

    // 5. Housekeeping: drop expired rows from the on-disk cache.
    let purged = client.purge_cache()?;
    println!("purged {purged} expired cache entries");

    Ok(())
}
