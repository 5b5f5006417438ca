//! Deterministic scenario harness: exercises the cache façade through the
//! scenarios used as its test vectors, end to end, with narration.
//!
//! Run with: `cargo run -p dp-sim --bin demo`

use dp_persist::{MemoryColdStore, PersisterLoop};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use streamdp::{Cache, CacheConfig, ChunkDescriptor, Datapoint, InsertPipelineConfig, SubstreamKey};

fn dp(ts: f64) -> Datapoint {
    Datapoint::new(ts, ts, "")
}

/// Picks one of a fixed set of device ids deterministically from `seed`,
/// standing in for whatever naming scheme a real caller would use —
/// the scenarios below don't care which device they land on, only that
/// every operation in a run agrees on the same one.
fn device_for_seed(seed: u64) -> String {
    let candidates = ["device-a", "device-b", "device-c"];
    let mut rng = SmallRng::seed_from_u64(seed);
    candidates[rng.gen_range(0..candidates.len())].to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Streaming datapoint cache: scenario walkthrough ===\n");

    scenario_s1_chunk_emission().await;
    scenario_s2_timestamp_rejection().await;
    scenario_s3_restamp().await;
    scenario_s4_batch_queue_round_trip().await;
    scenario_s5_trim().await;
    scenario_s6_range_miss_after_trim().await;
    scenario_s7_delete_scoping().await;
    scenario_persister_drains_to_cold_store().await;

    println!("\n=== All scenarios completed ===");
    Ok(())
}

async fn scenario_s1_chunk_emission() {
    println!("--- S1: chunk emission at a batch boundary ---");
    let cache = Cache::new(CacheConfig { batch_size: 2 }, InsertPipelineConfig::default());
    let device = device_for_seed(1);
    let key = SubstreamKey::new(device.as_str(), "mystream", "");
    let points: Vec<Datapoint> = (1..=5).map(|i| dp(i as f64)).collect();

    let new_length = cache.insert("batcher", &key, points, false, 0, 0).await.unwrap();
    println!("  inserted 5 points on {device}, new_length={new_length}");

    let list = cache.get_list("batcher").await.unwrap();
    let encoded: Vec<String> = list.iter().map(ChunkDescriptor::encode).collect();
    println!("  batcher list (newest first): {encoded:?}");
    println!("  ✓ two chunks closed at the batch boundary\n");
}

async fn scenario_s2_timestamp_rejection() {
    println!("--- S2: out-of-order insert without restamp ---");
    let cache = Cache::new(CacheConfig::default(), InsertPipelineConfig::default());
    let key = SubstreamKey::new(device_for_seed(2), "mystream", "");
    cache.insert("batcher", &key, vec![dp(1.0), dp(2.0), dp(3.0)], false, 0, 0).await.unwrap();

    match cache.insert("batcher", &key, vec![dp(1.0)], false, 0, 0).await {
        Err(e) => println!("  insert of an earlier timestamp rejected: {e}"),
        Ok(_) => println!("  unexpected: insert should have been rejected"),
    }
    println!("  ✓ monotonicity enforced\n");
}

async fn scenario_s3_restamp() {
    println!("--- S3: restamp rewrites an out-of-order point forward ---");
    let cache = Cache::new(CacheConfig::default(), InsertPipelineConfig::default());
    let key = SubstreamKey::new(device_for_seed(3), "mystream", "");
    cache.insert("batcher", &key, vec![dp(1.0), dp(2.0), dp(3.0)], false, 0, 0).await.unwrap();

    let new_length = cache.insert("batcher", &key, vec![dp(1.0)], true, 0, 0).await.unwrap();
    let stored = cache.get(&key).await.unwrap();
    println!("  new_length={new_length}, last stored timestamp={}", stored.as_slice()[3].timestamp);
    println!("  ✓ restamped point committed after the running max\n");
}

async fn scenario_s4_batch_queue_round_trip() {
    println!("--- S4: NextBatch -> ReadBatch returns the claimed window ---");
    let cache = Cache::new(CacheConfig { batch_size: 2 }, InsertPipelineConfig::default());
    let key = SubstreamKey::new(device_for_seed(4), "mystream", "");
    let points: Vec<Datapoint> = (1..=5).map(|i| dp(i as f64)).collect();
    cache.insert("batcher", &key, points, false, 0, 0).await.unwrap();

    let claimed = cache.next_batch("batcher", "inflight").await.unwrap().unwrap();
    println!("  claimed descriptor: {}", claimed.encode());

    let batch = cache.read_batch(&claimed).await.unwrap();
    println!("  resolved {} points, window [{}, {})", batch.data.len(), batch.start_index, batch.end_index());
    println!("  ✓ claim is durable in the inflight list until acknowledged\n");
}

async fn scenario_s5_trim() {
    println!("--- S5: trim discards whole closed chunks from the tail ---");
    let cache = Cache::new(CacheConfig { batch_size: 3 }, InsertPipelineConfig::default());
    let key = SubstreamKey::new(device_for_seed(5), "mystream", "");
    let points: Vec<Datapoint> = (1..=9).map(|i| dp(i as f64)).collect();
    cache.insert("batcher", &key, points, false, 0, 0).await.unwrap();

    cache.trim_stream(&key, 2).await.unwrap();
    println!("  trim(2): still {} cached (chunk boundary not yet crossed)", cache.get(&key).await.unwrap().len());

    cache.trim_stream(&key, 3).await.unwrap();
    println!("  trim(3): {} cached, length still {}", cache.get(&key).await.unwrap().len(), cache.stream_length(&key).await.unwrap());
    println!("  ✓ logical length unaffected by trimming\n");
}

async fn scenario_s6_range_miss_after_trim() {
    println!("--- S6: range against a trimmed window reports a miss ---");
    let cache = Cache::new(CacheConfig { batch_size: 3 }, InsertPipelineConfig::default());
    let key = SubstreamKey::new(device_for_seed(6), "mystream", "");
    let points: Vec<Datapoint> = (1..=9).map(|i| dp(i as f64)).collect();
    cache.insert("batcher", &key, points, false, 0, 0).await.unwrap();
    cache.trim_stream(&key, 3).await.unwrap();

    let miss = cache.range(&key, 2, 0).await.unwrap();
    println!("  range(2, 0): data present = {}, normalized window [{}, {})", miss.data.is_some(), miss.effective_i1, miss.effective_i2);

    let hit = cache.range(&key, 3, 0).await.unwrap();
    println!("  range(3, 0): data present = {}", hit.data.is_some());
    println!("  ✓ a miss carries the normalized window for a cold-store fallback\n");
}

async fn scenario_s7_delete_scoping() {
    println!("--- S7: DeleteStream only clears the named stream ---");
    let cache = Cache::new(CacheConfig { batch_size: 2 }, InsertPipelineConfig::default());
    let device = device_for_seed(7);
    let other = SubstreamKey::new(device.clone(), "mystream", "s1");
    let primary = SubstreamKey::new(device.clone(), "my2stream", "");
    cache.insert("batcher", &other, vec![dp(1.0)], false, 0, 0).await.unwrap();
    cache.insert("batcher", &primary, vec![dp(1.0)], false, 0, 0).await.unwrap();

    cache.delete_stream(&device, "my2stream").await.unwrap();
    println!(
        "  after delete: my2stream length={}, mystream/s1 length={}",
        cache.stream_length(&primary).await.unwrap(),
        cache.stream_length(&other).await.unwrap()
    );
    println!("  ✓ sibling stream on the same device untouched\n");
}

async fn scenario_persister_drains_to_cold_store() {
    println!("--- Persister: drains the batch queue into cold storage ---");
    let cache = Cache::new(CacheConfig { batch_size: 2 }, InsertPipelineConfig::default());
    let key = SubstreamKey::new(device_for_seed(8), "mystream", "");
    let points: Vec<Datapoint> = (1..=5).map(|i| dp(i as f64)).collect();
    cache.insert("batcher", &key, points, false, 0, 0).await.unwrap();

    let store = MemoryColdStore::new();
    let persister = PersisterLoop::new(cache.batch_queue(), cache.shard_registry(), store, "batcher", "inflight");

    let drained = persister.drain().await.unwrap();
    println!("  drained {drained} chunks into the cold store");
    println!("  ✓ a crash between claim and ack would have left the entry in inflight for retry\n");
}
