use std::collections::HashSet;
use std::sync::Arc;

use stmtcache::{
    CacheConfig, ConnectionCaches, Deallocate, LruCache, Result, StatementCache,
    StatementDescription, TransactionStatus, UsageThresholdCache, statement_name,
};

fn desc(sql: &str) -> Arc<StatementDescription> {
    Arc::new(StatementDescription::named_from_sql(sql, vec![23, 23], Vec::new()))
}

fn invalidated_sql(cache: &dyn StatementCache) -> Vec<String> {
    cache
        .get_invalidated()
        .iter()
        .map(|sd| sd.sql().to_string())
        .collect()
}

/// Stand-in for a server: tracks which named statements exist.
#[derive(Default)]
struct FakeServer {
    prepared: HashSet<String>,
    prepare_count: usize,
}

impl FakeServer {
    fn prepare(&mut self, sql: &str) -> Arc<StatementDescription> {
        let sd = desc(sql);
        self.prepared.insert(sd.name().to_string());
        self.prepare_count += 1;
        sd
    }

    fn deallocate_all(&mut self) {
        self.prepared.clear();
    }
}

impl Deallocate for FakeServer {
    fn deallocate(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            self.prepared.remove(*name);
        }
        Ok(())
    }
}

/// Runs `sql` the way a driver would: deallocate pending statements, use the
/// cached statement on a hit, otherwise prepare and offer the result to the
/// cache. A statement the cache declines runs as the unnamed statement and
/// leaves nothing behind on the server.
fn run(caches: &mut ConnectionCaches, server: &mut FakeServer, sql: &str) {
    caches
        .deallocate_invalidated(TransactionStatus::Idle, server)
        .unwrap();

    let Some(cache) = caches.statement_cache() else {
        return;
    };
    if let Some(sd) = cache.get(sql) {
        assert!(server.prepared.contains(sd.name()), "cached statement must exist");
        return;
    }

    let (len, pending) = (cache.len(), cache.get_invalidated().len());
    cache.put(desc(sql));
    if cache.len() > len || cache.get_invalidated().len() > pending {
        server.prepare(sql);
    }
}

#[test]
fn threshold_two_scenario() {
    let mut cache = UsageThresholdCache::new(10, 2).unwrap();
    let a = desc("A");

    assert!(cache.get("A").is_none());
    assert!(cache.get("A").is_none());
    cache.put(Arc::clone(&a));

    let hit = cache.get("A").unwrap();
    assert!(Arc::ptr_eq(&hit, &a));

    cache.invalidate("A");
    assert_eq!(invalidated_sql(&cache), vec!["A"]);
    cache.remove_invalidated();
    assert!(cache.get_invalidated().is_empty());

    assert!(cache.get("A").is_none());
    assert_eq!(cache.usage_count("A"), 1);
}

#[test]
fn threshold_zero_scenario() {
    let mut cache = UsageThresholdCache::new(10, 0).unwrap();
    assert!(cache.get("B").is_none());
    cache.put(desc("B"));
    assert!(cache.get("B").is_some());
}

#[test]
fn capacity_one_scenario() {
    let mut cache = UsageThresholdCache::new(1, 0).unwrap();
    cache.put(desc("X"));
    cache.put(desc("Y"));

    assert_eq!(cache.len(), 1);
    assert!(cache.get("Y").is_some());
    assert_eq!(invalidated_sql(&cache), vec!["X"]);
}

#[test]
fn threshold_monotonicity() {
    for threshold in 0..5u32 {
        let mut cache = UsageThresholdCache::new(10, threshold).unwrap();
        for _ in 1..threshold {
            assert!(cache.get("q").is_none());
            cache.put(desc("q"));
        }
        // Each put above happened before the count reached the threshold.
        assert!(cache.is_empty(), "threshold {threshold}");

        assert!(cache.get("q").is_none());
        cache.put(desc("q"));
        assert!(cache.get("q").is_some(), "threshold {threshold}");
    }
}

#[test]
fn capacity_bound_evicts_exactly_one() {
    let capacity = 4;
    let mut cache = LruCache::new(capacity).unwrap();
    for i in 0..=capacity {
        cache.put(desc(&format!("SELECT {i}")));
    }

    assert_eq!(cache.len(), capacity);
    assert_eq!(invalidated_sql(&cache), vec!["SELECT 0"]);
}

#[test]
fn invalidate_all_restarts_counting() {
    let mut cache = UsageThresholdCache::new(10, 1).unwrap();
    cache.get("A");
    cache.put(desc("A"));
    cache.get("B");

    cache.invalidate_all();
    cache.remove_invalidated();

    assert!(cache.get("A").is_none());
    assert_eq!(cache.usage_count("A"), 1);
    assert_eq!(cache.usage_count("B"), 0);
}

#[test]
fn empty_sql_rejection_leaves_state_unchanged() {
    let mut cache = UsageThresholdCache::new(10, 0).unwrap();
    cache.put(desc("A"));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.put(Arc::new(StatementDescription::new("n", "", Vec::new(), Vec::new())));
    }));

    assert!(result.is_err());
    assert_eq!(cache.len(), 1);
    assert!(cache.get("A").is_some());
    assert!(cache.get_invalidated().is_empty());
}

#[test]
fn statement_names_are_derived_from_sql() {
    let sd = desc("SELECT $1::int + $2::int");
    assert_eq!(sd.name(), statement_name("SELECT $1::int + $2::int"));
    assert!(sd.name().starts_with("stmtcache_"));
}

#[test]
fn driver_keeps_statement_once_threshold_reached() {
    let config = CacheConfig::new().usage_threshold(2);
    let mut caches = ConnectionCaches::new(&config).unwrap();
    let mut server = FakeServer::default();

    let add = "SELECT $1::int + $2::int";
    run(&mut caches, &mut server, add);
    assert!(server.prepared.is_empty());

    run(&mut caches, &mut server, add);
    assert_eq!(server.prepared.len(), 1);

    run(&mut caches, &mut server, add);
    run(&mut caches, &mut server, add);
    assert_eq!(server.prepared.len(), 1);
    assert_eq!(server.prepare_count, 1);

    let sub = "SELECT $1::int - $2::int";
    run(&mut caches, &mut server, sub);
    assert_eq!(server.prepared.len(), 1);
    run(&mut caches, &mut server, sub);
    assert_eq!(server.prepared.len(), 2);
}

#[test]
fn driver_default_threshold_serves_second_use_from_cache() {
    let mut caches = ConnectionCaches::new(&CacheConfig::new()).unwrap();
    let mut server = FakeServer::default();

    run(&mut caches, &mut server, "SELECT 1");
    assert_eq!(server.prepare_count, 1);
    run(&mut caches, &mut server, "SELECT 1");
    run(&mut caches, &mut server, "SELECT 1");
    assert_eq!(server.prepare_count, 1);
}

#[test]
fn driver_deallocate_all_resets_tracking() {
    let config = CacheConfig::new().usage_threshold(2);
    let mut caches = ConnectionCaches::new(&config).unwrap();
    let mut server = FakeServer::default();
    let insert = "INSERT INTO usage_threshold_test VALUES($1)";

    run(&mut caches, &mut server, insert);
    assert!(server.prepared.is_empty());

    server.deallocate_all();
    assert!(caches.observe_command_tag("DEALLOCATE ALL"));

    // Counting restarted, so one more use is not enough.
    run(&mut caches, &mut server, insert);
    assert!(server.prepared.is_empty());

    run(&mut caches, &mut server, insert);
    assert_eq!(server.prepared.len(), 1);
}

#[test]
fn driver_deallocates_evicted_statements() {
    let config = CacheConfig::new()
        .statement_cache_capacity(1)
        .usage_threshold(0);
    let mut caches = ConnectionCaches::new(&config).unwrap();
    let mut server = FakeServer::default();

    run(&mut caches, &mut server, "SELECT 1");
    run(&mut caches, &mut server, "SELECT 2");
    assert_eq!(server.prepared.len(), 2);
    assert_eq!(caches.pending_deallocation().len(), 1);

    // The next exchange deallocates the evicted statement first.
    run(&mut caches, &mut server, "SELECT 2");
    assert_eq!(server.prepared.len(), 1);
    assert!(server.prepared.contains(&statement_name("SELECT 2")));
    assert!(caches.pending_deallocation().is_empty());
}
