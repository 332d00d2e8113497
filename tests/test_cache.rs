use std::time::Duration;

use miniblade::{context, DiskCache, Engine, FsLoader, MemoryCache};
use similar_asserts::assert_eq;

fn cached_engine() -> Engine {
    let mut engine = Engine::new();
    engine.add_template("page", "value: {{ n }}");
    engine.set_cache(MemoryCache::new(16));
    engine
}

#[test]
fn test_repeat_render_hits_cache() {
    let engine = cached_engine();
    let first = engine.render("page", context! { n => 1 }).unwrap();
    let second = engine.render("page", context! { n => 1 }).unwrap();
    assert_eq!(first, "value: 1");
    assert_eq!(first, second);

    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.size, 1);
}

#[test]
fn test_different_context_is_a_different_entry() {
    let engine = cached_engine();
    assert_eq!(engine.render("page", context! { n => 1 }).unwrap(), "value: 1");
    assert_eq!(engine.render("page", context! { n => 2 }).unwrap(), "value: 2");

    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.size, 2);
}

#[test]
fn test_invalidate_template_drops_all_contexts() {
    let engine = cached_engine();
    engine.render("page", context! { n => 1 }).unwrap();
    engine.render("page", context! { n => 2 }).unwrap();
    assert_eq!(engine.cache_stats().unwrap().size, 2);

    engine.invalidate_template("page").unwrap();
    assert_eq!(engine.cache_stats().unwrap().size, 0);

    engine.render("page", context! { n => 1 }).unwrap();
    assert_eq!(engine.cache_stats().unwrap().misses, 3);
}

#[test]
fn test_clear_cache() {
    let engine = cached_engine();
    engine.render("page", context! { n => 1 }).unwrap();
    engine.clear_cache();
    assert_eq!(engine.cache_stats().unwrap().size, 0);
}

#[test]
fn test_source_change_misses() {
    let mut engine = cached_engine();
    engine.render("page", context! { n => 1 }).unwrap();
    engine.add_template("page", "changed: {{ n }}");
    let rv = engine.render("page", context! { n => 1 }).unwrap();
    assert_eq!(rv, "changed: 1");
}

#[test]
fn test_modified_file_invalidates_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.html");
    std::fs::write(&path, "same output").unwrap();

    let mut engine = Engine::new();
    engine.set_loader(FsLoader::new(dir.path()));
    engine.set_cache(MemoryCache::new(16));

    engine.render("page", context! {}).unwrap();
    engine.render("page", context! {}).unwrap();
    assert_eq!(engine.cache_stats().unwrap().hits, 1);

    // same content, newer mtime: the stored marker no longer matches
    std::thread::sleep(Duration::from_millis(20));
    std::fs::write(&path, "same output").unwrap();
    engine.render("page", context! {}).unwrap();
    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}

#[test]
fn test_track_modified_disabled_keeps_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.html");
    std::fs::write(&path, "same output").unwrap();

    let mut engine = Engine::new();
    engine.set_loader(FsLoader::new(dir.path()));
    engine.set_cache(MemoryCache::new(16));
    engine.set_track_modified(false);

    engine.render("page", context! {}).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    std::fs::write(&path, "same output").unwrap();
    engine.render("page", context! {}).unwrap();
    assert_eq!(engine.cache_stats().unwrap().hits, 1);
}

#[test]
fn test_memory_cache_evicts_least_recently_used() {
    let mut engine = Engine::new();
    engine.add_template("page", "{{ n }}");
    engine.set_cache(MemoryCache::new(2));
    engine.render("page", context! { n => 1 }).unwrap();
    engine.render("page", context! { n => 2 }).unwrap();
    // refresh entry 1, then force an eviction
    engine.render("page", context! { n => 1 }).unwrap();
    engine.render("page", context! { n => 3 }).unwrap();
    assert_eq!(engine.cache_stats().unwrap().size, 2);

    // entry 1 survived, entry 2 was evicted
    engine.render("page", context! { n => 1 }).unwrap();
    assert_eq!(engine.cache_stats().unwrap().hits, 2);
    engine.render("page", context! { n => 2 }).unwrap();
    assert_eq!(engine.cache_stats().unwrap().misses, 4);
}

#[test]
fn test_memory_cache_ttl_expiry() {
    let mut engine = Engine::new();
    engine.add_template("page", "x");
    engine.set_cache(MemoryCache::new(4).with_ttl(Duration::from_millis(10)));
    engine.render("page", context! {}).unwrap();
    std::thread::sleep(Duration::from_millis(25));
    engine.render("page", context! {}).unwrap();
    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 2);
}

#[test]
fn test_disk_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::new();
    engine.add_template("page", "n={{ n }}");
    engine.set_cache(DiskCache::new(dir.path().join("cache"), 16).unwrap());

    assert_eq!(engine.render("page", context! { n => 5 }).unwrap(), "n=5");
    assert_eq!(engine.render("page", context! { n => 5 }).unwrap(), "n=5");
    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 1);
}

#[test]
fn test_disk_cache_survives_reinstall() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");

    let mut engine = Engine::new();
    engine.add_template("page", "stable");
    engine.set_cache(DiskCache::new(&cache_dir, 16).unwrap());
    engine.render("page", context! {}).unwrap();

    // a fresh cache over the same directory sees the stored entry
    let mut engine = Engine::new();
    engine.add_template("page", "stable");
    engine.set_cache(DiskCache::new(&cache_dir, 16).unwrap());
    engine.render("page", context! {}).unwrap();
    assert_eq!(engine.cache_stats().unwrap().hits, 1);
}

#[test]
fn test_disk_cache_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::new();
    engine.add_template("page", "{{ n }}");
    engine.set_cache(DiskCache::new(dir.path().join("cache"), 16).unwrap());
    engine.render("page", context! { n => 1 }).unwrap();
    engine.render("page", context! { n => 2 }).unwrap();
    engine.invalidate_template("page").unwrap();
    assert_eq!(engine.cache_stats().unwrap().size, 0);
}

#[test]
fn test_render_str_bypasses_cache() {
    let mut engine = Engine::new();
    engine.set_cache(MemoryCache::new(16));
    engine.render_str("x", context! {}).unwrap();
    engine.render_str("x", context! {}).unwrap();
    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.size, 0);
}
