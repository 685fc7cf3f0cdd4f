#![no_main]

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use libfuzzer_sys::fuzz_target;
use memocache_core::config::CacheConfig;
use memocache_core::lru_cache::LruCache;

/// Decode ops from raw bytes: 2 bytes per op (opcode, key).
fuzz_target!(|data: &[u8]| {
    let Some((&cap_byte, ops)) = data.split_first() else {
        return;
    };
    let capacity = usize::from(cap_byte % 16) + 1;
    let cfg = CacheConfig {
        capacity,
        idle_ttl_ms: 3_600_000,
        sweep_interval_ms: 1_000,
    };
    let cache = LruCache::with_config(&cfg).expect("capacity is non-zero");

    // front = MRU
    let mut order: VecDeque<u8> = VecDeque::new();
    let mut model: HashMap<u8, u32> = HashMap::new();

    for (step, chunk) in ops.chunks_exact(2).enumerate() {
        let (op, key) = (chunk[0], chunk[1] % 32);
        let value = step as u32;
        match op % 6 {
            0 | 1 => {
                cache.add_or_update(key, value);
                if model.insert(key, value).is_none() && model.len() > capacity {
                    let lru = order.pop_back().expect("model order tracks entries");
                    model.remove(&lru);
                }
                order.retain(|&k| k != key);
                order.push_front(key);
            }
            2 => {
                let got = cache.try_get_value(&key);
                assert_eq!(got, model.get(&key).copied());
                if got.is_some() {
                    order.retain(|&k| k != key);
                    order.push_front(key);
                }
            }
            3 => assert_eq!(cache.peek(&key), model.get(&key).copied()),
            4 => assert_eq!(cache.purge_idle(), 0),
            _ => {
                let later = Instant::now() + Duration::from_secs(7_200);
                assert_eq!(cache.purge_idle_at(later), model.len());
                model.clear();
                order.clear();
            }
        }

        assert_eq!(cache.len(), model.len());
        if let Err(violation) = cache.check_invariants() {
            panic!("invariant violated at step {step}: {violation}");
        }
    }

    assert_eq!(cache.keys_mru(), order.into_iter().collect::<Vec<_>>());
});
