//! Process-local bounded cache.
//!
//! Best effort only: lives as long as the process, is not shared between
//! instances, and evicts the oldest-inserted key once `capacity` is reached.

use std::{
  collections::{HashMap, VecDeque},
  hash::Hash,
};

use tokio::sync::Mutex;

pub const COACH_CACHE_MAX: usize = 200;
pub const TTS_CACHE_MAX: usize = 120;

struct Inner<K, V> {
  map: HashMap<K, V>,
  order: VecDeque<K>,
}

pub struct BoundedCache<K, V> {
  capacity: usize,
  inner: Mutex<Inner<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  /// A capacity of zero disables caching.
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      inner: Mutex::new(Inner { map: HashMap::new(), order: VecDeque::new() }),
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub async fn get(&self, key: &K) -> Option<V> {
    self.inner.lock().await.map.get(key).cloned()
  }

  /// Inserts or replaces. A replaced key keeps its original insertion slot.
  pub async fn insert(&self, key: K, value: V) {
    if self.capacity == 0 {
      return;
    }
    let mut inner = self.inner.lock().await;
    if let Some(slot) = inner.map.get_mut(&key) {
      *slot = value;
      return;
    }
    while inner.map.len() >= self.capacity {
      match inner.order.pop_front() {
        Some(oldest) => {
          inner.map.remove(&oldest);
        }
        None => break,
      }
    }
    inner.order.push_back(key.clone());
    inner.map.insert(key, value);
  }

  pub async fn len(&self) -> usize {
    self.inner.lock().await.map.len()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;

  #[tokio::test]
  async fn evicts_first_inserted_key() {
    let cache = BoundedCache::new(COACH_CACHE_MAX);
    for i in 0..=COACH_CACHE_MAX {
      cache.insert(format!("k{i}"), i).await;
    }
    assert_eq!(cache.len().await, COACH_CACHE_MAX);
    assert_eq!(cache.get(&"k0".to_string()).await, None);
    assert_eq!(cache.get(&"k1".to_string()).await, Some(1));
    assert_eq!(cache.get(&format!("k{COACH_CACHE_MAX}")).await, Some(COACH_CACHE_MAX));
  }

  #[tokio::test]
  async fn replacing_a_key_does_not_evict() {
    let cache = BoundedCache::new(2);
    cache.insert("a", 1).await;
    cache.insert("b", 2).await;
    cache.insert("a", 10).await;
    assert_eq!(cache.len().await, 2);
    assert_eq!(cache.get(&"a").await, Some(10));

    // "a" still holds the oldest slot.
    cache.insert("c", 3).await;
    assert_eq!(cache.get(&"a").await, None);
    assert_eq!(cache.get(&"b").await, Some(2));
  }

  #[tokio::test]
  async fn zero_capacity_stores_nothing() {
    let cache = BoundedCache::new(0);
    cache.insert(1u8, "x").await;
    assert_eq!(cache.len().await, 0);
    assert_eq!(cache.capacity(), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_inserts_stay_bounded() {
    let cache = Arc::new(BoundedCache::new(TTS_CACHE_MAX));
    let mut handles = Vec::new();
    for t in 0..8 {
      let cache = cache.clone();
      handles.push(tokio::spawn(async move {
        for i in 0..100 {
          cache.insert((t, i), vec![t as u8, i as u8]).await;
          let _ = cache.get(&(t, i)).await;
        }
      }));
    }
    for h in handles {
      h.await.unwrap();
    }
    assert_eq!(cache.len().await, TTS_CACHE_MAX);
  }
}
