//! Кеш ответов каталога и ограничение частоты запросов.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Метаданные проекта практически не меняются за время установки модпака
pub const PROJECT_TTL: Duration = Duration::from_secs(60 * 60);

struct Slot<V> {
    value: V,
    expires_at: Instant,
}

/// Типизированный кеш с TTL. Хранит только успешные ответы, поэтому
/// временная ошибка повторяется при следующем запросе.
pub struct TtlCache<K, V> {
    slots: RwLock<HashMap<K, Slot<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.read().await;
        slots
            .get(key)
            .filter(|slot| slot.expires_at > Instant::now())
            .map(|slot| slot.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut slots = self.slots.write().await;

        if slots.len() >= self.capacity && !slots.contains_key(&key) {
            let now = Instant::now();
            slots.retain(|_, slot| slot.expires_at > now);

            // Всё ещё полон: выбрасываем четверть, начиная с ближайших к истечению
            if slots.len() >= self.capacity {
                let mut by_expiry: Vec<(K, Instant)> = slots
                    .iter()
                    .map(|(k, slot)| (k.clone(), slot.expires_at))
                    .collect();
                by_expiry.sort_by_key(|(_, expires_at)| *expires_at);
                for (stale, _) in by_expiry.into_iter().take((self.capacity / 4).max(1)) {
                    slots.remove(&stale);
                }
            }
        }

        slots.insert(
            key,
            Slot {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Значение из кеша, иначе `fetch` после ожидания rate limiter
    pub async fn get_or_fetch<E, F, Fut>(&self, key: K, limiter: &RateLimiter, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key).await {
            log::debug!("Catalog cache hit for {:?}", key);
            return Ok(hit);
        }

        limiter.wait().await;
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket: `burst` запросов сразу, дальше в среднем `per_second`
pub struct RateLimiter {
    burst: f64,
    per_second: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(burst: f64, per_second: f64) -> Self {
        Self {
            burst,
            per_second,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Берёт токен, если есть; иначе возвращает время ожидания
    pub async fn try_acquire(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let refill = now.duration_since(bucket.refilled_at).as_secs_f64() * self.per_second;
        bucket.tokens = (bucket.tokens + refill).min(self.burst);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - bucket.tokens) / self.per_second))
        }
    }

    pub async fn wait(&self) {
        while let Some(delay) = self.try_acquire().await {
            tokio::time::sleep(delay).await;
        }
    }
}
