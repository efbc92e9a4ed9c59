use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::store::{CacheError, CacheStore, CacheWrite, snapshot_version};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    write_prefixes: Vec<String>,
}

/// 内存版缓存，语义与 redis 实现一致，过期基于 tokio 时钟
///
/// 可以模拟整体不可用，或者只让某个键前缀的写入失败。
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
    faults: Mutex<Faults>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让所有读写删都失败
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults_lock().unavailable = unavailable;
    }

    /// 让以 `prefix` 开头的键的写入失败，删除和读取不受影响
    pub fn fail_writes_with_prefix(&self, prefix: &str) {
        self.faults_lock().write_prefixes.push(prefix.to_string());
    }

    pub fn clear_faults(&self) {
        *self.faults_lock() = Faults::default();
    }

    /// 未过期的原始值
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        self.entries_lock()
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        self.entries_lock()
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// 剩余存活时间
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries_lock()
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now)
    }

    /// 绕过所有检查直接写入，用来构造损坏或过期的数据
    pub fn put_raw(&self, key: &str, value: &[u8], ttl: Duration) {
        self.entries_lock().insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn check_read(&self) -> Result<(), CacheError> {
        if self.faults_lock().unavailable {
            return Err(CacheError::Unavailable("memory cache switched off".into()));
        }
        Ok(())
    }

    fn check_write(&self, key: &str) -> Result<(), CacheError> {
        let faults = self.faults_lock();
        if faults.unavailable || faults.write_prefixes.iter().any(|p| key.starts_with(p)) {
            return Err(CacheError::Unavailable(format!("write to {} rejected", key)));
        }
        Ok(())
    }

    fn entries_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn faults_lock(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// 已缓存的快照是否比 `version` 新
fn is_newer(entry: &Entry, version: i64) -> bool {
    snapshot_version(&entry.value).is_some_and(|cached| cached > version)
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.check_read()?;
        let now = Instant::now();
        let mut entries = self.entries_lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.check_write(key)?;
        self.put_raw(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check_read()?;
        self.entries_lock().remove(key);
        Ok(())
    }

    async fn set_if_newer(
        &self,
        key: &str,
        value: &[u8],
        version: i64,
        ttl: Duration,
    ) -> Result<CacheWrite, CacheError> {
        self.check_write(key)?;
        let now = Instant::now();
        let mut entries = self.entries_lock();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now && is_newer(entry, version) {
                return Ok(CacheWrite::Skipped);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: now + ttl,
            },
        );
        Ok(CacheWrite::Written)
    }

    async fn replace_if_newer(
        &self,
        key: &str,
        value: &[u8],
        version: i64,
    ) -> Result<CacheWrite, CacheError> {
        self.check_write(key)?;
        let now = Instant::now();
        let mut entries = self.entries_lock();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                if is_newer(entry, version) {
                    return Ok(CacheWrite::Skipped);
                }
                entry.value = value.to_vec();
                Ok(CacheWrite::Written)
            }
            _ => Ok(CacheWrite::Skipped),
        }
    }
}
