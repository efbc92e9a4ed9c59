use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::MultiplexedConnection};

use super::store::{CacheError, CacheStore, CacheWrite, ttl_secs};
use crate::utils::bounded;

// 旧快照不能覆盖新快照，比较和写入在 redis 内部原子完成
const SET_IF_NEWER: &str = r#"
local current = redis.call('GET', KEYS[1])
if current then
    local ok, decoded = pcall(cjson.decode, current)
    if ok and type(decoded) == 'table' then
        local cached = tonumber(decoded['version'])
        if cached and cached > tonumber(ARGV[2]) then
            return 0
        end
    end
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
"#;

// 只刷新仍然存在的键，不延长过期时间
const REPLACE_IF_NEWER: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return 0
end
local ok, decoded = pcall(cjson.decode, current)
if ok and type(decoded) == 'table' then
    local cached = tonumber(decoded['version'])
    if cached and cached > tonumber(ARGV[2]) then
        return 0
    end
end
redis.call('SET', KEYS[1], ARGV[1], 'KEEPTTL')
return 1
"#;

/// 基于 redis 的缓存实现
///
/// 启动时建立一条多路复用连接，每次调用克隆一份，克隆开销很小。
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: MultiplexedConnection,
    timeout: Duration,
    set_if_newer: Script,
    replace_if_newer: Script,
}

impl RedisCacheStore {
    pub async fn connect(client: &redis::Client, timeout: Duration) -> Result<Self, CacheError> {
        let conn = bounded(
            timeout,
            async { Ok::<_, CacheError>(client.get_multiplexed_async_connection().await?) },
            CacheError::Timeout,
        )
        .await?;

        Ok(Self {
            conn,
            timeout,
            set_if_newer: Script::new(SET_IF_NEWER),
            replace_if_newer: Script::new(REPLACE_IF_NEWER),
        })
    }

    fn written(flag: i64) -> CacheWrite {
        if flag == 1 {
            CacheWrite::Written
        } else {
            CacheWrite::Skipped
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        bounded(
            self.timeout,
            async {
                let value: Option<Vec<u8>> = conn.get(key).await?;
                Ok::<_, CacheError>(value)
            },
            CacheError::Timeout,
        )
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        bounded(
            self.timeout,
            async {
                let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await?;
                Ok::<_, CacheError>(())
            },
            CacheError::Timeout,
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        bounded(
            self.timeout,
            async {
                let _: () = conn.del(key).await?;
                Ok::<_, CacheError>(())
            },
            CacheError::Timeout,
        )
        .await
    }

    async fn set_if_newer(
        &self,
        key: &str,
        value: &[u8],
        version: i64,
        ttl: Duration,
    ) -> Result<CacheWrite, CacheError> {
        let mut conn = self.conn.clone();
        bounded(
            self.timeout,
            async {
                let flag: i64 = self
                    .set_if_newer
                    .key(key)
                    .arg(value)
                    .arg(version)
                    .arg(ttl_secs(ttl))
                    .invoke_async(&mut conn)
                    .await?;
                Ok::<_, CacheError>(Self::written(flag))
            },
            CacheError::Timeout,
        )
        .await
    }

    async fn replace_if_newer(
        &self,
        key: &str,
        value: &[u8],
        version: i64,
    ) -> Result<CacheWrite, CacheError> {
        let mut conn = self.conn.clone();
        bounded(
            self.timeout,
            async {
                let flag: i64 = self
                    .replace_if_newer
                    .key(key)
                    .arg(value)
                    .arg(version)
                    .invoke_async(&mut conn)
                    .await?;
                Ok::<_, CacheError>(Self::written(flag))
            },
            CacheError::Timeout,
        )
        .await
    }
}
