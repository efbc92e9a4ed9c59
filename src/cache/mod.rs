// 缓存模块
// 包含缓存键、底层存储接口和两个键族的操作

pub mod keys;
pub mod memory;
pub mod operations;
pub mod redis_store;
pub mod store;

// 重新导出常用类型，方便其他模块使用
pub use memory::MemoryCacheStore;
pub use operations::{SessionCacheOperations, UserCacheOperations};
pub use redis_store::RedisCacheStore;
pub use store::{CacheError, CacheStore, CacheWrite};
