use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::{StoreError, UserRepository};
use crate::database::models::user::{NewUser, User};

/// 内存版用户存储库，供测试和本地调试使用
///
/// 记录调用次数，并可以模拟数据库不可用。
#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<HashMap<String, User>>,
    next_id: AtomicUsize,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟数据库宕机，之后的所有调用都返回 [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 到目前为止的存储库调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 直接读一条记录，不计入调用次数
    pub fn peek(&self, name: &str) -> Option<User> {
        self.lock().get(name).cloned()
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, User>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        self.enter()?;
        Ok(self.lock().get(name).cloned())
    }

    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        self.enter()?;
        let mut users = self.lock();
        if users.contains_key(&user.name) {
            return Err(StoreError::UniqueViolation(user.name.clone()));
        }

        let now = Utc::now();
        let created = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1,
            name: user.name.clone(),
            gender: user.gender,
            age: user.age,
            password: user.password.clone(),
            nickname: user.nickname.clone(),
            creator: user.name.clone(),
            create_time: now,
            modifier: user.name.clone(),
            modify_time: now,
            version: 1,
        };
        users.insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn update_nickname(
        &self,
        name: &str,
        nickname: &str,
        modifier: &str,
    ) -> Result<u64, StoreError> {
        self.enter()?;
        let mut users = self.lock();
        match users.get_mut(name) {
            Some(user) => {
                user.nickname = nickname.to_string();
                user.modifier = modifier.to_string();
                user.modify_time = Utc::now();
                user.version += 1;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
