use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 性别，目前只支持男和女
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(format!("unsupported gender: {}", other)),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 用户数据库实体
///
/// 数据库是唯一可信来源，缓存里存的都是它的 JSON 快照。
/// `password` 会随快照一起写入缓存，登录命中缓存时需要用它比对。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    pub age: i32,
    pub password: String,
    pub nickname: String,
    pub creator: String,
    pub create_time: DateTime<Utc>,
    pub modifier: String,
    pub modify_time: DateTime<Utc>,
    /// 行版本号，每次更新自增，用来拒绝旧快照覆盖新快照
    pub version: i64,
}

/// 注册时写入的新用户
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub gender: Gender,
    pub age: i32,
    pub password: String,
    pub nickname: String,
}
